use thiserror::Error;

/// Errors that can occur while ingesting a file.
///
/// None of these are fatal to the service: they are caught at the per-file
/// boundary and the file is left where it was.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Directory '{0}' has no category mapping")]
    UnmappedCategory(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote rejected request with status {status}: {body}")]
    RemoteRejection { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Watch error: {0}")]
    Watch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_category_message_names_directory() {
        let err = IngestError::UnmappedCategory("Invoices".to_string());
        assert_eq!(err.to_string(), "Directory 'Invoices' has no category mapping");
    }
}
