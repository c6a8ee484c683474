use std::path::Path;

use asset_ingest_core::IngestError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// File content encoded for transfer.
#[derive(Debug, Clone)]
pub struct EncodedContent {
    /// Standard, padded base64
    pub text: String,
    /// Size of the original file in bytes
    pub byte_len: usize,
}

/// Read a whole file and base64-encode it.
///
/// A file that disappears between detection and read surfaces as
/// `IngestError::Io`, which only stops processing of that file.
pub async fn encode(path: &Path) -> Result<EncodedContent, IngestError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| IngestError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    Ok(EncodedContent {
        text: STANDARD.encode(&bytes),
        byte_len: bytes.len(),
    })
}
