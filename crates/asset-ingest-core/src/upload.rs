use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::asset_type::AssetType;
use crate::category::CategoryId;
use crate::error::IngestError;

/// Timestamp suffix appended to display names (and to colliding archive names).
pub const DISPLAY_NAME_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `<file stem>_<timestamp>`, e.g. `invoice_2024-05-01_13-45-10`.
pub fn display_name_for(file_name: &str, at: DateTime<Local>) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    format!("{}_{}", stem, at.format(DISPLAY_NAME_TIME_FORMAT))
}

/// One logical upload attempt.
///
/// Built once per file and reused as-is if the upload has to be retried
/// after a credential renewal, so the display name never changes mid-attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub display_name: String,
    pub file_name: String,
    /// Base64-encoded file content
    pub content: String,
    pub category: CategoryId,
    pub asset_type: AssetType,
    pub is_protected: bool,
}

impl UploadRequest {
    /// Build a request, stamping the display name with the current local time.
    pub fn new(
        file_name: impl Into<String>,
        content: String,
        category: CategoryId,
        asset_type: AssetType,
    ) -> Self {
        Self::new_at(file_name, content, category, asset_type, Local::now())
    }

    /// Build a request with an explicit generation time.
    pub fn new_at(
        file_name: impl Into<String>,
        content: String,
        category: CategoryId,
        asset_type: AssetType,
        at: DateTime<Local>,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            display_name: display_name_for(&file_name, at),
            file_name,
            content,
            category,
            asset_type,
            is_protected: false,
        }
    }
}

/// Server-assigned asset identifier. The API returns it as a number,
/// but strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AssetId {
    Number(u64),
    Text(String),
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Number(n) => write!(f, "{}", n),
            AssetId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Uploads a prepared request to the remote content-asset store.
///
/// Implementations own credential handling; callers only see the final
/// outcome of one logical attempt.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    /// Create the asset, returning its remote id if the server sent one.
    async fn upload(&self, request: &UploadRequest) -> Result<Option<AssetId>, IngestError>;
}
