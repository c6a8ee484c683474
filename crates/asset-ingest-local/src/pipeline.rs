use std::path::{Path, PathBuf};
use std::sync::Arc;

use asset_ingest_core::{
    is_accepted, AssetId, AssetType, AssetUploader, CategoryMap, IngestError, UploadRequest,
    DISPLAY_NAME_TIME_FORMAT,
};
use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::encode;

/// What happened to a candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Extension not accepted; nothing was touched
    Ignored,
    /// Parent directory has no category; the file stays in place
    Unmapped { directory: String },
    /// Uploaded and moved into the archive subdirectory
    Archived {
        asset_id: Option<AssetId>,
        destination: PathBuf,
    },
}

/// Turns a settled candidate file into an uploaded, archived asset.
///
/// On any failure the file is left at its original path so that a later
/// create event or rescan can pick it up again.
pub struct Pipeline {
    categories: Arc<CategoryMap>,
    uploader: Arc<dyn AssetUploader>,
    archive_dir_name: String,
}

impl Pipeline {
    pub fn new(
        categories: Arc<CategoryMap>,
        uploader: Arc<dyn AssetUploader>,
        archive_dir_name: impl Into<String>,
    ) -> Self {
        Self {
            categories,
            uploader,
            archive_dir_name: archive_dir_name.into(),
        }
    }

    /// Process one file, logging the outcome. Never fails.
    pub async fn handle(&self, path: &Path) {
        match self.process(path).await {
            Ok(Outcome::Ignored | Outcome::Unmapped { .. }) => {}
            Ok(Outcome::Archived {
                asset_id,
                destination,
            }) => {
                info!(
                    "Archived {} -> {} (asset {})",
                    path.display(),
                    destination.display(),
                    asset_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "<none>".to_string())
                );
            }
            Err(e) => warn!("Failed to ingest {}: {}", path.display(), e),
        }
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn process(&self, path: &Path) -> Result<Outcome, IngestError> {
        if !is_accepted(path) {
            debug!("Ignoring {}: extension not accepted", path.display());
            return Ok(Outcome::Ignored);
        }

        let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
            return Err(IngestError::Io(format!(
                "Path has no parent directory or file name: {}",
                path.display()
            )));
        };
        let directory = parent
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(category) = self.categories.resolve(&directory) else {
            warn!(
                "{}, leaving {} in place",
                IngestError::UnmappedCategory(directory.clone()),
                path.display()
            );
            return Ok(Outcome::Unmapped { directory });
        };

        let archive_dir = parent.join(&self.archive_dir_name);
        tokio::fs::create_dir_all(&archive_dir).await.map_err(|e| {
            IngestError::Io(format!(
                "Failed to create archive dir {}: {}",
                archive_dir.display(),
                e
            ))
        })?;

        let encoded = encode::encode(path).await?;
        let asset_type = AssetType::classify(path);
        debug!(
            "Encoded {} ({} bytes) as {}",
            path.display(),
            encoded.byte_len,
            asset_type.name
        );

        let file_name = file_name.to_string_lossy().into_owned();
        let request = UploadRequest::new(file_name, encoded.text, category, asset_type);
        let asset_id = self.uploader.upload(&request).await?;

        let destination = archive_destination(&archive_dir, &request.file_name).await?;
        tokio::fs::rename(path, &destination).await.map_err(|e| {
            IngestError::Io(format!(
                "Uploaded {} but failed to move it to {}: {}",
                path.display(),
                destination.display(),
                e
            ))
        })?;

        Ok(Outcome::Archived {
            asset_id,
            destination,
        })
    }
}

/// Pick a destination that does not clobber an earlier archived copy.
///
/// `lidos/<name>` if free, else `lidos/<stem>_<timestamp><.ext>`, then
/// `..._<timestamp>-1<.ext>`, `-2`, and so on.
async fn archive_destination(archive_dir: &Path, file_name: &str) -> Result<PathBuf, IngestError> {
    let plain = archive_dir.join(file_name);
    if !exists(&plain).await? {
        return Ok(plain);
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = Local::now().format(DISPLAY_NAME_TIME_FORMAT);

    let mut counter = 0u32;
    loop {
        let candidate = if counter == 0 {
            archive_dir.join(format!("{}_{}{}", stem, stamp, ext))
        } else {
            archive_dir.join(format!("{}_{}-{}{}", stem, stamp, counter, ext))
        };
        if !exists(&candidate).await? {
            debug!("Archive name collision, using {}", candidate.display());
            return Ok(candidate);
        }
        counter += 1;
    }
}

async fn exists(path: &Path) -> Result<bool, IngestError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| IngestError::Io(format!("Failed to stat {}: {}", path.display(), e)))
}
