use std::path::Path;

use serde::Serialize;

/// Extensions picked up by the watcher. Anything else is ignored at detection time.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "zip",
];

/// Remote asset type classification, serialized as `{"id": .., "name": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssetType {
    pub id: u32,
    pub name: &'static str,
}

// Base asset type ids of the Content Builder API.
const ASSET_TYPES: &[(&str, AssetType)] = &[
    ("pdf", AssetType::new(127, "document")),
    ("zip", AssetType::ARCHIVE),
    ("jpg", AssetType::new(23, "jpg")),
    ("jpeg", AssetType::new(22, "jpeg")),
    ("png", AssetType::new(28, "png")),
    ("gif", AssetType::new(20, "gif")),
    ("bmp", AssetType::new(25, "bmp")),
    ("tif", AssetType::new(26, "tiff")),
    ("tiff", AssetType::new(26, "tiff")),
];

impl AssetType {
    /// Fallback for extensions missing from the table.
    pub const ARCHIVE: AssetType = AssetType::new(13, "archive");

    const fn new(id: u32, name: &'static str) -> Self {
        Self { id, name }
    }

    /// Classify a file by its (case-insensitive) extension.
    ///
    /// Never fails: unknown or missing extensions map to [`AssetType::ARCHIVE`].
    pub fn classify(path: &Path) -> AssetType {
        let Some(ext) = lowercase_extension(path) else {
            return Self::ARCHIVE;
        };
        ASSET_TYPES
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, t)| *t)
            .unwrap_or(Self::ARCHIVE)
    }
}

/// Whether a path has one of the [`ACCEPTED_EXTENSIONS`].
pub fn is_accepted(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
