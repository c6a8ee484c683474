//! Core types and traits for the folder-to-content-asset ingestion service.
//!
//! This crate holds the pieces that do not depend on a runtime or transport:
//! - `AssetType`: the fixed extension -> remote asset type table
//! - `CategoryMap`: directory name -> remote category id, loaded once per run
//! - `UploadRequest` / `AssetUploader`: what gets sent and who sends it

mod asset_type;
mod category;
mod error;
mod upload;

pub use asset_type::{is_accepted, AssetType, ACCEPTED_EXTENSIONS};
pub use category::{CategoryId, CategoryMap};
pub use error::IngestError;
pub use upload::{
    display_name_for, AssetId, AssetUploader, UploadRequest, DISPLAY_NAME_TIME_FORMAT,
};
