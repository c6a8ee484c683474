mod content_api;

pub use content_api::ContentAssetClient;
