use std::sync::Arc;
use std::time::Duration;

use asset_ingest_core::{AssetId, AssetUploader, IngestError, UploadRequest};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::auth::{AuthSession, AuthToken};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAssetBody<'a> {
    name: &'a str,
    asset_type: AssetTypeRef<'a>,
    category: CategoryRef,
    file_name: &'a str,
    file: &'a str,
    is_protected: bool,
}

#[derive(Serialize)]
struct AssetTypeRef<'a> {
    id: u32,
    name: &'a str,
}

#[derive(Serialize)]
struct CategoryRef {
    id: u64,
}

#[derive(Deserialize)]
struct CreatedAsset {
    id: Option<AssetId>,
}

/// Content-asset REST client.
///
/// Sends one create-asset call per upload; on a 401 it renews the shared
/// session once and replays the exact same body.
pub struct ContentAssetClient {
    http_client: Client,
    api_url: String,
    session: Arc<AuthSession>,
}

impl ContentAssetClient {
    /// Create a new client with a bounded per-request timeout.
    pub fn new(
        api_url: String,
        session: Arc<AuthSession>,
        timeout: Duration,
    ) -> Result<Self, IngestError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_url,
            session,
        })
    }

    fn body(request: &UploadRequest) -> Result<Bytes, IngestError> {
        let body = CreateAssetBody {
            name: &request.display_name,
            asset_type: AssetTypeRef {
                id: request.asset_type.id,
                name: request.asset_type.name,
            },
            category: CategoryRef {
                id: request.category.0,
            },
            file_name: &request.file_name,
            file: &request.content,
            is_protected: request.is_protected,
        };
        serde_json::to_vec(&body)
            .map(Bytes::from)
            .map_err(|e| IngestError::Io(format!("Failed to serialize asset body: {}", e)))
    }

    async fn send(&self, body: Bytes, token: &AuthToken) -> Result<reqwest::Response, IngestError> {
        self.http_client
            .post(&self.api_url)
            .bearer_auth(&token.value)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| IngestError::Transport(format!("Asset create request failed: {}", e)))
    }
}

#[async_trait]
impl AssetUploader for ContentAssetClient {
    #[instrument(skip(self, request), level = "debug", fields(name = %request.display_name))]
    async fn upload(&self, request: &UploadRequest) -> Result<Option<AssetId>, IngestError> {
        let body = Self::body(request)?;

        let token = self.session.token_or_acquire().await?;
        debug!("Uploading with token generation {}", token.generation);

        let mut response = self.send(body.clone(), &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Token rejected for {}, renewing", request.file_name);
            let fresh = self.session.renew(Some(&token)).await?;
            response = self.send(body, &fresh).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                let text = response.text().await.unwrap_or_default();
                return Err(IngestError::Auth(format!(
                    "Asset API still returned 401 after renewal: {}",
                    text
                )));
            }
        }

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IngestError::Transport(format!("Failed to read asset response: {}", e)))?;

        if !status.is_success() {
            return Err(IngestError::RemoteRejection {
                status: status.as_u16(),
                body: text,
            });
        }

        let created: CreatedAsset =
            serde_json::from_str(&text).map_err(|e| IngestError::RemoteRejection {
                status: status.as_u16(),
                body: format!("Unparsable asset response ({}): {}", e, text),
            })?;

        info!(
            "Asset created: {} (category {}, type {}, id={})",
            request.display_name,
            request.category,
            request.asset_type.name,
            created
                .id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "<none>".to_string())
        );
        Ok(created.id)
    }
}
