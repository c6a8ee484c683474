//! Bearer token lifecycle for the content-asset API.
//!
//! Tokens are acquired with a client-credentials grant and cached in memory.
//! There is no expiry tracking: the uploader renews when the API answers 401.

use std::time::Duration;

use asset_ingest_core::IngestError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Client credentials sent to the token endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub account_id: String,
}

/// A cached bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
    /// Increases with every successful acquisition
    pub generation: u64,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    account_id: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Shared, thread-safe token session.
///
/// Renewals are serialized: concurrent callers that saw the same stale token
/// converge on a single fresh one.
pub struct AuthSession {
    client: Client,
    auth_url: String,
    credentials: Credentials,
    token: RwLock<Option<AuthToken>>,
    renew_lock: Mutex<u64>,
}

impl AuthSession {
    /// Create a new session in the unauthenticated state.
    pub fn new(
        auth_url: String,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            auth_url,
            credentials,
            token: RwLock::new(None),
            renew_lock: Mutex::new(0),
        })
    }

    /// The cached token, if any.
    pub async fn current_token(&self) -> Option<AuthToken> {
        self.token.read().await.clone()
    }

    /// Acquire a token and cache it.
    pub async fn acquire(&self) -> Result<AuthToken, IngestError> {
        self.renew(None).await
    }

    /// The cached token, or a freshly acquired one when the cache is empty.
    ///
    /// Callers that queue up behind an in-progress acquisition reuse its
    /// token instead of requesting their own.
    pub async fn token_or_acquire(&self) -> Result<AuthToken, IngestError> {
        if let Some(token) = self.current_token().await {
            return Ok(token);
        }

        let mut generation = self.renew_lock.lock().await;
        if let Some(token) = self.current_token().await {
            debug!("Token acquired while waiting (generation {})", token.generation);
            return Ok(token);
        }
        self.fetch_and_store(&mut generation).await
    }

    /// Replace the cached token with a fresh one.
    ///
    /// With `stale` set, the network call is skipped if another caller already
    /// replaced that token while this one was waiting for the lock.
    #[instrument(skip(self, stale), level = "debug")]
    pub async fn renew(&self, stale: Option<&AuthToken>) -> Result<AuthToken, IngestError> {
        let mut generation = self.renew_lock.lock().await;

        if let Some(stale) = stale {
            if let Some(current) = self.current_token().await {
                if current.generation != stale.generation {
                    debug!("Token already renewed (generation {})", current.generation);
                    return Ok(current);
                }
            }
        }

        self.fetch_and_store(&mut generation).await
    }

    /// Must be called with `renew_lock` held; `generation` is its guarded value.
    async fn fetch_and_store(&self, generation: &mut u64) -> Result<AuthToken, IngestError> {
        match self.request_token().await {
            Ok(value) => {
                *generation += 1;
                let token = AuthToken {
                    value,
                    obtained_at: Utc::now(),
                    generation: *generation,
                };
                *self.token.write().await = Some(token.clone());
                info!(
                    "Access token acquired at {} (generation {})",
                    token.obtained_at, token.generation
                );
                Ok(token)
            }
            Err(e) => {
                *self.token.write().await = None;
                warn!("Token acquisition failed: {}", e);
                Err(e)
            }
        }
    }

    async fn request_token(&self) -> Result<String, IngestError> {
        let body = TokenRequest {
            grant_type: &self.credentials.grant_type,
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            account_id: &self.credentials.account_id,
        };

        let response = self
            .client
            .post(&self.auth_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IngestError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(IngestError::Auth(format!(
                "Token endpoint returned {}: {}",
                status, text
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| IngestError::Auth(format!("Invalid token response: {}", e)))?;

        match parsed.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(IngestError::Auth(
                "Token response did not contain an access_token".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            grant_type: "client_credentials".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            account_id: "123".to_string(),
        }
    }

    fn session(server: &MockServer) -> AuthSession {
        AuthSession::new(
            format!("{}/v2/token", server.uri()),
            credentials(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_acquire_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .and(body_json(serde_json::json!({
                "grant_type": "client_credentials",
                "client_id": "cid",
                "client_secret": "secret",
                "account_id": "123"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = session(&server);
        assert!(session.current_token().await.is_none());

        let token = session.acquire().await.unwrap();
        assert_eq!(token.value, "t1");
        assert_eq!(token.generation, 1);
        assert_eq!(session.current_token().await, Some(token));
    }

    #[tokio::test]
    async fn test_acquire_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let session = session(&server);
        let err = session.acquire().await.unwrap_err();
        assert!(matches!(err, IngestError::Auth(_)));
        assert!(err.to_string().contains("invalid_client"));
        assert!(session.current_token().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_token_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": ""})),
            )
            .mount(&server)
            .await;

        let session = session(&server);
        assert!(matches!(session.acquire().await, Err(IngestError::Auth(_))));
    }

    #[tokio::test]
    async fn test_failed_renewal_clears_cached_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t1"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let session = session(&server);
        let first = session.acquire().await.unwrap();
        assert!(session.renew(Some(&first)).await.is_err());
        assert!(session.current_token().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_renewals_converge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t1"})),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "t2"}))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(session(&server));
        let stale = session.acquire().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                let stale = stale.clone();
                tokio::spawn(async move { session.renew(Some(&stale)).await })
            })
            .collect();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.value, "t2");
            assert_eq!(token.generation, 2);
        }
    }

    #[tokio::test]
    async fn test_token_or_acquire_reuses_cached_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = session(&server);
        let first = session.token_or_acquire().await.unwrap();
        let second = session.token_or_acquire().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_acquisitions_converge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "t1"}))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(session(&server));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.token_or_acquire().await })
            })
            .collect();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.value, "t1");
            assert_eq!(token.generation, 1);
        }
    }
}
