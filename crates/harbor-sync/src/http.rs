//! # HTTP Transport
//!
//! [`SyncTransport`] over JSON/HTTP with reqwest.
//!
//! ## Response Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  send ──► network error ─────────────────► ConnectionFailed / Timeout  │
//! │   │                                                                     │
//! │   ▼                                                                     │
//! │  status not 2xx ─────────────────────────► Http { status, body }        │
//! │   │                                                                     │
//! │   ▼                                                                     │
//! │  body empty or not the expected JSON ────► ProtocolViolation            │
//! │   │                                                                     │
//! │   ▼                                                                     │
//! │  Ok(T)                                                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{PullQuery, PullResponse, PushRequest, PushResponse};
use crate::transport::SyncTransport;

const PUSH_PATH: &str = "api/sync/push";
const PULL_PATH: &str = "api/sync/pull";
const HEALTH_PATH: &str = "api/health";

/// HTTP client for the sync server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport for `base_url`.
    ///
    /// A base URL with a path prefix (`https://host/pos`) keeps it: the
    /// endpoints resolve to `https://host/pos/api/sync/...`.
    pub fn new(base_url: &str, request_timeout: Duration) -> SyncResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(HttpTransport { client, base_url })
    }

    /// Creates a transport from the `[server]` section.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(&config.server.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base_url.join(path)?)
    }
}

/// Reads a success body as `T`, or turns the response into an error.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> SyncResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!(status = status.as_u16(), body = %body, "Sync server returned an error");
        return Err(SyncError::Http {
            status: status.as_u16(),
            body,
        });
    }

    if body.trim().is_empty() {
        return Err(SyncError::ProtocolViolation(format!(
            "empty response body with status {status}"
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        SyncError::ProtocolViolation(format!("unparseable response body: {e}"))
    })
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let url = self.endpoint(PUSH_PATH)?;
        debug!(%url, changes = request.changes.len(), "Pushing batch");

        let response = self.client.post(url).json(request).send().await?;
        read_json(response).await
    }

    async fn pull(&self, terminal_id: &str, since: i64, max: usize) -> SyncResult<PullResponse> {
        let url = self.endpoint(PULL_PATH)?;
        debug!(%url, since, max, "Pulling changes");

        let query = PullQuery {
            terminal_id,
            since,
            max,
        };
        let response = self.client.get(url).query(&query).send().await?;
        read_json(response).await
    }

    async fn ping(&self) -> bool {
        let Ok(url) = self.endpoint(HEALTH_PATH) else {
            return false;
        };

        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                false
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
