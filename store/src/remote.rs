//! REST client for the conversation backend.
//!
//! Every endpoint answers with an envelope `{success, data?, message?}`; a
//! present `success: false` is treated as a rejection even on a 2xx status.

use std::net::IpAddr;
use std::time::Duration;

use fdi_types::{Conversation, ConversationId, DeviceId, truncate_with_ellipsis};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use thiserror::Error;
use url::{Host, Url};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const MAX_LOGGED_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("backend base URL cannot carry a path")]
    InvalidBaseUrl,
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    pub base_url: Option<String>,
    /// Accept loopback and unspecified hosts (local development backends, tests).
    pub allow_loopback: bool,
}

impl RemoteConfig {
    /// Parsed base URL when the backend counts as configured.
    ///
    /// Unset, unparsable, non-HTTP, and loopback URLs are all "not configured":
    /// a development default must never be mistaken for a deployed backend.
    #[must_use]
    pub fn configured_base_url(&self) -> Option<Url> {
        let raw = self.base_url.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(base_url = raw, "Ignoring unparsable backend URL: {e}");
                return None;
            }
        };
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if !self.allow_loopback && is_local_host(&url) {
            tracing::debug!(base_url = raw, "Backend URL points at a local host; remote disabled");
            return None;
        }
        Some(url)
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured_base_url().is_some()
    }
}

fn is_local_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_local_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_local_ip(IpAddr::V6(ip)),
        None => true,
    }
}

fn is_local_ip(ip: IpAddr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: Option<bool>,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Health {
    #[serde(default)]
    status: String,
    #[serde(default)]
    database: String,
}

#[derive(Debug, serde::Serialize)]
struct BulkUpload<'a> {
    conversations: &'a [Conversation],
}

#[derive(Debug, Clone)]
pub struct RemoteBackend {
    base: Url,
    http: reqwest::Client,
}

impl RemoteBackend {
    /// `None` when the config does not describe a usable backend.
    #[must_use]
    pub fn from_config(config: &RemoteConfig) -> Option<Self> {
        let base = config.configured_base_url()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build backend HTTP client: {e}. Falling back to defaults.");
                reqwest::Client::new()
            });
        Some(Self { base, http })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidBaseUrl)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn device_endpoint(&self, segments: &[&str], device: &DeviceId) -> Result<Url, RemoteError> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("deviceId", device.as_str());
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status,
                body: truncate_with_ellipsis(&body, MAX_LOGGED_BODY_CHARS),
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        if envelope.success == Some(false) {
            return Err(RemoteError::Rejected(envelope.message.unwrap_or_default()));
        }
        Ok(envelope.data)
    }

    /// `true` when the backend reports both itself and its database healthy.
    pub async fn health(&self) -> Result<bool, RemoteError> {
        let url = self.endpoint(&["api", "health"])?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                status,
                body: String::new(),
            });
        }
        let health: Health = response.json().await?;
        Ok(health.status == "ok" && health.database == "connected")
    }

    pub async fn list(&self, device: &DeviceId) -> Result<Vec<Conversation>, RemoteError> {
        let url = self.device_endpoint(&["api", "conversations"], device)?;
        Ok(self.send(self.http.get(url)).await?.unwrap_or_default())
    }

    pub async fn get(
        &self,
        id: &ConversationId,
        device: &DeviceId,
    ) -> Result<Option<Conversation>, RemoteError> {
        let url = self.device_endpoint(&["api", "conversations", id.as_str()], device)?;
        self.send(self.http.get(url)).await
    }

    /// Create or replace by id.
    pub async fn upsert(&self, conversation: &Conversation) -> Result<(), RemoteError> {
        let url = self.endpoint(&["api", "conversations"])?;
        self.send::<IgnoredAny>(self.http.post(url).json(conversation))
            .await
            .map(drop)
    }

    pub async fn delete(&self, id: &ConversationId, device: &DeviceId) -> Result<(), RemoteError> {
        let url = self.device_endpoint(&["api", "conversations", id.as_str()], device)?;
        self.send::<IgnoredAny>(self.http.delete(url)).await.map(drop)
    }

    pub async fn clear_device(&self, device: &DeviceId) -> Result<(), RemoteError> {
        let url = self.endpoint(&["api", "conversations", "device", device.as_str()])?;
        self.send::<IgnoredAny>(self.http.delete(url)).await.map(drop)
    }

    pub async fn bulk_upload(&self, conversations: &[Conversation]) -> Result<(), RemoteError> {
        let url = self.endpoint(&["api", "conversations", "bulk"])?;
        let body = BulkUpload { conversations };
        self.send::<IgnoredAny>(self.http.post(url).json(&body))
            .await
            .map(drop)
    }
}
