//! Streaming chat-completions client for the FDI Assistant.
//!
//! # Architecture
//!
//! - [`CompletionClient`] - the seam the session controller is generic over
//! - [`openrouter`] - OpenRouter chat-completions implementation
//! - [`prompt`] - the assistant's system prompt (knowledge base + directive rules)
//! - [`sse_types`] - typed wire records for streamed chunks
//!
//! A client turns an ordered message history into a [`FragmentStream`]: a lazy,
//! single-shot, finite stream of text deltas in arrival order.
//!
//! # Error Handling
//!
//! Misconfiguration and non-success HTTP statuses are delivered as ordinary text
//! fragments, so callers accumulate success and failure output the same way.
//! Only transport-level failures (connect errors, broken bodies, idle timeouts)
//! surface as `Err` items, and each of those ends the stream.

pub mod openrouter;
pub mod prompt;
pub mod sse_types;

use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;

use futures_util::{Stream, StreamExt};

pub use fdi_types;
pub use openrouter::OpenRouterClient;

use fdi_types::{ApiKey, ChatMessage};

/// Canonical OpenRouter chat-completions endpoint.
pub const OPENROUTER_CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub const DEFAULT_MODEL: &str = "moonshotai/kimi-k2";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Sent to the provider so requests are attributable in its dashboard.
pub const APP_TITLE: &str = "FDI Associates Chatbot";

/// Only fragment produced when no usable credential is configured.
pub const MISSING_API_KEY_MESSAGE: &str = "API key not configured. Please set OPENROUTER_API_KEY (or [openrouter] api_key in ~/.fdi/config.toml) and restart.";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;

// reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

pub(crate) const MAX_LINE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Ordered text deltas of one assistant reply.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("stream idle for {}s", .0.as_secs())]
    IdleTimeout(Duration),
    #[error("stream line exceeded maximum size (4 MiB)")]
    BufferOverflow,
}

/// Produces a streamed assistant reply for a message history.
pub trait CompletionClient: Send + Sync {
    /// Start a reply. No IO happens until the returned stream is polled.
    fn stream(&self, messages: &[ChatMessage]) -> FragmentStream;
}

/// Collect a whole reply. For callers that do not render incrementally.
pub async fn complete<C>(client: &C, messages: &[ChatMessage]) -> Result<String, StreamError>
where
    C: CompletionClient + ?Sized,
{
    let mut stream = client.stream(messages);
    let mut full = String::new();
    while let Some(fragment) = stream.next().await {
        full.push_str(&fragment?);
    }
    Ok(full)
}

pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build tuned HTTP client: {e}. Falling back to defaults.");
            reqwest::Client::new()
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert("X-Title", HeaderValue::from_static(APP_TITLE));

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

/// Idle timeout between body chunks, overridable via `FDI_STREAM_IDLE_TIMEOUT_SECS`.
pub fn stream_idle_timeout() -> Duration {
    static TIMEOUT: OnceLock<Duration> = OnceLock::new();
    *TIMEOUT.get_or_init(|| {
        let timeout = std::env::var("FDI_STREAM_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS);
        Duration::from_secs(timeout)
    })
}

/// Split the next complete line off the front of `buffer`, without its terminator.
fn drain_next_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buffer.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

/// Payload of a `data:` line, with the single optional leading space removed.
fn extract_data(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineAction {
    /// Not a data line, or a data line without text.
    Skip,
    Emit(String),
    /// `[DONE]` sentinel.
    Done,
}

pub(crate) fn parse_line(line: &[u8]) -> LineAction {
    let Ok(line) = std::str::from_utf8(line) else {
        tracing::debug!(bytes = line.len(), "Skipping non UTF-8 stream line");
        return LineAction::Skip;
    };
    let Some(data) = extract_data(line.trim_start()) else {
        return LineAction::Skip;
    };
    let data = data.trim_end();
    if data == "[DONE]" {
        return LineAction::Done;
    }

    match serde_json::from_str::<sse_types::ChunkEvent>(data) {
        Ok(event) => {
            if let Some(error) = event.error.as_ref() {
                tracing::warn!(
                    code = ?error.code,
                    message = error.message.as_deref().unwrap_or_default(),
                    "Provider reported an error mid-stream"
                );
            }
            event
                .into_text_delta()
                .map_or(LineAction::Skip, LineAction::Emit)
        }
        Err(e) => {
            tracing::debug!(%e, payload_bytes = data.len(), "Skipping malformed stream payload");
            LineAction::Skip
        }
    }
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Credential, model and request tuning for the completion endpoint.
///
/// ```rust
/// use fdi_providers::ApiConfig;
/// use fdi_types::ApiKey;
///
/// let config = ApiConfig::new(Some(ApiKey::new("sk-or-v1-example")))
///     .with_model("moonshotai/kimi-k2")
///     .with_max_tokens(500);
/// assert_eq!(config.max_tokens(), 500);
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    api_key: Option<ApiKey>,
    model: String,
    endpoint: String,
    temperature: f32,
    max_tokens: u32,
    site_url: Option<String>,
    idle_timeout: Duration,
}

impl ApiConfig {
    #[must_use]
    pub fn new(api_key: Option<ApiKey>) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            endpoint: OPENROUTER_CHAT_COMPLETIONS_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            site_url: None,
            idle_timeout: stream_idle_timeout(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Origin reported in `HTTP-Referer`.
    #[must_use]
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// The key, if one is set and long enough to be plausible.
    #[must_use]
    pub fn usable_api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref().filter(|key| key.is_plausible())
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    #[must_use]
    pub const fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    #[must_use]
    pub fn site_url(&self) -> Option<&str> {
        self.site_url.as_deref()
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiConfig, LineAction, drain_next_line, extract_data, parse_line};
    use fdi_types::ApiKey;

    #[test]
    fn api_config_rejects_short_keys() {
        assert!(ApiConfig::new(None).usable_api_key().is_none());
        assert!(
            ApiConfig::new(Some(ApiKey::new("")))
                .usable_api_key()
                .is_none()
        );
        assert!(
            ApiConfig::new(Some(ApiKey::new("sk-or-v1-abcdef")))
                .usable_api_key()
                .is_some()
        );
    }

    mod line_drain {
        use super::drain_next_line;

        #[test]
        fn drains_lines_in_order() {
            let mut buffer = b"data: a\ndata: b\npartial".to_vec();
            assert_eq!(drain_next_line(&mut buffer), Some(b"data: a".to_vec()));
            assert_eq!(drain_next_line(&mut buffer), Some(b"data: b".to_vec()));
            assert_eq!(drain_next_line(&mut buffer), None);
            assert_eq!(buffer, b"partial");
        }

        #[test]
        fn strips_carriage_return() {
            let mut buffer = b"data: crlf\r\nrest".to_vec();
            assert_eq!(drain_next_line(&mut buffer), Some(b"data: crlf".to_vec()));
            assert_eq!(buffer, b"rest");
        }

        #[test]
        fn yields_empty_lines() {
            let mut buffer = b"\n\ndata: x\n".to_vec();
            assert_eq!(drain_next_line(&mut buffer), Some(Vec::new()));
            assert_eq!(drain_next_line(&mut buffer), Some(Vec::new()));
            assert_eq!(drain_next_line(&mut buffer), Some(b"data: x".to_vec()));
        }
    }

    mod data_extract {
        use super::extract_data;

        #[test]
        fn extracts_with_and_without_space() {
            assert_eq!(extract_data("data: hello"), Some("hello"));
            assert_eq!(extract_data("data:hello"), Some("hello"));
        }

        #[test]
        fn ignores_other_fields_and_comments() {
            assert_eq!(extract_data("event: message"), None);
            assert_eq!(extract_data(": OPENROUTER PROCESSING"), None);
            assert_eq!(extract_data(""), None);
        }
    }

    mod line_parse {
        use super::{LineAction, parse_line};

        #[test]
        fn emits_delta_content() {
            let line = br#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
            assert_eq!(parse_line(line), LineAction::Emit("Hello".to_string()));
        }

        #[test]
        fn done_sentinel() {
            assert_eq!(parse_line(b"data: [DONE]"), LineAction::Done);
        }

        #[test]
        fn skips_role_only_and_empty_deltas() {
            let role_only = br#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
            let empty = br#"data: {"choices":[{"delta":{"content":""}}]}"#;
            let no_choices = br#"data: {"id":"gen-1"}"#;
            assert_eq!(parse_line(role_only), LineAction::Skip);
            assert_eq!(parse_line(empty), LineAction::Skip);
            assert_eq!(parse_line(no_choices), LineAction::Skip);
        }

        #[test]
        fn skips_malformed_json() {
            assert_eq!(parse_line(b"data: {not json"), LineAction::Skip);
            assert_eq!(parse_line(&[0xff, 0xfe, b'\n']), LineAction::Skip);
        }

        #[test]
        fn skips_comment_lines() {
            assert_eq!(parse_line(b": OPENROUTER PROCESSING"), LineAction::Skip);
        }
    }
}
