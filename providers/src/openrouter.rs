use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde_json::{Value, json};

use crate::{
    ApiConfig, CompletionClient, FragmentStream, LineAction, MAX_LINE_BUFFER_BYTES,
    MISSING_API_KEY_MESSAGE, StreamError, drain_next_line, http_client, parse_line, prompt,
    read_capped_error_body,
};
use fdi_types::ChatMessage;

/// Chat-completions client for OpenRouter (or any endpoint speaking the same shape).
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl OpenRouterClient {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: http_client().clone(),
        }
    }

    #[must_use]
    pub fn with_http_client(config: ApiConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(json!({ "role": "system", "content": prompt::system_prompt() }));
        wire.extend(messages.iter().map(|msg| {
            json!({
                "role": msg.role().as_str(),
                "content": msg.content(),
            })
        }));

        json!({
            "model": self.config.model(),
            "messages": wire,
            "max_tokens": self.config.max_tokens(),
            "temperature": self.config.temperature(),
            "stream": true,
        })
    }
}

impl CompletionClient for OpenRouterClient {
    fn stream(&self, messages: &[ChatMessage]) -> FragmentStream {
        let Some(api_key) = self.config.usable_api_key() else {
            tracing::warn!("Completion requested without a usable API key");
            return stream::iter([Ok(MISSING_API_KEY_MESSAGE.to_string())]).boxed();
        };

        let mut request = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(api_key.as_str())
            .json(&self.request_body(messages));
        if let Some(site_url) = self.config.site_url() {
            request = request.header("HTTP-Referer", site_url);
        }

        tracing::debug!(
            model = self.config.model(),
            history_len = messages.len(),
            "Starting streamed completion"
        );

        let idle_timeout = self.config.idle_timeout();
        stream::unfold(
            ReadState::Pending(request, idle_timeout),
            |state| async move { state.advance().await },
        )
        .boxed()
    }
}

enum ReadState {
    /// Request built but not sent; nothing happens until the stream is polled.
    Pending(reqwest::RequestBuilder, std::time::Duration),
    Reading(BodyReader),
    Finished,
}

enum Opened {
    Body(BodyReader),
    /// In-band diagnostic for a non-success status.
    Fragment(String),
    Failed(StreamError),
}

impl ReadState {
    async fn advance(self) -> Option<(Result<String, StreamError>, ReadState)> {
        let mut state = self;
        loop {
            match state {
                ReadState::Finished => return None,
                ReadState::Pending(request, idle_timeout) => {
                    match open(request, idle_timeout).await {
                        Opened::Body(reader) => state = ReadState::Reading(reader),
                        Opened::Fragment(text) => return Some((Ok(text), ReadState::Finished)),
                        Opened::Failed(err) => return Some((Err(err), ReadState::Finished)),
                    }
                }
                ReadState::Reading(mut reader) => {
                    return match reader.next_fragment().await {
                        Some(Ok(text)) => Some((Ok(text), ReadState::Reading(reader))),
                        Some(Err(err)) => Some((Err(err), ReadState::Finished)),
                        None => None,
                    };
                }
            }
        }
    }
}

async fn open(request: reqwest::RequestBuilder, idle_timeout: std::time::Duration) -> Opened {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(%e, "Completion request failed");
            return Opened::Failed(StreamError::Transport(e));
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = read_capped_error_body(response).await;
        tracing::warn!(status = status.as_u16(), %body, "Completion API error");
        return Opened::Fragment(format!(
            "Error: API request failed ({}). Please try again.",
            status.as_u16()
        ));
    }

    Opened::Body(BodyReader {
        body: response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed(),
        buffer: Vec::new(),
        idle_timeout,
        eof: false,
    })
}

struct BodyReader {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    idle_timeout: std::time::Duration,
    eof: bool,
}

impl BodyReader {
    /// Next text delta, `None` at `[DONE]` or end of body.
    async fn next_fragment(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            while let Some(line) = drain_next_line(&mut self.buffer) {
                match parse_line(&line) {
                    LineAction::Skip => {}
                    LineAction::Emit(text) => return Some(Ok(text)),
                    LineAction::Done => return None,
                }
            }

            if self.eof {
                return None;
            }

            let Ok(next) = tokio::time::timeout(self.idle_timeout, self.body.next()).await else {
                tracing::warn!(
                    timeout_secs = self.idle_timeout.as_secs(),
                    "Completion stream idle timeout"
                );
                return Some(Err(StreamError::IdleTimeout(self.idle_timeout)));
            };

            match next {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    if self.buffer.len() > MAX_LINE_BUFFER_BYTES {
                        return Some(Err(StreamError::BufferOverflow));
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(%e, "Completion stream read failed");
                    return Some(Err(StreamError::Transport(e)));
                }
                None => {
                    // Flush a final line that arrived without a trailing newline.
                    self.eof = true;
                    if !self.buffer.is_empty() {
                        self.buffer.push(b'\n');
                    }
                }
            }
        }
    }
}
