//! Typed records for streamed chat-completions chunks.
//!
//! Providers behind the chat-completions shape disagree on which fields they send,
//! so every field is optional and absent fields simply mean "nothing to emit".
//! Unknown fields are ignored.

use serde::Deserialize;

/// One `data:` payload of a streamed chat completion.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkEvent {
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
    /// Mid-stream provider error (e.g. upstream model failure).
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub delta: Option<Delta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorInfo {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ChunkEvent {
    /// Text of the first choice's delta, if it carries any.
    #[must_use]
    pub fn into_text_delta(self) -> Option<String> {
        self.choices?
            .into_iter()
            .next()?
            .delta?
            .content
            .filter(|content| !content.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkEvent;

    fn parse(raw: &str) -> ChunkEvent {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn extracts_first_choice_content() {
        let event = parse(r#"{"id":"gen-1","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#);
        assert_eq!(event.into_text_delta(), Some("Hi".to_string()));
    }

    #[test]
    fn tolerates_null_and_missing_fields() {
        assert_eq!(parse(r#"{"choices":null}"#).into_text_delta(), None);
        assert_eq!(parse(r#"{"choices":[]}"#).into_text_delta(), None);
        assert_eq!(parse(r#"{"choices":[{}]}"#).into_text_delta(), None);
        assert_eq!(
            parse(r#"{"choices":[{"delta":{"content":null}}]}"#).into_text_delta(),
            None
        );
    }

    #[test]
    fn captures_mid_stream_error() {
        let event = parse(
            r#"{"error":{"code":502,"message":"upstream failed"},"choices":[{"finish_reason":"error"}]}"#,
        );
        assert_eq!(
            event.error.as_ref().and_then(|e| e.message.as_deref()),
            Some("upstream failed")
        );
        assert_eq!(event.into_text_delta(), None);
    }
}
