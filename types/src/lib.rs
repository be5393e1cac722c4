//! Core domain types for the FDI Assistant.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod conversation;
mod ids;
mod message;
pub mod navigation;
mod text;

pub use conversation::{Conversation, DEFAULT_CONVERSATION_TITLE, TITLE_PREVIEW_CHARS};
pub use ids::{ConversationId, DeviceId};
pub use message::{ChatMessage, Role};
pub use navigation::{NavigationAction, NavigationRoute, ParsedContent, parse_navigation_actions};
pub use text::truncate_with_ellipsis;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("message content must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// ============================================================================
// API Key Types
// ============================================================================

/// Minimum length for a credential to be considered plausibly configured.
pub const MIN_API_KEY_LEN: usize = 10;

/// Credential for the hosted completion provider.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

impl ApiKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is long enough to be worth sending to the provider.
    #[must_use]
    pub fn is_plausible(&self) -> bool {
        self.0.trim().len() >= MIN_API_KEY_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiKey, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        assert!(NonEmptyString::new("   \n\t").is_err());
        assert!(NonEmptyString::new("").is_err());
        assert_eq!(NonEmptyString::new(" hi ").unwrap().as_str(), " hi ");
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-or-v1-secret-value");
        let debug = format!("{key:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn api_key_plausibility_uses_minimum_length() {
        assert!(!ApiKey::new("").is_plausible());
        assert!(!ApiKey::new("short").is_plausible());
        assert!(!ApiKey::new("    123456789    ").is_plausible());
        assert!(ApiKey::new("sk-or-v1-0123").is_plausible());
    }
}
