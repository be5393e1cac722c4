//! Conversation records as held by the session and persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::title_preview;
use crate::{ChatMessage, ConversationId, DeviceId};

/// Title for a conversation that has no messages yet.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

/// Characters of the first user message kept in a derived title.
pub const TITLE_PREVIEW_CHARS: usize = 30;

/// A titled, ordered transcript.
///
/// Field names follow the remote backend's document shape (camelCase). Unknown
/// fields such as the backend's `_id` are ignored on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
}

impl Conversation {
    /// Empty conversation with the placeholder title.
    #[must_use]
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            id: ConversationId::from_timestamp(created_at),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
            created_at,
            updated_at: None,
            device_id: None,
        }
    }

    /// Empty conversation titled after the message that is about to open it.
    #[must_use]
    pub fn for_first_message(text: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            title: Self::derive_title(text),
            ..Self::new(created_at)
        }
    }

    #[must_use]
    pub fn derive_title(first_message: &str) -> String {
        title_preview(first_message, TITLE_PREVIEW_CHARS)
    }

    /// Replace the transcript and re-derive the title from its first message.
    pub fn set_messages(&mut self, messages: Vec<ChatMessage>) {
        if let Some(first) = messages.first() {
            self.title = Self::derive_title(first.content());
        }
        self.messages = messages;
    }
}
