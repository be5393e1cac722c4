//! Chat session controller for the FDI Assistant.
//!
//! # Architecture
//!
//! [`ChatSession`] owns the conversation list, the open transcript and the
//! [`SessionPhase`] state machine. It is driven from a single task:
//!
//! - [`ChatSession::submit`] appends the user message and spawns a streaming task
//! - [`ChatSession::process_stream_events`] / [`ChatSession::wait_for_reply`] fold
//!   fragments into the in-progress reply and finalize it
//! - every transcript change is queued on the [`persistence`] outbox
//!
//! At most one reply is in flight: `submit` and the conversation-switching
//! operations are refused while `Streaming`.

mod persistence;
mod state;
mod streaming;
pub mod welcome;

use chrono::{TimeDelta, Utc};

use fdi_providers::CompletionClient;
use fdi_types::{
    ChatMessage, Conversation, ConversationId, NavigationAction, NonEmptyString, ParsedContent,
    Role, parse_navigation_actions,
};

pub use persistence::{
    PersistIntent, PersistenceOutbox, persistence_channel, spawn_persistence_worker,
};
pub use state::SessionPhase;
pub use welcome::{CONVERSATION_STARTERS, QUICK_ACTIONS, QuickAction};

use state::SessionState;

/// Reply recorded when the stream fails at the transport level.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// A transcript entry ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub role: Role,
    /// Assistant text with directives removed; user text as sent.
    pub content: String,
    /// Buttons, in directive order. Always empty for user messages.
    pub actions: Vec<NavigationAction>,
}

impl RenderedMessage {
    fn from_message(message: &ChatMessage) -> Self {
        match message.role() {
            Role::User => Self {
                role: Role::User,
                content: message.content().to_string(),
                actions: Vec::new(),
            },
            Role::Assistant => {
                let ParsedContent {
                    clean_content,
                    actions,
                } = parse_navigation_actions(message.content());
                Self {
                    role: Role::Assistant,
                    content: clean_content,
                    actions,
                }
            }
        }
    }
}

pub struct ChatSession<C> {
    client: C,
    /// Most recent first.
    conversations: Vec<Conversation>,
    current: Option<ConversationId>,
    /// Finalized transcript of `current`.
    messages: Vec<ChatMessage>,
    state: SessionState,
    history_view: bool,
    outbox: PersistenceOutbox,
}

impl<C> std::fmt::Debug for ChatSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("conversations", &self.conversations.len())
            .field("current", &self.current)
            .field("messages", &self.messages.len())
            .field("phase", &self.state.phase())
            .field("history_view", &self.history_view)
            .finish_non_exhaustive()
    }
}

impl<C: CompletionClient> ChatSession<C> {
    #[must_use]
    pub fn new(client: C, outbox: PersistenceOutbox) -> Self {
        Self {
            client,
            conversations: Vec::new(),
            current: None,
            messages: Vec::new(),
            state: SessionState::Idle,
            history_view: false,
            outbox,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, SessionState::Streaming(_))
    }

    /// Partial reply text while streaming.
    #[must_use]
    pub fn streaming_content(&self) -> Option<&str> {
        match &self.state {
            SessionState::Streaming(active) => Some(active.buffer()),
            _ => None,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    #[must_use]
    pub fn current_conversation_id(&self) -> Option<&ConversationId> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn is_history_view(&self) -> bool {
        self.history_view
    }

    /// Transcript with directives parsed out of assistant messages.
    #[must_use]
    pub fn rendered_messages(&self) -> Vec<RenderedMessage> {
        self.messages
            .iter()
            .map(RenderedMessage::from_message)
            .collect()
    }

    /// Send `text` as the next user message.
    ///
    /// Returns `false` (and does nothing) for blank text or while a reply is streaming.
    pub fn submit(&mut self, text: &str) -> bool {
        if self.is_streaming() {
            tracing::debug!("Ignoring submit while a reply is streaming");
            return false;
        }
        let Ok(text) = NonEmptyString::new(text.trim()) else {
            return false;
        };

        if self.current.is_none() {
            let conversation = Conversation::for_first_message(&text, self.fresh_timestamp());
            self.current = Some(conversation.id.clone());
            self.messages.clear();
            self.conversations.insert(0, conversation);
        }

        self.messages
            .push(ChatMessage::user(text.into_inner(), Utc::now()));
        self.sync_current_conversation();
        self.history_view = false;
        self.start_streaming();
        true
    }

    /// Submit and wait for the full reply.
    pub async fn send(&mut self, text: &str) -> bool {
        if !self.submit(text) {
            return false;
        }
        self.wait_for_reply().await;
        true
    }

    /// Open an empty "New Chat" conversation.
    pub fn start_new_conversation(&mut self) -> bool {
        if self.refuse_while_streaming("start a new conversation") {
            return false;
        }
        let conversation = Conversation::new(self.fresh_timestamp());
        self.current = Some(conversation.id.clone());
        self.messages.clear();
        self.outbox.push(PersistIntent::Save(conversation.clone()));
        self.conversations.insert(0, conversation);
        self.state = SessionState::AwaitingInput;
        self.history_view = false;
        true
    }

    pub fn load_conversation(&mut self, id: &ConversationId) -> bool {
        if self.refuse_while_streaming("load a conversation") {
            return false;
        }
        let Some(conversation) = self.conversations.iter().find(|c| &c.id == id) else {
            tracing::debug!(conversation = %id, "Cannot load unknown conversation");
            return false;
        };
        self.messages = conversation.messages.clone();
        self.current = Some(conversation.id.clone());
        self.state = SessionState::AwaitingInput;
        self.history_view = false;
        true
    }

    /// Remove a conversation. Deleting the open one returns the session to `Idle`.
    pub fn delete_conversation(&mut self, id: &ConversationId) -> bool {
        if self.refuse_while_streaming("delete a conversation") {
            return false;
        }
        self.conversations.retain(|c| &c.id != id);
        if self.current.as_ref() == Some(id) {
            self.current = None;
            self.messages.clear();
            self.state = SessionState::Idle;
        }
        self.outbox.push(PersistIntent::Delete(id.clone()));
        true
    }

    pub fn clear_history(&mut self) -> bool {
        if self.refuse_while_streaming("clear history") {
            return false;
        }
        self.conversations.clear();
        self.current = None;
        self.messages.clear();
        self.state = SessionState::Idle;
        self.outbox.push(PersistIntent::Clear);
        true
    }

    pub fn toggle_history_view(&mut self) -> bool {
        self.history_view = !self.history_view;
        self.history_view
    }

    /// Replace the conversation list, typically with the store's listing.
    ///
    /// The open conversation stays listed even when `conversations` predates its first save.
    pub fn set_history(&mut self, conversations: Vec<Conversation>) -> bool {
        if self.refuse_while_streaming("replace history") {
            return false;
        }
        let open = self
            .current
            .as_ref()
            .and_then(|id| self.conversations.iter().position(|c| &c.id == id))
            .map(|index| self.conversations.swap_remove(index));
        self.conversations = conversations;
        if let Some(open) = open
            && !self.conversations.iter().any(|c| c.id == open.id)
        {
            self.conversations.insert(0, open);
        }
        true
    }

    /// The host is closing the chat surface.
    pub fn close(&mut self) {
        self.cancel_stream();
        self.history_view = false;
    }

    fn refuse_while_streaming(&self, operation: &str) -> bool {
        let streaming = self.is_streaming();
        if streaming {
            tracing::debug!(operation, "Refused while a reply is streaming");
        }
        streaming
    }

    /// Creation time whose millisecond id is not already taken.
    fn fresh_timestamp(&self) -> chrono::DateTime<Utc> {
        let mut at = Utc::now();
        while self
            .conversations
            .iter()
            .any(|c| c.id == ConversationId::from_timestamp(at))
        {
            at += TimeDelta::milliseconds(1);
        }
        at
    }

    /// Copy the transcript into the open conversation's record and queue a save.
    pub(crate) fn sync_current_conversation(&mut self) {
        let Some(id) = self.current.clone() else {
            return;
        };
        let index = match self.conversations.iter().position(|c| c.id == id) {
            Some(index) => index,
            None => {
                tracing::debug!(conversation = %id, "Open conversation missing from list, restoring it");
                let created_at = self
                    .messages
                    .first()
                    .map_or_else(Utc::now, ChatMessage::timestamp);
                let mut restored = Conversation::new(created_at);
                restored.id = id;
                self.conversations.insert(0, restored);
                0
            }
        };
        let conversation = &mut self.conversations[index];
        conversation.set_messages(self.messages.clone());
        self.outbox.push(PersistIntent::Save(conversation.clone()));
    }
}
