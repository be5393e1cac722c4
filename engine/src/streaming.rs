//! Streaming reply handling for the session.

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::mpsc;

use fdi_providers::CompletionClient;
use fdi_types::ChatMessage;

use crate::state::{ActiveStream, SessionState, StreamEvent};
use crate::{ChatSession, FALLBACK_REPLY};

const STREAM_EVENT_CHANNEL_CAPACITY: usize = 1024;

impl<C: CompletionClient> ChatSession<C> {
    /// Spawn the streaming task for the current transcript and enter `Streaming`.
    pub(crate) fn start_streaming(&mut self) {
        let fragments = self.client.stream(&self.messages);
        let (tx, rx) = mpsc::channel(STREAM_EVENT_CHANNEL_CAPACITY);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        let task = async move {
            let mut fragments = fragments;
            while let Some(item) = fragments.next().await {
                let event = match item {
                    Ok(text) => StreamEvent::Fragment(text),
                    Err(e) => {
                        tracing::warn!("Completion stream failed: {e}");
                        let _ = tx.send(StreamEvent::Failed(e.to_string())).await;
                        return;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Finished).await;
        };

        tokio::spawn(async move {
            let _ = Abortable::new(task, abort_registration).await;
        });

        self.state = SessionState::Streaming(ActiveStream::new(rx, abort_handle));
    }

    /// Apply every event already received, without waiting.
    ///
    /// Returns `true` if the reply finished during this call.
    pub fn process_stream_events(&mut self) -> bool {
        loop {
            let SessionState::Streaming(active) = &mut self.state else {
                return false;
            };
            let event = match active.try_recv_event() {
                Ok(event) => event,
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    tracing::warn!("Stream channel disconnected");
                    StreamEvent::Failed("stream disconnected".to_string())
                }
            };
            if self.apply_stream_event(event, &mut |_: &str| {}) {
                return true;
            }
        }
    }

    /// Await the in-flight reply, if any, to completion.
    pub async fn wait_for_reply(&mut self) {
        self.wait_for_reply_with(|_| {}).await;
    }

    /// Like [`Self::wait_for_reply`], calling `on_fragment` with each fragment as it arrives.
    pub async fn wait_for_reply_with(&mut self, mut on_fragment: impl FnMut(&str)) {
        loop {
            let SessionState::Streaming(active) = &mut self.state else {
                return;
            };
            let event = active
                .recv_event()
                .await
                .unwrap_or_else(|| StreamEvent::Failed("stream disconnected".to_string()));
            if self.apply_stream_event(event, &mut on_fragment) {
                return;
            }
        }
    }

    /// Returns `true` when the event ended the turn.
    fn apply_stream_event(&mut self, event: StreamEvent, on_fragment: &mut dyn FnMut(&str)) -> bool {
        match event {
            StreamEvent::Fragment(text) => {
                if let SessionState::Streaming(active) = &mut self.state {
                    active.push_fragment(&text);
                    on_fragment(&text);
                }
                false
            }
            StreamEvent::Finished => {
                self.finish_turn(None);
                true
            }
            StreamEvent::Failed(reason) => {
                self.finish_turn(Some(reason));
                true
            }
        }
    }

    fn finish_turn(&mut self, failure: Option<String>) {
        let SessionState::Streaming(active) =
            std::mem::replace(&mut self.state, SessionState::AwaitingInput)
        else {
            return;
        };

        let content = match failure {
            None => active.into_buffer(),
            Some(reason) => {
                tracing::debug!(%reason, "Replacing partial reply with fallback");
                FALLBACK_REPLY.to_string()
            }
        };
        self.messages.push(ChatMessage::assistant(content, Utc::now()));
        self.sync_current_conversation();
    }

    /// Abort the in-flight reply and discard its partial text.
    ///
    /// Returns `false` when nothing was streaming.
    pub fn cancel_stream(&mut self) -> bool {
        let SessionState::Streaming(active) =
            std::mem::replace(&mut self.state, SessionState::AwaitingInput)
        else {
            return false;
        };
        active.abort();
        tracing::debug!(discarded_bytes = active.buffer().len(), "Reply cancelled");
        true
    }
}
