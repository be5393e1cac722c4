//! Session state machine types.

use futures_util::future::AbortHandle;
use tokio::sync::mpsc;

/// Messages from the streaming task to the session.
#[derive(Debug)]
pub(crate) enum StreamEvent {
    Fragment(String),
    /// Transport failure; ends the turn with the fallback reply.
    Failed(String),
    Finished,
}

/// In-flight reply. Owned by [`SessionState::Streaming`] so a second reply cannot start.
#[derive(Debug)]
pub(crate) struct ActiveStream {
    buffer: String,
    events: mpsc::Receiver<StreamEvent>,
    abort_handle: AbortHandle,
}

impl ActiveStream {
    pub(crate) fn new(events: mpsc::Receiver<StreamEvent>, abort_handle: AbortHandle) -> Self {
        Self {
            buffer: String::new(),
            events,
            abort_handle,
        }
    }

    pub(crate) fn buffer(&self) -> &str {
        &self.buffer
    }

    pub(crate) fn push_fragment(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    pub(crate) fn into_buffer(self) -> String {
        self.buffer
    }

    pub(crate) fn try_recv_event(&mut self) -> Result<StreamEvent, mpsc::error::TryRecvError> {
        self.events.try_recv()
    }

    pub(crate) async fn recv_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Stop the streaming task. Dropping its fragment stream closes the request.
    pub(crate) fn abort(&self) {
        self.abort_handle.abort();
    }
}

#[derive(Debug, Default)]
pub(crate) enum SessionState {
    /// No conversation open.
    #[default]
    Idle,
    /// A conversation is open and no reply is in flight.
    AwaitingInput,
    Streaming(ActiveStream),
}

impl SessionState {
    pub(crate) fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::AwaitingInput => SessionPhase::AwaitingInput,
            SessionState::Streaming(_) => SessionPhase::Streaming,
        }
    }
}

/// Public view of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingInput,
    Streaming,
}
