//! Persistence outbox.
//!
//! The session never awaits storage. Every transcript mutation is queued as a
//! [`PersistIntent`] and a worker task applies intents to the store in order.
//! Outcomes are logged only; nothing flows back to the session.

use std::sync::Arc;

use fdi_store::{ConversationStore, SaveOutcome};
use fdi_types::{Conversation, ConversationId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistIntent {
    Save(Conversation),
    Delete(ConversationId),
    Clear,
}

/// Sending half of the outbox held by the session.
#[derive(Debug, Clone)]
pub struct PersistenceOutbox {
    tx: mpsc::UnboundedSender<PersistIntent>,
}

impl PersistenceOutbox {
    pub(crate) fn push(&self, intent: PersistIntent) {
        if self.tx.send(intent).is_err() {
            tracing::warn!("Persistence worker stopped; change not saved");
        }
    }
}

#[must_use]
pub fn persistence_channel() -> (PersistenceOutbox, mpsc::UnboundedReceiver<PersistIntent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PersistenceOutbox { tx }, rx)
}

/// Apply intents until every outbox sender is dropped.
pub fn spawn_persistence_worker(
    store: Arc<ConversationStore>,
    mut intents: mpsc::UnboundedReceiver<PersistIntent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(intent) = intents.recv().await {
            apply(&store, intent).await;
        }
        tracing::debug!("Persistence outbox closed");
    })
}

async fn apply(store: &ConversationStore, intent: PersistIntent) {
    match intent {
        PersistIntent::Save(conversation) => {
            let outcome = store.save(&conversation).await;
            if outcome == SaveOutcome::LocalOnly && store.is_remote_configured() {
                tracing::debug!(conversation = %conversation.id, "Saved locally only");
            }
        }
        PersistIntent::Delete(id) => {
            let remote = store.delete(&id).await;
            tracing::debug!(conversation = %id, remote, "Deleted conversation");
        }
        PersistIntent::Clear => {
            let remote = store.clear().await;
            tracing::debug!(remote, "Cleared conversations");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use fdi_store::{ConversationStore, LocalSettings, MemoryKeyValueStore};
    use fdi_types::{ChatMessage, Conversation};

    use super::{PersistIntent, persistence_channel, spawn_persistence_worker};

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[tokio::test]
    async fn worker_applies_intents_in_order() {
        let settings = Arc::new(LocalSettings::new(Arc::new(MemoryKeyValueStore::new())));
        let store = Arc::new(ConversationStore::new(settings, None));
        let (outbox, rx) = persistence_channel();
        let worker = spawn_persistence_worker(store.clone(), rx);

        let mut first = Conversation::for_first_message("first", at(1_000));
        first.messages.push(ChatMessage::user("first", at(1_000)));
        let second = Conversation::for_first_message("second", at(2_000));

        outbox.push(PersistIntent::Save(first.clone()));
        outbox.push(PersistIntent::Save(second.clone()));
        outbox.push(PersistIntent::Delete(second.id.clone()));
        drop(outbox);
        worker.await.unwrap();

        let stored = store.list().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first.id);
        assert_eq!(stored[0].messages, first.messages);
    }

    #[tokio::test]
    async fn clear_empties_store() {
        let settings = Arc::new(LocalSettings::new(Arc::new(MemoryKeyValueStore::new())));
        let store = Arc::new(ConversationStore::new(settings, None));
        let (outbox, rx) = persistence_channel();
        let worker = spawn_persistence_worker(store.clone(), rx);

        outbox.push(PersistIntent::Save(Conversation::new(at(1_000))));
        outbox.push(PersistIntent::Clear);
        drop(outbox);
        worker.await.unwrap();

        assert!(store.list().await.is_empty());
    }
}
