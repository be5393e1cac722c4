//! Remote-primary conversation persistence with an on-device cache.
//!
//! The local cache is written through on every save, so a conversation is never
//! lost because the backend was down. Reads prefer the backend and fall back to
//! the cache. No operation here returns an error: failures are logged and the
//! outcome type says which backend was reached.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use fdi_types::{Conversation, ConversationId};

use crate::device::LocalSettings;
use crate::local::{CONVERSATIONS_KEY, LocalError, MIGRATION_MARKER_KEY};
use crate::remote::RemoteBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Cached locally and accepted by the backend.
    Remote,
    /// Cached locally only (backend unconfigured or unreachable).
    LocalOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    NotConfigured,
    NothingToMigrate,
    AlreadyMigrated,
    Migrated(usize),
    /// Upload failed; the marker stays unset so the next start retries.
    Failed,
}

#[derive(Debug)]
pub struct ConversationStore {
    settings: Arc<LocalSettings>,
    remote: Option<RemoteBackend>,
    /// Serializes read-modify-write of the cached list.
    cache_lock: Mutex<()>,
}

impl ConversationStore {
    #[must_use]
    pub fn new(settings: Arc<LocalSettings>, remote: Option<RemoteBackend>) -> Self {
        Self {
            settings,
            remote,
            cache_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<LocalSettings> {
        &self.settings
    }

    #[must_use]
    pub fn is_remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn save(&self, conversation: &Conversation) -> SaveOutcome {
        let mut record = conversation.clone();
        record.updated_at = Some(Utc::now());
        record.device_id = Some(self.settings.device_id().clone());

        self.update_cache(|cached| {
            if let Some(existing) = cached.iter_mut().find(|c| c.id == record.id) {
                *existing = record.clone();
            } else {
                cached.insert(0, record.clone());
            }
        });

        let Some(remote) = &self.remote else {
            return SaveOutcome::LocalOnly;
        };
        match remote.upsert(&record).await {
            Ok(()) => SaveOutcome::Remote,
            Err(e) => {
                tracing::warn!(conversation = %record.id, "Remote save failed, kept local copy: {e}");
                SaveOutcome::LocalOnly
            }
        }
    }

    /// All conversations, most recent first.
    pub async fn list(&self) -> Vec<Conversation> {
        if let Some(remote) = &self.remote {
            match remote.list(self.settings.device_id()).await {
                Ok(mut conversations) if !conversations.is_empty() => {
                    self.replace_cache(&conversations);
                    sort_most_recent_first(&mut conversations);
                    return conversations;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Remote list failed, using local cache: {e}"),
            }
        }

        let mut conversations = self.read_cache();
        sort_most_recent_first(&mut conversations);
        conversations
    }

    pub async fn get(&self, id: &ConversationId) -> Option<Conversation> {
        if let Some(remote) = &self.remote {
            match remote.get(id, self.settings.device_id()).await {
                Ok(Some(conversation)) => return Some(conversation),
                Ok(None) => {}
                Err(e) => tracing::warn!(conversation = %id, "Remote get failed, using local cache: {e}"),
            }
        }
        self.read_cache().into_iter().find(|c| &c.id == id)
    }

    /// `true` only if the backend confirmed the delete; the cache is updated regardless.
    pub async fn delete(&self, id: &ConversationId) -> bool {
        self.update_cache(|cached| cached.retain(|c| &c.id != id));

        let Some(remote) = &self.remote else {
            return false;
        };
        match remote.delete(id, self.settings.device_id()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(conversation = %id, "Remote delete failed: {e}");
                false
            }
        }
    }

    /// Remove every conversation for this device.
    pub async fn clear(&self) -> bool {
        {
            let _guard = self.lock_cache();
            if let Err(e) = self.settings.storage().remove(CONVERSATIONS_KEY) {
                tracing::warn!("Failed to clear local conversations: {e}");
            }
        }

        let Some(remote) = &self.remote else {
            return false;
        };
        match remote.clear_device(self.settings.device_id()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Remote clear failed: {e}");
                false
            }
        }
    }

    /// One-time upload of the local cache to a newly configured backend.
    pub async fn migrate_local_to_remote(&self) -> MigrationOutcome {
        let Some(remote) = &self.remote else {
            return MigrationOutcome::NotConfigured;
        };

        let cached = self.read_cache();
        if cached.is_empty() {
            return MigrationOutcome::NothingToMigrate;
        }
        match self.settings.storage().get(MIGRATION_MARKER_KEY) {
            Ok(Some(_)) => return MigrationOutcome::AlreadyMigrated,
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read migration marker: {e}"),
        }

        let device = self.settings.device_id();
        let records: Vec<Conversation> = cached
            .into_iter()
            .map(|mut c| {
                c.device_id = Some(device.clone());
                c.updated_at = Some(c.updated_at.unwrap_or(c.created_at));
                c
            })
            .collect();

        tracing::info!(count = records.len(), "Migrating local conversations to backend");
        if let Err(e) = remote.bulk_upload(&records).await {
            tracing::warn!("Conversation migration failed: {e}");
            return MigrationOutcome::Failed;
        }

        let marker = Utc::now().to_rfc3339();
        if let Err(e) = self.settings.storage().set(MIGRATION_MARKER_KEY, &marker) {
            tracing::warn!("Failed to record migration marker: {e}");
        }
        tracing::info!(count = records.len(), "Conversation migration complete");
        MigrationOutcome::Migrated(records.len())
    }

    pub async fn check_connection(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };
        match remote.health().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!("Backend health check failed: {e}");
                false
            }
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ()> {
        self.cache_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn update_cache(&self, edit: impl FnOnce(&mut Vec<Conversation>)) {
        let _guard = self.lock_cache();
        let mut cached = self.read_cache();
        edit(&mut cached);
        self.write_cache(&cached);
    }

    fn replace_cache(&self, conversations: &[Conversation]) {
        let _guard = self.lock_cache();
        self.write_cache(conversations);
    }

    fn read_cache(&self) -> Vec<Conversation> {
        match self.try_read_cache() {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("Local conversation cache unreadable: {e}");
                Vec::new()
            }
        }
    }

    fn try_read_cache(&self) -> Result<Vec<Conversation>, LocalError> {
        let Some(raw) = self.settings.storage().get(CONVERSATIONS_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|source| LocalError::Corrupt {
            key: CONVERSATIONS_KEY.to_string(),
            source,
        })
    }

    fn write_cache(&self, conversations: &[Conversation]) {
        let result = serde_json::to_string(conversations)
            .map_err(|source| LocalError::Corrupt {
                key: CONVERSATIONS_KEY.to_string(),
                source,
            })
            .and_then(|raw| self.settings.storage().set(CONVERSATIONS_KEY, &raw));
        if let Err(e) = result {
            tracing::warn!("Failed to write local conversation cache: {e}");
        }
    }
}

fn sort_most_recent_first(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
