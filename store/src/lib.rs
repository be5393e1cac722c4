//! Conversation persistence for the FDI Assistant.
//!
//! - [`local`] - on-device key-value storage (file-backed or in-memory)
//! - [`device`] - device identity and theme preference
//! - [`remote`] - REST client for the conversation backend
//! - [`store`] - [`ConversationStore`], remote-primary with a local write-through cache

mod atomic_write;
pub mod device;
pub mod local;
pub mod remote;
mod store;

pub use device::{LocalSettings, ThemePreference, UnknownTheme};
pub use local::{FileKeyValueStore, KeyValueStore, LocalError, MemoryKeyValueStore};
pub use remote::{RemoteBackend, RemoteConfig, RemoteError};
pub use store::{ConversationStore, MigrationOutcome, SaveOutcome};
