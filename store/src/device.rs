//! Per-installation settings: device identity and theme preference.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use fdi_types::DeviceId;

use crate::local::{DEVICE_ID_KEY, KeyValueStore, LocalError, THEME_KEY};

const DEVICE_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown theme {0:?} (expected light, dark or system)")]
pub struct UnknownTheme(String);

impl FromStr for ThemePreference {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(UnknownTheme(other.to_string())),
        }
    }
}

/// Settings that live only on this device.
///
/// The device id is created on first use, persisted, and cached for the life of
/// the process. If it cannot be persisted the generated id is still used for
/// this process.
pub struct LocalSettings {
    storage: Arc<dyn KeyValueStore>,
    device_id: OnceLock<DeviceId>,
}

impl fmt::Debug for LocalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSettings")
            .field("device_id", &self.device_id.get())
            .finish_non_exhaustive()
    }
}

impl LocalSettings {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            device_id: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        self.device_id.get_or_init(|| self.load_or_create_device_id())
    }

    fn load_or_create_device_id(&self) -> DeviceId {
        match self.storage.get(DEVICE_ID_KEY) {
            Ok(Some(stored)) if !stored.trim().is_empty() => return DeviceId::new(stored.trim()),
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read device id: {e}"),
        }

        let id = generate_device_id();
        if let Err(e) = self.storage.set(DEVICE_ID_KEY, id.as_str()) {
            tracing::warn!("Failed to persist device id: {e}");
        }
        tracing::debug!(device_id = %id, "Created device id");
        id
    }

    /// Stored theme, or the default when unset or unreadable.
    #[must_use]
    pub fn theme(&self) -> ThemePreference {
        match self.storage.get(THEME_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_default(),
            Ok(None) => ThemePreference::default(),
            Err(e) => {
                tracing::warn!("Failed to read theme preference: {e}");
                ThemePreference::default()
            }
        }
    }

    pub fn set_theme(&self, theme: ThemePreference) -> Result<(), LocalError> {
        self.storage.set(THEME_KEY, theme.as_str())
    }
}

/// `device_<unix-millis>_<9 base36 chars>`.
fn generate_device_id() -> DeviceId {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut entropy = uuid::Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(DEVICE_SUFFIX_LEN);
    for _ in 0..DEVICE_SUFFIX_LEN {
        suffix.push(char::from(ALPHABET[(entropy % 36) as usize]));
        entropy /= 36;
    }
    DeviceId::new(format!(
        "device_{}_{suffix}",
        Utc::now().timestamp_millis()
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{LocalSettings, ThemePreference, generate_device_id};
    use crate::local::{DEVICE_ID_KEY, KeyValueStore, MemoryKeyValueStore, THEME_KEY};

    #[test]
    fn device_id_has_expected_shape() {
        let id = generate_device_id();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "device");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }

    #[test]
    fn device_id_is_created_once_and_persisted() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let settings = LocalSettings::new(storage.clone());

        let first = settings.device_id().clone();
        assert_eq!(settings.device_id(), &first);
        assert_eq!(
            storage.get(DEVICE_ID_KEY).unwrap().as_deref(),
            Some(first.as_str())
        );

        // A fresh process sees the stored id.
        let reopened = LocalSettings::new(storage);
        assert_eq!(reopened.device_id(), &first);
    }

    #[test]
    fn existing_device_id_is_reused() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        storage.set(DEVICE_ID_KEY, "device_1_abcdefghi").unwrap();
        let settings = LocalSettings::new(storage);
        assert_eq!(settings.device_id().as_str(), "device_1_abcdefghi");
    }

    #[test]
    fn theme_defaults_to_system_and_persists() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let settings = LocalSettings::new(storage.clone());
        assert_eq!(settings.theme(), ThemePreference::System);

        settings.set_theme(ThemePreference::Dark).unwrap();
        assert_eq!(settings.theme(), ThemePreference::Dark);
        assert_eq!(storage.get(THEME_KEY).unwrap().as_deref(), Some("dark"));

        storage.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(settings.theme(), ThemePreference::System);
    }

    #[test]
    fn theme_parses_case_insensitively() {
        assert_eq!(" Light ".parse::<ThemePreference>().unwrap(), ThemePreference::Light);
        assert!("blue".parse::<ThemePreference>().is_err());
    }
}
