//! `~/.fdi/config.toml` loading.
//!
//! Every section and field is optional. String values support `${VAR}`
//! expansion, and `OPENROUTER_API_KEY` / `FDI_API_BASE_URL` in the environment
//! take precedence over the file.
//!
//! ```toml
//! [openrouter]
//! api_key = "${OPENROUTER_API_KEY}"
//! model = "moonshotai/kimi-k2"
//! temperature = 0.7
//! max_tokens = 1000
//! site_url = "https://fdiassociates.com"
//!
//! [backend]
//! base_url = "https://fdi-backend.onrender.com"
//!
//! [app]
//! data_dir = "/custom/path"
//! ```

use std::path::{Path, PathBuf};
use std::{env, fs};

use fdi_types::ApiKey;
use serde::Deserialize;
use thiserror::Error;

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const BASE_URL_ENV: &str = "FDI_API_BASE_URL";

const CONFIG_DIR: &str = ".fdi";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FdiConfig {
    pub openrouter: Option<OpenRouterConfig>,
    pub backend: Option<BackendConfig>,
    pub app: Option<AppConfig>,
}

#[derive(Default, Deserialize)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Origin sent as `HTTP-Referer`.
    pub site_url: Option<String>,
    pub idle_timeout_secs: Option<u64>,
}

// Manual Debug impl to prevent leaking the API key in logs.
impl std::fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("site_url", &self.site_url)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    /// Treat loopback URLs as a real backend (local development).
    #[serde(default)]
    pub allow_loopback: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub data_dir: Option<String>,
}

/// Replace `${VAR}` with the variable's value (empty if unset).
///
/// An unclosed `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_override(name: &str) -> Option<String> {
    non_empty(env::var(name).ok())
}

impl FdiConfig {
    /// Load the user config. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {source}", path.display());
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn openrouter(&self) -> Option<&OpenRouterConfig> {
        self.openrouter.as_ref()
    }

    /// Credential from the environment, else from the file.
    #[must_use]
    pub fn api_key(&self) -> Option<ApiKey> {
        self.api_key_with(env_override(API_KEY_ENV))
    }

    fn api_key_with(&self, from_env: Option<String>) -> Option<ApiKey> {
        from_env
            .or_else(|| {
                let raw = self.openrouter.as_ref()?.api_key.as_deref()?;
                non_empty(Some(expand_env_vars(raw)))
            })
            .map(|key| ApiKey::new(key.trim()))
    }

    /// Backend base URL from the environment, else from the file.
    #[must_use]
    pub fn backend_base_url(&self) -> Option<String> {
        self.backend_base_url_with(env_override(BASE_URL_ENV))
    }

    fn backend_base_url_with(&self, from_env: Option<String>) -> Option<String> {
        from_env.or_else(|| {
            let raw = self.backend.as_ref()?.base_url.as_deref()?;
            non_empty(Some(expand_env_vars(raw)))
        })
    }

    #[must_use]
    pub fn allow_loopback_backend(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.allow_loopback)
    }

    /// Directory for on-device storage; `~/.fdi/data` unless overridden.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.app
            .as_ref()
            .and_then(|app| non_empty(app.data_dir.as_deref().map(expand_env_vars)))
            .map_or_else(default_data_dir, PathBuf::from)
    }
}

#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// `~/.fdi/data`, or `./.fdi/data` when there is no home directory.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR))
        .join("data")
}
