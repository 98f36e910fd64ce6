use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::{DEFAULT_MODEL_PROVIDER, DEFAULT_REPLY_DELAY};
use crate::registry::{CredentialRegistry, RegistryError};

pub const CONFIG_DIR_ENV: &str = "DBCOPILOT_CONFIG_DIR";
pub const API_URL_ENV: &str = "DBCOPILOT_API_URL";

const APP_DIR: &str = "dbcopilot";
const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session.json";
const LOG_FILE: &str = "dbcopilot.log";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    #[default]
    Backend,
    Canned,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStoreKind {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatSettings {
    pub mode: ChatMode,
    pub reply_delay_ms: u64,
    pub model_provider: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            mode: ChatMode::Backend,
            reply_delay_ms: u64::try_from(DEFAULT_REPLY_DELAY.as_millis()).unwrap_or(1_500),
            model_provider: DEFAULT_MODEL_PROVIDER.to_string(),
        }
    }
}

impl ChatSettings {
    #[must_use]
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSettings {
    pub store: SessionStoreKind,
    pub keyring_service: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSettings,
    pub chat: ChatSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
    pub credential_fields: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid [credential_fields] in config: {0}")]
    Registry(#[from] RegistryError),
}

impl AppConfig {
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_dir()?.join(CONFIG_FILE);
        let mut config = Self::load_from_path(path)?;
        config.apply_env();
        Ok(config)
    }

    /// Missing or blank files yield the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.credential_registry()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Some(base_url) = env::var(API_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
        {
            self.api.base_url = base_url;
        }
    }

    pub fn credential_registry(&self) -> Result<CredentialRegistry, ConfigError> {
        Ok(CredentialRegistry::default().with_overrides(&self.credential_fields)?)
    }
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(ConfigError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(ConfigError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join(APP_DIR))
}

#[must_use]
pub fn session_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SESSION_FILE)
}

#[must_use]
pub fn log_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(LOG_FILE)
}
