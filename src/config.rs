use crate::error::ConfigError;
use crate::storage::{FileStorage, KeyringStorage, MemoryStorage, Storage};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const ENV_API_BASE_URL: &str = "MAGIO_API_BASE_URL";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "MAGIO_HTTP_TIMEOUT_SECS";
pub const ENV_SESSION_STORAGE: &str = "MAGIO_SESSION_STORAGE";
pub const ENV_SESSION_FILE: &str = "MAGIO_SESSION_FILE";

const DEFAULT_SESSION_FILE: &str = "magio-session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    File(PathBuf),
    Keyring,
}

impl SessionBackend {
    pub fn open(&self) -> Arc<dyn Storage> {
        match self {
            Self::Memory => Arc::new(MemoryStorage::new()),
            Self::File(path) => Arc::new(FileStorage::new(path.clone())),
            Self::Keyring => {
                let keyring = KeyringStorage::new();
                if keyring.is_available() {
                    Arc::new(keyring)
                } else {
                    warn!("os keyring unavailable; session will not outlive this process");
                    Arc::new(MemoryStorage::new())
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    /// Overall per-request timeout. `None` leaves timing to the caller.
    pub http_timeout: Option<Duration>,
    pub session_backend: SessionBackend,
}

impl Config {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: normalize_base_url(&api_base_url.into()),
            http_timeout: None,
            session_backend: SessionBackend::Memory,
        }
    }

    /// Reads configuration from the process environment, loading `.env`
    /// first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_base_url = read(ENV_API_BASE_URL).ok_or(ConfigError::Missing(ENV_API_BASE_URL))?;
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: ENV_API_BASE_URL,
                value: api_base_url,
            });
        }

        let http_timeout = match read(ENV_HTTP_TIMEOUT_SECS) {
            None => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        key: ENV_HTTP_TIMEOUT_SECS,
                        value: raw,
                    })
                }
            },
        };

        let session_file = read(ENV_SESSION_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
        let session_backend = match read(ENV_SESSION_STORAGE).as_deref() {
            None | Some("keyring") => SessionBackend::Keyring,
            Some("file") => SessionBackend::File(session_file),
            Some("memory") => SessionBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: ENV_SESSION_STORAGE,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            api_base_url: normalize_base_url(&api_base_url),
            http_timeout,
            session_backend,
        })
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
