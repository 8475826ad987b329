//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Port the HTTP surface listens on.
    pub http_port: u16,
    /// Upper bound for any single store call made during onboarding.
    pub store_timeout: Duration,
    /// Allowed CORS origins. `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/mentorship.db"),
            http_port: 8080,
            store_timeout: Duration::from_secs(10),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment. Unset values take
    /// their defaults; unparseable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::try_from_lookup(|key| std::env::var(key).ok())
    }

    /// Lenient variant of [`AppConfig::try_from_lookup`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let db_path = lookup("MENTORSHIP_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let http_port: u16 = lookup("MENTORSHIP_HTTP_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.http_port);

        let store_timeout = lookup("MENTORSHIP_STORE_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.store_timeout);

        let cors_origins = lookup("MENTORSHIP_CORS_ORIGINS")
            .map(|s| split_list(&s))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.cors_origins);

        Self {
            db_path,
            http_port,
            store_timeout,
            cors_origins,
        }
    }

    /// Strict variant: unparseable values are reported instead of defaulted.
    pub fn try_from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup("MENTORSHIP_HTTP_PORT") {
            raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "MENTORSHIP_HTTP_PORT".into(),
                message: format!("{raw:?}: {e}"),
            })?;
        }
        if let Some(raw) = lookup("MENTORSHIP_STORE_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidValue {
                        key: "MENTORSHIP_STORE_TIMEOUT_SECS".into(),
                        message: "timeout must be at least one second".into(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(ConfigError::InvalidValue {
                        key: "MENTORSHIP_STORE_TIMEOUT_SECS".into(),
                        message: format!("{raw:?}: {e}"),
                    });
                }
            }
        }
        Ok(Self::from_lookup(lookup))
    }

    /// Whether any origin is allowed.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
