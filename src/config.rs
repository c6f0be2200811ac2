//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::onboarding::engine::InitMode;

/// Server configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the REST API listens on.
    pub port: u16,
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Optional JSON step catalog. The built-in catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
    /// How the employee-created hook initializes onboarding.
    pub init_mode: InitMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/hr-onboarding.db"),
            catalog_path: None,
            init_mode: InitMode::Idempotent,
        }
    }
}

impl ServerConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("HR_ONBOARDING_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "HR_ONBOARDING_PORT".to_string(),
                message: format!("{raw:?} is not a port number: {e}"),
            })?,
            None => defaults.port,
        };

        let db_path = lookup("HR_ONBOARDING_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let catalog_path = lookup("HR_ONBOARDING_CATALOG_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let init_mode = match lookup("HR_ONBOARDING_STRICT_INIT") {
            Some(raw) => {
                if parse_bool("HR_ONBOARDING_STRICT_INIT", &raw)? {
                    InitMode::Strict
                } else {
                    InitMode::Idempotent
                }
            }
            None => defaults.init_mode,
        };

        Ok(Self {
            port,
            db_path,
            catalog_path,
            init_mode,
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{other:?} is not a boolean"),
        }),
    }
}
