//! # configs
//!
//! Layered runtime settings: built-in defaults, then an optional TOML file
//! named by `WORLDFEED_CONFIG`, then `WORLDFEED__SECTION__KEY` environment
//! variables. The legacy deployment variable names (`PINATA_JWT`,
//! `APP_ID`, ...) are honored last.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub const CONFIG_PATH_VAR: &str = "WORLDFEED_CONFIG";
const ENV_PREFIX: &str = "WORLDFEED";
/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_TTL_HOURS: u64 = 24 * 365;

/// Legacy variable name and the setting it overrides.
const LEGACY_OVERRIDES: [(&str, &str); 5] = [
    ("PINATA_JWT", "pinata.jwt"),
    ("PINATA_GATEWAY", "pinata.gateway_url"),
    ("MAIN_DATA_HASH", "storage.main_data_hash"),
    ("APP_ID", "minikit.app_id"),
    ("DEV_PORTAL_API_KEY", "minikit.dev_portal_api_key"),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub pinata: PinataSettings,
    pub auth: AuthSettings,
    pub minikit: MinikitSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mounts the `/debug/*` operator routes
    pub debug_routes: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    /// Reference of the legacy global document, used when no newer one is found
    pub main_data_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PinataSettings {
    pub jwt: Option<SecretString>,
    pub api_url: String,
    pub gateway_url: String,
    pub timeout_secs: u64,
    pub page_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub session_secret: Option<SecretString>,
    pub session_ttl_hours: u64,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinikitSettings {
    pub app_id: Option<String>,
    pub dev_portal_api_key: Option<SecretString>,
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Settings {
    /// Loads `.env`, then settings from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), ".env loaded");
        }
        let vars: HashMap<String, String> = std::env::vars().collect();
        let file = vars.get(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::from_sources(file.as_deref(), vars)
    }

    /// Builds settings from an explicit file and variable map.
    pub fn from_sources(file: Option<&Path>, vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.debug_routes", true)?
            .set_default("storage.data_dir", "./data")?
            .set_default("pinata.api_url", "https://api.pinata.cloud")?
            .set_default("pinata.gateway_url", "https://gateway.pinata.cloud/ipfs/")?
            .set_default("pinata.timeout_secs", 10)?
            .set_default("pinata.page_limit", 100)?
            .set_default("auth.session_ttl_hours", 24)?
            .set_default("auth.secure_cookie", false)?
            .set_default("minikit.api_url", "https://developer.worldcoin.org")?
            .set_default("logging.format", "pretty")?
            .set_default("logging.filter", "info")?;

        if let Some(path) = file {
            info!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(vars.clone())),
        );

        for (var, key) in LEGACY_OVERRIDES {
            let value = vars
                .get(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            builder = builder.set_override_option(key, value)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.auth.session_ttl_hours == 0 {
            return Err(ConfigError::Invalid("auth.session_ttl_hours must be non-zero".into()));
        }
        if self.auth.session_ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(ConfigError::Invalid(format!(
                "auth.session_ttl_hours must be at most {MAX_SESSION_TTL_HOURS}"
            )));
        }
        if self.pinata.timeout_secs == 0 {
            return Err(ConfigError::Invalid("pinata.timeout_secs must be non-zero".into()));
        }
        if self.pinata.page_limit == 0 {
            return Err(ConfigError::Invalid("pinata.page_limit must be non-zero".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn pinata_timeout(&self) -> Duration {
        Duration::from_secs(self.pinata.timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.session_ttl_hours * 60 * 60)
    }
}
