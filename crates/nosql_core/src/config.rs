//! Startup configuration for the document store.
//!
//! # Responsibility
//! - Read the service endpoint and access key from the environment.
//! - Read database/container identifiers from a JSON settings file.
//! - Produce one immutable `StoreConfig` before any service call.
//!
//! # Invariants
//! - Every required value is present and non-empty once loading succeeds.
//! - The access key never appears in `Debug` output.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable holding the service endpoint.
pub const ENDPOINT_ENV: &str = "CosmosEndpoint";
/// Environment variable holding the account access key.
pub const MASTER_KEY_ENV: &str = "CosmosMasterKey";
/// Settings file read when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

const MEMORY_ENDPOINTS: [&str; 2] = ["memory:", ":memory:"];
const SQLITE_SCHEME: &str = "sqlite://";

/// Configuration loading error. Always fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    MissingEnv(&'static str),
    EmptyValue(&'static str),
    SettingsIo {
        path: PathBuf,
        source: std::io::Error,
    },
    SettingsParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    MissingSetting(&'static str),
    InvalidEndpoint(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnv(name) => write!(f, "environment variable `{name}` is not set"),
            Self::EmptyValue(name) => write!(f, "configuration value `{name}` is empty"),
            Self::SettingsIo { path, source } => {
                write!(f, "failed to read settings `{}`: {source}", path.display())
            }
            Self::SettingsParse { path, source } => {
                write!(f, "invalid settings `{}`: {source}", path.display())
            }
            Self::MissingSetting(name) => write!(f, "setting `{name}` is missing"),
            Self::InvalidEndpoint(value) => write!(
                f,
                "unsupported endpoint `{value}`; expected memory: | sqlite://<path> | <path>"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SettingsIo { source, .. } => Some(source),
            Self::SettingsParse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Where the document service lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Process-local database, discarded on drop.
    Memory,
    /// Database file on local disk.
    File(PathBuf),
}

impl Endpoint {
    /// Parses `memory:`, `sqlite://<path>` or a bare filesystem path.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyValue(ENDPOINT_ENV));
        }
        if MEMORY_ENDPOINTS.contains(&trimmed) {
            return Ok(Self::Memory);
        }
        if let Some(path) = trimmed.strip_prefix(SQLITE_SCHEME) {
            if path.is_empty() {
                return Err(ConfigError::InvalidEndpoint(trimmed.to_string()));
            }
            return Ok(Self::File(PathBuf::from(path)));
        }
        if trimmed.contains("://") {
            return Err(ConfigError::InvalidEndpoint(trimmed.to_string()));
        }
        Ok(Self::File(PathBuf::from(trimmed)))
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory:"),
            Self::File(path) => write!(f, "{SQLITE_SCHEME}{}", path.display()),
        }
    }
}

/// Connection settings for a document client.
#[derive(Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub master_key: String,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint, master_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            master_key: master_key.into(),
        }
    }
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("master_key", &"<redacted>")
            .finish()
    }
}

/// Fully resolved store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub client: ClientConfig,
    pub database_id: String,
    pub container_id: String,
}

#[derive(Debug, Deserialize)]
struct AppSettings {
    #[serde(rename = "CosmosDataBaseId")]
    database_id: Option<String>,
    #[serde(rename = "CosmosContainerId")]
    container_id: Option<String>,
}

impl StoreConfig {
    /// Loads configuration from the process environment and a settings file.
    ///
    /// # Errors
    /// - Returns `ConfigError` when any required value is missing or invalid.
    pub fn load(settings_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_sources(|name| std::env::var(name).ok(), settings_path)
    }

    /// Loads configuration using an injected environment lookup.
    pub fn from_sources(
        env: impl Fn(&str) -> Option<String>,
        settings_path: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let endpoint = required_env(&env, ENDPOINT_ENV)?;
        let master_key = required_env(&env, MASTER_KEY_ENV)?;
        let settings = read_settings(settings_path.as_ref())?;

        let database_id = required_setting(settings.database_id, "CosmosDataBaseId")?;
        let container_id = required_setting(settings.container_id, "CosmosContainerId")?;

        Ok(Self {
            client: ClientConfig::new(Endpoint::parse(&endpoint)?, master_key),
            database_id,
            container_id,
        })
    }
}

fn required_env(
    env: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    let value = env(name).ok_or(ConfigError::MissingEnv(name))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyValue(name));
    }
    Ok(trimmed.to_string())
}

fn required_setting(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::MissingSetting(name))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyValue(name));
    }
    Ok(trimmed.to_string())
}

fn read_settings(path: &Path) -> Result<AppSettings, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::SettingsIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::SettingsParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{ClientConfig, ConfigError, Endpoint};
    use std::path::PathBuf;

    #[test]
    fn endpoint_parse_accepts_memory_and_paths() {
        assert_eq!(Endpoint::parse(" memory: ").unwrap(), Endpoint::Memory);
        assert_eq!(Endpoint::parse(":memory:").unwrap(), Endpoint::Memory);
        assert_eq!(
            Endpoint::parse("sqlite:///var/lib/families.db").unwrap(),
            Endpoint::File(PathBuf::from("/var/lib/families.db"))
        );
        assert_eq!(
            Endpoint::parse("data/families.db").unwrap(),
            Endpoint::File(PathBuf::from("data/families.db"))
        );
    }

    #[test]
    fn endpoint_parse_rejects_remote_schemes() {
        let err = Endpoint::parse("https://localhost:8081/").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
        assert!(matches!(
            Endpoint::parse("sqlite://"),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn client_config_debug_redacts_master_key() {
        let config = ClientConfig::new(Endpoint::Memory, "super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
