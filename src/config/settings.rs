//! TOML-based configuration for Roster.
//!
//! Supports a config file (roster.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [database]
//! dialect = "sqlite"
//! path = "${ROSTER_DB}"
//!
//! [query]
//! default_page_size = 25
//! max_page_size = 500
//! escape_does_not_contain = false
//!
//! [cache]
//! enabled = true
//! ttl_seconds = 120
//! max_entries = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compile::CompileOptions;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub query: QuerySettings,
    pub cache: CacheSettings,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQL dialect statements are rendered in.
    pub dialect: Dialect,

    /// Database file (supports ${ENV_VAR} expansion). `None` for in-memory.
    pub path: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            path: None,
        }
    }
}

impl DatabaseSettings {
    /// Get the database path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Request limits and compiler switches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Page size used when a request omits one.
    pub default_page_size: u64,

    /// Largest page size a request may ask for.
    pub max_page_size: u64,

    /// Escape LIKE wildcards in `doesNotContain` values too.
    pub escape_does_not_contain: bool,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 500,
            escape_does_not_contain: false,
        }
    }
}

/// Row count cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,

    /// Count TTL in seconds.
    pub ttl_seconds: u64,

    /// Upper bound on cached counts.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 120,
            max_entries: 10_000,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `ROSTER_CONFIG`
    /// 2. `./roster.toml`
    /// 3. `~/.config/roster/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("ROSTER_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("roster.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("roster").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Compiler options implied by these settings.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::default()
            .with_dialect(self.database.dialect)
            .with_does_not_contain_escaping(self.query.escape_does_not_contain)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let query = &self.query;
        if query.max_page_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "query.max_page_size must be greater than 0".into(),
            ));
        }
        if query.default_page_size == 0 || query.default_page_size > query.max_page_size {
            return Err(SettingsError::InvalidConfig(format!(
                "query.default_page_size must be between 1 and {}",
                query.max_page_size
            )));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(SettingsError::InvalidConfig(
                "cache.max_entries must be greater than 0 when the cache is enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
