//! Configuration module for Roster.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, DatabaseSettings, QuerySettings, Settings, SettingsError,
};
