//! Configuration module for watchbridge.
//!
//! Layered configuration:
//! - Default values
//! - TOML configuration file (`.watchbridge/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `WATCHBRIDGE_` and use double
//! underscores to separate nested levels:
//! - `WATCHBRIDGE_SESSION__CASE_SENSITIVE_PATHS=false` sets `session.case_sensitive_paths`
//! - `WATCHBRIDGE_TRANSPORT__CHANNEL_CAPACITY=1024` sets `transport.channel_capacity`
//! - `WATCHBRIDGE_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".watchbridge";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "WATCHBRIDGE_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Logging levels
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path handling for bound sessions
    #[serde(default)]
    pub session: SessionConfig,

    /// Stdio transport settings
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level for all targets without an override
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `watchbridge::session = "debug"`
    #[serde(default)]
    pub modules: IndexMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SessionConfig {
    /// Whether paths differing only in case name different files
    #[serde(default = "default_case_sensitive_paths")]
    pub case_sensitive_paths: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TransportConfig {
    /// Outbound notifications queued before new ones are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_version() -> u32 { 1 }
fn default_log_level() -> String { "warn".to_string() }
fn default_channel_capacity() -> usize { 256 }

/// Case sensitivity of the host platform's default file system.
pub fn default_case_sensitive_paths() -> bool {
    !cfg!(any(target_os = "windows", target_os = "macos"))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            logging: LoggingConfig::default(),
            session: SessionConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: IndexMap::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            case_sensitive_paths: default_case_sensitive_paths(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// Find `.watchbridge/settings.toml` in the current directory or an ancestor
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `root`
    pub fn init_config_file(root: impl AsRef<Path>, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }

    /// Render the settings as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
