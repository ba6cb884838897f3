//! Configuration file support

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use modpull_curse::config::default_workers;

/// Global configuration for modpull
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub workers: WorkersConfig,
    pub catalog: CatalogConfig,
    pub http: HttpFileConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    #[serde(deserialize_with = "deserialize_env_path")]
    pub default_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("mods"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
    /// Milliseconds between worker starts
    pub stagger_ms: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            default: default_workers(),
            stagger_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    #[serde(deserialize_with = "deserialize_env_string")]
    pub api_url: String,
    pub game_slug: String,
    pub category_slug: String,
    pub batch_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let settings = modpull_curse::CatalogSettings::default();
        Self {
            api_url: settings.api_url,
            game_slug: settings.game_slug,
            category_slug: settings.category_slug,
            batch_size: 200,
        }
    }
}

impl CatalogConfig {
    pub fn settings(&self) -> modpull_curse::CatalogSettings {
        modpull_curse::CatalogSettings {
            api_url: self.api_url.clone(),
            game_slug: self.game_slug.clone(),
            category_slug: self.category_slug.clone(),
        }
    }
}

/// `[http]` section, timeouts in seconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpFileConfig {
    pub connect_timeout: u64,
    pub read_timeout: u64,
    pub max_connections: usize,
}

impl Default for HttpFileConfig {
    fn default() -> Self {
        let http = modpull_core::HttpConfig::default();
        Self {
            connect_timeout: http.connect_timeout.as_secs(),
            read_timeout: http.read_timeout.as_secs(),
            max_connections: http.max_connections,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Deserialize a string that may be an environment variable reference like ${VAR}
fn deserialize_env_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    expand_env_var(&s).ok_or_else(|| serde::de::Error::custom(format!("{s} is not set")))
}

fn deserialize_env_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_env_string(deserializer).map(PathBuf::from)
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./modpull.toml (current directory)
    /// 2. ~/.config/modpull/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("modpull.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "modpull") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
