//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (EDGECACHE_*)
//! 2. TOML config file (if EDGECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::VersionTags;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (EDGECACHE_*)
/// 2. TOML config file (if EDGECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via EDGECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for origin requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body bytes accepted from origin.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Origin fetch timeout in milliseconds. Applies to every strategy and to
    /// manifest pre-warming.
    ///
    /// Set via EDGECACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Base URL that root-relative request and manifest URLs resolve against.
    #[serde(default)]
    pub origin_base: Option<String>,

    /// Prefix shared by every namespace name.
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// Version tag of the static (pre-warmed) namespace.
    ///
    /// Set via EDGECACHE_STATIC_VERSION environment variable.
    #[serde(default = "default_version")]
    pub static_version: String,

    /// Version tag of the dynamic (runtime-filled) namespace.
    #[serde(default = "default_version")]
    pub dynamic_version: String,

    /// URLs pre-fetched into the static namespace at install, in order.
    #[serde(default)]
    pub manifest: Vec<String>,

    /// Dynamic entries captured longer ago than this are swept.
    #[serde(default = "default_expiry_days")]
    pub expiry_days: u32,

    /// Seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Seconds between buffered-event sync attempts.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Tag identifying the buffered-event sync job.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Endpoint receiving buffered event batches. Sync is disabled when unset.
    #[serde(default)]
    pub sink_url: Option<String>,

    /// Navigation target for notification clicks that carry no URL.
    #[serde(default = "default_app_root")]
    pub app_root: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./edgecache.sqlite")
}

fn default_user_agent() -> String {
    "edgecache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_namespace_prefix() -> String {
    "edgecache".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_expiry_days() -> u32 {
    7
}

fn default_sweep_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_sync_interval_secs() -> u64 {
    5 * 60
}

fn default_sync_tag() -> String {
    "sync-events".into()
}

fn default_app_root() -> String {
    "/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            origin_base: None,
            namespace_prefix: default_namespace_prefix(),
            static_version: default_version(),
            dynamic_version: default_version(),
            manifest: Vec::new(),
            expiry_days: default_expiry_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sync_interval_secs: default_sync_interval_secs(),
            sync_tag: default_sync_tag(),
            sink_url: None,
            app_root: default_app_root(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn expiry_threshold(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.expiry_days))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn version_tags(&self) -> VersionTags {
        VersionTags::new(&self.namespace_prefix, &self.static_version, &self.dynamic_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `EDGECACHE_`
    /// 2. TOML file from `EDGECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("EDGECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("EDGECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Sink endpoint, required only when buffered-event sync is started.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no sink URL is configured.
    pub fn require_sink_url(&self) -> Result<&str, ConfigError> {
        self.sink_url.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "sink_url".into(),
            hint: "Set EDGECACHE_SINK_URL environment variable".into(),
        })
    }
}
