//! Application configuration with layered loading.
//!
//! Configuration management using figment for layered loading from multiple
//! sources:
//!
//! 1. Environment variables (KIRI_OFFLINE_*)
//! 2. TOML config file (if KIRI_OFFLINE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (KIRI_OFFLINE_*)
/// 2. TOML config file (if KIRI_OFFLINE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache store.
    ///
    /// Set via KIRI_OFFLINE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name of the current cache generation.
    ///
    /// This string is the sole versioning mechanism: bumping the worker
    /// version means changing it (e.g. "kiri-v2"). Reusing a name across
    /// incompatible manifests will NOT refresh entries already stored:
    /// cache-first assets are never invalidated except by generation
    /// deletion. Set via KIRI_OFFLINE_CACHE_NAME.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Origin the gateway fronts (scheme + host + port).
    ///
    /// Site-relative manifest entries and intercepted request paths resolve
    /// against it. Set via KIRI_OFFLINE_ORIGIN.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Address the gateway listens on.
    ///
    /// Set via KIRI_OFFLINE_LISTEN_ADDR.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to the asset manifest file.
    ///
    /// Set via KIRI_OFFLINE_MANIFEST_PATH.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    /// User-Agent string for upstream requests.
    ///
    /// Set via KIRI_OFFLINE_USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per upstream response.
    ///
    /// Set via KIRI_OFFLINE_MAX_BYTES.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upstream request timeout in milliseconds.
    ///
    /// No timeout beyond this is imposed by the fetch strategies themselves.
    /// Set via KIRI_OFFLINE_TIMEOUT_MS.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./kiri-offline-cache.sqlite")
}

fn default_cache_name() -> String {
    "kiri".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("./offline_manifest.txt")
}

fn default_user_agent() -> String {
    "kiri-offline/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_name: default_cache_name(),
            origin: default_origin(),
            listen_addr: default_listen_addr(),
            manifest_path: default_manifest_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("KIRI_OFFLINE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("KIRI_OFFLINE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./kiri-offline-cache.sqlite"));
        assert_eq!(config.cache_name, "kiri");
        assert_eq!(config.origin, "http://127.0.0.1:8000");
        assert_eq!(config.listen_addr, "127.0.0.1:8787");
        assert_eq!(config.manifest_path, PathBuf::from("./offline_manifest.txt"));
        assert_eq!(config.user_agent, "kiri-offline/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }
}
