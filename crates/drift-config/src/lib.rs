//! # drift-config
//!
//! Configuration management for Drift.
//!
//! Loads configuration from:
//! 1. `~/.drift/config.toml` (global)
//! 2. `.drift/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub importer: ImporterConfig,
    pub status_cache: StatusCacheConfig,
}

impl Config {
    /// Load config from standard locations (CWD-relative project config).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_for_project(Path::new("."))
    }

    /// Load config for a specific project root directory.
    /// Resolution order: global → project → env vars.
    pub fn load_for_project(project_root: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(&global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        let project_config_path = project_root.join(".drift/config.toml");
        if project_config_path.exists() {
            debug!("loading project config from {:?}", project_config_path);
            let contents = std::fs::read_to_string(&project_config_path)?;
            let project_config: Config = toml::from_str(&contents)?;
            config.merge(project_config);
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Global config path: `~/.drift/config.toml`.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".drift/config.toml"))
    }

    /// Merge another config (project overrides global).
    /// Non-default values from `other` replace values in `self`.
    fn merge(&mut self, other: Config) {
        let default_storage = StorageConfig::default();
        if other.storage.root != default_storage.root {
            self.storage.root = other.storage.root;
        }

        let default_importer = ImporterConfig::default();
        if other.importer.helper != default_importer.helper {
            self.importer.helper = other.importer.helper;
        }

        let default_cache = StatusCacheConfig::default();
        if other.status_cache.scm_status_cache_max_size
            != default_cache.scm_status_cache_max_size
        {
            self.status_cache.scm_status_cache_max_size =
                other.status_cache.scm_status_cache_max_size;
        }
        if other.status_cache.scm_status_cache_minimum_items
            != default_cache.scm_status_cache_minimum_items
        {
            self.status_cache.scm_status_cache_minimum_items =
                other.status_cache.scm_status_cache_minimum_items;
        }
    }

    /// Apply environment variable overrides (highest priority).
    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("DRIFT_STORE_DIR") {
            self.storage.root = PathBuf::from(root);
        }
        if let Ok(helper) = std::env::var("DRIFT_HELPER") {
            self.importer.helper = PathBuf::from(helper);
        }
        if let Ok(size) = std::env::var("DRIFT_STATUS_CACHE_MAX_SIZE") {
            if let Ok(n) = size.parse() {
                self.status_cache.scm_status_cache_max_size = n;
            }
        }
        if let Ok(items) = std::env::var("DRIFT_STATUS_CACHE_MINIMUM_ITEMS") {
            if let Ok(n) = items.parse() {
                self.status_cache.scm_status_cache_minimum_items = n;
            }
        }
    }
}

/// Byte-store location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the file-backed byte-store.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .map(|h| h.join(".drift/store"))
                .unwrap_or_else(|| PathBuf::from("/tmp/drift-store")),
        }
    }
}

/// SCM helper process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImporterConfig {
    /// Path to the SCM import helper executable.
    pub helper: PathBuf,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            helper: PathBuf::from("drift-scm-helper"),
        }
    }
}

/// Status cache tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusCacheConfig {
    /// Total accounted bytes the cache may hold before evicting.
    pub scm_status_cache_max_size: usize,
    /// Floor of retained entries eviction never goes below.
    pub scm_status_cache_minimum_items: usize,
}

impl Default for StatusCacheConfig {
    fn default() -> Self {
        Self {
            scm_status_cache_max_size: 4 * 1024 * 1024,
            scm_status_cache_minimum_items: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Serializes tests that touch process-wide environment variables.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.storage.root.ends_with(".drift/store"));
        assert_eq!(config.importer.helper, PathBuf::from("drift-scm-helper"));
        assert_eq!(
            config.status_cache.scm_status_cache_max_size,
            4 * 1024 * 1024
        );
        assert_eq!(config.status_cache.scm_status_cache_minimum_items, 10);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[status_cache]
scm_status_cache_max_size = 600
"#,
        )
        .unwrap();

        assert_eq!(config.status_cache.scm_status_cache_max_size, 600);
        assert_eq!(config.status_cache.scm_status_cache_minimum_items, 10);
        assert_eq!(config.importer.helper, PathBuf::from("drift-scm-helper"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let original = Config::default();
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(original.storage, parsed.storage);
        assert_eq!(original.importer, parsed.importer);
        assert_eq!(original.status_cache, parsed.status_cache);
    }

    #[test]
    fn test_merge_replaces_non_default_values() {
        let mut base = Config::default();
        let mut overlay = Config::default();
        overlay.importer.helper = PathBuf::from("/opt/helper");
        overlay.status_cache.scm_status_cache_max_size = 1234;

        base.merge(overlay);

        assert_eq!(base.importer.helper, PathBuf::from("/opt/helper"));
        assert_eq!(base.status_cache.scm_status_cache_max_size, 1234);
        // Untouched sections keep their base values.
        assert_eq!(base.status_cache.scm_status_cache_minimum_items, 10);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut config = Config::default();

        std::env::set_var("DRIFT_STORE_DIR", "/env/store");
        std::env::set_var("DRIFT_STATUS_CACHE_MAX_SIZE", "600");
        config.apply_env_overrides();
        std::env::remove_var("DRIFT_STORE_DIR");
        std::env::remove_var("DRIFT_STATUS_CACHE_MAX_SIZE");

        assert_eq!(config.storage.root, PathBuf::from("/env/store"));
        assert_eq!(config.status_cache.scm_status_cache_max_size, 600);
    }

    #[test]
    fn test_invalid_env_value_is_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut config = Config::default();

        std::env::set_var("DRIFT_STATUS_CACHE_MAX_SIZE", "not_a_number");
        config.apply_env_overrides();
        std::env::remove_var("DRIFT_STATUS_CACHE_MAX_SIZE");

        assert_eq!(
            config.status_cache.scm_status_cache_max_size,
            4 * 1024 * 1024
        );
    }

    #[test]
    fn test_load_project_config_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let drift_dir = temp.path().join(".drift");
        std::fs::create_dir_all(&drift_dir).unwrap();
        std::fs::write(
            drift_dir.join("config.toml"),
            r#"
[importer]
helper = "/usr/local/bin/my-helper"

[status_cache]
scm_status_cache_minimum_items = 3
"#,
        )
        .unwrap();

        let _guard = ENV_LOCK.lock().unwrap();
        let config = Config::load_for_project(temp.path()).unwrap();
        assert_eq!(
            config.importer.helper,
            PathBuf::from("/usr/local/bin/my-helper")
        );
        assert_eq!(config.status_cache.scm_status_cache_minimum_items, 3);
    }
}
