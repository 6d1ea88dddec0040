//! Runtime configuration (§6.4, §A.3): a TOML file merged with
//! environment-variable overrides for storage paths. Grounded in the
//! reference crate's `app/config_manager.rs`/`app_config.rs` split
//! (file config -> typed defaults-aware merge), generalized here from
//! per-invocation CLI-flag precedence to env-var precedence since this
//! crate's primary entry point is a long-running daemon.

mod error;

pub use error::{ConfigError, Result};

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, instrument, warn};

/// Storage paths (§6.4 `storage.*`). Every path here can be overridden
/// by an environment variable, per spec.md's "Environment overrides of
/// storage paths must be honored."
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub download_dir: PathBuf,
    pub organize_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("stackwatch.db"),
            download_dir: PathBuf::from("downloads"),
            organize_dir: PathBuf::from("library"),
            cache_dir: PathBuf::from("cache"),
        }
    }
}

/// Fuzzy-matching thresholds (§6.4 `matching.*`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub fuzzy_threshold: u8,
    pub duplicate_date_threshold_days: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { fuzzy_threshold: 80, duplicate_date_threshold_days: 5 }
    }
}

/// Import Pipeline behavior (§6.4 `import.*`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub organization_pattern: Option<String>,
    pub auto_track_imports: bool,
    pub category_prefix: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            organization_pattern: None,
            auto_track_imports: true,
            category_prefix: "_".to_string(),
        }
    }
}

/// Download batching (§6.4 `downloads.*`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    pub max_retries: i64,
    pub max_per_batch: usize,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self { max_retries: 3, max_per_batch: 10 }
    }
}

/// Task Scheduler intervals, in seconds (§6.4 `tasks.*`, §4.8).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub auto_download_interval: u64,
    pub download_monitor_interval: u64,
    pub cleanup_covers_interval: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            auto_download_interval: 1800,
            download_monitor_interval: 30,
            cleanup_covers_interval: 86400,
        }
    }
}

/// Cover-extraction quality settings (§6.4 `pdf.*`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub cover_dpi_low: u32,
    pub cover_dpi_high: u32,
    pub cover_quality_low: u8,
    pub cover_quality_high: u8,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { cover_dpi_low: 100, cover_dpi_high: 200, cover_quality_low: 75, cover_quality_high: 90 }
    }
}

/// One configured RSS search provider (composition-root plumbing, not
/// itself part of spec.md §6.4 — search providers are an external
/// collaborator per spec.md §1, so this struct only carries enough to
/// construct [`crate::search::RssSearchProvider`] instances at startup).
#[derive(Debug, Clone, Deserialize)]
pub struct RssProviderConfig {
    pub name: String,
    pub feed_url: String,
}

/// Search provider wiring (`[[providers.rss]]` tables).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub rss: Vec<RssProviderConfig>,
}

/// SABnzbd download client wiring (composition-root plumbing, same
/// rationale as [`RssProviderConfig`] — the download client is an
/// external collaborator per spec.md §1).
#[derive(Debug, Clone, Deserialize)]
pub struct SabnzbdConfig {
    pub name: String,
    pub api_url: String,
    pub api_key: String,
}

/// Download client wiring (`[client.sabnzbd]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub sabnzbd: Option<SabnzbdConfig>,
}

/// The full recognized configuration surface (§6.4, plus the
/// composition-root-only `providers`/`client` sections above).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StackwatchConfig {
    pub storage: StorageConfig,
    pub matching: MatchingConfig,
    pub import: ImportConfig,
    pub downloads: DownloadsConfig,
    pub tasks: TasksConfig,
    pub pdf: PdfConfig,
    pub providers: ProvidersConfig,
    pub client: ClientConfig,
}

impl StackwatchConfig {
    /// Loads configuration from `path` if it exists (TOML), otherwise
    /// falls back to defaults, then applies the four storage-path
    /// environment overrides (`STACKWATCH_DB_PATH`,
    /// `STACKWATCH_DOWNLOAD_DIR`, `STACKWATCH_ORGANIZE_DIR`,
    /// `STACKWATCH_CACHE_DIR`), as required by spec.md §6.4.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] if the file exists but cannot be
    /// read, or [`ConfigError::Parse`] if it is not valid TOML.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
            let parsed: Self = toml::from_str(&raw)?;
            info!(path = %path.display(), "loaded configuration");
            parsed
        } else {
            warn!(path = %path.display(), "config file not found; using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies storage-path environment overrides in place.
    fn apply_env_overrides(&mut self) {
        if let Some(value) = env_path("STACKWATCH_DB_PATH") {
            self.storage.db_path = value;
        }
        if let Some(value) = env_path("STACKWATCH_DOWNLOAD_DIR") {
            self.storage.download_dir = value;
        }
        if let Some(value) = env_path("STACKWATCH_ORGANIZE_DIR") {
            self.storage.organize_dir = value;
        }
        if let Some(value) = env_path("STACKWATCH_CACHE_DIR") {
            self.storage.cache_dir = value;
        }
    }

    /// Resolves the default config file path:
    /// `$XDG_CONFIG_HOME/stackwatch/config.toml`, falling back to
    /// `~/.config/stackwatch/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("stackwatch").join("config.toml");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("stackwatch").join("config.toml");
        }
        PathBuf::from("stackwatch").join("config.toml")
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_spec_defaults() {
        let config = StackwatchConfig::default();
        assert_eq!(config.matching.fuzzy_threshold, 80);
        assert_eq!(config.matching.duplicate_date_threshold_days, 5);
        assert_eq!(config.downloads.max_retries, 3);
        assert_eq!(config.downloads.max_per_batch, 10);
        assert_eq!(config.tasks.auto_download_interval, 1800);
        assert_eq!(config.tasks.download_monitor_interval, 30);
        assert_eq!(config.tasks.cleanup_covers_interval, 86400);
        assert_eq!(config.import.category_prefix, "_");
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = StackwatchConfig::load(Path::new("/nonexistent/stackwatch.toml")).unwrap();
        assert_eq!(config.matching.fuzzy_threshold, 80);
    }

    #[test]
    fn test_load_parses_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [matching]
            fuzzy_threshold = 90

            [downloads]
            max_per_batch = 5
            "#,
        )
        .unwrap();

        let config = StackwatchConfig::load(&path).unwrap();
        assert_eq!(config.matching.fuzzy_threshold, 90);
        assert_eq!(config.downloads.max_per_batch, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.downloads.max_retries, 3);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml {{{").unwrap();

        let result = StackwatchConfig::load(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_env_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\ndb_path = \"from-file.db\"\n").unwrap();

        // SAFETY: test-local env var, restored immediately after use.
        unsafe { std::env::set_var("STACKWATCH_DB_PATH", "/tmp/from-env.db") };
        let config = StackwatchConfig::load(&path).unwrap();
        unsafe { std::env::remove_var("STACKWATCH_DB_PATH") };

        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/from-env.db"));
    }
}
