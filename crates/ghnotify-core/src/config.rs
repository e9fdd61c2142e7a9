use std::path::{Path, PathBuf};

use chrono::Duration;
use ghnotify_api::{Endpoints, RetryConfig};
use serde::{Deserialize, Serialize};

/// Main configuration structure
///
/// Loaded from ~/.config/gh-notify/config.toml when present. Every field
/// has a default, so an empty or partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub retry: RetrySettings,
}

impl Config {
    /// Load config from `path`, or the default location when `None`.
    /// A missing file means defaults.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&contents)
        } else {
            // No config file? Use defaults
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Get the config file path
    /// Uses XDG on Linux, Application Support on macOS, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        Ok(dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("gh-notify")
            .join("config.toml"))
    }

    /// Token precedence: config file, then GITHUB_TOKEN, then GH_TOKEN
    pub fn resolve_token(&self) -> crate::Result<String> {
        self.github
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
            .or_else(|| std::env::var("GH_TOKEN").ok().filter(|t| !t.is_empty()))
            .ok_or(crate::Error::MissingToken)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            api_url: self.github.api_url.clone(),
            graphql_url: self.github.graphql_url.clone(),
        }
    }

    pub fn retry_config(&self) -> crate::Result<RetryConfig> {
        let timeout_ms = self.retry.timeout_secs.checked_mul(1000).ok_or_else(|| {
            crate::Error::ConfigError(format!(
                "retry.timeout_secs is too large: {}",
                self.retry.timeout_secs
            ))
        })?;

        Ok(RetryConfig {
            max_retries: self.retry.max_retries,
            initial_delay_ms: self.retry.initial_delay_ms,
            timeout_ms,
            ..RetryConfig::default()
        })
    }

    /// Configured cache directory, falling back to ~/.cache/gh-notify
    pub fn cache_dir(&self) -> crate::Result<PathBuf> {
        match &self.cache.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(ghnotify_cache::default_cache_dir()?),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub personal access token
    /// Needs the `notifications` and `repo` (or `public_repo`) scopes
    pub token: Option<String>,

    /// REST API URL (for GitHub Enterprise)
    #[serde(default = "default_github_url")]
    pub api_url: String,

    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
}

fn default_github_url() -> String {
    ghnotify_api::http::GITHUB_API_BASE.to_string()
}

fn default_graphql_url() -> String {
    ghnotify_api::http::GITHUB_GRAPHQL_URL.to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_url(),
            graphql_url: default_graphql_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Where notifications.json lives
    pub dir: Option<PathBuf>,

    /// Cap for each cached list; unset keeps whatever the cache file says
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Parallel repository fetches during the star phase
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Minimum minutes between two star fetches (0 = always fetch)
    #[serde(default = "default_event_cooldown")]
    pub event_cooldown_minutes: u64,

    /// How far back the very first star fetch looks
    #[serde(default = "default_initial_window")]
    pub initial_event_window_hours: u64,
}

fn default_workers() -> usize {
    6 // well under GitHub's secondary rate limit thresholds
}

fn default_event_cooldown() -> u64 {
    60
}

fn default_initial_window() -> u64 {
    4 // don't flood a first run with ancient stars
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            event_cooldown_minutes: default_event_cooldown(),
            initial_event_window_hours: default_initial_window(),
        }
    }
}

impl SyncConfig {
    pub fn event_cooldown(&self) -> crate::Result<Duration> {
        duration_from_minutes(self.event_cooldown_minutes).ok_or_else(|| {
            crate::Error::ConfigError(format!(
                "sync.event_cooldown_minutes is out of range: {}",
                self.event_cooldown_minutes
            ))
        })
    }

    pub fn initial_event_window(&self) -> crate::Result<Duration> {
        i64::try_from(self.initial_event_window_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                crate::Error::ConfigError(format!(
                    "sync.initial_event_window_hours is out of range: {}",
                    self.initial_event_window_hours
                ))
            })
    }
}

/// `minutes` as a chrono duration, or `None` when it doesn't fit
pub fn duration_from_minutes(minutes: u64) -> Option<Duration> {
    i64::try_from(minutes).ok().and_then(Duration::try_minutes)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Budget per GraphQL call, retries included
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    2000
}

fn default_timeout() -> u64 {
    30
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            timeout_secs: default_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sync.workers, 6);
        assert_eq!(config.sync.event_cooldown_minutes, 60);
        assert_eq!(config.sync.initial_event_window_hours, 4);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert!(config.cache.dir.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [sync]
            event_cooldown_minutes = 15

            [cache]
            dir = "/tmp/gh-notify-test"
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.event_cooldown_minutes, 15);
        assert_eq!(config.sync.workers, 6);
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/gh-notify-test"));
        assert_eq!(config.retry.timeout_secs, 30);
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nmax_retries = 5\n").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.retry.max_retries, 5);

        let missing = Config::load(Some(dir.path().join("nope.toml").as_path())).unwrap();
        assert_eq!(missing.retry.max_retries, 3);
    }

    #[test]
    fn test_retry_config_conversion() {
        let mut config = Config::default();
        config.retry.timeout_secs = 10;
        config.retry.initial_delay_ms = 500;

        let retry = config.retry_config().unwrap();
        assert_eq!(retry.timeout_ms, 10_000);
        assert_eq!(retry.initial_delay_ms, 500);
        assert_eq!(retry.max_retries, 3);
    }

    #[test]
    fn test_huge_timeout_is_config_error() {
        let mut config = Config::default();
        config.retry.timeout_secs = u64::MAX;
        assert!(matches!(
            config.retry_config(),
            Err(crate::Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_sync_durations() {
        let mut sync = SyncConfig::default();
        assert_eq!(sync.event_cooldown().unwrap(), Duration::minutes(60));
        assert_eq!(sync.initial_event_window().unwrap(), Duration::hours(4));

        sync.event_cooldown_minutes = u64::MAX;
        sync.initial_event_window_hours = i64::MAX as u64;
        assert!(matches!(sync.event_cooldown(), Err(crate::Error::ConfigError(_))));
        assert!(matches!(
            sync.initial_event_window(),
            Err(crate::Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_minutes_out_of_range() {
        assert_eq!(duration_from_minutes(90), Some(Duration::minutes(90)));
        assert_eq!(duration_from_minutes(u64::MAX), None);
        assert_eq!(duration_from_minutes(i64::MAX as u64), None);
    }

    #[test]
    fn test_config_token_wins() {
        let mut config = Config::default();
        config.github.token = Some("from-file".into());
        assert_eq!(config.resolve_token().unwrap(), "from-file");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[sync\nworkers = ").unwrap_err();
        assert!(matches!(err, crate::Error::ConfigError(_)));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("event_cooldown_minutes"));
        assert!(toml.contains("timeout_secs"));
    }
}
