//! Runtime configuration.
//!
//! Loaded once at startup from TOML (explicit path, or the per-user config
//! file when present), then overridden from the environment. The resulting
//! value is immutable and handed to every client at construction.

use crate::data::FinanceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `tiingo.api_key`.
pub const API_KEY_ENV: &str = "TIINGO_API_KEY";

/// Environment variable that overrides `cache.dir`.
pub const CACHE_DIR_ENV: &str = "MOMENT_CACHE_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentConfig {
    pub tiingo: TiingoConfig,
    pub yahoo: YahooConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiingoConfig {
    pub api_key: String,
    pub base_url: String,
    pub ws_url: String,
    pub tickers_url: String,
}

impl Default for TiingoConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.tiingo.com/".into(),
            ws_url: "wss://api.tiingo.com/iex".into(),
            tickers_url: "https://apimedia.tiingo.com/docs/tiingo/daily/supported_tickers.zip"
                .into(),
        }
    }
}

impl TiingoConfig {
    /// The API key, or a configuration error naming where to set it.
    pub fn require_api_key(&self) -> Result<&str, FinanceError> {
        if self.api_key.trim().is_empty() {
            return Err(FinanceError::Config(format!(
                "no Tiingo API key: set {API_KEY_ENV} or tiingo.api_key in the config file"
            )));
        }
        Ok(self.api_key.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    pub base_url: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com/".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    /// Validity window of the in-memory ticker list.
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("moment"),
            ttl_hours: 24,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            breaker_cooldown_secs: 30 * 60,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

impl MomentConfig {
    /// Parse a config from a TOML string. Missing sections take defaults.
    pub fn from_toml(content: &str) -> Result<Self, FinanceError> {
        toml::from_str(content).map_err(|e| FinanceError::Config(format!("parse config TOML: {e}")))
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, FinanceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FinanceError::Config(format!("read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Per-user config location: `{config_dir}/moment/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("moment").join("config.toml"))
    }

    /// Resolve the effective config: explicit file, else the per-user file
    /// when it exists, else defaults; then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, FinanceError> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        Ok(base.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from an environment lookup. Empty values are ignored.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.tiingo.api_key = key;
        }
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.cache.dir = PathBuf::from(dir);
        }
        self
    }

    /// Serialize the config to TOML.
    pub fn to_toml(&self) -> Result<String, FinanceError> {
        toml::to_string_pretty(self).map_err(|e| FinanceError::Config(format!("serialize config: {e}")))
    }
}
