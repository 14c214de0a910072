// src/config/daemon.rs
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_CONFIG_PATH: &str = "NOSTRHITCH_CONFIG";
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/nostrhitch.toml", "config.json"];

pub const DEFAULT_HITCHWIKI_BASE: &str = "https://hitchwiki.org";
pub const DEFAULT_HITCHMAP_URL: &str = "https://hitchmap.com/dump.sqlite";

pub const DEFAULT_LANGUAGES: [&str; 16] = [
    "en", "de", "es", "fi", "fr", "he", "hr", "it", "lt", "nl", "pl", "pt", "ro", "ru", "tr", "zh",
];

fn default_true() -> bool {
    true
}
fn default_hw_interval() -> u64 {
    300
}
fn default_hitch_interval() -> u64 {
    86_400
}
fn default_hitchwiki_base() -> String {
    DEFAULT_HITCHWIKI_BASE.to_string()
}
fn default_languages() -> Vec<String> {
    DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect()
}
fn default_hitchmap_url() -> String {
    DEFAULT_HITCHMAP_URL.to_string()
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("hitchmap-dumps")
}
fn default_window_days() -> i64 {
    12
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

#[derive(Clone, Deserialize)]
pub struct Config {
    /// bech32 (`nsec1...`) or hex secret key of the publishing identity.
    #[serde(default)]
    pub nsec: String,
    #[serde(default)]
    pub relays: Vec<String>,
    /// `false` behaves like `dry_run = true`.
    #[serde(default = "default_true")]
    pub post_to_relays: bool,
    /// Feed poll interval, seconds.
    #[serde(default = "default_hw_interval")]
    pub hw_interval: u64,
    /// Snapshot poll interval, seconds.
    #[serde(default = "default_hitch_interval")]
    pub hitch_interval: u64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub dry_run: bool,
    /// Alternate wiki mirror used for fetching only.
    #[serde(default)]
    pub secret_hitchwiki_url: Option<String>,
    #[serde(default = "default_hitchwiki_base")]
    pub hitchwiki_base: String,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_hitchmap_url")]
    pub hitchmap_url: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
    #[serde(default = "default_window_days")]
    pub snapshot_window_days: i64,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
    #[serde(default)]
    pub profile: Option<ProfileConfig>,
}

/// Profile metadata kept in sync on the relays at startup.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub nip05: String,
    #[serde(default)]
    pub lud16: String,
    #[serde(default)]
    pub bot_description: String,
}

impl fmt::Debug for Config {
    // Never print the secret key; length only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("nsec_len", &self.nsec.len())
            .field("relays", &self.relays)
            .field("post_to_relays", &self.post_to_relays)
            .field("hw_interval", &self.hw_interval)
            .field("hitch_interval", &self.hitch_interval)
            .field("debug", &self.debug)
            .field("dry_run", &self.dry_run)
            .field("secret_hitchwiki_url", &self.secret_hitchwiki_url.is_some())
            .field("hitchwiki_base", &self.hitchwiki_base)
            .field("languages", &self.languages)
            .field("hitchmap_url", &self.hitchmap_url)
            .field("snapshot_dir", &self.snapshot_dir)
            .field("snapshot_window_days", &self.snapshot_window_days)
            .field("log_dir", &self.log_dir)
            .field("metrics_addr", &self.metrics_addr)
            .field("profile", &self.profile.as_ref().map(|p| p.name.as_str()))
            .finish()
    }
}

impl Config {
    /// Load and validate a config file. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .ok_or_else(|| ConfigError::Format(path.display().to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve the config path:
    /// 1) explicit path (CLI)
    /// 2) $NOSTRHITCH_CONFIG
    /// 3) config/nostrhitch.toml
    /// 4) config.json
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(p) = explicit {
            return Ok(p.to_path_buf());
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Ok(pb);
            }
            return Err(ConfigError::NotFound(pb.display().to_string()));
        }
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| ConfigError::NotFound(DEFAULT_CONFIG_PATHS.join(" or ")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nsec.trim().is_empty() {
            return Err(ConfigError::Missing("nsec"));
        }
        if self.relays.iter().all(|r| r.trim().is_empty()) {
            return Err(ConfigError::Missing("relays"));
        }
        if self.hw_interval == 0 || self.hitch_interval == 0 {
            return Err(ConfigError::Invalid(
                "poll intervals must be greater than zero".into(),
            ));
        }
        if self.snapshot_window_days <= 0 {
            return Err(ConfigError::Invalid(
                "snapshot_window_days must be positive".into(),
            ));
        }
        if self.languages.is_empty() {
            return Err(ConfigError::Invalid("languages cannot be empty".into()));
        }
        url::Url::parse(&self.hitchwiki_base)
            .map_err(|e| ConfigError::Invalid(format!("hitchwiki_base: {e}")))?;
        if let Some(mirror) = &self.secret_hitchwiki_url {
            url::Url::parse(mirror)
                .map_err(|e| ConfigError::Invalid(format!("secret_hitchwiki_url: {e}")))?;
        }
        Ok(())
    }

    /// True when nothing should actually be sent to relays.
    pub fn effective_dry_run(&self) -> bool {
        self.dry_run || !self.post_to_relays
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_secs(self.hw_interval)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.hitch_interval)
    }

    /// Canonical wiki base without a trailing slash.
    pub fn canonical_base(&self) -> String {
        self.hitchwiki_base.trim_end_matches('/').to_string()
    }

    /// Base used for fetching: the mirror when configured, else canonical.
    pub fn fetch_base(&self) -> String {
        self.secret_hitchwiki_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| self.canonical_base())
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Option<Config> {
    // Try TOML first if hinted, JSON otherwise; then the other one.
    if hint_ext == "toml" {
        toml::from_str(s).ok().or_else(|| serde_json::from_str(s).ok())
    } else {
        serde_json::from_str(s).ok().or_else(|| toml::from_str(s).ok())
    }
}
