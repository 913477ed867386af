// src/config/mod.rs
//! Application configuration.
//!
//! Built once in `main` from an optional TOML file plus environment overrides,
//! then handed to component constructors. Nothing below this module reads the
//! process environment.

pub mod ai;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use ai::AiConfig;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.7444.163 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Bind address for `/metrics` and `/health`; disabled when absent.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub profile_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub max_posts_per_cycle: usize,
    pub max_scroll_attempts: u32,
    pub scroll_step_px: u32,
    pub scroll_pause_ms: u64,
    pub initial_wait_ms: u64,
    pub origin_timezone: String,
    pub target_timezone: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            profile_url: "https://truthsocial.com/@realDonaldTrump".to_string(),
            webdriver_url: "http://localhost:4444".to_string(),
            headless: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_posts_per_cycle: 10,
            max_scroll_attempts: 200,
            scroll_step_px: 800,
            scroll_pause_ms: 2_000,
            initial_wait_ms: 4_000,
            origin_timezone: "Asia/Seoul".to_string(),
            target_timezone: "America/New_York".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn origin_tz(&self) -> Result<Tz> {
        parse_tz(&self.origin_timezone)
    }

    pub fn target_tz(&self) -> Result<Tz> {
        parse_tz(&self.target_timezone)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Supabase project URL; "ENV" or empty reads SUPABASE_URL.
    pub supabase_url: Option<String>,
    /// Supabase service key; "ENV" or empty reads SUPABASE_KEY.
    pub supabase_key: Option<String>,
    pub posts_table: String,
    pub reports_table: String,
    pub raw_backup_path: PathBuf,
    pub results_backup_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            posts_table: "posts".to_string(),
            reports_table: "analyze".to_string(),
            raw_backup_path: PathBuf::from("data/posts_scraped.csv"),
            results_backup_path: PathBuf::from("data/posts_analysis.csv"),
            timeout_secs: 15,
        }
    }
}

impl StoreConfig {
    /// Resolve "ENV"/empty connection settings from SUPABASE_URL / SUPABASE_KEY.
    pub fn resolve<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.supabase_url = resolve_secret(self.supabase_url, "SUPABASE_URL", &lookup)
            .map(|u| u.trim_end_matches('/').to_string());
        self.supabase_key = resolve_secret(self.supabase_key, "SUPABASE_KEY", &lookup);
        self
    }

    /// Both connection settings present → primary store enabled.
    pub fn supabase(&self) -> Option<(&str, &str)> {
        match (self.supabase_url.as_deref(), self.supabase_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub error_backoff_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            error_backoff_secs: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub desktop: bool,
    pub discord_webhook_url: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            desktop: true,
            discord_webhook_url: None,
        }
    }
}

impl AppConfig {
    /// Load using env var + fallbacks:
    /// 1) $MONITOR_CONFIG_PATH (must exist)
    /// 2) config/monitor.toml
    /// 3) built-in defaults
    ///
    /// Environment overrides are applied afterwards.
    pub fn load() -> Result<Self> {
        Self::load_unresolved()?.resolve(|key: &str| std::env::var(key).ok())
    }

    /// File or defaults, before environment overrides and validation.
    pub fn load_unresolved() -> Result<Self> {
        let base = match std::env::var(ENV_CONFIG_PATH).ok() {
            Some(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::from_file(&pb)?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(base)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Apply environment overrides and validate. `lookup` abstracts the
    /// environment so tests can pass a fixed map.
    pub fn resolve<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.ai = self.ai.resolve(&lookup)?;

        self.store = self.store.resolve(&lookup);

        if let Some(url) = lookup("WEBDRIVER_URL").filter(|v| !v.trim().is_empty()) {
            self.scraper.webdriver_url = url;
        }
        if let Some(hook) = lookup("DISCORD_WEBHOOK_URL").filter(|v| !v.trim().is_empty()) {
            self.notify.discord_webhook_url = Some(hook);
        }
        if let Some(addr) = lookup("METRICS_ADDR").filter(|v| !v.trim().is_empty()) {
            self.metrics_addr = Some(
                addr.parse()
                    .with_context(|| format!("METRICS_ADDR is not a socket address: {addr}"))?,
            );
        }

        self.scraper.origin_tz()?;
        self.scraper.target_tz()?;
        if self.scraper.max_posts_per_cycle == 0 {
            anyhow::bail!("scraper.max_posts_per_cycle must be at least 1");
        }

        Ok(self)
    }
}

fn resolve_secret<F>(value: Option<String>, env_key: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Some(v) if !v.trim().is_empty() && !v.trim().eq_ignore_ascii_case("env") => Some(v),
        _ => lookup(env_key).filter(|v| !v.trim().is_empty()),
    }
}

fn parse_tz(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow!("invalid timezone {name:?}: {e}"))
}
