//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::Platform;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Checkpoint file location
    #[serde(default)]
    pub session: SessionConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry cooldown after failures
    #[serde(default)]
    pub backoff: BackoffConfig,

    #[serde(default)]
    pub instagram: InstagramConfig,

    #[serde(default)]
    pub twitter: TwitterConfig,

    #[serde(default)]
    pub tiktok: TiktokConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.session.file.as_os_str().is_empty() {
            return Err(AppError::validation("session.file is empty"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.backoff.step_minutes == 0 {
            return Err(AppError::validation("backoff.step_minutes must be > 0"));
        }
        if self.instagram.app_id.trim().is_empty() {
            return Err(AppError::validation("instagram.app_id is empty"));
        }
        if self.twitter.max_results == 0 || self.twitter.max_results > 1000 {
            return Err(AppError::validation(
                "twitter.max_results must be between 1 and 1000",
            ));
        }
        if self.tiktok.count == 0 {
            return Err(AppError::validation("tiktok.count must be > 0"));
        }
        if self.tiktok.api_host.trim().is_empty() {
            return Err(AppError::validation("tiktok.api_host is empty"));
        }
        for platform in Platform::ALL {
            if self.pacing(platform).pages_per_flush == 0 {
                return Err(AppError::validation(format!(
                    "{}.pages_per_flush must be > 0",
                    platform
                )));
            }
        }
        self.instagram.base_url()?;
        self.twitter.base_url()?;
        Url::parse(&self.tiktok.api_url)?;
        Ok(())
    }

    /// Flush threshold and page delay for a platform.
    pub fn pacing(&self, platform: Platform) -> Pacing {
        match platform {
            Platform::Instagram => Pacing {
                pages_per_flush: self.instagram.pages_per_flush,
                page_delay: Duration::from_millis(self.instagram.page_delay_ms),
            },
            Platform::Twitter => Pacing {
                pages_per_flush: self.twitter.pages_per_flush,
                page_delay: Duration::from_millis(self.twitter.page_delay_ms),
            },
            Platform::Tiktok => Pacing {
                pages_per_flush: self.tiktok.pages_per_flush,
                page_delay: Duration::from_millis(self.tiktok.page_delay_ms),
            },
        }
    }
}

/// Per-platform pagination pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub pages_per_flush: usize,
    pub page_delay: Duration,
}

/// Where checkpoint state lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "defaults::session_file")]
    pub file: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: defaults::session_file(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for Twitter and TikTok requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Cooldown applied after a failed fetch or flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First cooldown, in minutes
    #[serde(default = "defaults::cooldown_initial")]
    pub initial_minutes: u64,

    /// Added to the cooldown after every consecutive failure
    #[serde(default = "defaults::cooldown_step")]
    pub step_minutes: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_minutes: defaults::cooldown_initial(),
            step_minutes: defaults::cooldown_step(),
        }
    }
}

/// Instagram private API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(default = "defaults::instagram_api_base")]
    pub api_base: String,

    /// Value of the `X-IG-App-ID` header
    #[serde(default = "defaults::instagram_app_id")]
    pub app_id: String,

    /// The private API only answers app-like user agents
    #[serde(default = "defaults::instagram_user_agent")]
    pub user_agent: String,

    #[serde(default = "defaults::instagram_pages_per_flush")]
    pub pages_per_flush: usize,

    #[serde(default = "defaults::instagram_page_delay")]
    pub page_delay_ms: u64,

    /// Delay between per-follower detail lookups
    #[serde(default = "defaults::instagram_detail_delay")]
    pub detail_delay_ms: u64,
}

impl InstagramConfig {
    pub fn base_url(&self) -> Result<Url> {
        parse_base(&self.api_base)
    }
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::instagram_api_base(),
            app_id: defaults::instagram_app_id(),
            user_agent: defaults::instagram_user_agent(),
            pages_per_flush: defaults::instagram_pages_per_flush(),
            page_delay_ms: defaults::instagram_page_delay(),
            detail_delay_ms: defaults::instagram_detail_delay(),
        }
    }
}

/// Twitter API v2 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default = "defaults::twitter_api_base")]
    pub api_base: String,

    /// Followers per page (1..=1000)
    #[serde(default = "defaults::twitter_max_results")]
    pub max_results: u32,

    /// Maximum number of pages fetched in one run
    #[serde(default = "defaults::twitter_page_limit")]
    pub page_limit: usize,

    #[serde(default = "defaults::single_page")]
    pub pages_per_flush: usize,

    #[serde(default = "defaults::twitter_page_delay")]
    pub page_delay_ms: u64,
}

impl TwitterConfig {
    pub fn base_url(&self) -> Result<Url> {
        parse_base(&self.api_base)
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::twitter_api_base(),
            max_results: defaults::twitter_max_results(),
            page_limit: defaults::twitter_page_limit(),
            pages_per_flush: defaults::single_page(),
            page_delay_ms: defaults::twitter_page_delay(),
        }
    }
}

/// TikTok (ScrapTik on RapidAPI) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiktokConfig {
    #[serde(default = "defaults::tiktok_api_url")]
    pub api_url: String,

    /// Value of the `X-RapidAPI-Host` header
    #[serde(default = "defaults::tiktok_api_host")]
    pub api_host: String,

    #[serde(default = "defaults::tiktok_count")]
    pub count: u32,

    #[serde(default = "defaults::single_page")]
    pub pages_per_flush: usize,

    #[serde(default = "defaults::tiktok_page_delay")]
    pub page_delay_ms: u64,
}

impl Default for TiktokConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::tiktok_api_url(),
            api_host: defaults::tiktok_api_host(),
            count: defaults::tiktok_count(),
            pages_per_flush: defaults::single_page(),
            page_delay_ms: defaults::tiktok_page_delay(),
        }
    }
}

/// Parse a base URL, making sure relative joins append to its path.
fn parse_base(raw: &str) -> Result<Url> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn session_file() -> PathBuf {
        PathBuf::from("./session-data.tmp")
    }

    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; social-info/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn cooldown_initial() -> u64 {
        60
    }
    pub fn cooldown_step() -> u64 {
        60
    }

    pub fn single_page() -> usize {
        1
    }

    pub fn instagram_api_base() -> String {
        "https://i.instagram.com/api/v1/".into()
    }
    pub fn instagram_app_id() -> String {
        "567067343352427".into()
    }
    pub fn instagram_user_agent() -> String {
        "Instagram 76.0.0.15.395 Android (24/7.0; 640dpi; 1440x2560; samsung; SM-G930F; herolte; samsungexynos8890; en_US; 138226743)".into()
    }
    pub fn instagram_pages_per_flush() -> usize {
        5
    }
    pub fn instagram_page_delay() -> u64 {
        2000
    }
    pub fn instagram_detail_delay() -> u64 {
        1000
    }

    pub fn twitter_api_base() -> String {
        "https://api.twitter.com/2/".into()
    }
    pub fn twitter_max_results() -> u32 {
        100
    }
    pub fn twitter_page_limit() -> usize {
        100
    }
    pub fn twitter_page_delay() -> u64 {
        1000
    }

    pub fn tiktok_api_url() -> String {
        "https://scraptik.p.rapidapi.com/list-followers".into()
    }
    pub fn tiktok_api_host() -> String {
        "scraptik.p.rapidapi.com".into()
    }
    pub fn tiktok_count() -> u32 {
        100
    }
    pub fn tiktok_page_delay() -> u64 {
        5000
    }
}
