//! Configuration types.
//!
//! A single immutable [`Config`] value is constructed once at the boundary
//! (CLI plus environment) and threaded through the core. No module reads
//! ambient globals.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::config::constants::*;
use crate::proxy::{ProxyEndpoint, ProxyMode, ProxyModule};

/// Logging verbosity, most restrictive first.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Which crawl phases to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PhaseMode {
    /// Subtitle-centric pass only.
    #[value(name = "1")]
    One,
    /// Quality-threshold pass only.
    #[value(name = "2")]
    Two,
    /// Both passes, sequentially (default).
    #[default]
    All,
}

/// Uploader category selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UploadMode {
    /// Scheduled run against the base catalog URL.
    Daily,
    /// Custom starting URL (actor page, search result, ...).
    Adhoc,
}

/// Scraper settings (C6 plus the C3 thresholds it applies).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// First index page to fetch.
    pub start_page: u32,
    /// Last index page to fetch (ignored in `all_mode`).
    pub end_page: u32,
    /// Keep paging until an empty index page appears.
    pub all_mode: bool,
    /// Phase 2 admission: minimum rating (inclusive).
    pub phase2_min_rate: f64,
    /// Phase 2 admission: minimum comment count (inclusive).
    pub phase2_min_comments: u32,
    /// Minimum interval between detail-page fetches.
    pub detail_sleep: Duration,
    /// Minimum interval between index-page fetches.
    pub page_sleep: Duration,
    /// Pause between entries on the same page.
    pub entry_sleep: Duration,
    /// Suppress the released-today/yesterday gate.
    pub ignore_release_date: bool,
    /// Base catalog URL.
    pub base_url: String,
    /// Parallel detail fetches. 1 keeps the crawl polite.
    pub detail_workers: usize,
    /// Soft wall-clock budget; the crawl stops at the next page boundary
    /// once exceeded.
    pub deadline: Option<Duration>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            end_page: 20,
            all_mode: false,
            phase2_min_rate: DEFAULT_PHASE2_MIN_RATE,
            phase2_min_comments: DEFAULT_PHASE2_MIN_COMMENTS,
            detail_sleep: DEFAULT_DETAIL_SLEEP,
            page_sleep: DEFAULT_PAGE_SLEEP,
            entry_sleep: DEFAULT_ENTRY_SLEEP,
            ignore_release_date: false,
            base_url: "https://catalog.example.com".to_string(),
            detail_workers: 1,
            deadline: None,
        }
    }
}

/// Proxy pool settings (C1).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// `single` pins the first entry; `pool` round-robins.
    pub mode: ProxyMode,
    /// Ordered proxy list.
    pub pool: Vec<ProxyEndpoint>,
    /// Cooldown after a ban, seconds.
    pub cooldown_seconds: u64,
    /// Consecutive failures before cooldown.
    pub max_failures: u32,
    /// Which subsystems route through the pool; anything else connects
    /// directly.
    pub modules: Vec<ProxyModule>,
    /// Ban ledger path.
    pub ban_ledger: PathBuf,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::Single,
            pool: Vec::new(),
            cooldown_seconds: DEFAULT_COOLDOWN_SECS,
            max_failures: DEFAULT_MAX_FAILURES,
            modules: vec![ProxyModule::All],
            ban_ledger: PathBuf::from("reports/proxy_bans.csv"),
        }
    }
}

/// Challenge-bypass front-end settings (C2, optional).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BypassConfig {
    /// Route catalog requests through the bypass service.
    pub enabled: bool,
    /// Port the service listens on.
    pub service_port: u16,
}

/// Torrent client (Web UI) settings (C7).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TorrentClientConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    /// Category for daily-mode adds.
    pub category_daily: String,
    /// Category for ad-hoc-mode adds.
    pub category_adhoc: String,
    /// Save path passed to the client on add.
    pub save_path: String,
    /// Start torrents immediately after adding.
    pub auto_start: bool,
    /// Skip hash checking on add.
    pub skip_checking: bool,
    pub request_timeout: Duration,
    /// Delay between successive adds; the client mishandles burst rates.
    pub inter_add_delay: Duration,
}

impl Default for TorrentClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            user: "admin".to_string(),
            pass: String::new(),
            category_daily: "Harvest".to_string(),
            category_adhoc: "Harvest-AdHoc".to_string(),
            save_path: String::new(),
            auto_start: true,
            skip_checking: false,
            request_timeout: Duration::from_secs(30),
            inter_add_delay: DEFAULT_INTER_ADD_DELAY,
        }
    }
}

/// Deep-storage bridge settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeepStorageConfig {
    /// Service endpoint.
    pub base_url: String,
    pub email: String,
    pub pass: String,
    /// Floor between bridge requests, to stay under its rate limits.
    pub request_delay: Duration,
    /// Torrents older than this many days get bridged out.
    pub age_days: u32,
}

impl Default for DeepStorageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://storage.example.com/api".to_string(),
            email: String::new(),
            pass: String::new(),
            request_delay: DEFAULT_DEEP_STORAGE_DELAY,
            age_days: 3,
        }
    }
}

/// Report directory layout (C9).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Root for daily-mode reports (dated subdirectories below it).
    pub daily_dir: PathBuf,
    /// Root for ad-hoc reports.
    pub adhoc_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            daily_dir: PathBuf::from("reports/DailyReport"),
            adhoc_dir: PathBuf::from("reports/AdHoc"),
        }
    }
}

/// The complete, immutable configuration of a run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub proxy: ProxyConfig,
    pub bypass: BypassConfig,
    pub torrent_client: TorrentClientConfig,
    pub deep_storage: DeepStorageConfig,
    pub reports: ReportConfig,
    /// History table path.
    pub history_path: PathBuf,
    /// Session cookie for the catalog, produced by the external login
    /// helper. Requests carry it when present; its rejection is fatal.
    pub session_cookie: Option<String>,
    /// User-Agent for catalog requests.
    pub user_agent: String,
}

impl Config {
    /// A config with all defaults except the history path, which has no
    /// meaningful zero value.
    pub fn with_defaults() -> Self {
        Self {
            history_path: PathBuf::from("reports/parsed_movies_history.csv"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ..Default::default()
        }
    }
}
