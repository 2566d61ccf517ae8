//! magnet_harvest: a two-stage content ingestion pipeline.
//!
//! Discovers new catalog entries over HTTP, extracts per-entry magnet links
//! selected by a priority policy, keeps an incremental cross-run history,
//! and hands the selected torrents to a torrent client's Web UI. A proxy
//! pool with ban detection and a persistent cooldown ledger keeps the crawl
//! alive when the catalog starts blocking addresses.
//!
//! # Example
//!
//! ```no_run
//! use magnet_harvest::{run_scrape, Config, ScrapeOptions};
//! use magnet_harvest::initialization::build_fetcher;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::with_defaults();
//! let (fetcher, _pool, _ledger) = build_fetcher(&config, false, false)?;
//! let report = run_scrape(&fetcher, &config, &ScrapeOptions::default()).await?;
//! println!("{} rows written", report.rows_written);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod classify;
pub mod config;
pub mod deep_storage;
pub mod error_handling;
pub mod history;
pub mod http;
pub mod initialization;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod proxy;
pub mod report;
pub mod scraper;
pub mod uploader;
pub mod utils;

// Re-export the public API surface.
pub use config::{Config, LogFormat, LogLevel, PhaseMode, UploadMode};
pub use error_handling::{ScrapeError, UploadError};
pub use pipeline::{run_pipeline, CommitHook, NoopCommit, PipelineOptions, RunOutcome, RunStatus};
pub use scraper::{run_scrape, ScrapeOptions, ScrapeReport};
pub use uploader::{run_upload, QbClient, UploadSummary};
