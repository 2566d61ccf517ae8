//! Configuration: typed option structs and crate-wide constants.

pub mod constants;
mod types;

pub use constants::*;
pub use types::{
    BypassConfig, Config, DeepStorageConfig, LogFormat, LogLevel, PhaseMode, ProxyConfig,
    ReportConfig, ScraperConfig, TorrentClientConfig, UploadMode,
};
