//! Error taxonomy, response classification, and run counters.

mod categorization;
mod stats;
mod types;

pub use categorization::{
    classify_response, classify_transport_error, is_retriable, retry_schedule,
};
pub use stats::{ScrapeStats, ScrapeStatsSnapshot};
pub use types::{
    BanReason, FetchClass, FetchError, HistoryError, LedgerError, PoolError, ScrapeError,
    UploadError,
};
