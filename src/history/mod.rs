//! Cross-run history of entries and per-bucket downloads.

mod store;

pub use store::{HistoryStore, Overrides};
