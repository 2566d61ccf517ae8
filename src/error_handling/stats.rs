//! Per-run counters.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

/// Scrape-run counters, updated from concurrent detail workers.
#[derive(Debug, Default)]
pub struct ScrapeStats {
    pages_attempted: AtomicU32,
    pages_failed: AtomicU32,
    entries_selected: AtomicU32,
    entries_detailed: AtomicU32,
    entries_failed: AtomicU32,
    ban_events: AtomicU32,
}

/// A point-in-time copy of [`ScrapeStats`], suitable for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeStatsSnapshot {
    pub pages_attempted: u32,
    pub pages_failed: u32,
    pub entries_selected: u32,
    pub entries_detailed: u32,
    pub entries_failed: u32,
    pub ban_events: u32,
}

impl ScrapeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_attempted(&self) {
        self.pages_attempted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn page_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn entry_selected(&self) {
        self.entries_selected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn entry_detailed(&self) {
        self.entries_detailed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn entry_failed(&self) {
        self.entries_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn ban_event(&self) {
        self.ban_events.fetch_add(1, Ordering::SeqCst);
    }

    /// Copies the counters out.
    pub fn snapshot(&self) -> ScrapeStatsSnapshot {
        ScrapeStatsSnapshot {
            pages_attempted: self.pages_attempted.load(Ordering::SeqCst),
            pages_failed: self.pages_failed.load(Ordering::SeqCst),
            entries_selected: self.entries_selected.load(Ordering::SeqCst),
            entries_detailed: self.entries_detailed.load(Ordering::SeqCst),
            entries_failed: self.entries_failed.load(Ordering::SeqCst),
            ban_events: self.ban_events.load(Ordering::SeqCst),
        }
    }
}

impl ScrapeStatsSnapshot {
    /// A run is a total outage when every attempted page failed.
    pub fn is_total_outage(&self) -> bool {
        self.pages_attempted > 0 && self.pages_failed == self.pages_attempted
    }
}
