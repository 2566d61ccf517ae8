//! Per-host request pacing.
//!
//! Pacing is a behavioral contract with the catalog, not an implementation
//! detail: index fetches, detail fetches, and per-entry work each have a
//! minimum inter-request interval. Slots are handed out under a lock and
//! awaited outside it, so the schedule stays correct when several detail
//! workers run in parallel.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// The pacing classes, each with its own interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaceClass {
    /// Catalog index pages.
    Index,
    /// Catalog detail pages.
    Detail,
    /// Per-entry spacing within a page.
    Entry,
}

/// Hands out start slots so that requests of one class against one host are
/// at least the configured interval apart.
pub struct Pacer {
    index_interval: Duration,
    detail_interval: Duration,
    entry_interval: Duration,
    slots: Mutex<HashMap<(String, PaceClass), Instant>>,
}

impl Pacer {
    pub fn new(page_sleep: Duration, detail_sleep: Duration, entry_sleep: Duration) -> Self {
        Self {
            index_interval: page_sleep,
            detail_interval: detail_sleep,
            entry_interval: entry_sleep,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn interval(&self, class: PaceClass) -> Duration {
        match class {
            PaceClass::Index => self.index_interval,
            PaceClass::Detail => self.detail_interval,
            PaceClass::Entry => self.entry_interval,
        }
    }

    /// Waits until this caller's slot for `(host, class)` arrives.
    ///
    /// The first caller proceeds immediately; each subsequent caller is
    /// scheduled one interval after the previous slot, even when callers
    /// arrive simultaneously.
    pub async fn wait(&self, host: &str, class: PaceClass) {
        let interval = self.interval(class);
        if interval.is_zero() {
            return;
        }

        let start = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            let slot = slots
                .entry((host.to_string(), class))
                .or_insert(now);
            let start = (*slot).max(now);
            *slot = start + interval;
            start
        };

        tokio::time::sleep_until(start).await;
    }
}
