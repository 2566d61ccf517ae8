//! Proxy pool with passive health checking.
//!
//! The pool never probes proxies actively (a probe against the catalog is
//! indistinguishable from scraping and burns the address). Health is inferred
//! from real request outcomes reported by the HTTP client. A banned or
//! exhausted proxy goes on cooldown and is written to the ban ledger so the
//! next run starts with the same picture.

use std::sync::{Arc, Mutex};

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::TIMESTAMP_FORMAT;
use crate::error_handling::{BanReason, PoolError};
use crate::proxy::ban_ledger::BanLedger;
use crate::proxy::masking::mask_proxy_url;

/// Pool behavior: pin the first entry, or rotate over all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// Always the first entry; its ban fails the run.
    #[default]
    Single,
    /// Round-robin over available entries.
    Pool,
}

/// Subsystems that may route through the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyModule {
    SpiderIndex,
    SpiderDetail,
    SpiderAgeVerification,
    Qbittorrent,
    Pikpak,
    /// Every subsystem.
    All,
}

impl ProxyModule {
    /// Name used in configuration and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyModule::SpiderIndex => "spider_index",
            ProxyModule::SpiderDetail => "spider_detail",
            ProxyModule::SpiderAgeVerification => "spider_age_verification",
            ProxyModule::Qbittorrent => "qbittorrent",
            ProxyModule::Pikpak => "pikpak",
            ProxyModule::All => "all",
        }
    }

    /// Whether `modules` routes this module through the pool.
    pub fn enabled_in(&self, modules: &[ProxyModule]) -> bool {
        modules.contains(&ProxyModule::All) || modules.contains(self)
    }
}

/// One configured proxy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyEndpoint {
    pub name: String,
    /// Outbound URL for plain-HTTP traffic, credentials allowed.
    pub http_url: Option<String>,
    /// Outbound URL for HTTPS traffic; falls back to `http_url`.
    pub https_url: Option<String>,
}

impl ProxyEndpoint {
    /// The URL requests are actually sent through.
    pub fn effective_url(&self) -> Option<&str> {
        self.https_url.as_deref().or(self.http_url.as_deref())
    }
}

/// What a successful selection hands back: the name keys both the per-proxy
/// HTTP client and later success/failure reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLease {
    pub name: String,
}

/// The failure kinds the pool reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient problem; counts toward the consecutive-failure budget.
    Transient,
    /// Observed ban; immediate cooldown.
    Ban(BanReason),
}

#[derive(Debug)]
struct ProxyState {
    endpoint: ProxyEndpoint,
    consecutive_failures: u32,
    last_success: Option<NaiveDateTime>,
    last_failure: Option<NaiveDateTime>,
    last_use: Option<NaiveDateTime>,
    total_requests: u64,
    total_successes: u64,
    cooldown_until: Option<NaiveDateTime>,
}

impl ProxyState {
    fn is_available(&self, now: NaiveDateTime) -> bool {
        match self.cooldown_until {
            // Expiry exactly at `now` means the cooldown is over.
            Some(until) => until <= now,
            None => true,
        }
    }
}

/// Per-proxy statistics for the run status.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyStats {
    pub name: String,
    pub available: bool,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_successes: u64,
    pub success_rate: f64,
    pub last_success: Option<String>,
    pub last_failure: Option<String>,
    pub cooldown_remaining_secs: Option<i64>,
}

struct PoolState {
    entries: Vec<ProxyState>,
    cursor: usize,
}

/// The proxy pool (C1). One mutex guards all in-memory state; operations are
/// O(n) over a handful of entries and never block on I/O except the ledger
/// append at ban time.
pub struct ProxyPool {
    mode: ProxyMode,
    max_failures: u32,
    cooldown: ChronoDuration,
    ledger: Arc<BanLedger>,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// Builds the pool from configuration, consulting the ledger so that
    /// proxies banned in earlier runs start on cooldown.
    pub fn new(
        mode: ProxyMode,
        endpoints: Vec<ProxyEndpoint>,
        max_failures: u32,
        cooldown_seconds: u64,
        ledger: Arc<BanLedger>,
    ) -> Self {
        let mut entries = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if endpoint.effective_url().is_none() {
                warn!("Proxy '{}' has no URL, skipping", endpoint.name);
                continue;
            }
            let cooldown_until = ledger.active_ban(&endpoint.name).map(|ban| {
                warn!(
                    "Proxy '{}' is banned until {} (from ledger)",
                    endpoint.name,
                    ban.expires_at.format(TIMESTAMP_FORMAT)
                );
                ban.expires_at
            });
            info!(
                "Registered proxy '{}' ({})",
                endpoint.name,
                mask_proxy_url(endpoint.effective_url().unwrap_or_default())
            );
            entries.push(ProxyState {
                endpoint,
                consecutive_failures: 0,
                last_success: None,
                last_failure: None,
                last_use: None,
                total_requests: 0,
                total_successes: 0,
                cooldown_until,
            });
        }
        Self {
            mode,
            max_failures,
            cooldown: ChronoDuration::seconds(cooldown_seconds as i64),
            ledger,
            state: Mutex::new(PoolState {
                entries,
                cursor: 0,
            }),
        }
    }

    /// Picks a proxy for the next request.
    ///
    /// `single` mode always returns the first entry unless it is cooling
    /// down. `pool` mode rotates: the entry after the cursor that is
    /// available, ties broken by least-recent use so load spreads evenly.
    ///
    /// # Errors
    ///
    /// `PoolError::NoProxyAvailable` when no entry is usable; the caller
    /// must surface this as a run-fatal condition.
    pub fn select(&self) -> Result<ProxyLease, PoolError> {
        self.select_at(Local::now().naive_local())
    }

    fn select_at(&self, now: NaiveDateTime) -> Result<ProxyLease, PoolError> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if state.entries.is_empty() {
            return Err(PoolError::NoProxyAvailable);
        }

        let chosen = match self.mode {
            ProxyMode::Single => {
                let first = &state.entries[0];
                if first.is_available(now) {
                    Some(0)
                } else {
                    None
                }
            }
            ProxyMode::Pool => {
                let len = state.entries.len();
                let start = state.cursor;
                let mut candidate: Option<usize> = None;
                for step in 1..=len {
                    let idx = (start + step) % len;
                    if !state.entries[idx].is_available(now) {
                        continue;
                    }
                    candidate = match candidate {
                        None => Some(idx),
                        // Tie-break on least-recent use
                        Some(best)
                            if state.entries[idx].last_use < state.entries[best].last_use =>
                        {
                            Some(idx)
                        }
                        keep => keep,
                    };
                    // The rotation order already spreads load; the first
                    // available entry after the cursor wins unless an idle
                    // one exists.
                    if state.entries[idx].last_use.is_none() {
                        break;
                    }
                }
                candidate
            }
        };

        match chosen {
            Some(idx) => {
                state.cursor = idx;
                state.entries[idx].last_use = Some(now);
                let name = state.entries[idx].endpoint.name.clone();
                debug!("Selected proxy '{name}'");
                Ok(ProxyLease { name })
            }
            None => {
                warn!("All proxies are banned or cooling down");
                Err(PoolError::NoProxyAvailable)
            }
        }
    }

    /// Records a successful request through `proxy`.
    pub fn report_success(&self, proxy: &ProxyLease) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = state
            .entries
            .iter_mut()
            .find(|e| e.endpoint.name == proxy.name)
        {
            let now = Local::now().naive_local();
            entry.consecutive_failures = 0;
            entry.last_success = Some(now);
            entry.total_requests += 1;
            entry.total_successes += 1;
        }
    }

    /// Records a failed request through `proxy`.
    ///
    /// A `Ban` kind, or hitting the consecutive-failure budget, puts the
    /// proxy on cooldown and appends a ledger record. Reporting a ban for an
    /// already-banned proxy is a no-op (idempotent under racing reporters).
    pub fn report_failure(&self, proxy: &ProxyLease, kind: FailureKind) {
        let now = Local::now().naive_local();
        let mut ban_to_record: Option<(String, String, BanReason)> = None;

        {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let Some(entry) = state
                .entries
                .iter_mut()
                .find(|e| e.endpoint.name == proxy.name)
            else {
                return;
            };

            entry.total_requests += 1;
            entry.last_failure = Some(now);
            entry.consecutive_failures += 1;

            let reason = match kind {
                FailureKind::Ban(reason) => Some(reason),
                FailureKind::Transient if entry.consecutive_failures >= self.max_failures => {
                    Some(BanReason::MaxFailures)
                }
                FailureKind::Transient => None,
            };

            if let Some(reason) = reason {
                if entry.is_available(now) {
                    entry.cooldown_until = Some(now + self.cooldown);
                    ban_to_record = Some((
                        entry.endpoint.name.clone(),
                        entry
                            .endpoint
                            .effective_url()
                            .unwrap_or_default()
                            .to_string(),
                        reason,
                    ));
                }
            } else {
                warn!(
                    "Proxy '{}' failed ({}/{})",
                    proxy.name, entry.consecutive_failures, self.max_failures
                );
            }
        }

        // Ledger append happens outside the pool lock; the ledger has its
        // own lock and dedup.
        if let Some((name, host, reason)) = ban_to_record {
            if let Err(e) = self.ledger.record_ban(&name, &host, reason, self.cooldown) {
                warn!("Failed to append ban record for '{name}': {e}");
            }
        }
    }

    /// Count of entries usable right now.
    pub fn available_count(&self) -> usize {
        let now = Local::now().naive_local();
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.entries.iter().filter(|e| e.is_available(now)).count()
    }

    /// Total configured entries.
    pub fn len(&self) -> usize {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.entries.len()
    }

    /// True when no proxies are configured at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Endpoints as configured, for building per-proxy HTTP clients.
    pub fn endpoints(&self) -> Vec<ProxyEndpoint> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.entries.iter().map(|e| e.endpoint.clone()).collect()
    }

    /// Per-proxy statistics for the run status.
    pub fn snapshot(&self) -> Vec<ProxyStats> {
        let now = Local::now().naive_local();
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state
            .entries
            .iter()
            .map(|e| ProxyStats {
                name: e.endpoint.name.clone(),
                available: e.is_available(now),
                consecutive_failures: e.consecutive_failures,
                total_requests: e.total_requests,
                total_successes: e.total_successes,
                success_rate: if e.total_requests == 0 {
                    0.0
                } else {
                    e.total_successes as f64 / e.total_requests as f64
                },
                last_success: e.last_success.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
                last_failure: e.last_failure.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
                cooldown_remaining_secs: e
                    .cooldown_until
                    .filter(|until| *until > now)
                    .map(|until| (until - now).num_seconds()),
            })
            .collect()
    }

    /// Logs the statistics block at info level.
    pub fn log_statistics(&self) {
        let stats = self.snapshot();
        info!("Proxy pool: {} configured", stats.len());
        for s in &stats {
            let status = if s.available {
                "available".to_string()
            } else {
                format!(
                    "cooldown ({}s left)",
                    s.cooldown_remaining_secs.unwrap_or(0)
                )
            };
            info!(
                "  {} [{}] requests={} success_rate={:.1}% consecutive_failures={}",
                s.name,
                status,
                s.total_requests,
                s.success_rate * 100.0,
                s.consecutive_failures
            );
        }
    }
}
