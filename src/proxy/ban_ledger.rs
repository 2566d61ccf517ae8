//! Persistent ban ledger.
//!
//! One CSV row per ban. Rows are append-only: expired bans stay in the file
//! as history and are filtered out on load. The append happens as a single
//! buffered write followed by a flush, so a concurrent reader sees either no
//! new record or the complete record.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::TIMESTAMP_FORMAT;
use crate::error_handling::{BanReason, LedgerError};
use crate::proxy::masking::mask_proxy_url;

const LEDGER_HEADER: &[&str] = &[
    "proxy_name",
    "proxy_host",
    "banned_at",
    "expires_at",
    "reason",
    "description",
];

/// One ban, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BanRecord {
    pub proxy_name: String,
    /// Host portion only; credentials never reach the ledger.
    pub proxy_host: String,
    pub banned_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    /// Machine-readable reason code (see [`BanReason::code`]).
    pub reason: String,
    pub description: String,
}

impl BanRecord {
    /// A proxy is banned while its expiry lies strictly in the future;
    /// an expiry equal to `now` means the ban is over.
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.expires_at > now
    }
}

struct LedgerState {
    /// Currently-active bans by proxy name.
    active: HashMap<String, BanRecord>,
    /// Bans added during this run.
    delta: Vec<BanRecord>,
}

/// The on-disk ban ledger shared by the pool and the pipeline status.
pub struct BanLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl BanLedger {
    /// Loads the ledger, keeping only bans whose cooldown has not expired.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Csv` on a malformed file and
    /// `LedgerError::Io` on filesystem problems. A missing file is an empty
    /// ledger, not an error.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let mut active = HashMap::new();

        if path.exists() {
            let mut reader = csv::Reader::from_path(path)?;
            let mut total = 0usize;
            for row in reader.deserialize::<HashMap<String, String>>() {
                let row = row?;
                total += 1;
                let Some(record) = Self::record_from_row(&row) else {
                    warn!("Skipping malformed ban ledger row");
                    continue;
                };
                if record.banned_at > record.expires_at {
                    return Err(LedgerError::LogicGuard(format!(
                        "ban of '{}' expires before it begins",
                        record.proxy_name
                    )));
                }
                if record.is_active(Local::now().naive_local()) {
                    active.insert(record.proxy_name.clone(), record);
                }
            }
            info!(
                "Loaded ban ledger: {} records, {} still active",
                total,
                active.len()
            );
        } else {
            debug!("No ban ledger at {}, starting fresh", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(LedgerState {
                active,
                delta: Vec::new(),
            }),
        })
    }

    fn record_from_row(row: &HashMap<String, String>) -> Option<BanRecord> {
        let parse = |key: &str| -> Option<NaiveDateTime> {
            NaiveDateTime::parse_from_str(row.get(key)?.trim(), TIMESTAMP_FORMAT).ok()
        };
        Some(BanRecord {
            proxy_name: row.get("proxy_name")?.clone(),
            proxy_host: row.get("proxy_host").cloned().unwrap_or_default(),
            banned_at: parse("banned_at")?,
            expires_at: parse("expires_at")?,
            reason: row.get("reason").cloned().unwrap_or_default(),
            description: row.get("description").cloned().unwrap_or_default(),
        })
    }

    /// Records a ban and appends it to the file.
    ///
    /// Idempotent: a proxy that is already actively banned is not re-recorded,
    /// so two racing failure reports produce one ledger row.
    pub fn record_ban(
        &self,
        proxy_name: &str,
        proxy_host: &str,
        reason: BanReason,
        cooldown: ChronoDuration,
    ) -> Result<bool, LedgerError> {
        let now = Local::now().naive_local();
        let record = BanRecord {
            proxy_name: proxy_name.to_string(),
            proxy_host: mask_proxy_url(proxy_host),
            banned_at: now,
            expires_at: now + cooldown,
            reason: reason.code().to_string(),
            description: reason.describe().to_string(),
        };

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = state.active.get(proxy_name) {
            if existing.is_active(now) {
                debug!("Proxy '{proxy_name}' already banned, ledger unchanged");
                return Ok(false);
            }
        }

        self.append(&record)?;
        warn!(
            "Proxy '{}' banned until {} ({})",
            proxy_name,
            record.expires_at.format(TIMESTAMP_FORMAT),
            record.description
        );
        state.active.insert(proxy_name.to_string(), record.clone());
        state.delta.push(record);
        Ok(true)
    }

    fn append(&self, record: &BanRecord) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let is_new = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Format the full row (header included for a fresh file) into one
        // buffer so it lands in a single write.
        let mut buf = Vec::new();
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut buf);
            if is_new {
                writer.write_record(LEDGER_HEADER)?;
            }
            let banned_at = record.banned_at.format(TIMESTAMP_FORMAT).to_string();
            let expires_at = record.expires_at.format(TIMESTAMP_FORMAT).to_string();
            writer.write_record([
                record.proxy_name.as_str(),
                record.proxy_host.as_str(),
                banned_at.as_str(),
                expires_at.as_str(),
                record.reason.as_str(),
                record.description.as_str(),
            ])?;
            writer.flush()?;
        }

        file.write_all(&buf)?;
        file.sync_all()?;
        Ok(())
    }

    /// Whether a proxy is actively banned at `now`.
    pub fn is_banned(&self, proxy_name: &str, now: NaiveDateTime) -> bool {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state
            .active
            .get(proxy_name)
            .map(|r| r.is_active(now))
            .unwrap_or(false)
    }

    /// Active ban for a proxy, if any.
    pub fn active_ban(&self, proxy_name: &str) -> Option<BanRecord> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.active.get(proxy_name).cloned()
    }

    /// Bans recorded during this run, in order.
    pub fn delta(&self) -> Vec<BanRecord> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.delta.clone()
    }

    /// Currently-active bans, soonest-to-expire first.
    pub fn active(&self) -> Vec<BanRecord> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut records: Vec<_> = state.active.values().cloned().collect();
        records.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        records
    }

    /// Human summary of active bans, for the run notification.
    pub fn summary(&self) -> String {
        let active = self.active();
        if active.is_empty() {
            return "No proxies currently banned.".to_string();
        }
        let mut lines = vec![format!("Currently banned proxies: {}", active.len())];
        let now = Local::now().naive_local();
        for record in &active {
            let remaining = record.expires_at - now;
            lines.push(format!(
                "  - {}: banned {} ({}), unbans {} ({}d {}h left)",
                record.proxy_name,
                record.banned_at.format(TIMESTAMP_FORMAT),
                record.description,
                record.expires_at.format(TIMESTAMP_FORMAT),
                remaining.num_days().max(0),
                (remaining.num_hours() % 24).max(0),
            ));
        }
        lines.join("\n")
    }
}
