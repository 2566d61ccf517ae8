//! The durable, cross-run history table.
//!
//! One CSV keyed by `href`, one column per torrent bucket holding the
//! first-download timestamp. All persistence for the table lives here: a
//! schema change touches this file and nothing else.

use std::collections::{BTreeSet, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use strum::IntoEnumIterator;
use tempfile::NamedTempFile;

use crate::error_handling::HistoryError;
use crate::models::{HistoryRecord, Phase, TorrentType};

const HISTORY_HEADER: &[&str] = &[
    "href",
    "phase",
    "video_code",
    "create_date",
    "update_date",
    "hacked_subtitle",
    "hacked_no_subtitle",
    "subtitle",
    "no_subtitle",
];

/// Columns that identify the retired single-column layout.
const LEGACY_TYPE_COLUMN: &str = "torrent_type";
const LEGACY_DATE_COLUMN: &str = "parsed_date";

/// Caller-supplied gates for [`HistoryStore::should_process`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    /// Pursue all four buckets regardless of what history says.
    pub ignore_history: bool,
}

/// Process-exclusive lock for a write session. The lock file lives next to
/// the table and disappears when the guard drops.
struct SessionLock {
    lock_path: PathBuf,
}

impl SessionLock {
    fn acquire(target: &Path) -> Result<Self, HistoryError> {
        let lock_path = PathBuf::from(format!("{}.lock", target.display()));
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                Ok(Self { lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(HistoryError::Locked(lock_path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

/// The history store (C5). Loaded fully into memory; writes rewrite the file
/// atomically under a session lock.
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<HistoryRecord>,
    index: HashMap<String, usize>,
}

impl HistoryStore {
    /// Loads the table, upgrading the legacy schema and compacting duplicate
    /// hrefs when found.
    ///
    /// # Errors
    ///
    /// `HistoryError::Schema` when a record violates an invariant
    /// (`create_date` after `update_date`); `Io`/`Csv` on file problems.
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        let mut store = Self {
            path: path.to_path_buf(),
            records: Vec::new(),
            index: HashMap::new(),
        };

        if !path.exists() {
            info!("No history at {}, starting fresh", path.display());
            return Ok(store);
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let legacy = headers.iter().any(|h| h == LEGACY_TYPE_COLUMN)
            || headers.iter().any(|h| h == LEGACY_DATE_COLUMN);

        let mut raw: Vec<HistoryRecord> = Vec::new();
        for row in reader.records() {
            let row = row?;
            let get = |name: &str| -> String {
                headers
                    .iter()
                    .position(|h| h == name)
                    .and_then(|i| row.get(i))
                    .unwrap_or_default()
                    .to_string()
            };
            let record = if legacy {
                Self::record_from_legacy_row(&get)
            } else {
                Self::record_from_row(&get)
            };
            if record.create_date > record.update_date {
                return Err(HistoryError::Schema(format!(
                    "record {} created after its last update",
                    record.href
                )));
            }
            raw.push(record);
        }

        // Duplicate hrefs: keep the most recently updated record.
        let mut deduped: Vec<HistoryRecord> = Vec::with_capacity(raw.len());
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut duplicates = 0usize;
        for record in raw {
            match seen.get(&record.href) {
                Some(&idx) => {
                    duplicates += 1;
                    if record.update_date > deduped[idx].update_date {
                        deduped[idx] = record;
                    }
                }
                None => {
                    seen.insert(record.href.clone(), deduped.len());
                    deduped.push(record);
                }
            }
        }

        store.records = deduped;
        store.rebuild_index();
        info!(
            "Loaded {} history records from {}",
            store.records.len(),
            path.display()
        );

        if legacy || duplicates > 0 {
            if legacy {
                info!("Upgrading legacy history schema in place");
            }
            if duplicates > 0 {
                warn!("Dropped {duplicates} duplicate history records");
            }
            store.save()?;
        }

        Ok(store)
    }

    fn record_from_row(get: &dyn Fn(&str) -> String) -> HistoryRecord {
        let column = |name: &str| -> Option<String> {
            let value = get(name);
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        HistoryRecord {
            href: get("href"),
            phase: Phase::from_column(&get("phase")),
            video_code: get("video_code"),
            create_date: get("create_date"),
            update_date: get("update_date"),
            hacked_subtitle: column("hacked_subtitle"),
            hacked_no_subtitle: column("hacked_no_subtitle"),
            subtitle: column("subtitle"),
            no_subtitle: column("no_subtitle"),
        }
    }

    /// Upgrades a legacy row: the single `parsed_date` becomes both date
    /// columns, and the per-bucket columns start out null. The old
    /// comma-separated type list carried no timestamps worth preserving.
    fn record_from_legacy_row(get: &dyn Fn(&str) -> String) -> HistoryRecord {
        let parsed_date = get(LEGACY_DATE_COLUMN);
        HistoryRecord {
            href: get("href"),
            phase: Phase::from_column(&get("phase")),
            video_code: {
                let code = get("video_code");
                if code.is_empty() {
                    get("video_title")
                } else {
                    code
                }
            },
            create_date: parsed_date.clone(),
            update_date: parsed_date,
            hacked_subtitle: None,
            hacked_no_subtitle: None,
            subtitle: None,
            no_subtitle: None,
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.href.clone(), i))
            .collect();
    }

    /// Looks up the record for an href.
    pub fn lookup(&self, href: &str) -> Option<&HistoryRecord> {
        self.index.get(href).map(|&i| &self.records[i])
    }

    /// Whether a bucket has ever been downloaded for an href.
    pub fn is_downloaded(&self, href: &str, t: TorrentType) -> bool {
        self.lookup(href)
            .map(|r| r.downloaded_at(t).is_some())
            .unwrap_or(false)
    }

    /// The buckets the scraper should still pursue for an entry.
    ///
    /// Phase 1 chases the preferred pair (`hacked_subtitle`, `subtitle`);
    /// phase 2 exists for one thing only: upgrading an entry that has a
    /// plain download to the crack variant.
    pub fn should_process(
        &self,
        href: &str,
        phase: Phase,
        overrides: Overrides,
    ) -> BTreeSet<TorrentType> {
        if overrides.ignore_history {
            return TorrentType::iter().collect();
        }

        match (self.lookup(href), phase) {
            (None, Phase::One) => [TorrentType::HackedSubtitle, TorrentType::Subtitle]
                .into_iter()
                .collect(),
            (None, Phase::Two) => [TorrentType::HackedNoSubtitle].into_iter().collect(),
            (Some(record), Phase::One) => [TorrentType::HackedSubtitle, TorrentType::Subtitle]
                .into_iter()
                .filter(|t| record.downloaded_at(*t).is_none())
                .collect(),
            (Some(record), Phase::Two) => {
                if record.downloaded_at(TorrentType::NoSubtitle).is_some()
                    && record.downloaded_at(TorrentType::HackedNoSubtitle).is_none()
                {
                    [TorrentType::HackedNoSubtitle].into_iter().collect()
                } else {
                    BTreeSet::new()
                }
            }
        }
    }

    /// Creates or updates the record for an entry.
    ///
    /// Each bucket in `types` gets `timestamp` unless it already carries a
    /// stamp (first write wins). `update_date` always advances; `create_date`
    /// never moves after creation. The touched record moves to the front so
    /// the file stays ordered most-recently-updated first.
    pub fn merge(
        &mut self,
        href: &str,
        video_code: &str,
        phase: Phase,
        types: &BTreeSet<TorrentType>,
        timestamp: &str,
    ) {
        let idx = match self.index.get(href) {
            Some(&idx) => idx,
            None => {
                let record = HistoryRecord {
                    href: href.to_string(),
                    phase,
                    video_code: video_code.to_string(),
                    create_date: timestamp.to_string(),
                    update_date: timestamp.to_string(),
                    hacked_subtitle: None,
                    hacked_no_subtitle: None,
                    subtitle: None,
                    no_subtitle: None,
                };
                self.records.insert(0, record);
                self.rebuild_index();
                0
            }
        };

        {
            let record = &mut self.records[idx];
            for t in types {
                record.record_download(*t, timestamp);
            }
            record.update_date = timestamp.to_string();
            record.phase = phase;
            debug!("Merged history for {href}: {:?}", types);
        }

        if idx != 0 {
            let record = self.records.remove(idx);
            self.records.insert(0, record);
            self.rebuild_index();
        }
    }

    /// Records that the uploader pushed `types` for an entry.
    pub fn mark_downloaded(
        &mut self,
        href: &str,
        video_code: &str,
        types: &BTreeSet<TorrentType>,
        timestamp: &str,
    ) {
        let phase = self
            .lookup(href)
            .map(|r| r.phase)
            .unwrap_or(Phase::Two);
        self.merge(href, video_code, phase, types, timestamp);
    }

    /// Writes the table back atomically (temp file + rename) under the
    /// session lock, fsyncing before the rename.
    pub fn save(&self) -> Result<(), HistoryError> {
        let _lock = SessionLock::acquire(&self.path)?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let temp = NamedTempFile::new_in(parent)?;

        {
            let mut writer = csv::Writer::from_writer(temp.as_file());
            writer.write_record(HISTORY_HEADER)?;
            for record in &self.records {
                let phase = record.phase.as_u8().to_string();
                writer.write_record([
                    record.href.as_str(),
                    phase.as_str(),
                    record.video_code.as_str(),
                    record.create_date.as_str(),
                    record.update_date.as_str(),
                    record.hacked_subtitle.as_deref().unwrap_or(""),
                    record.hacked_no_subtitle.as_deref().unwrap_or(""),
                    record.subtitle.as_deref().unwrap_or(""),
                    record.no_subtitle.as_deref().unwrap_or(""),
                ])?;
            }
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| HistoryError::Io(e.error))?;
        debug!("Wrote {} history records", self.records.len());
        Ok(())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, most recently updated first.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }
}
