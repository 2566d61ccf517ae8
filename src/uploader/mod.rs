//! The uploader (C7): pushes a report's new magnets to the torrent client.
//!
//! Idempotent by construction: a cell is only ever pushed when neither the
//! report marker nor the history column says it has been pushed before, and
//! both are updated the moment an add succeeds. Running the uploader twice
//! over the same report performs zero adds the second time.

mod qbittorrent;

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info, warn};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::config::{Config, UploadMode};
use crate::error_handling::UploadError;
use crate::history::HistoryStore;
use crate::models::TorrentType;
use crate::report::{is_downloaded_cell, mark_cell_downloaded, read_report, write_report};
use crate::utils::now_stamp;

pub use qbittorrent::{AddOutcome, AddRequest, QbClient, TorrentClient, TorrentHandle};
pub use qbittorrent::hash_from_magnet;

/// What an upload run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadSummary {
    /// Adds actually attempted against the client.
    pub attempted: u32,
    pub added: u32,
    pub rejected: u32,
    pub network_errors: u32,
    /// Cells skipped because they were already marked or already in history.
    pub skipped_downloaded: u32,
    /// Successful adds per bucket label.
    pub added_by_type: BTreeMap<String, u32>,
}

impl UploadSummary {
    /// The critical condition: adds were attempted and none landed.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.added == 0
    }

    /// Every attempted add died on the wire (client effectively down).
    pub fn sustained_network_failure(&self) -> bool {
        self.attempted > 0 && self.network_errors == self.attempted
    }
}

/// Runs the upload pass over one report file.
///
/// Reads the report, pushes every unmarked magnet cell, marks pushed cells
/// with the downloaded prefix, records downloads in history, and rewrites
/// the report atomically.
///
/// # Errors
///
/// `UploadError::AuthFailed` / `Unreachable` are critical; per-torrent
/// rejections are counted in the summary instead.
pub async fn run_upload<C: TorrentClient>(
    client: &C,
    config: &Config,
    mode: UploadMode,
    report_path: &Path,
    dry_run: bool,
) -> Result<UploadSummary, UploadError> {
    let mut rows = read_report(report_path)?;
    let mut history = HistoryStore::load(&config.history_path)?;
    let mut summary = UploadSummary::default();
    let mut report_modified = false;
    let mut history_modified = false;
    let mut logged_in = false;

    let category = match mode {
        UploadMode::Daily => config.torrent_client.category_daily.clone(),
        UploadMode::Adhoc => config.torrent_client.category_adhoc.clone(),
    };
    info!(
        "Uploading from {} (category {category})",
        report_path.display()
    );

    for row in rows.iter_mut() {
        for t in TorrentType::iter() {
            let Some(cell) = row.cell(t) else {
                continue;
            };
            let magnet = cell.magnet.trim().to_string();
            if magnet.is_empty() {
                continue;
            }
            if is_downloaded_cell(&magnet) {
                summary.skipped_downloaded += 1;
                continue;
            }

            // The history column wins over the report: a cell may predate
            // an upload recorded by a later run.
            if history.is_downloaded(&row.href, t) {
                if let Some(cell) = row.cell_mut(t).as_mut() {
                    cell.magnet = mark_cell_downloaded(&cell.magnet);
                }
                report_modified = true;
                summary.skipped_downloaded += 1;
                debug!("{} [{}] already in history", row.video_code, t.label());
                continue;
            }

            if dry_run {
                summary.attempted += 1;
                info!("[dry run] would add {} [{}]", row.video_code, t.label());
                continue;
            }

            if !logged_in {
                client.probe().await?;
                client.login().await?;
                logged_in = true;
            }

            summary.attempted += 1;
            let request = AddRequest {
                magnet: magnet.clone(),
                title: format!("{} [{}]", row.video_code, t.label()),
                category: category.clone(),
                save_path: config.torrent_client.save_path.clone(),
                auto_start: config.torrent_client.auto_start,
                skip_checking: config.torrent_client.skip_checking,
            };

            match client.add(&request).await {
                AddOutcome::Added => {
                    summary.added += 1;
                    *summary
                        .added_by_type
                        .entry(t.label().to_string())
                        .or_insert(0) += 1;

                    let types = [t].into_iter().collect();
                    history.mark_downloaded(&row.href, &row.video_code, &types, &now_stamp());
                    history_modified = true;

                    if let Some(cell) = row.cell_mut(t).as_mut() {
                        cell.magnet = mark_cell_downloaded(&cell.magnet);
                    }
                    report_modified = true;
                }
                AddOutcome::Rejected => {
                    summary.rejected += 1;
                    warn!("Client rejected {} [{}]", row.video_code, t.label());
                }
                AddOutcome::NetworkError => {
                    summary.network_errors += 1;
                    warn!("Network error adding {} [{}]", row.video_code, t.label());
                }
            }

            tokio::time::sleep(config.torrent_client.inter_add_delay).await;
        }
    }

    if !dry_run {
        if history_modified {
            history.save()?;
        }
        if report_modified {
            write_report(report_path, &rows)?;
        }
    }

    if summary.sustained_network_failure() {
        return Err(UploadError::Unreachable(format!(
            "all {} attempted adds failed on the wire",
            summary.attempted
        )));
    }

    crate::app::log_upload_summary(&summary);
    Ok(summary)
}
