//! End-of-run summary logging.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::ScrapeStatsSnapshot;
use crate::models::{ReportRow, TorrentType};
use crate::uploader::UploadSummary;

/// Logs the scrape summary block: counters plus per-bucket share of rows.
pub fn log_scrape_summary(stats: &ScrapeStatsSnapshot, rows: &[ReportRow], partial: bool) {
    info!("==================================================");
    info!("SCRAPE SUMMARY");
    info!("==================================================");
    if partial {
        info!("Run was cut short by the wall-clock budget");
    }
    info!(
        "Pages: {} attempted, {} failed",
        stats.pages_attempted, stats.pages_failed
    );
    info!(
        "Entries: {} selected, {} detailed, {} failed",
        stats.entries_selected, stats.entries_detailed, stats.entries_failed
    );
    if stats.ban_events > 0 {
        info!("Ban events: {}", stats.ban_events);
    }
    info!("Report rows: {}", rows.len());

    if !rows.is_empty() {
        for t in TorrentType::iter() {
            let count = rows
                .iter()
                .filter(|row| row.cell(t).map(|c| !c.magnet.is_empty()).unwrap_or(false))
                .count();
            if count > 0 {
                info!(
                    "  - {}: {} ({:.1}%)",
                    t.label(),
                    count,
                    count as f64 / rows.len() as f64 * 100.0
                );
            }
        }
    }
    info!("==================================================");
}

/// Logs the upload summary block.
pub fn log_upload_summary(summary: &UploadSummary) {
    info!("==================================================");
    info!("UPLOAD SUMMARY");
    info!("==================================================");
    info!(
        "Attempted: {}, added: {}, rejected: {}, network errors: {}",
        summary.attempted, summary.added, summary.rejected, summary.network_errors
    );
    info!("Skipped (already downloaded): {}", summary.skipped_downloaded);
    for (label, count) in &summary.added_by_type {
        info!("  - {label}: {count}");
    }
    if summary.attempted > 0 {
        info!(
            "Success rate: {:.1}%",
            summary.added as f64 / summary.attempted as f64 * 100.0
        );
    }
    info!("==================================================");
}
