//! Run-scoped report files.
//!
//! One CSV per run, produced by the scraper and consumed (and rewritten) by
//! the uploader. All report persistence lives here; rewrites are atomic via
//! write-temp-then-rename.

use std::path::{Path, PathBuf};

use chrono::Local;
use log::debug;
use tempfile::NamedTempFile;

use crate::models::{MagnetCell, ReportRow, TorrentType};

/// Literal marker prefixed to a magnet cell once the uploader has consumed
/// it. The trailing space is part of the contract.
pub const DOWNLOADED_PREFIX: &str = "[DOWNLOADED] ";

const REPORT_HEADER: &[&str] = &[
    "href",
    "video_code",
    "title",
    "page",
    "actor",
    "rate",
    "comment_number",
    "hacked_subtitle",
    "hacked_no_subtitle",
    "subtitle",
    "no_subtitle",
    "size_hacked_subtitle",
    "size_hacked_no_subtitle",
    "size_subtitle",
    "size_no_subtitle",
];

/// Whether a cell has already been consumed by the uploader.
pub fn is_downloaded_cell(cell: &str) -> bool {
    cell.trim_start().starts_with(DOWNLOADED_PREFIX.trim_end())
}

/// Prefixes a cell with the downloaded marker (idempotent).
pub fn mark_cell_downloaded(cell: &str) -> String {
    if is_downloaded_cell(cell) {
        cell.to_string()
    } else {
        format!("{DOWNLOADED_PREFIX}{cell}")
    }
}

/// `base/YYYY/MM/name` for today, creating nothing.
pub fn dated_report_path(base: &Path, file_name: &str) -> PathBuf {
    let now = Local::now();
    base.join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
        .join(file_name)
}

/// Default report file name for today's run.
pub fn default_report_name() -> String {
    format!("Harvest_{}.csv", crate::utils::today_compact())
}

/// Reads a report. A missing file is an error; the uploader has nothing to
/// do without one and the caller decides how loud to be about it.
pub fn read_report(path: &Path) -> Result<Vec<ReportRow>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let get = |name: &str| -> String {
            headers
                .iter()
                .position(|h| h == name)
                .and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };
        let cell = |magnet_col: &str, size_col: &str| -> Option<MagnetCell> {
            let magnet = get(magnet_col);
            if magnet.trim().is_empty() {
                None
            } else {
                Some(MagnetCell {
                    magnet,
                    size: get(size_col),
                })
            }
        };

        rows.push(ReportRow {
            href: get("href"),
            video_code: get("video_code"),
            title: get("title"),
            page: get("page").parse().unwrap_or(0),
            actor: get("actor"),
            rate: get("rate"),
            comment_number: get("comment_number"),
            hacked_subtitle: cell("hacked_subtitle", "size_hacked_subtitle"),
            hacked_no_subtitle: cell("hacked_no_subtitle", "size_hacked_no_subtitle"),
            subtitle: cell("subtitle", "size_subtitle"),
            no_subtitle: cell("no_subtitle", "size_no_subtitle"),
        });
    }
    Ok(rows)
}

/// Writes a report atomically: temp file in the target directory, fsync,
/// rename over the destination.
pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<(), csv::Error> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let temp = NamedTempFile::new_in(parent)?;

    {
        let mut writer = csv::Writer::from_writer(temp.as_file());
        writer.write_record(REPORT_HEADER)?;
        for row in rows {
            let cell = |t: TorrentType| -> (String, String) {
                row.cell(t)
                    .map(|c| (c.magnet.clone(), c.size.clone()))
                    .unwrap_or_default()
            };
            let (hs, hs_size) = cell(TorrentType::HackedSubtitle);
            let (hns, hns_size) = cell(TorrentType::HackedNoSubtitle);
            let (s, s_size) = cell(TorrentType::Subtitle);
            let (ns, ns_size) = cell(TorrentType::NoSubtitle);
            let page = row.page.to_string();
            writer.write_record([
                row.href.as_str(),
                row.video_code.as_str(),
                row.title.as_str(),
                page.as_str(),
                row.actor.as_str(),
                row.rate.as_str(),
                row.comment_number.as_str(),
                hs.as_str(),
                hns.as_str(),
                s.as_str(),
                ns.as_str(),
                hs_size.as_str(),
                hns_size.as_str(),
                s_size.as_str(),
                ns_size.as_str(),
            ])?;
        }
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| csv::Error::from(e.error))?;
    debug!("Wrote report with {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_row() -> ReportRow {
        ReportRow {
            href: "/v/abc".into(),
            video_code: "ABC-123".into(),
            title: "ABC-123 some title".into(),
            page: 2,
            actor: "Someone".into(),
            rate: "4.5".into(),
            comment_number: "120".into(),
            hacked_subtitle: Some(MagnetCell {
                magnet: "magnet:?xt=urn:btih:aaa".into(),
                size: "4.2GB".into(),
            }),
            hacked_no_subtitle: None,
            subtitle: Some(MagnetCell {
                magnet: "[DOWNLOADED] magnet:?xt=urn:btih:bbb".into(),
                size: "3.0GB".into(),
            }),
            no_subtitle: None,
        }
    }

    #[test]
    fn test_downloaded_marker_predicate() {
        assert!(is_downloaded_cell("[DOWNLOADED] magnet:?x"));
        assert!(is_downloaded_cell("[DOWNLOADED] "));
        assert!(!is_downloaded_cell("magnet:?x"));
        assert!(!is_downloaded_cell(""));
    }

    #[test]
    fn test_mark_cell_is_idempotent() {
        let once = mark_cell_downloaded("magnet:?x");
        let twice = mark_cell_downloaded(&once);
        assert_eq!(once, "[DOWNLOADED] magnet:?x");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        let rows = vec![sample_row()];
        write_report(&path, &rows).unwrap();

        let back = read_report(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].href, "/v/abc");
        assert_eq!(back[0].page, 2);
        assert_eq!(
            back[0].hacked_subtitle.as_ref().unwrap().magnet,
            "magnet:?xt=urn:btih:aaa"
        );
        assert!(is_downloaded_cell(&back[0].subtitle.as_ref().unwrap().magnet));
        assert!(back[0].hacked_no_subtitle.is_none());
    }

    #[test]
    fn test_rewrite_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        write_report(&path, &[sample_row()]).unwrap();
        let first = std::fs::read(&path).unwrap();

        let rows = read_report(&path).unwrap();
        write_report(&path, &rows).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dated_report_path_shape() {
        let path = dated_report_path(Path::new("reports/DailyReport"), "Harvest_20250102.csv");
        let text = path.to_string_lossy().into_owned();
        assert!(text.starts_with("reports/DailyReport/"));
        assert!(text.ends_with("/Harvest_20250102.csv"));
        // base / YYYY / MM / name
        assert_eq!(path.components().count(), 5);
    }
}
