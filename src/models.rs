//! Core data model types shared across the crate.
//!
//! These are the closed record types produced by the parsers and consumed by
//! the classifier, history store, report writer, and uploader.

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// The four torrent buckets an entry's magnets are sorted into.
///
/// The variant order is meaningful: it is the canonical column order of the
/// history and report files and the order buckets are compared in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Serialize, Deserialize,
)]
pub enum TorrentType {
    /// Crack variant with embedded subtitles.
    HackedSubtitle,
    /// Crack variant without subtitles.
    HackedNoSubtitle,
    /// Standard variant with subtitles.
    Subtitle,
    /// Standard variant, upgraded to 4K when one is offered.
    NoSubtitle,
}

impl TorrentType {
    /// The CSV column name for this bucket (history and report files).
    pub fn column(&self) -> &'static str {
        match self {
            TorrentType::HackedSubtitle => "hacked_subtitle",
            TorrentType::HackedNoSubtitle => "hacked_no_subtitle",
            TorrentType::Subtitle => "subtitle",
            TorrentType::NoSubtitle => "no_subtitle",
        }
    }

    /// Human-readable label used in torrent titles and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            TorrentType::HackedSubtitle => "Hacked+Subtitle",
            TorrentType::HackedNoSubtitle => "Hacked-NoSubtitle",
            TorrentType::Subtitle => "Subtitle",
            TorrentType::NoSubtitle => "NoSubtitle",
        }
    }
}

/// Which of the two crawl phases an entry was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Subtitle-centric pass (tag-gated).
    One,
    /// Quality-threshold pass (rating/comment gated).
    Two,
}

impl Phase {
    /// Numeric form used in the history file's `phase` column.
    pub fn as_u8(&self) -> u8 {
        match self {
            Phase::One => 1,
            Phase::Two => 2,
        }
    }

    /// Parses the history file's `phase` column. Anything unrecognized maps
    /// to phase 1 (the conservative choice: more types get pursued).
    pub fn from_column(s: &str) -> Phase {
        if s.trim() == "2" {
            Phase::Two
        } else {
            Phase::One
        }
    }
}

/// A catalog entry as it appears on an index page.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Page-relative link to the detail page (stable key across runs).
    pub href: String,
    /// The entry's stable identifier as displayed on the card.
    pub video_code: String,
    /// Human title.
    pub title: String,
    /// Index page the entry was discovered on.
    pub page: u32,
    /// Rating (0-5, one decimal); absent when the card carries no score.
    pub rating: Option<f64>,
    /// Number of comments backing the rating.
    pub comment_count: Option<u32>,
    /// Raw site tags on the card, in display order.
    pub tags: Vec<String>,
}

/// One magnet offer on a detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct Magnet {
    /// The magnet URI (always begins with `magnet:`).
    pub uri: String,
    /// Display name of the torrent.
    pub name: String,
    /// Descriptive tags, normalized to lowercase.
    pub tags: Vec<String>,
    /// Size as displayed, e.g. `4.94GB`. Empty when missing.
    pub size_text: String,
    /// Publication timestamp as displayed (sortable string form).
    pub timestamp: String,
}

/// Detail-page attributes that are not present on index cards.
#[derive(Debug, Clone, Default)]
pub struct DetailPage {
    /// Magnets offered for the entry, in page order.
    pub magnets: Vec<Magnet>,
    /// First credited actor, when listed.
    pub actor: Option<String>,
    /// Canonical identifier from the copy button, when present.
    pub video_code: Option<String>,
}

/// A magnet URI paired with its displayed size, as stored in a report cell.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetCell {
    /// Magnet URI, or a bare `[DOWNLOADED] ` marker once consumed.
    pub magnet: String,
    /// Size text carried alongside.
    pub size: String,
}

/// One row of a run-scoped report.
#[derive(Debug, Clone, Default)]
pub struct ReportRow {
    pub href: String,
    pub video_code: String,
    pub title: String,
    pub page: u32,
    pub actor: String,
    /// Rating as displayed (kept as text so the CSV round-trips exactly).
    pub rate: String,
    pub comment_number: String,
    pub hacked_subtitle: Option<MagnetCell>,
    pub hacked_no_subtitle: Option<MagnetCell>,
    pub subtitle: Option<MagnetCell>,
    pub no_subtitle: Option<MagnetCell>,
}

impl ReportRow {
    /// Borrows the cell for a bucket.
    pub fn cell(&self, t: TorrentType) -> Option<&MagnetCell> {
        match t {
            TorrentType::HackedSubtitle => self.hacked_subtitle.as_ref(),
            TorrentType::HackedNoSubtitle => self.hacked_no_subtitle.as_ref(),
            TorrentType::Subtitle => self.subtitle.as_ref(),
            TorrentType::NoSubtitle => self.no_subtitle.as_ref(),
        }
    }

    /// Mutably borrows the cell slot for a bucket.
    pub fn cell_mut(&mut self, t: TorrentType) -> &mut Option<MagnetCell> {
        match t {
            TorrentType::HackedSubtitle => &mut self.hacked_subtitle,
            TorrentType::HackedNoSubtitle => &mut self.hacked_no_subtitle,
            TorrentType::Subtitle => &mut self.subtitle,
            TorrentType::NoSubtitle => &mut self.no_subtitle,
        }
    }

    /// True when at least one cell holds a magnet that has not been marked
    /// as downloaded. Rows without any such cell are not worth writing.
    pub fn has_new_magnet(&self) -> bool {
        use strum::IntoEnumIterator;
        TorrentType::iter().any(|t| {
            self.cell(t)
                .map(|c| !crate::report::is_downloaded_cell(&c.magnet) && !c.magnet.is_empty())
                .unwrap_or(false)
        })
    }
}

/// One history record: an entry ever seen, with per-bucket download stamps.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub href: String,
    pub phase: Phase,
    pub video_code: String,
    /// First-seen timestamp. Never changes after creation.
    pub create_date: String,
    /// Last-touched timestamp. Advances on every merge.
    pub update_date: String,
    pub hacked_subtitle: Option<String>,
    pub hacked_no_subtitle: Option<String>,
    pub subtitle: Option<String>,
    pub no_subtitle: Option<String>,
}

impl HistoryRecord {
    /// Download stamp for a bucket, if it has ever been recorded.
    pub fn downloaded_at(&self, t: TorrentType) -> Option<&str> {
        let slot = match t {
            TorrentType::HackedSubtitle => &self.hacked_subtitle,
            TorrentType::HackedNoSubtitle => &self.hacked_no_subtitle,
            TorrentType::Subtitle => &self.subtitle,
            TorrentType::NoSubtitle => &self.no_subtitle,
        };
        slot.as_deref()
    }

    /// Records a download stamp for a bucket. The first write wins; later
    /// calls leave the stored stamp untouched.
    pub fn record_download(&mut self, t: TorrentType, stamp: &str) {
        let slot = match t {
            TorrentType::HackedSubtitle => &mut self.hacked_subtitle,
            TorrentType::HackedNoSubtitle => &mut self.hacked_no_subtitle,
            TorrentType::Subtitle => &mut self.subtitle,
            TorrentType::NoSubtitle => &mut self.no_subtitle,
        };
        if slot.is_none() {
            *slot = Some(stamp.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torrent_type_columns_are_distinct() {
        use strum::IntoEnumIterator;
        let columns: std::collections::HashSet<_> =
            TorrentType::iter().map(|t| t.column()).collect();
        assert_eq!(columns.len(), 4);
    }

    #[test]
    fn test_phase_round_trip() {
        assert_eq!(Phase::from_column("1"), Phase::One);
        assert_eq!(Phase::from_column("2"), Phase::Two);
        assert_eq!(Phase::from_column(" 2 "), Phase::Two);
        // Unrecognized values fall back to phase 1
        assert_eq!(Phase::from_column("x"), Phase::One);
        assert_eq!(Phase::One.as_u8(), 1);
        assert_eq!(Phase::Two.as_u8(), 2);
    }

    #[test]
    fn test_record_download_first_write_wins() {
        let mut record = HistoryRecord {
            href: "/v/abc".into(),
            phase: Phase::One,
            video_code: "ABC-123".into(),
            create_date: "2025-01-01 00:00:00".into(),
            update_date: "2025-01-01 00:00:00".into(),
            hacked_subtitle: None,
            hacked_no_subtitle: None,
            subtitle: None,
            no_subtitle: None,
        };
        record.record_download(TorrentType::Subtitle, "2025-01-02 10:00:00");
        record.record_download(TorrentType::Subtitle, "2025-06-30 10:00:00");
        assert_eq!(
            record.downloaded_at(TorrentType::Subtitle),
            Some("2025-01-02 10:00:00")
        );
        assert_eq!(record.downloaded_at(TorrentType::NoSubtitle), None);
    }

    #[test]
    fn test_report_row_has_new_magnet() {
        let mut row = ReportRow {
            href: "/v/abc".into(),
            ..Default::default()
        };
        assert!(!row.has_new_magnet());

        row.subtitle = Some(MagnetCell {
            magnet: "[DOWNLOADED] ".into(),
            size: String::new(),
        });
        assert!(!row.has_new_magnet());

        row.hacked_subtitle = Some(MagnetCell {
            magnet: "magnet:?xt=urn:btih:aaa".into(),
            size: "4.2GB".into(),
        });
        assert!(row.has_new_magnet());
    }
}
