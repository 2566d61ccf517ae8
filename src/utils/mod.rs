//! Small shared helpers.

use chrono::{Local, NaiveDateTime};

use crate::config::{COMPACT_DATE_FORMAT, TIMESTAMP_FORMAT};

/// Current local time in the on-disk timestamp format.
pub fn now_stamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Current local date in compact form, for report file names.
pub fn today_compact() -> String {
    Local::now().format(COMPACT_DATE_FORMAT).to_string()
}

/// Parses an on-disk timestamp.
pub fn parse_stamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_round_trip() {
        let stamp = now_stamp();
        assert!(parse_stamp(&stamp).is_some());
    }

    #[test]
    fn test_parse_stamp_rejects_garbage() {
        assert!(parse_stamp("not a date").is_none());
        assert!(parse_stamp("2025-13-99 25:00:00").is_none());
    }

    #[test]
    fn test_today_compact_shape() {
        let today = today_compact();
        assert_eq!(today.len(), 8);
        assert!(today.chars().all(|c| c.is_ascii_digit()));
    }
}
