//! Phase admission rules.
//!
//! Filtering operates on parsed fields, never on raw HTML. Phase 1 is
//! tag-gated; phase 2 is quality-gated. Entries carrying the subtitle tag
//! belong to phase 1 exclusively so the two phases never double-process.

use crate::config::ScraperConfig;
use crate::models::{IndexEntry, Phase};
use crate::parse::tags;

/// Whether an index entry is admitted to a phase.
///
/// `suppress_release_gate` drops the released-today/yesterday requirement
/// (set for ad-hoc crawls and the `--ignore-release-date` override).
pub fn admits(
    entry: &IndexEntry,
    phase: Phase,
    config: &ScraperConfig,
    suppress_release_gate: bool,
) -> bool {
    match phase {
        Phase::One => {
            tags::has_subtitle_tag(&entry.tags)
                && (suppress_release_gate || tags::has_release_tag(&entry.tags))
        }
        Phase::Two => {
            if tags::has_subtitle_tag(&entry.tags) {
                return false;
            }
            if !suppress_release_gate && !tags::has_release_tag(&entry.tags) {
                return false;
            }
            // Missing rating or comment count makes an entry ineligible;
            // both thresholds are inclusive.
            let Some(rating) = entry.rating else {
                return false;
            };
            let Some(comments) = entry.comment_count else {
                return false;
            };
            rating >= config.phase2_min_rate && comments >= config.phase2_min_comments
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tags: &[&str], rating: Option<f64>, comments: Option<u32>) -> IndexEntry {
        IndexEntry {
            href: "/v/x".into(),
            video_code: "X-1".into(),
            title: "X-1".into(),
            page: 1,
            rating,
            comment_count: comments,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn config() -> ScraperConfig {
        ScraperConfig::default()
    }

    #[test]
    fn test_phase1_needs_subtitle_and_release_tags() {
        let cfg = config();
        assert!(admits(
            &entry(&["含中字磁鏈", "今日新種"], None, None),
            Phase::One,
            &cfg,
            false
        ));
        assert!(!admits(
            &entry(&["含中字磁鏈"], None, None),
            Phase::One,
            &cfg,
            false
        ));
        assert!(!admits(
            &entry(&["今日新種"], None, None),
            Phase::One,
            &cfg,
            false
        ));
    }

    #[test]
    fn test_phase1_release_gate_suppression() {
        let cfg = config();
        assert!(admits(
            &entry(&["含中字磁鏈"], None, None),
            Phase::One,
            &cfg,
            true
        ));
    }

    #[test]
    fn test_phase2_excludes_subtitle_entries() {
        let cfg = config();
        assert!(!admits(
            &entry(&["含中字磁鏈", "今日新種"], Some(4.8), Some(200)),
            Phase::Two,
            &cfg,
            false
        ));
    }

    #[test]
    fn test_phase2_thresholds_are_inclusive() {
        let cfg = config();
        // Exactly at both thresholds: admitted
        assert!(admits(
            &entry(
                &["昨日新種"],
                Some(cfg.phase2_min_rate),
                Some(cfg.phase2_min_comments)
            ),
            Phase::Two,
            &cfg,
            false
        ));
        // Strictly below rating: rejected
        assert!(!admits(
            &entry(
                &["昨日新種"],
                Some(cfg.phase2_min_rate - 0.1),
                Some(cfg.phase2_min_comments)
            ),
            Phase::Two,
            &cfg,
            false
        ));
        // Strictly below comments: rejected
        assert!(!admits(
            &entry(
                &["昨日新種"],
                Some(cfg.phase2_min_rate),
                Some(cfg.phase2_min_comments - 1)
            ),
            Phase::Two,
            &cfg,
            false
        ));
    }

    #[test]
    fn test_phase2_missing_score_is_ineligible() {
        let cfg = config();
        assert!(!admits(
            &entry(&["今日新種"], None, Some(500)),
            Phase::Two,
            &cfg,
            false
        ));
        assert!(!admits(
            &entry(&["今日新種"], Some(4.9), None),
            Phase::Two,
            &cfg,
            false
        ));
    }

    #[test]
    fn test_phase2_release_gate_still_applies_without_suppression() {
        let cfg = config();
        assert!(!admits(
            &entry(&[], Some(4.9), Some(500)),
            Phase::Two,
            &cfg,
            false
        ));
        assert!(admits(
            &entry(&[], Some(4.9), Some(500)),
            Phase::Two,
            &cfg,
            true
        ));
    }
}
