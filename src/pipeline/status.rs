//! Run status: the single outcome object a pipeline invocation produces.

use serde::Serialize;

use crate::deep_storage::BridgeSummary;
use crate::error_handling::ScrapeStatsSnapshot;
use crate::proxy::{BanRecord, ProxyStats};
use crate::uploader::UploadSummary;

/// Overall verdict of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// Work was found and processed.
    Success,
    /// Nothing new; still a healthy run.
    SuccessEmpty,
    /// A critical error stopped or degraded the run.
    FailedCritical,
    /// The proxy pool was exhausted by bans.
    FailedProxyBanned,
}

impl RunOutcome {
    /// Process exit code for this outcome. Ban outages get a distinct code
    /// so schedulers can tell them from ordinary failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success | RunOutcome::SuccessEmpty => 0,
            RunOutcome::FailedCritical => 1,
            RunOutcome::FailedProxyBanned => 2,
        }
    }

    /// Label used in the notification subject.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "SUCCESS",
            RunOutcome::SuccessEmpty => "SUCCESS (empty)",
            RunOutcome::FailedCritical => "FAILED",
            RunOutcome::FailedProxyBanned => "FAILED (proxy banned)",
        }
    }
}

/// The one status object emitted per run. The notification channel sends it
/// unchanged; no failure is silent, including the empty-success case.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub outcome: RunOutcome,
    pub scrape: Option<ScrapeStatsSnapshot>,
    pub rows_written: usize,
    pub upload: Option<UploadSummary>,
    pub bridge: Option<BridgeSummary>,
    /// Bans recorded during this run.
    pub ban_delta: Vec<BanRecord>,
    /// Per-proxy statistics at the end of the run.
    pub proxy_stats: Vec<ProxyStats>,
    /// Why the run is considered critical, when it is.
    pub critical_causes: Vec<String>,
    /// Tail of each step's summary, for the notification body.
    pub log_excerpts: Vec<String>,
}

impl RunStatus {
    pub fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            scrape: None,
            rows_written: 0,
            upload: None,
            bridge: None,
            ban_delta: Vec::new(),
            proxy_stats: Vec::new(),
            critical_causes: Vec::new(),
            log_excerpts: Vec::new(),
        }
    }

    /// Notification subject line.
    pub fn subject(&self) -> String {
        format!(
            "Harvest Pipeline Report {} - {}",
            crate::utils::today_compact(),
            self.outcome.as_str()
        )
    }

    /// Notification body: counters first, then excerpts, then the ban
    /// picture.
    pub fn body(&self, ban_summary: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("Outcome: {}\n\n", self.outcome.as_str()));

        if !self.critical_causes.is_empty() {
            out.push_str("Critical errors:\n");
            for cause in &self.critical_causes {
                out.push_str(&format!("  - {cause}\n"));
            }
            out.push('\n');
        }

        if let Some(scrape) = &self.scrape {
            out.push_str(&format!(
                "Scraper: {} pages attempted, {} failed, {} entries selected, \
                 {} detailed, {} failed, {} ban events\n",
                scrape.pages_attempted,
                scrape.pages_failed,
                scrape.entries_selected,
                scrape.entries_detailed,
                scrape.entries_failed,
                scrape.ban_events,
            ));
            out.push_str(&format!("Report rows: {}\n", self.rows_written));
        }
        if let Some(upload) = &self.upload {
            out.push_str(&format!(
                "Uploader: {} attempted, {} added, {} rejected, {} network errors, {} skipped\n",
                upload.attempted,
                upload.added,
                upload.rejected,
                upload.network_errors,
                upload.skipped_downloaded,
            ));
        }
        if let Some(bridge) = &self.bridge {
            out.push_str(&format!(
                "Deep storage: {} candidates, {} ok, {} pending, {} failed\n",
                bridge.candidates, bridge.ok, bridge.pending, bridge.failed,
            ));
        }

        if !self.log_excerpts.is_empty() {
            out.push('\n');
            for excerpt in &self.log_excerpts {
                out.push_str(excerpt);
                out.push('\n');
            }
        }

        out.push('\n');
        out.push_str(ban_summary);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Success.exit_code(), 0);
        assert_eq!(RunOutcome::SuccessEmpty.exit_code(), 0);
        assert_eq!(RunOutcome::FailedCritical.exit_code(), 1);
        assert_eq!(RunOutcome::FailedProxyBanned.exit_code(), 2);
    }

    #[test]
    fn test_subject_carries_outcome() {
        let status = RunStatus::new(RunOutcome::FailedProxyBanned);
        assert!(status.subject().contains("FAILED (proxy banned)"));
    }

    #[test]
    fn test_body_includes_counters_and_bans() {
        let mut status = RunStatus::new(RunOutcome::Success);
        status.scrape = Some(ScrapeStatsSnapshot {
            pages_attempted: 3,
            pages_failed: 1,
            entries_selected: 5,
            entries_detailed: 4,
            entries_failed: 1,
            ban_events: 0,
        });
        status.rows_written = 4;
        let body = status.body("No proxies currently banned.");
        assert!(body.contains("3 pages attempted"));
        assert!(body.contains("Report rows: 4"));
        assert!(body.contains("No proxies currently banned."));
    }

    #[test]
    fn test_body_lists_critical_causes() {
        let mut status = RunStatus::new(RunOutcome::FailedCritical);
        status
            .critical_causes
            .push("torrent client login failed".into());
        let body = status.body("");
        assert!(body.contains("Critical errors:"));
        assert!(body.contains("torrent client login failed"));
    }
}
