//! The pipeline orchestrator (C8): scrape → upload → deep-storage bridge.
//!
//! Each step's failure is classified against a fixed policy: total outages,
//! auth failures, and all-adds-failed are critical; individual page
//! failures, per-torrent rejections, and bridge API errors are not. Exactly
//! one [`RunStatus`] comes out, whatever happens.

mod status;

use log::{error, info, warn};

use crate::config::{Config, UploadMode};
use crate::deep_storage::{run_bridge, DeepStorageClient};
use crate::error_handling::ScrapeError;
use crate::http::PageSource;
use crate::proxy::{BanLedger, ProxyPool};
use crate::scraper::{run_scrape, ScrapeOptions};
use crate::uploader::{run_upload, TorrentClient};

pub use status::{RunOutcome, RunStatus};

/// Hook for publishing intermediate artifacts (reports, history) after each
/// step, so operators can watch a long run progress. The real publisher is
/// an external collaborator; the default does nothing.
pub trait CommitHook: Send + Sync {
    /// Publishes the current artifacts, labeled with the step that just
    /// finished. Failures are the hook's problem to log; the pipeline
    /// continues regardless.
    fn commit(&self, step: &str);
}

/// The default hook: log and move on.
pub struct NoopCommit;

impl CommitHook for NoopCommit {
    fn commit(&self, step: &str) {
        log::debug!("No artifact publisher configured (step {step})");
    }
}

/// Everything a pipeline invocation needs beyond the config.
pub struct PipelineOptions {
    pub scrape: ScrapeOptions,
    pub upload_mode: UploadMode,
}

/// Drives a full run. Infallible by contract: every failure mode collapses
/// into the returned [`RunStatus`].
pub async fn run_pipeline<S, T, D>(
    source: &S,
    torrent_client: &T,
    storage: &D,
    pool: Option<&ProxyPool>,
    ledger: &BanLedger,
    config: &Config,
    options: &PipelineOptions,
    hook: &dyn CommitHook,
) -> RunStatus
where
    S: PageSource,
    T: TorrentClient,
    D: DeepStorageClient,
{
    let dry_run = options.scrape.dry_run;

    // Step 1: scrape.
    info!("Pipeline step 1: scraper");
    let scrape = match run_scrape(source, config, &options.scrape).await {
        Ok(report) => report,
        Err(ScrapeError::ProxyBanOutage) => {
            error!("Proxy pool exhausted; aborting pipeline");
            let mut status = RunStatus::new(RunOutcome::FailedProxyBanned);
            status.ban_delta = ledger.delta();
            status.proxy_stats = pool.map(|p| p.snapshot()).unwrap_or_default();
            status
                .critical_causes
                .push("proxy pool exhausted by bans".into());
            return status;
        }
        Err(e) => {
            error!("Scraper failed: {e}");
            let mut status = RunStatus::new(RunOutcome::FailedCritical);
            status.ban_delta = ledger.delta();
            status.proxy_stats = pool.map(|p| p.snapshot()).unwrap_or_default();
            status.critical_causes.push(format!("scraper: {e}"));
            return status;
        }
    };
    hook.commit("scraper");

    let mut status = RunStatus::new(RunOutcome::Success);
    status.scrape = Some(scrape.stats);
    status.rows_written = scrape.rows_written;
    if scrape.partial {
        status
            .log_excerpts
            .push("Scraper stopped early at the wall-clock budget.".into());
    }

    // Step 2: upload, when there is a report to upload.
    if let Some(report_path) = &scrape.report_path {
        info!("Pipeline step 2: uploader");
        match run_upload(
            torrent_client,
            config,
            options.upload_mode,
            report_path,
            dry_run,
        )
        .await
        {
            Ok(summary) => {
                if summary.all_failed() {
                    status.critical_causes.push(format!(
                        "all {} torrent adds failed",
                        summary.attempted
                    ));
                }
                status.upload = Some(summary);
            }
            Err(e) => {
                // Report stays on disk for a manual retry; history was not
                // advanced for anything that did not land.
                error!("Uploader failed: {e}");
                status.critical_causes.push(format!("uploader: {e}"));
            }
        }
        hook.commit("uploader");
    } else if !dry_run {
        info!("No report produced; skipping uploader");
    }

    // Step 3: deep-storage bridge. Never critical unless the service is
    // plain unreachable.
    if !dry_run {
        info!("Pipeline step 3: deep-storage bridge");
        let categories = vec![
            config.torrent_client.category_daily.clone(),
            config.torrent_client.category_adhoc.clone(),
        ];
        let bridge = run_bridge(torrent_client, storage, &config.deep_storage, &categories).await;
        if bridge.connectivity_outage {
            warn!("Deep-storage bridge reported a connectivity outage");
            status
                .critical_causes
                .push("deep-storage bridge unreachable".into());
        }
        status.bridge = Some(bridge);
    }
    hook.commit("final");

    status.ban_delta = ledger.delta();
    status.proxy_stats = pool.map(|p| p.snapshot()).unwrap_or_default();
    if let Some(pool) = pool {
        pool.log_statistics();
    }

    // Verdict.
    status.outcome = if !status.critical_causes.is_empty() {
        RunOutcome::FailedCritical
    } else if status.rows_written == 0
        && status.upload.as_ref().map(|u| u.added).unwrap_or(0) == 0
    {
        RunOutcome::SuccessEmpty
    } else {
        RunOutcome::Success
    };

    info!("Pipeline outcome: {}", status.outcome.as_str());
    status
}
