//! The two-phase crawl engine.
//!
//! Per page: fetch index, parse, filter, decide against history, fetch the
//! details still worth fetching, classify magnets, record report rows. Pages
//! complete in order; entries keep their discovery order; a history merge
//! for an entry always lands before the row that references it.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};

use crate::classify::{classify_magnets, Selection};
use crate::config::{Config, PhaseMode};
use crate::error_handling::{FetchError, ScrapeError, ScrapeStats, ScrapeStatsSnapshot};
use crate::history::{HistoryStore, Overrides};
use crate::http::PageSource;
use crate::models::{IndexEntry, MagnetCell, Phase, ReportRow, TorrentType};
use crate::parse::{parse_detail, parse_index};
use crate::proxy::ProxyModule;
use crate::report::{
    dated_report_path, default_report_name, write_report, DOWNLOADED_PREFIX,
};
use crate::scraper::filter;
use crate::utils::now_stamp;

/// Run-scoped knobs, propagated verbatim from the CLI.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub phase_mode: PhaseMode,
    /// Ad-hoc starting URL; switches the report to the ad-hoc folder.
    pub custom_url: Option<String>,
    pub ignore_history: bool,
    pub ignore_release_date: bool,
    /// Process everything but write no report and merge no history.
    pub dry_run: bool,
    /// Report file name override.
    pub output_file: Option<String>,
}

/// What a completed crawl hands back.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub stats: ScrapeStatsSnapshot,
    /// Where the report landed; `None` on dry runs.
    pub report_path: Option<PathBuf>,
    pub rows_written: usize,
    /// The wall-clock budget ran out and the crawl stopped early.
    pub partial: bool,
    /// Ad-hoc mode was active.
    pub adhoc: bool,
}

/// Crawls the catalog and writes the run report.
pub async fn run_scrape<S: PageSource>(
    source: &S,
    config: &Config,
    options: &ScrapeOptions,
) -> Result<ScrapeReport, ScrapeError> {
    let mut history = HistoryStore::load(&config.history_path)?;
    let engine = Engine {
        source,
        config,
        options,
        stats: ScrapeStats::new(),
        started: Instant::now(),
    };
    engine.run(&mut history).await
}

struct Engine<'a, S: PageSource> {
    source: &'a S,
    config: &'a Config,
    options: &'a ScrapeOptions,
    stats: ScrapeStats,
    started: Instant,
}

impl<'a, S: PageSource> Engine<'a, S> {
    async fn run(self, history: &mut HistoryStore) -> Result<ScrapeReport, ScrapeError> {
        let adhoc = self.options.custom_url.is_some();
        let mut rows: Vec<ReportRow> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut partial = false;

        let phases: &[Phase] = match self.options.phase_mode {
            PhaseMode::One => &[Phase::One],
            PhaseMode::Two => &[Phase::Two],
            PhaseMode::All => &[Phase::One, Phase::Two],
        };

        for &phase in phases {
            info!(
                "Phase {}: {}",
                phase.as_u8(),
                match phase {
                    Phase::One => "entries with subtitle + release tags",
                    Phase::Two => "release-tagged entries over the quality bar",
                }
            );
            partial |= self
                .crawl_phase(phase, history, &mut rows, &mut seen, adhoc)
                .await?;
        }

        let stats = self.stats.snapshot();
        if stats.is_total_outage() && stats.ban_events == 0 {
            return Err(ScrapeError::TotalOutage {
                pages: stats.pages_attempted,
            });
        }

        let report_path = if self.options.dry_run {
            info!("Dry run: {} rows would be written", rows.len());
            for row in rows.iter().take(3) {
                info!("Dry run sample: {} (page {})", row.video_code, row.page);
            }
            None
        } else {
            let base = if adhoc {
                &self.config.reports.adhoc_dir
            } else {
                &self.config.reports.daily_dir
            };
            let name = self
                .options
                .output_file
                .clone()
                .unwrap_or_else(default_report_name);
            let path = dated_report_path(base, &name);
            write_report(&path, &rows)?;
            info!("Report written to {}", path.display());
            Some(path)
        };

        crate::app::log_scrape_summary(&stats, &rows, partial);

        Ok(ScrapeReport {
            stats,
            report_path,
            rows_written: rows.len(),
            partial,
            adhoc,
        })
    }

    /// Crawls one phase. Returns whether the deadline cut it short.
    async fn crawl_phase(
        &self,
        phase: Phase,
        history: &mut HistoryStore,
        rows: &mut Vec<ReportRow>,
        seen: &mut HashSet<String>,
        adhoc: bool,
    ) -> Result<bool, ScrapeError> {
        let cfg = &self.config.scraper;
        let suppress_release_gate =
            adhoc || cfg.ignore_release_date || self.options.ignore_release_date;
        let mut page = cfg.start_page;

        loop {
            if let Some(deadline) = cfg.deadline {
                if self.started.elapsed() >= deadline {
                    warn!("Wall-clock budget exhausted, stopping at page boundary {page}");
                    return Ok(true);
                }
            }

            let url = self.page_url(page);
            self.stats.page_attempted();

            let body = match self.source.fetch_page(&url, ProxyModule::SpiderIndex).await {
                Ok(body) => body,
                Err(FetchError::NoProxyAvailable) => return Err(ScrapeError::ProxyBanOutage),
                Err(FetchError::Auth { detail, .. }) => return Err(ScrapeError::Auth(detail)),
                Err(FetchError::Ban { url, reason }) => {
                    self.stats.ban_event();
                    self.stats.page_failed();
                    error!("[Page {page}] banned fetching {url}: {}", reason.describe());
                    if cfg.all_mode {
                        break;
                    }
                    if page >= cfg.end_page {
                        break;
                    }
                    page += 1;
                    continue;
                }
                Err(e) => {
                    self.stats.page_failed();
                    error!("[Page {page}] failed to fetch index: {e}");
                    if cfg.all_mode {
                        break;
                    }
                    if page >= cfg.end_page {
                        break;
                    }
                    page += 1;
                    continue;
                }
            };

            let (entries, warnings) = parse_index(&body, page);
            for w in &warnings {
                warn!("[Page {}] {}", w.page, w.message);
            }
            if cfg.all_mode && entries.is_empty() {
                info!("[Page {page}] empty index page, stopping phase {}", phase.as_u8());
                break;
            }
            info!("[Page {page}] {} entries", entries.len());

            self.process_page(phase, entries, history, rows, seen, suppress_release_gate)
                .await?;

            if !self.options.dry_run {
                history.save()?;
            }

            if !cfg.all_mode && page >= cfg.end_page {
                break;
            }
            page += 1;
        }

        Ok(false)
    }

    /// Processes one parsed index page: filter, decide, fetch details
    /// through the bounded worker pool, classify, record.
    async fn process_page(
        &self,
        phase: Phase,
        entries: Vec<IndexEntry>,
        history: &mut HistoryStore,
        rows: &mut Vec<ReportRow>,
        seen: &mut HashSet<String>,
        suppress_release_gate: bool,
    ) -> Result<(), ScrapeError> {
        let overrides = Overrides {
            ignore_history: self.options.ignore_history,
        };

        // FILTER + DECIDE happen before any detail fetch; entries whose
        // requested set is empty never cost a request.
        let mut work: Vec<(IndexEntry, BTreeSet<TorrentType>)> = Vec::new();
        for entry in entries {
            if !filter::admits(&entry, phase, &self.config.scraper, suppress_release_gate) {
                continue;
            }
            if !seen.insert(entry.href.clone()) {
                debug!("Skipping {} (already handled this session)", entry.href);
                continue;
            }
            let requested = history.should_process(&entry.href, phase, overrides);
            if requested.is_empty() {
                debug!("Skipping {} (history complete for phase {})", entry.href, phase.as_u8());
                continue;
            }
            self.stats.entry_selected();
            work.push((entry, requested));
        }

        // Detail fetches flow through a bounded pool; `buffered` keeps
        // completion order equal to discovery order.
        let workers = self.config.scraper.detail_workers.max(1);
        let fetched: Vec<_> = stream::iter(work.into_iter().map(|(entry, requested)| {
            let url = self.detail_url(&entry.href);
            async move {
                let result = self
                    .source
                    .fetch_page(&url, ProxyModule::SpiderDetail)
                    .await;
                (entry, requested, result)
            }
        }))
        .buffered(workers)
        .collect()
        .await;

        for (entry, requested, result) in fetched {
            let body = match result {
                Ok(body) => body,
                Err(FetchError::NoProxyAvailable) => return Err(ScrapeError::ProxyBanOutage),
                Err(FetchError::Auth { detail, .. }) => return Err(ScrapeError::Auth(detail)),
                Err(e) => {
                    if matches!(e, FetchError::Ban { .. }) {
                        self.stats.ban_event();
                    }
                    self.stats.entry_failed();
                    warn!("Detail fetch failed for {}: {e}", entry.href);
                    continue;
                }
            };

            let (detail, warnings) = parse_detail(&body, entry.page);
            for w in &warnings {
                debug!("[{}] {}", entry.href, w.message);
            }
            self.stats.entry_detailed();

            let selection = classify_magnets(&detail.magnets);
            let row = self.build_row(
                &entry,
                &detail.actor,
                detail.video_code.as_deref(),
                &requested,
                &selection,
                history,
            );

            if row.has_new_magnet() {
                if !self.options.dry_run {
                    // Record the sighting. Download columns stay null here;
                    // only the uploader stamps them, so a freshly reported
                    // magnet still gets pushed later in the same run.
                    history.merge(&entry.href, &row.video_code, phase, &BTreeSet::new(), &now_stamp());
                }
                rows.push(row);
            } else {
                debug!("No new magnets for {}, row dropped", entry.href);
            }

            if !self.config.scraper.entry_sleep.is_zero() {
                tokio::time::sleep(self.config.scraper.entry_sleep).await;
            }
        }

        Ok(())
    }

    /// Builds a report row: requested buckets get their selected magnet,
    /// buckets already in history get the bare downloaded marker.
    fn build_row(
        &self,
        entry: &IndexEntry,
        actor: &Option<String>,
        detail_code: Option<&str>,
        requested: &BTreeSet<TorrentType>,
        selection: &Selection,
        history: &HistoryStore,
    ) -> ReportRow {
        let mut row = ReportRow {
            href: entry.href.clone(),
            video_code: detail_code
                .filter(|c| !c.is_empty())
                .unwrap_or(&entry.video_code)
                .to_string(),
            title: entry.title.clone(),
            page: entry.page,
            actor: actor.clone().unwrap_or_default(),
            rate: entry.rating.map(|r| r.to_string()).unwrap_or_default(),
            comment_number: entry
                .comment_count
                .map(|c| c.to_string())
                .unwrap_or_default(),
            ..Default::default()
        };

        use strum::IntoEnumIterator;
        for t in TorrentType::iter() {
            if requested.contains(&t) {
                if let Some(cell) = selection.get(&t) {
                    *row.cell_mut(t) = Some(cell.clone());
                }
            } else if history.is_downloaded(&entry.href, t) {
                *row.cell_mut(t) = Some(MagnetCell {
                    magnet: DOWNLOADED_PREFIX.to_string(),
                    size: String::new(),
                });
            }
        }
        row
    }

    fn page_url(&self, page: u32) -> String {
        match &self.options.custom_url {
            Some(custom) => {
                if page == 1 {
                    custom.clone()
                } else if custom.contains('?') {
                    format!("{custom}&page={page}")
                } else {
                    format!("{custom}?page={page}")
                }
            }
            None => {
                let base = &self.config.scraper.base_url;
                if base.contains('?') {
                    format!("{base}&page={page}")
                } else {
                    format!("{}/?page={page}", base.trim_end_matches('/'))
                }
            }
        }
    }

    fn detail_url(&self, href: &str) -> String {
        let base = match &self.options.custom_url {
            Some(custom) => custom.as_str(),
            None => self.config.scraper.base_url.as_str(),
        };
        match url::Url::parse(base).and_then(|b| b.join(href)) {
            Ok(joined) => joined.to_string(),
            Err(_) => format!("{}{href}", base.trim_end_matches('/')),
        }
    }
}
