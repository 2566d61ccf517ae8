//! End-to-end pipeline runs against mocks: outcome classification and the
//! exit-code contract.

mod common;

use common::*;
use magnet_harvest::config::{PhaseMode, UploadMode};
use magnet_harvest::proxy::BanLedger;
use magnet_harvest::scraper::ScrapeOptions;
use magnet_harvest::{run_pipeline, NoopCommit, PipelineOptions, RunOutcome};
use tempfile::TempDir;

fn pipeline_options(phase_mode: PhaseMode) -> PipelineOptions {
    PipelineOptions {
        scrape: ScrapeOptions {
            phase_mode,
            ..Default::default()
        },
        upload_mode: UploadMode::Daily,
    }
}

/// A clean run: rows scraped, adds made, bridge quiet → SUCCESS, exit 0.
#[tokio::test]
async fn test_full_run_success() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.scraper.end_page = 1;
    let ledger = BanLedger::load(&config.proxy.ban_ledger).unwrap();

    let source = FakePageSource::new();
    source.set(
        &index_url(1),
        CannedPage::Body(index_page(&[card(
            "/v/a",
            "A-1",
            &["含中字磁鏈", "今日新種"],
            "",
        )])),
    );
    source.set(
        &detail_url("/v/a"),
        CannedPage::Body(detail_page(
            "A-1",
            &[magnet_item("a", "A-1-C", &["字幕"], "2.0GB", "")],
        )),
    );

    let client = MockTorrentClient::new();
    let storage = MockDeepStorage::default();

    let status = run_pipeline(
        &source,
        &client,
        &storage,
        None,
        &ledger,
        &config,
        &pipeline_options(PhaseMode::One),
        &NoopCommit,
    )
    .await;

    assert_eq!(status.outcome, RunOutcome::Success);
    assert_eq!(status.outcome.exit_code(), 0);
    assert_eq!(status.rows_written, 1);
    assert_eq!(status.upload.as_ref().unwrap().added, 1);
    assert!(status.ban_delta.is_empty());
    assert!(status.critical_causes.is_empty());
    assert!(status.subject().contains("SUCCESS"));
}

/// Nothing new on the catalog → SUCCESS_EMPTY, still exit 0, still reported.
#[tokio::test]
async fn test_empty_run_is_success_empty() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.scraper.end_page = 1;
    let ledger = BanLedger::load(&config.proxy.ban_ledger).unwrap();

    let source = FakePageSource::new();
    source.set(&index_url(1), CannedPage::Body(empty_index_page()));

    let client = MockTorrentClient::new();
    let storage = MockDeepStorage::default();

    let status = run_pipeline(
        &source,
        &client,
        &storage,
        None,
        &ledger,
        &config,
        &pipeline_options(PhaseMode::One),
        &NoopCommit,
    )
    .await;

    assert_eq!(status.outcome, RunOutcome::SuccessEmpty);
    assert_eq!(status.outcome.exit_code(), 0);
    assert_eq!(client.add_count(), 0);
}

/// Pool exhaustion short-circuits the run: distinct outcome, exit 2, later
/// steps skipped.
#[tokio::test]
async fn test_proxy_ban_outage_short_circuits() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.scraper.end_page = 1;
    let ledger = BanLedger::load(&config.proxy.ban_ledger).unwrap();

    let source = FakePageSource::new();
    source.set(&index_url(1), CannedPage::NoProxy);

    let client = MockTorrentClient::new();
    let storage = MockDeepStorage::default();

    let status = run_pipeline(
        &source,
        &client,
        &storage,
        None,
        &ledger,
        &config,
        &pipeline_options(PhaseMode::One),
        &NoopCommit,
    )
    .await;

    assert_eq!(status.outcome, RunOutcome::FailedProxyBanned);
    assert_eq!(status.outcome.exit_code(), 2);
    assert_eq!(client.add_count(), 0, "uploader must not run");
    assert!(storage.submitted.lock().unwrap().is_empty());
}

/// Torrent-client login refusal after a good scrape → FAILED_CRITICAL with
/// an auth cause; the report survives for a manual retry.
#[tokio::test]
async fn test_uploader_auth_failure_is_critical() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.scraper.end_page = 1;
    let ledger = BanLedger::load(&config.proxy.ban_ledger).unwrap();

    let source = FakePageSource::new();
    source.set(
        &index_url(1),
        CannedPage::Body(index_page(&[card(
            "/v/a",
            "A-1",
            &["含中字磁鏈", "今日新種"],
            "",
        )])),
    );
    source.set(
        &detail_url("/v/a"),
        CannedPage::Body(detail_page(
            "A-1",
            &[magnet_item("a", "A-1-C", &["字幕"], "2.0GB", "")],
        )),
    );

    let client = MockTorrentClient::refusing_login();
    let storage = MockDeepStorage::default();

    let status = run_pipeline(
        &source,
        &client,
        &storage,
        None,
        &ledger,
        &config,
        &pipeline_options(PhaseMode::One),
        &NoopCommit,
    )
    .await;

    assert_eq!(status.outcome, RunOutcome::FailedCritical);
    assert_eq!(status.outcome.exit_code(), 1);
    assert!(status
        .critical_causes
        .iter()
        .any(|c| c.contains("login failed")));

    // The report is still on disk with its magnet unmarked
    let report_dir = &config.reports.daily_dir;
    assert!(report_dir.exists());
}

/// A total index outage (no bans involved) is critical with exit 1.
#[tokio::test]
async fn test_total_outage_is_critical() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.scraper.end_page = 1;
    let ledger = BanLedger::load(&config.proxy.ban_ledger).unwrap();

    let source = FakePageSource::new();
    source.set(&index_url(1), CannedPage::Transient);

    let client = MockTorrentClient::new();
    let storage = MockDeepStorage::default();

    let status = run_pipeline(
        &source,
        &client,
        &storage,
        None,
        &ledger,
        &config,
        &pipeline_options(PhaseMode::One),
        &NoopCommit,
    )
    .await;

    assert_eq!(status.outcome, RunOutcome::FailedCritical);
    assert_eq!(status.outcome.exit_code(), 1);
}

/// Aged torrents get bridged to deep storage and removed from the client.
#[tokio::test]
async fn test_bridge_moves_aged_torrents() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.scraper.end_page = 1;
    config.deep_storage.age_days = 3;
    let ledger = BanLedger::load(&config.proxy.ban_ledger).unwrap();

    let source = FakePageSource::new();
    source.set(&index_url(1), CannedPage::Body(empty_index_page()));

    let client = MockTorrentClient::new();
    let old_enough = chrono::Utc::now().timestamp() - 10 * 24 * 3600;
    client.torrents.lock().unwrap().push(
        magnet_harvest::uploader::TorrentHandle {
            hash: "abc123".into(),
            name: "old torrent".into(),
            added_on: old_enough,
            category: config.torrent_client.category_daily.clone(),
            magnet_uri: "magnet:?xt=urn:btih:old".into(),
        },
    );
    let storage = MockDeepStorage::default();

    let status = run_pipeline(
        &source,
        &client,
        &storage,
        None,
        &ledger,
        &config,
        &pipeline_options(PhaseMode::One),
        &NoopCommit,
    )
    .await;

    let bridge = status.bridge.unwrap();
    assert_eq!(bridge.candidates, 1);
    assert_eq!(bridge.ok, 1);
    assert_eq!(
        client.deletes.lock().unwrap().as_slice(),
        &["abc123".to_string()]
    );
}
