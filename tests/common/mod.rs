//! Shared fixtures: a canned page source, a mock torrent client, a mock
//! deep-storage service, and HTML builders matching the catalog markup.

// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use magnet_harvest::config::Config;
use magnet_harvest::deep_storage::{DeepStorageClient, TransferState};
use magnet_harvest::error_handling::{BanReason, FetchError, UploadError};
use magnet_harvest::http::PageSource;
use magnet_harvest::proxy::ProxyModule;
use magnet_harvest::uploader::{AddOutcome, AddRequest, TorrentClient, TorrentHandle};
use tempfile::TempDir;

/// What the fake source should do for a URL.
#[derive(Clone)]
pub enum CannedPage {
    Body(String),
    NoProxy,
    Ban,
    Auth,
    Transient,
}

/// A [`PageSource`] serving canned bodies, counting fetches per URL.
#[derive(Default)]
pub struct FakePageSource {
    pages: Mutex<HashMap<String, CannedPage>>,
    fetch_counts: Mutex<HashMap<String, u32>>,
}

impl FakePageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, page: CannedPage) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), page);
    }

    pub fn fetch_count(&self, url: &str) -> u32 {
        *self.fetch_counts.lock().unwrap().get(url).unwrap_or(&0)
    }
}

#[async_trait]
impl PageSource for FakePageSource {
    async fn fetch_page(&self, url: &str, _module: ProxyModule) -> Result<String, FetchError> {
        *self
            .fetch_counts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let page = self.pages.lock().unwrap().get(url).cloned();
        match page {
            Some(CannedPage::Body(body)) => Ok(body),
            Some(CannedPage::NoProxy) => Err(FetchError::NoProxyAvailable),
            Some(CannedPage::Ban) => Err(FetchError::Ban {
                url: url.to_string(),
                reason: BanReason::PersistentForbidden,
            }),
            Some(CannedPage::Auth) => Err(FetchError::Auth {
                url: url.to_string(),
                detail: "session rejected".into(),
            }),
            Some(CannedPage::Transient) | None => Err(FetchError::TransientHttp {
                url: url.to_string(),
                status: 503,
            }),
        }
    }
}

/// How the mock client should answer `login`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LoginBehavior {
    Ok,
    AuthFailed,
}

/// A [`TorrentClient`] that records add calls.
pub struct MockTorrentClient {
    pub login_behavior: LoginBehavior,
    pub add_outcome: AddOutcome,
    pub adds: Mutex<Vec<AddRequest>>,
    pub deletes: Mutex<Vec<String>>,
    pub torrents: Mutex<Vec<TorrentHandle>>,
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self {
            login_behavior: LoginBehavior::Ok,
            add_outcome: AddOutcome::Added,
            adds: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            torrents: Mutex::new(Vec::new()),
        }
    }

    pub fn refusing_login() -> Self {
        Self {
            login_behavior: LoginBehavior::AuthFailed,
            ..Self::new()
        }
    }

    pub fn add_count(&self) -> usize {
        self.adds.lock().unwrap().len()
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    async fn probe(&self) -> Result<(), UploadError> {
        Ok(())
    }

    async fn login(&self) -> Result<(), UploadError> {
        match self.login_behavior {
            LoginBehavior::Ok => Ok(()),
            LoginBehavior::AuthFailed => {
                Err(UploadError::AuthFailed("bad credentials".into()))
            }
        }
    }

    async fn add(&self, request: &AddRequest) -> AddOutcome {
        self.adds.lock().unwrap().push(request.clone());
        self.add_outcome
    }

    async fn list_recent(
        &self,
        since: i64,
        categories: &[String],
    ) -> Result<Vec<TorrentHandle>, UploadError> {
        Ok(self
            .torrents
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.added_on >= since && categories.contains(&t.category))
            .cloned()
            .collect())
    }

    async fn delete(&self, hash: &str, _delete_files: bool) -> Result<(), UploadError> {
        self.deletes.lock().unwrap().push(hash.to_string());
        Ok(())
    }
}

/// A deep-storage service that accepts everything.
#[derive(Default)]
pub struct MockDeepStorage {
    pub submitted: Mutex<Vec<String>>,
}

#[async_trait]
impl DeepStorageClient for MockDeepStorage {
    async fn login(&self, _email: &str, _pass: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn submit_batch(&self, magnets: &[String]) -> anyhow::Result<String> {
        self.submitted.lock().unwrap().extend(magnets.iter().cloned());
        Ok("batch-1".into())
    }

    async fn status(&self, _batch_id: &str) -> anyhow::Result<Vec<(String, TransferState)>> {
        Ok(self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .map(|m| (m.clone(), TransferState::Ok))
            .collect())
    }
}

/// Base URL used by test configs.
pub const BASE_URL: &str = "https://catalog.test";

/// A config rooted in a temp dir with all pacing zeroed.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::with_defaults();
    config.scraper.base_url = BASE_URL.to_string();
    config.scraper.page_sleep = std::time::Duration::ZERO;
    config.scraper.detail_sleep = std::time::Duration::ZERO;
    config.scraper.entry_sleep = std::time::Duration::ZERO;
    config.torrent_client.inter_add_delay = std::time::Duration::ZERO;
    config.deep_storage.request_delay = std::time::Duration::ZERO;
    config.history_path = dir.path().join("history.csv");
    config.proxy.ban_ledger = dir.path().join("proxy_bans.csv");
    config.reports.daily_dir = dir.path().join("DailyReport");
    config.reports.adhoc_dir = dir.path().join("AdHoc");
    config
}

/// URL of index page `n` as the engine builds it.
pub fn index_url(page: u32) -> String {
    format!("{BASE_URL}/?page={page}")
}

/// URL of a detail page as the engine builds it.
pub fn detail_url(href: &str) -> String {
    format!("{BASE_URL}{href}")
}

/// One index card.
pub fn card(href: &str, code: &str, tags: &[&str], score: &str) -> String {
    let tag_spans: String = tags
        .iter()
        .map(|t| format!(r#"<span class="tag">{t}</span>"#))
        .collect();
    format!(
        r#"<div class="item">
             <a class="box" href="{href}" title="{code} title">
               <div class="video-title">{code}</div>
               <div class="score"><span class="value">{score}</span></div>
               <div class="tags has-addons">{tag_spans}</div>
             </a>
           </div>"#
    )
}

/// An index page holding the given cards.
pub fn index_page(cards: &[String]) -> String {
    format!(
        r#"<html><body><div class="movie-list h cols-4 vcols-8">{}</div></body></html>"#,
        cards.join("")
    )
}

/// An index page with no entries (terminal condition for `all` mode).
pub fn empty_index_page() -> String {
    index_page(&[])
}

/// One magnet row on a detail page.
pub fn magnet_item(hash: &str, name: &str, tags: &[&str], size: &str, time: &str) -> String {
    let tag_spans: String = tags
        .iter()
        .map(|t| format!(r#"<span class="tag">{t}</span>"#))
        .collect();
    format!(
        r#"<div class="item columns is-desktop">
             <div class="magnet-name">
               <a href="magnet:?xt=urn:btih:{hash}">
                 <span class="name">{name}</span>
                 <span class="meta">{size}, 1 file</span>
                 <div class="tags">{tag_spans}</div>
               </a>
             </div>
             <div class="date"><span class="time">{time}</span></div>
           </div>"#
    )
}

/// A detail page with the given magnet rows.
pub fn detail_page(code: &str, magnets: &[String]) -> String {
    format!(
        r#"<html><body>
             <a class="button is-white copy-to-clipboard" data-clipboard-text="{code}"></a>
             <div class="video-detail"></div>
             <div id="magnets-content">{}</div>
           </body></html>"#,
        magnets.join("")
    )
}
