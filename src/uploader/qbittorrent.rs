//! qBittorrent Web-UI client.
//!
//! The uploader only depends on the [`TorrentClient`] trait; this is the
//! production implementation against the v2 Web API. Sessions ride on the
//! client's cookie store.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Deserialize;

use crate::config::TorrentClientConfig;
use crate::error_handling::UploadError;

/// One add request, fully resolved (category and flags included).
#[derive(Debug, Clone)]
pub struct AddRequest {
    pub magnet: String,
    /// Display name for the torrent in the client.
    pub title: String,
    pub category: String,
    pub save_path: String,
    pub auto_start: bool,
    pub skip_checking: bool,
}

/// Per-torrent add result. `Rejected` is non-critical; a run where every
/// attempted add fails is escalated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Rejected,
    NetworkError,
}

/// A torrent known to the client.
#[derive(Debug, Clone, Deserialize)]
pub struct TorrentHandle {
    pub hash: String,
    pub name: String,
    /// Unix seconds the torrent was added.
    #[serde(default)]
    pub added_on: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub magnet_uri: String,
}

/// The operations the uploader and the deep-storage bridge need from a
/// torrent client. Mockable in tests.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Cheap connectivity probe, run before bothering with credentials.
    async fn probe(&self) -> Result<(), UploadError>;

    /// Authenticates; the session is cached by the implementation.
    async fn login(&self) -> Result<(), UploadError>;

    /// Adds one torrent.
    async fn add(&self, request: &AddRequest) -> AddOutcome;

    /// Torrents added since `since` (unix seconds) in the given categories.
    /// `since = 0` lists everything in those categories.
    async fn list_recent(
        &self,
        since: i64,
        categories: &[String],
    ) -> Result<Vec<TorrentHandle>, UploadError>;

    /// Removes a torrent, optionally with its files.
    async fn delete(&self, hash: &str, delete_files: bool) -> Result<(), UploadError>;
}

/// Production client for a qBittorrent Web UI.
pub struct QbClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    pass: String,
}

impl QbClient {
    /// Builds the client. The HTTP client carries a cookie store so the
    /// login session persists across calls. When the proxy configuration
    /// routes the `qbittorrent` module through the pool, `proxy_url` pins
    /// the outbound proxy for the whole session.
    pub fn new(config: &TorrentClientConfig, proxy_url: Option<&str>) -> Result<Self, UploadError> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout);
        if let Some(url) = proxy_url {
            let proxy =
                reqwest::Proxy::all(url).map_err(|e| UploadError::Unreachable(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| UploadError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: format!("http://{}:{}", config.host, config.port),
            user: config.user.clone(),
            pass: config.pass.clone(),
        })
    }
}

#[async_trait]
impl TorrentClient for QbClient {
    async fn probe(&self) -> Result<(), UploadError> {
        let url = format!("{}/api/v2/app/version", self.base_url);
        match self.http.get(&url).send().await {
            // 403 means reachable but unauthenticated, which is fine here
            Ok(resp) if resp.status().is_success() || resp.status().as_u16() == 403 => {
                debug!("Torrent client reachable at {}", self.base_url);
                Ok(())
            }
            Ok(resp) => Err(UploadError::Unreachable(format!(
                "unexpected status {} from version probe",
                resp.status()
            ))),
            Err(e) => Err(UploadError::Unreachable(e.to_string())),
        }
    }

    async fn login(&self) -> Result<(), UploadError> {
        let url = format!("{}/api/v2/auth/login", self.base_url);
        let params = [("username", self.user.as_str()), ("password", self.pass.as_str())];

        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| UploadError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(UploadError::AuthFailed(format!(
                "login returned {}",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| UploadError::Unreachable(e.to_string()))?;
        if body.trim() == "Ok." {
            info!("Logged in to torrent client");
            Ok(())
        } else {
            Err(UploadError::AuthFailed(format!("login body: {body}")))
        }
    }

    async fn add(&self, request: &AddRequest) -> AddOutcome {
        let url = format!("{}/api/v2/torrents/add", self.base_url);
        let add_paused = (!request.auto_start).to_string();
        let skip_checking = request.skip_checking.to_string();
        let params = [
            ("urls", request.magnet.as_str()),
            ("rename", request.title.as_str()),
            ("category", request.category.as_str()),
            ("savepath", request.save_path.as_str()),
            ("skip_checking", skip_checking.as_str()),
            ("addPaused", add_paused.as_str()),
        ];

        match self.http.post(&url).form(&params).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.text().await.as_deref() {
                    Ok("Fails.") => {
                        warn!("Client rejected torrent '{}'", request.title);
                        AddOutcome::Rejected
                    }
                    Ok(_) => {
                        debug!("Added '{}' to category {}", request.title, request.category);
                        AddOutcome::Added
                    }
                    Err(_) => AddOutcome::NetworkError,
                }
            }
            Ok(resp) => {
                warn!(
                    "Add of '{}' returned status {}",
                    request.title,
                    resp.status()
                );
                AddOutcome::Rejected
            }
            Err(e) => {
                error!("Add of '{}' failed: {e}", request.title);
                AddOutcome::NetworkError
            }
        }
    }

    async fn list_recent(
        &self,
        since: i64,
        categories: &[String],
    ) -> Result<Vec<TorrentHandle>, UploadError> {
        let url = format!("{}/api/v2/torrents/info", self.base_url);
        let mut handles = Vec::new();
        for category in categories {
            let resp = self
                .http
                .get(&url)
                .query(&[("category", category.as_str())])
                .send()
                .await
                .map_err(|e| UploadError::Unreachable(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(UploadError::Unreachable(format!(
                    "torrent list returned {}",
                    resp.status()
                )));
            }
            let batch: Vec<TorrentHandle> = resp
                .json()
                .await
                .map_err(|e| UploadError::Unreachable(e.to_string()))?;
            handles.extend(batch.into_iter().filter(|h| h.added_on >= since));
        }
        Ok(handles)
    }

    async fn delete(&self, hash: &str, delete_files: bool) -> Result<(), UploadError> {
        let url = format!("{}/api/v2/torrents/delete", self.base_url);
        let delete_files = delete_files.to_string();
        let params = [("hashes", hash), ("deleteFiles", delete_files.as_str())];
        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| UploadError::Unreachable(e.to_string()))?;
        if resp.status().is_success() {
            debug!("Deleted torrent {hash}");
            Ok(())
        } else {
            Err(UploadError::Unreachable(format!(
                "delete returned {}",
                resp.status()
            )))
        }
    }
}

/// Extracts the info hash from a magnet URI.
pub fn hash_from_magnet(magnet: &str) -> Option<String> {
    let start = magnet.find("btih:")? + "btih:".len();
    let hash: String = magnet[start..]
        .chars()
        .take_while(|c| *c != '&')
        .collect::<String>()
        .to_lowercase();
    if hash.len() >= 32 && hash.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(hash)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_from_magnet() {
        let magnet = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=x";
        assert_eq!(
            hash_from_magnet(magnet).as_deref(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
    }

    #[test]
    fn test_hash_from_magnet_rejects_malformed() {
        assert_eq!(hash_from_magnet("magnet:?xt=urn:btih:short"), None);
        assert_eq!(hash_from_magnet("https://example.com/x.torrent"), None);
    }

    #[test]
    fn test_hash_is_lowercased() {
        let magnet = "magnet:?xt=urn:btih:ABCDEF0123456789ABCDEF0123456789ABCDEF01";
        assert_eq!(
            hash_from_magnet(magnet).as_deref(),
            Some("abcdef0123456789abcdef0123456789abcdef01")
        );
    }
}
