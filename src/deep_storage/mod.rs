//! Deep-storage bridge: moves aged torrents out of the client into a remote
//! storage service.
//!
//! The service is an external collaborator; the core depends only on the
//! [`DeepStorageClient`] operations and treats its per-magnet failures as
//! non-critical. Only a connectivity outage is worth escalating.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::DeepStorageConfig;
use crate::uploader::TorrentClient;

/// Per-magnet transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferState {
    Ok,
    Pending,
    Failed,
}

/// The operations the bridge needs from the storage service.
#[async_trait]
pub trait DeepStorageClient: Send + Sync {
    /// Authenticates with the service.
    async fn login(&self, email: &str, pass: &str) -> anyhow::Result<()>;

    /// Submits a batch of magnets; returns a batch id for polling.
    async fn submit_batch(&self, magnets: &[String]) -> anyhow::Result<String>;

    /// Per-magnet state of a batch.
    async fn status(&self, batch_id: &str) -> anyhow::Result<Vec<(String, TransferState)>>;
}

/// What the bridge step did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BridgeSummary {
    /// Torrents old enough to bridge.
    pub candidates: u32,
    pub submitted: u32,
    pub ok: u32,
    pub pending: u32,
    pub failed: u32,
    /// The service itself was unreachable; the pipeline reports this louder
    /// than individual failures.
    pub connectivity_outage: bool,
}

/// Bridges torrents older than the configured age into deep storage and
/// removes the fully-transferred ones from the client.
///
/// Never returns an error: bridge problems degrade the summary instead of
/// failing the pipeline.
pub async fn run_bridge<C: TorrentClient, D: DeepStorageClient>(
    torrent_client: &C,
    storage: &D,
    config: &DeepStorageConfig,
    categories: &[String],
) -> BridgeSummary {
    let mut summary = BridgeSummary::default();

    let cutoff = Utc::now().timestamp() - i64::from(config.age_days) * 24 * 3600;
    let handles = match torrent_client.list_recent(0, categories).await {
        Ok(handles) => handles,
        Err(e) => {
            warn!("Bridge could not list torrents: {e}");
            summary.connectivity_outage = true;
            return summary;
        }
    };

    let aged: Vec<_> = handles
        .into_iter()
        .filter(|h| h.added_on > 0 && h.added_on <= cutoff && !h.magnet_uri.is_empty())
        .collect();
    summary.candidates = aged.len() as u32;
    if aged.is_empty() {
        info!("No torrents older than {} days to bridge", config.age_days);
        return summary;
    }

    if let Err(e) = storage.login(&config.email, &config.pass).await {
        warn!("Deep-storage login failed: {e}");
        summary.connectivity_outage = true;
        return summary;
    }
    tokio::time::sleep(config.request_delay).await;

    let magnets: Vec<String> = aged.iter().map(|h| h.magnet_uri.clone()).collect();
    let batch_id = match storage.submit_batch(&magnets).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Deep-storage batch submit failed: {e}");
            summary.failed = summary.candidates;
            return summary;
        }
    };
    summary.submitted = magnets.len() as u32;
    tokio::time::sleep(config.request_delay).await;

    let states = match storage.status(&batch_id).await {
        Ok(states) => states,
        Err(e) => {
            warn!("Deep-storage status poll failed: {e}");
            summary.pending = summary.submitted;
            return summary;
        }
    };

    for (magnet, state) in states {
        match state {
            TransferState::Ok => {
                summary.ok += 1;
                if let Some(handle) = aged.iter().find(|h| h.magnet_uri == magnet) {
                    tokio::time::sleep(config.request_delay).await;
                    if let Err(e) = torrent_client.delete(&handle.hash, false).await {
                        warn!("Could not remove bridged torrent {}: {e}", handle.hash);
                    } else {
                        debug!("Removed bridged torrent {}", handle.hash);
                    }
                }
            }
            TransferState::Pending => summary.pending += 1,
            TransferState::Failed => summary.failed += 1,
        }
    }

    info!(
        "Bridge: {} candidates, {} ok, {} pending, {} failed",
        summary.candidates, summary.ok, summary.pending, summary.failed
    );
    summary
}

/// HTTP implementation of the storage service API.
pub struct HttpDeepStorageClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    batch_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    items: Vec<StatusItem>,
}

#[derive(Deserialize)]
struct StatusItem {
    magnet: String,
    state: TransferState,
}

impl HttpDeepStorageClient {
    /// Builds the client; `proxy_url` is set when the `pikpak` module is
    /// routed through the proxy pool.
    pub fn new(base_url: impl Into<String>, proxy_url: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl DeepStorageClient for HttpDeepStorageClient {
    async fn login(&self, email: &str, pass: &str) -> anyhow::Result<()> {
        let url = format!("{}/v1/auth/login", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&LoginBody {
                email,
                password: pass,
            })
            .send()
            .await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "deep-storage login returned {}",
            resp.status()
        );
        Ok(())
    }

    async fn submit_batch(&self, magnets: &[String]) -> anyhow::Result<String> {
        let url = format!("{}/v1/transfers", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "magnets": magnets }))
            .send()
            .await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "deep-storage submit returned {}",
            resp.status()
        );
        let body: SubmitResponse = resp.json().await?;
        Ok(body.batch_id)
    }

    async fn status(&self, batch_id: &str) -> anyhow::Result<Vec<(String, TransferState)>> {
        let url = format!("{}/v1/transfers/{batch_id}", self.base_url);
        let resp = self.http.get(&url).send().await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "deep-storage status returned {}",
            resp.status()
        );
        let body: StatusResponse = resp.json().await?;
        Ok(body
            .items
            .into_iter()
            .map(|item| (item.magnet, item.state))
            .collect())
    }
}
