//! The outbound HTTP client for catalog pages.
//!
//! One call = pacing, proxy selection, optional bypass rewriting, the retry
//! budget for transient failures, response classification, and outcome
//! reporting back to the proxy pool. Callers see a body or a typed
//! [`FetchError`]; they never see a status code they have to interpret.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::{BROWSER_HEADERS, BYPASS_HOSTNAME_HEADER, BYPASS_REFRESH_HEADER};
use crate::error_handling::{
    classify_response, classify_transport_error, is_retriable, retry_schedule, BanReason,
    FetchClass, FetchError,
};
use crate::http::bypass::BypassRoute;
use crate::http::pacing::{PaceClass, Pacer};
use crate::parse::tags;
use crate::proxy::{FailureKind, ProxyLease, ProxyModule, ProxyPool};

/// Anything that can produce a page body for a URL. The scraper engine works
/// against this seam so tests can feed it canned HTML.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches a page on behalf of `module`, returning its body.
    async fn fetch_page(&self, url: &str, module: ProxyModule) -> Result<String, FetchError>;
}

/// The real fetcher.
pub struct PageFetcher {
    direct: reqwest::Client,
    /// One client per proxy endpoint; reqwest binds proxies at build time.
    proxied: HashMap<String, reqwest::Client>,
    pool: Option<Arc<ProxyPool>>,
    proxy_modules: Vec<ProxyModule>,
    bypass: Option<BypassRoute>,
    pacer: Pacer,
    session_cookie: Option<String>,
}

impl PageFetcher {
    pub fn new(
        direct: reqwest::Client,
        proxied: HashMap<String, reqwest::Client>,
        pool: Option<Arc<ProxyPool>>,
        proxy_modules: Vec<ProxyModule>,
        bypass: Option<BypassRoute>,
        pacer: Pacer,
        session_cookie: Option<String>,
    ) -> Self {
        Self {
            direct,
            proxied,
            pool,
            proxy_modules,
            bypass,
            pacer,
            session_cookie,
        }
    }

    fn pace_class(module: ProxyModule) -> PaceClass {
        match module {
            ProxyModule::SpiderIndex => PaceClass::Index,
            ProxyModule::SpiderDetail => PaceClass::Detail,
            _ => PaceClass::Entry,
        }
    }

    fn headers(&self, bypass_host: Option<&str>, refresh_bypass: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in BROWSER_HEADERS {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        if let Some(cookie) = &self.session_cookie {
            if let Ok(value) = HeaderValue::from_str(&format!("_session={cookie}")) {
                headers.insert(reqwest::header::COOKIE, value);
            }
        }
        if let Some(host) = bypass_host {
            if let Ok(value) = HeaderValue::from_str(host) {
                headers.insert(HeaderName::from_static(BYPASS_HOSTNAME_HEADER), value);
            }
        }
        if refresh_bypass {
            headers.insert(
                HeaderName::from_static(BYPASS_REFRESH_HEADER),
                HeaderValue::from_static("true"),
            );
        }
        headers
    }

    /// Leases a proxy when `module` is routed through the pool.
    ///
    /// Bypass traffic always goes to the local service directly, so no lease
    /// is taken when the bypass front-end is enabled.
    fn lease_for(&self, module: ProxyModule) -> Result<Option<ProxyLease>, FetchError> {
        if self.bypass.is_some() {
            return Ok(None);
        }
        let Some(pool) = &self.pool else {
            return Ok(None);
        };
        if !module.enabled_in(&self.proxy_modules) {
            return Ok(None);
        }
        match pool.select() {
            Ok(lease) => Ok(Some(lease)),
            Err(_) => Err(FetchError::NoProxyAvailable),
        }
    }

    fn client_for(&self, lease: Option<&ProxyLease>) -> &reqwest::Client {
        lease
            .and_then(|l| self.proxied.get(&l.name))
            .unwrap_or(&self.direct)
    }

    fn report(&self, lease: Option<&ProxyLease>, outcome: Result<(), FailureKind>) {
        let (Some(pool), Some(lease)) = (&self.pool, lease) else {
            return;
        };
        match outcome {
            Ok(()) => pool.report_success(lease),
            Err(kind) => pool.report_failure(lease, kind),
        }
    }

    fn ban_reason(status: u16, final_url: &str, body: &str) -> BanReason {
        if status == crate::config::HTTP_STATUS_FORBIDDEN {
            BanReason::PersistentForbidden
        } else if tags::is_auth_redirect(final_url) {
            BanReason::AuthLoop
        } else if tags::is_challenge_page(body) {
            BanReason::ChallengeUnsolved
        } else {
            BanReason::PersistentForbidden
        }
    }

    /// One request/response exchange, classified.
    async fn exchange(
        &self,
        url: &str,
        lease: Option<&ProxyLease>,
        refresh_bypass: bool,
    ) -> Result<(u16, String, String), FetchError> {
        let (effective_url, bypass_host) = match (&self.bypass, Url::parse(url)) {
            (Some(route), Ok(parsed)) => route.rewrite(&parsed),
            _ => (url.to_string(), None),
        };

        let client = self.client_for(lease);
        let response = client
            .get(&effective_url)
            .headers(self.headers(bypass_host.as_deref(), refresh_bypass))
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            source: e,
        })?;
        Ok((status, final_url, body))
    }

    async fn fetch_inner(
        &self,
        url: &str,
        module: ProxyModule,
        follow_age_gate: bool,
    ) -> Result<String, FetchError> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        self.pacer.wait(&host, Self::pace_class(module)).await;

        let delays: Vec<std::time::Duration> = std::iter::once(std::time::Duration::ZERO)
            .chain(retry_schedule())
            .collect();

        let mut last_error: Option<FetchError> = None;
        for (attempt, delay) in delays.iter().enumerate() {
            if !delay.is_zero() {
                debug!(
                    "Retrying {url} in {:.1}s (attempt {})",
                    delay.as_secs_f64(),
                    attempt + 1
                );
                tokio::time::sleep(*delay).await;
            }

            let lease = self.lease_for(module)?;

            let (status, final_url, body) = match self.exchange(url, lease.as_ref(), false).await {
                Ok(exchange) => exchange,
                Err(FetchError::Network { url, source }) => {
                    let class = classify_transport_error(&source);
                    self.report(lease.as_ref(), Err(FailureKind::Transient));
                    let err = FetchError::Network { url, source };
                    if is_retriable(class) {
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(other) => return Err(other),
            };

            let mut class =
                classify_response(status, &final_url, &body, self.session_cookie.is_some());

            // A challenge page with the bypass front-end enabled gets one
            // immediate cache-refresh retry before it counts as a ban.
            let mut body = body;
            let mut final_url = final_url;
            let mut status = status;
            if class == FetchClass::Ban && self.bypass.is_some() && tags::is_challenge_page(&body) {
                debug!("Challenge page through bypass, forcing cache refresh for {url}");
                if let Ok((s2, f2, b2)) = self.exchange(url, lease.as_ref(), true).await {
                    status = s2;
                    final_url = f2;
                    body = b2;
                    class = classify_response(
                        status,
                        &final_url,
                        &body,
                        self.session_cookie.is_some(),
                    );
                }
            }
            if self.bypass.is_some() && tags::is_bypass_failure(&body) {
                class = FetchClass::Transient;
            }

            match class {
                FetchClass::Ok => {
                    self.report(lease.as_ref(), Ok(()));
                    if follow_age_gate {
                        if let Some(cleared) = self.clear_age_gate(url, &body).await {
                            return Ok(cleared);
                        }
                    }
                    return Ok(body);
                }
                FetchClass::Transient => {
                    self.report(lease.as_ref(), Err(FailureKind::Transient));
                    last_error = Some(FetchError::TransientHttp {
                        url: url.to_string(),
                        status,
                    });
                    continue;
                }
                FetchClass::Network => {
                    self.report(lease.as_ref(), Err(FailureKind::Transient));
                    last_error = Some(FetchError::TransientHttp {
                        url: url.to_string(),
                        status,
                    });
                    continue;
                }
                FetchClass::Ban => {
                    let reason = Self::ban_reason(status, &final_url, &body);
                    self.report(lease.as_ref(), Err(FailureKind::Ban(reason)));
                    return Err(FetchError::Ban {
                        url: url.to_string(),
                        reason,
                    });
                }
                FetchClass::Auth => {
                    return Err(FetchError::Auth {
                        url: url.to_string(),
                        detail: format!("status {status}, landed on {final_url}"),
                    });
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::TransientHttp {
            url: url.to_string(),
            status: 0,
        }))
    }

    /// Handles the age-verification modal: when a page carries the modal but
    /// no catalog content, confirm once and re-fetch. Returns the re-fetched
    /// body, or `None` when the page needed no clearing (or clearing failed,
    /// in which case the original body is the best we have).
    ///
    /// Uses single exchanges rather than the full retry path: the
    /// confirmation is best-effort and must not recurse into pacing.
    async fn clear_age_gate(&self, url: &str, body: &str) -> Option<String> {
        let confirm_href = {
            let html = scraper::Html::parse_document(body);
            if tags::has_catalog_content(&html) {
                return None;
            }
            tags::age_confirm_href(&html)?
        };

        let confirm_url = Url::parse(url)
            .ok()
            .and_then(|base| base.join(&confirm_href).ok())?
            .to_string();
        debug!("Age gate on {url}, confirming via {confirm_url}");

        let lease = match self.lease_for(ProxyModule::SpiderAgeVerification) {
            Ok(lease) => lease,
            Err(_) => return None,
        };

        match self.exchange(&confirm_url, lease.as_ref(), false).await {
            Ok((status, _, _)) if (200..400).contains(&status) => {}
            Ok((status, _, _)) => {
                warn!("Age-gate confirmation returned status {status}");
                return None;
            }
            Err(e) => {
                warn!("Age-gate confirmation failed: {e}");
                return None;
            }
        }

        match self.exchange(url, lease.as_ref(), false).await {
            Ok((status, final_url, body))
                if classify_response(status, &final_url, &body, self.session_cookie.is_some())
                    == FetchClass::Ok =>
            {
                Some(body)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Re-fetch after age gate failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch_page(&self, url: &str, module: ProxyModule) -> Result<String, FetchError> {
        self.fetch_inner(url, module, true).await
    }
}
