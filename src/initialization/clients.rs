//! HTTP client and fetcher construction.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use log::warn;

use crate::config::{Config, REQUEST_TIMEOUT};
use crate::http::{BypassRoute, PageFetcher, Pacer};
use crate::proxy::{BanLedger, ProxyEndpoint, ProxyPool};

/// A catalog-facing `reqwest::Client`: browser UA, cookie store, gzip,
/// rustls, bounded timeout.
pub fn init_direct_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .cookie_store(true)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// One client per proxy endpoint. reqwest binds a proxy at build time, so
/// per-request proxy selection means selecting among prebuilt clients.
pub fn init_proxied_clients(
    config: &Config,
    endpoints: &[ProxyEndpoint],
) -> HashMap<String, reqwest::Client> {
    let mut clients = HashMap::new();
    for endpoint in endpoints {
        let Some(url) = endpoint.effective_url() else {
            continue;
        };
        let proxy = match reqwest::Proxy::all(url) {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!("Invalid proxy URL for '{}': {e}", endpoint.name);
                continue;
            }
        };
        match reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .proxy(proxy)
            .build()
        {
            Ok(client) => {
                clients.insert(endpoint.name.clone(), client);
            }
            Err(e) => warn!("Failed to build client for proxy '{}': {e}", endpoint.name),
        }
    }
    clients
}

/// Builds the full fetch stack: ledger, pool (when proxying is on), pacer,
/// bypass route, and the [`PageFetcher`] tying them together.
pub fn build_fetcher(
    config: &Config,
    use_proxy: bool,
    use_bypass: bool,
) -> anyhow::Result<(PageFetcher, Option<Arc<ProxyPool>>, Arc<BanLedger>)> {
    let ledger = Arc::new(
        BanLedger::load(&config.proxy.ban_ledger).context("Failed to load ban ledger")?,
    );

    let pool = if use_proxy && !config.proxy.pool.is_empty() {
        Some(Arc::new(ProxyPool::new(
            config.proxy.mode,
            config.proxy.pool.clone(),
            config.proxy.max_failures,
            config.proxy.cooldown_seconds,
            Arc::clone(&ledger),
        )))
    } else {
        if use_proxy {
            warn!("--use-proxy set but no proxies configured; going direct");
        }
        None
    };

    let direct = init_direct_client(config)?;
    let proxied = match &pool {
        Some(pool) => init_proxied_clients(config, &pool.endpoints()),
        None => HashMap::new(),
    };

    let bypass = if use_bypass && config.bypass.enabled {
        Some(BypassRoute::new("127.0.0.1", config.bypass.service_port))
    } else {
        None
    };

    let pacer = Pacer::new(
        config.scraper.page_sleep,
        config.scraper.detail_sleep,
        config.scraper.entry_sleep,
    );

    let fetcher = PageFetcher::new(
        direct,
        proxied,
        pool.clone(),
        config.proxy.modules.clone(),
        bypass,
        pacer,
        config.session_cookie.clone(),
    );
    Ok((fetcher, pool, ledger))
}
