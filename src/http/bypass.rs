//! Challenge-bypass URL rewriting.
//!
//! When enabled, catalog requests are rewritten to a local bypass service
//! that solves challenges on our behalf:
//! `https://host/path?q=1` → `http://{service}:{port}/path?q=1` with an
//! `x-hostname` header carrying the original host. Cookies pass through
//! unchanged; the service forwards them upstream.

use url::Url;

/// Where the bypass service listens.
#[derive(Debug, Clone)]
pub struct BypassRoute {
    host: String,
    port: u16,
}

impl BypassRoute {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Rewrites `target` to pass through the bypass service.
    ///
    /// Returns the rewritten URL plus the `x-hostname` value the request
    /// must carry. Targets without a host (cannot happen for catalog URLs)
    /// are passed back unchanged with no header.
    pub fn rewrite(&self, target: &Url) -> (String, Option<String>) {
        let Some(original_host) = target.host_str() else {
            return (target.to_string(), None);
        };
        let mut rewritten = format!("http://{}:{}{}", self.host, self.port, target.path());
        if let Some(query) = target.query() {
            rewritten.push('?');
            rewritten.push_str(query);
        }
        (rewritten, Some(original_host.to_string()))
    }
}
