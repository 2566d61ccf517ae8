//! Error type definitions.
//!
//! The error taxonomy is deliberately small: `Network` and `TransientHttp`
//! are retried locally, `Ban` is routed to the proxy pool, `Auth` and `Io`
//! abort the run, `Parse` skips the entry, and `LogicGuard` is a fail-fast
//! bug indicator.

use std::path::PathBuf;

use thiserror::Error;

/// Classification of a completed HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchClass {
    /// Usable response.
    Ok,
    /// 5xx / 429 / similar; worth retrying.
    Transient,
    /// The catalog has blocked this source address.
    Ban,
    /// Connect, DNS, reset, timeout; worth retrying.
    Network,
    /// Session cookie rejected or credentials wrong.
    Auth,
}

/// Why a proxy was placed on cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanReason {
    /// Persistent 403 on catalog pages.
    PersistentForbidden,
    /// Redirect loop into login/age-gate while a session cookie was sent.
    AuthLoop,
    /// Challenge page the bypass service could not clear.
    ChallengeUnsolved,
    /// Consecutive-failure budget exhausted.
    MaxFailures,
}

impl BanReason {
    /// Stable code stored in the ban ledger's `reason` column.
    pub fn code(&self) -> &'static str {
        match self {
            BanReason::PersistentForbidden => "forbidden",
            BanReason::AuthLoop => "auth_loop",
            BanReason::ChallengeUnsolved => "challenge",
            BanReason::MaxFailures => "max_failures",
        }
    }

    /// Human description stored next to the code.
    pub fn describe(&self) -> &'static str {
        match self {
            BanReason::PersistentForbidden => "persistent 403 from the catalog",
            BanReason::AuthLoop => "redirected to login/age gate with a valid session",
            BanReason::ChallengeUnsolved => "challenge page not cleared by bypass",
            BanReason::MaxFailures => "too many consecutive failures",
        }
    }

    /// Parses a ledger `reason` code back into a variant.
    pub fn from_code(code: &str) -> Option<BanReason> {
        match code {
            "forbidden" => Some(BanReason::PersistentForbidden),
            "auth_loop" => Some(BanReason::AuthLoop),
            "challenge" => Some(BanReason::ChallengeUnsolved),
            "max_failures" => Some(BanReason::MaxFailures),
            _ => None,
        }
    }
}

/// Failure of a single page fetch, after retries.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network-level failure that survived the retry budget.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Transient HTTP failure that survived the retry budget.
    #[error("transient HTTP {status} fetching {url}")]
    TransientHttp { url: String, status: u16 },

    /// The response classified as a ban.
    #[error("banned while fetching {url}: {}", .reason.describe())]
    Ban { url: String, reason: BanReason },

    /// Session cookie rejected by the catalog.
    #[error("authentication failed fetching {url}: {detail}")]
    Auth { url: String, detail: String },

    /// The proxy pool has no usable entry left.
    #[error("no proxy available")]
    NoProxyAvailable,
}

/// Proxy pool selection failure.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// Every configured proxy is banned or cooling down.
    #[error("no proxy available: all entries banned or cooling down")]
    NoProxyAvailable,
}

/// History store failure. `Io` and `Schema` abort the run.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Another process holds the write session.
    #[error("history file is locked: {0}")]
    Locked(PathBuf),

    /// The file violates an invariant (bad header, create_date after
    /// update_date, ...). Fail fast: continuing would corrupt state.
    #[error("history schema violation: {0}")]
    Schema(String),
}

/// Ban ledger failure.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ban ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ban ledger CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A record claims to be active but its expiry is in the past.
    #[error("ban ledger invariant violated: {0}")]
    LogicGuard(String),
}

/// Scrape run failure (the per-run verdicts the binary maps to exit codes).
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// The pool was exhausted by bans; exit code 2.
    #[error("proxy pool exhausted by bans")]
    ProxyBanOutage,

    /// Every attempted index page failed; exit code 1.
    #[error("total outage: all {pages} index pages failed")]
    TotalOutage { pages: u32 },

    /// The catalog rejected the session cookie.
    #[error("catalog authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Uploader failure.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Torrent client rejected the credentials.
    #[error("torrent client login failed: {0}")]
    AuthFailed(String),

    /// Client unreachable.
    #[error("torrent client unreachable: {0}")]
    Unreachable(String),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ban_reason_code_round_trip() {
        for reason in [
            BanReason::PersistentForbidden,
            BanReason::AuthLoop,
            BanReason::ChallengeUnsolved,
            BanReason::MaxFailures,
        ] {
            assert_eq!(BanReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(BanReason::from_code("bogus"), None);
    }

    #[test]
    fn test_fetch_error_display_names_url() {
        let err = FetchError::TransientHttp {
            url: "https://x/1".into(),
            status: 503,
        };
        let text = err.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("https://x/1"));
    }
}
