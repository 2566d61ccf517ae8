//! Compile-time constants shared across the crate.

use std::time::Duration;

/// Default User-Agent header. A realistic desktop Chrome build; the catalog
/// serves a challenge page to anything that looks like a bot.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Browser-like headers merged into every catalog request.
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,\
         image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    ),
    ("Accept-Language", "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
    ("Cache-Control", "max-age=0"),
];

/// Header carrying the original hostname through the challenge-bypass service.
pub const BYPASS_HOSTNAME_HEADER: &str = "x-hostname";

/// Header that forces the bypass service to refresh its clearance cache.
pub const BYPASS_REFRESH_HEADER: &str = "x-bypass-cache";

/// A bypass response smaller than this that also carries the failure keyword
/// is treated as a bypass failure rather than real page content.
pub const BYPASS_FAILURE_MAX_BYTES: usize = 1000;

/// Initial retry delay in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;

/// Backoff multiplier applied per retry.
pub const RETRY_FACTOR: u64 = 2;

/// Retry delays are capped at this many seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 10;

/// Retries after the initial attempt for transient/network failures.
pub const RETRY_MAX_ATTEMPTS: usize = 2;

/// Hard per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timestamp format used in every on-disk table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compact date used in report file names (`Harvest_20250102.csv`).
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Proxy cooldown after a ban: 8 days. The catalog bans source IPs for 7
/// days; the extra day keeps a just-unbanned proxy from being re-burned by a
/// clock-skewed scheduler.
pub const DEFAULT_COOLDOWN_SECS: u64 = 8 * 24 * 3600;

/// Consecutive failures before a proxy is treated as banned.
pub const DEFAULT_MAX_FAILURES: u32 = 3;

/// HTTP status codes the classifier cares about by name.
pub const HTTP_STATUS_FORBIDDEN: u16 = 403;
pub const HTTP_STATUS_UNAUTHORIZED: u16 = 401;
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Default Phase 2 admission thresholds (both configurable).
pub const DEFAULT_PHASE2_MIN_RATE: f64 = 4.0;
pub const DEFAULT_PHASE2_MIN_COMMENTS: u32 = 85;

/// Default pacing intervals.
pub const DEFAULT_PAGE_SLEEP: Duration = Duration::from_secs(2);
pub const DEFAULT_DETAIL_SLEEP: Duration = Duration::from_secs(5);
pub const DEFAULT_ENTRY_SLEEP: Duration = Duration::from_secs(1);

/// Default delay between successive torrent-client add calls.
pub const DEFAULT_INTER_ADD_DELAY: Duration = Duration::from_secs(1);

/// Default request-delay floor for the deep-storage bridge.
pub const DEFAULT_DEEP_STORAGE_DELAY: Duration = Duration::from_secs(2);
