//! Response classification and retry strategy.
//!
//! Ban detection is concentrated here: one decision function over
//! (status, final URL, body, session presence), so the proxy pool stays
//! policy-free and call sites never improvise their own heuristics.

use std::time::Duration;

use rand::Rng;
use tokio_retry::strategy::ExponentialBackoff;

use super::types::FetchClass;
use crate::config::{
    HTTP_STATUS_FORBIDDEN, HTTP_STATUS_TOO_MANY_REQUESTS, HTTP_STATUS_UNAUTHORIZED,
    RETRY_FACTOR, RETRY_INITIAL_DELAY_MS, RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_SECS,
};
use crate::parse::tags;

/// Classifies a completed HTTP exchange.
///
/// # Arguments
///
/// * `status` - Response status code
/// * `final_url` - URL after redirects
/// * `body` - Response body text
/// * `has_session` - Whether the request carried a catalog session cookie
///
/// The rules, in order:
/// 1. 403 is a ban (the catalog's block, not a permissions problem).
/// 2. 401 is an authentication failure.
/// 3. 429 and 5xx are transient.
/// 4. A redirect that landed on the login/age-gate page while a session
///    cookie was sent means the catalog is refusing this source: ban.
///    Without a cookie the same landing is an auth failure (expired login).
/// 5. A challenge block page in the body is a ban; when a bypass front-end
///    is in play the caller retries once through it before reporting.
/// 6. Anything else with a 2xx status is OK.
pub fn classify_response(status: u16, final_url: &str, body: &str, has_session: bool) -> FetchClass {
    if status == HTTP_STATUS_FORBIDDEN {
        return FetchClass::Ban;
    }
    if status == HTTP_STATUS_UNAUTHORIZED {
        return FetchClass::Auth;
    }
    if status == HTTP_STATUS_TOO_MANY_REQUESTS || (500..600).contains(&status) {
        return FetchClass::Transient;
    }
    if tags::is_auth_redirect(final_url) {
        return if has_session {
            FetchClass::Ban
        } else {
            FetchClass::Auth
        };
    }
    if tags::is_challenge_page(body) {
        return FetchClass::Ban;
    }
    if (200..300).contains(&status) {
        return FetchClass::Ok;
    }
    // Remaining 3xx/4xx oddities: not worth retrying, not a ban either.
    // Treat as transient once so the retry budget decides.
    FetchClass::Transient
}

/// Classifies a transport-level `reqwest` failure.
pub fn classify_transport_error(error: &reqwest::Error) -> FetchClass {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        FetchClass::Network
    } else if let Some(status) = error.status() {
        classify_response(status.as_u16(), "", "", false)
    } else {
        FetchClass::Network
    }
}

/// Whether a classification is worth another attempt.
pub fn is_retriable(class: FetchClass) -> bool {
    matches!(class, FetchClass::Transient | FetchClass::Network)
}

/// Creates the jittered exponential backoff schedule for fetch retries.
///
/// Delays start at `RETRY_INITIAL_DELAY_MS`, double per attempt, cap at
/// `RETRY_MAX_DELAY_SECS`, and carry up to 20% random jitter so a fleet of
/// workers does not retry in lockstep.
pub fn retry_schedule() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(RETRY_INITIAL_DELAY_MS)
        .factor(RETRY_FACTOR)
        .max_delay(Duration::from_secs(RETRY_MAX_DELAY_SECS))
        .take(RETRY_MAX_ATTEMPTS)
        .map(|base| {
            let jitter = rand::thread_rng().gen_range(0.0..0.2);
            base.mul_f64(1.0 + jitter)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_is_ban() {
        assert_eq!(
            classify_response(403, "https://x/", "", true),
            FetchClass::Ban
        );
        assert_eq!(
            classify_response(403, "https://x/", "", false),
            FetchClass::Ban
        );
    }

    #[test]
    fn test_server_errors_are_transient() {
        for status in [429u16, 500, 502, 503, 504] {
            assert_eq!(
                classify_response(status, "https://x/", "", false),
                FetchClass::Transient,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_auth_redirect_depends_on_session() {
        // With a session cookie: the site is refusing the address → ban
        assert_eq!(
            classify_response(200, "https://x/login", "<html/>", true),
            FetchClass::Ban
        );
        // Without one: the login simply expired → auth
        assert_eq!(
            classify_response(200, "https://x/login", "<html/>", false),
            FetchClass::Auth
        );
    }

    #[test]
    fn test_challenge_body_is_ban() {
        let body = "<title>Security Verification</title><div class=turnstile>";
        assert_eq!(
            classify_response(200, "https://x/", body, false),
            FetchClass::Ban
        );
    }

    #[test]
    fn test_plain_success() {
        assert_eq!(
            classify_response(200, "https://x/?page=1", "<html>content</html>", true),
            FetchClass::Ok
        );
    }

    #[test]
    fn test_retriability() {
        assert!(is_retriable(FetchClass::Transient));
        assert!(is_retriable(FetchClass::Network));
        assert!(!is_retriable(FetchClass::Ban));
        assert!(!is_retriable(FetchClass::Auth));
        assert!(!is_retriable(FetchClass::Ok));
    }

    #[test]
    fn test_retry_schedule_bounds() {
        let delays: Vec<Duration> = retry_schedule().collect();
        assert_eq!(delays.len(), RETRY_MAX_ATTEMPTS);
        for delay in &delays {
            // Cap plus 20% jitter headroom
            assert!(delay.as_secs_f64() <= RETRY_MAX_DELAY_SECS as f64 * 1.2);
        }
        assert!(delays[0].as_millis() >= RETRY_INITIAL_DELAY_MS as u128);
    }
}
