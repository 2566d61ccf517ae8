//! PageFetcher against a real HTTP server: classification, retries, the
//! age-gate flow.

use std::collections::HashMap;
use std::time::Duration;

use httptest::{matchers::*, responders::*, Expectation, Server};
use magnet_harvest::error_handling::FetchError;
use magnet_harvest::http::{PageFetcher, PageSource, Pacer};
use magnet_harvest::proxy::ProxyModule;

fn fetcher() -> PageFetcher {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client");
    PageFetcher::new(
        client,
        HashMap::new(),
        None,
        vec![ProxyModule::All],
        None,
        Pacer::new(Duration::ZERO, Duration::ZERO, Duration::ZERO),
        None,
    )
}

const CONTENT: &str =
    r#"<html><body><div class="movie-list h">catalog content here</div></body></html>"#;

#[tokio::test]
async fn test_plain_success() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/index"))
            .respond_with(status_code(200).body(CONTENT)),
    );

    let body = fetcher()
        .fetch_page(&server.url("/index").to_string(), ProxyModule::SpiderIndex)
        .await
        .expect("fetch should succeed");
    assert!(body.contains("catalog content"));
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/flaky"))
            .times(2)
            .respond_with(cycle![
                status_code(503),
                status_code(200).body(CONTENT),
            ]),
    );

    let body = fetcher()
        .fetch_page(&server.url("/flaky").to_string(), ProxyModule::SpiderIndex)
        .await
        .expect("retry should recover");
    assert!(body.contains("catalog content"));
}

#[tokio::test]
async fn test_persistent_transient_exhausts_budget() {
    let server = Server::run();
    // Initial attempt + 2 retries
    server.expect(
        Expectation::matching(request::method_path("GET", "/down"))
            .times(3)
            .respond_with(status_code(503)),
    );

    let err = fetcher()
        .fetch_page(&server.url("/down").to_string(), ProxyModule::SpiderIndex)
        .await
        .expect_err("must fail after the retry budget");
    assert!(matches!(err, FetchError::TransientHttp { status: 503, .. }));
}

#[tokio::test]
async fn test_forbidden_is_ban_and_not_retried() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/blocked"))
            .times(1)
            .respond_with(status_code(403)),
    );

    let err = fetcher()
        .fetch_page(&server.url("/blocked").to_string(), ProxyModule::SpiderIndex)
        .await
        .expect_err("403 is a ban");
    assert!(matches!(err, FetchError::Ban { .. }));
}

#[tokio::test]
async fn test_challenge_body_is_ban() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/challenge")).respond_with(
            status_code(200)
                .body("<title>Security Verification</title><script src=turnstile.js></script>"),
        ),
    );

    let err = fetcher()
        .fetch_page(&server.url("/challenge").to_string(), ProxyModule::SpiderIndex)
        .await
        .expect_err("challenge page is a ban");
    assert!(matches!(err, FetchError::Ban { .. }));
}

#[tokio::test]
async fn test_age_gate_is_confirmed_and_refetched() {
    let server = Server::run();
    let gated = r#"<html><body>
        <div class="modal is-active over18-modal">
          <a href="/over18?back=/index">I am over 18</a>
        </div>
      </body></html>"#;

    server.expect(
        Expectation::matching(request::method_path("GET", "/index"))
            .times(2)
            .respond_with(cycle![
                status_code(200).body(gated),
                status_code(200).body(CONTENT),
            ]),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/over18"))
            .times(1)
            .respond_with(status_code(200).body("ok")),
    );

    let body = fetcher()
        .fetch_page(&server.url("/index").to_string(), ProxyModule::SpiderIndex)
        .await
        .expect("age gate should be cleared");
    assert!(body.contains("catalog content"));
}
