//! Integration tests for the reqwest-backed lightweight transport and a
//! full configured run against a local `wiremock` server.

use std::time::Duration;

use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use listing_scout::config::DelayMs;
use listing_scout::scrapers::types::RequestProfile;
use listing_scout::scrapers::{HttpTransport, ReqwestTransport};
use listing_scout::{FetchError, ListingRecord, Scraper, ScraperConfig, StopReason};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5)).expect("failed to build transport")
}

fn profile() -> RequestProfile {
    RequestProfile::with_user_agent("listing-scout-test/0.1".to_string())
}

fn cards(n: usize) -> String {
    (0..n)
        .map(|i| format!(r#"<div class="property-card"><h2>Home {i}</h2><span class="price">R {i}00</span></div>"#))
        .collect()
}

#[tokio::test]
async fn returns_body_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let body = transport()
        .get(&format!("{}/rent", server.uri()), &profile())
        .await
        .unwrap();

    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = transport()
        .get(&format!("{}/rent", server.uri()), &profile())
        .await
        .unwrap_err();

    assert!(
        matches!(err, FetchError::UnexpectedStatus { status: 503, .. }),
        "expected UnexpectedStatus(503), got: {err:?}"
    );
}

#[tokio::test]
async fn sends_browser_like_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "listing-scout-test/0.1"))
        .and(header("referer", "https://www.google.com/"))
        .and(header("dnt", "1"))
        .and(header_exists("upgrade-insecure-requests"))
        .respond_with(ResponseTemplate::new(200).set_body_string("matched"))
        .expect(1)
        .mount(&server)
        .await;

    let body = transport().get(&server.uri(), &profile()).await.unwrap();

    assert_eq!(body, "matched");
}

#[tokio::test]
async fn configured_run_walks_pages_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>{}<div class="paging"><a class="next" href="/rent/page/2">Next</a></div></body></html>"#,
            cards(4)
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rent/page/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>{}<div class="paging"><a class="next disabled" href="/rent/page/3">Next</a></div></body></html>"#,
            cards(2)
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("properties.json");
    let config = ScraperConfig {
        target_url: format!("{}/rent", server.uri()),
        max_pages: None,
        output_file: output.clone(),
        page_delay_ms: DelayMs { min: 0, max: 0 },
        retry_delay_ms: DelayMs { min: 0, max: 0 },
        ..ScraperConfig::default()
    };

    let scraper = Scraper::from_config(config).unwrap();
    let report = scraper.scrape().await;

    assert_eq!(report.stop_reason, StopReason::NoNextPage);
    assert_eq!(report.pages_completed, 2);
    assert_eq!(report.saves, 1);

    let saved: Vec<ListingRecord> =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(saved.len(), 6);
    assert_eq!(saved[0].title, "Home 0");
    assert_eq!(saved[5].price, "R 100");
}
