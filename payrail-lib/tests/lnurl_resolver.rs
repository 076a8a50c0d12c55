//! Integration tests for the LNURL-pay resolver against a mock HTTP server.
//!
//! ```bash
//! cargo test -p payrail-lib --test lnurl_resolver
//! ```

use payrail_lib::config::LnurlConfig;
use payrail_lib::lnurl::LnurlInvoiceResolver;
use payrail_lib::test_utils::fixtures;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn resolver() -> LnurlInvoiceResolver {
    LnurlInvoiceResolver::new(LnurlConfig::new().with_timeout(5).with_insecure_http(true)).unwrap()
}

fn address(server: &MockServer) -> String {
    format!("bob@{}", server.address())
}

async fn mount_discovery(server: &MockServer, min_msat: u64, max_msat: u64) {
    let callback = format!("{}/lnurlp/bob/callback", server.uri());
    Mock::given(method("GET"))
        .and(path("/.well-known/lnurlp/bob"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::pay_request_json(&callback, min_msat, max_msat)),
        )
        .mount(server)
        .await;
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_resolve_address() {
    let server = MockServer::start().await;
    mount_discovery(&server, 1_000_000, 100_000_000).await;

    let endpoint = resolver().resolve_address(&address(&server)).await.unwrap();
    assert_eq!(endpoint.min_sendable, 1_000);
    assert_eq!(endpoint.max_sendable, 100_000);
    assert_eq!(endpoint.comment_allowed, Some(140));
    assert!(endpoint.callback.ends_with("/lnurlp/bob/callback"));
}

#[tokio::test]
async fn test_discovery_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/lnurlp/bob"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(resolver().resolve_address(&address(&server)).await.is_none());
}

#[tokio::test]
async fn test_discovery_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/lnurlp/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ERROR",
            "reason": "user not found"
        })))
        .mount(&server)
        .await;

    assert!(resolver().resolve_address(&address(&server)).await.is_none());
}

#[tokio::test]
async fn test_discovery_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/lnurlp/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
        .mount(&server)
        .await;

    assert!(resolver().resolve_address(&address(&server)).await.is_none());
}

#[tokio::test]
async fn test_unreachable_host() {
    // Nothing listens on the discard port.
    assert!(resolver().resolve_address("bob@127.0.0.1:9").await.is_none());
    assert!(resolver().resolve_address("not-an-address").await.is_none());
}

// ============================================================================
// Invoice requests
// ============================================================================

#[tokio::test]
async fn test_resolve_and_get_invoice() {
    let server = MockServer::start().await;
    mount_discovery(&server, 1_000_000, 100_000_000).await;
    Mock::given(method("GET"))
        .and(path("/lnurlp/bob/callback"))
        .and(query_param("amount", "1000000"))
        .and(query_param("comment", "hi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pr": fixtures::SAMPLE_INVOICE,
            "routes": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let invoice = resolver()
        .resolve_and_get_invoice(&address(&server), 1_000, Some("hi"))
        .await;
    assert_eq!(invoice.as_deref(), Some(fixtures::SAMPLE_INVOICE));
}

#[tokio::test]
async fn test_out_of_bounds_amount_skips_callback() {
    let server = MockServer::start().await;
    mount_discovery(&server, 1_000_000, 100_000_000).await;
    Mock::given(method("GET"))
        .and(path("/lnurlp/bob/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pr": fixtures::SAMPLE_INVOICE
        })))
        .expect(0)
        .mount(&server)
        .await;

    let resolver = resolver();
    assert!(resolver
        .resolve_and_get_invoice(&address(&server), 999, None)
        .await
        .is_none());
    assert!(resolver
        .resolve_and_get_invoice(&address(&server), 100_001, None)
        .await
        .is_none());
}

#[tokio::test]
async fn test_callback_error_status() {
    let server = MockServer::start().await;
    mount_discovery(&server, 1_000, 10_000_000).await;
    Mock::given(method("GET"))
        .and(path("/lnurlp/bob/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ERROR",
            "reason": "amount too small"
        })))
        .mount(&server)
        .await;

    assert!(resolver()
        .resolve_and_get_invoice(&address(&server), 10, None)
        .await
        .is_none());
}

#[tokio::test]
async fn test_callback_without_invoice() {
    let server = MockServer::start().await;
    mount_discovery(&server, 1_000, 10_000_000).await;
    Mock::given(method("GET"))
        .and(path("/lnurlp/bob/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "pr": "" })))
        .mount(&server)
        .await;

    assert!(resolver()
        .resolve_and_get_invoice(&address(&server), 10, None)
        .await
        .is_none());
}

#[tokio::test]
async fn test_callback_server_error() {
    let server = MockServer::start().await;
    mount_discovery(&server, 1_000, 10_000_000).await;
    Mock::given(method("GET"))
        .and(path("/lnurlp/bob/callback"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(resolver()
        .resolve_and_get_invoice(&address(&server), 10, None)
        .await
        .is_none());
}

#[tokio::test]
async fn test_callback_keeps_existing_query() {
    let server = MockServer::start().await;
    let callback = format!("{}/cb?k1=abc", server.uri());
    Mock::given(method("GET"))
        .and(path("/.well-known/lnurlp/bob"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::pay_request_json(&callback, 1_000, 10_000_000)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cb"))
        .and(query_param("k1", "abc"))
        .and(query_param("amount", "21000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pr": fixtures::SAMPLE_INVOICE
        })))
        .expect(1)
        .mount(&server)
        .await;

    let invoice = resolver()
        .resolve_and_get_invoice(&address(&server), 21, None)
        .await;
    assert!(invoice.is_some());
}
