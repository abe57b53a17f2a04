//! Tests for the downstream event forwarder.

use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn message() -> NormalizedMessage {
    NormalizedMessage {
        event_type: "CHECKOUT.ORDER.APPROVED".to_string(),
        label_notes: "Test note".to_string(),
        timestamp: None,
        event_data: json!({"k": "v"}),
    }
}

fn forwarder(server: &MockServer, enabled: bool) -> EventForwarder {
    let target = Url::parse(&format!("{}/hook", server.uri())).unwrap();
    EventForwarder::new(reqwest::Client::new(), Some(target), enabled)
}

#[tokio::test]
async fn test_forward_posts_normalized_event_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(json!({
            "event_type": "CHECKOUT.ORDER.APPROVED",
            "label_notes": "Test note",
            "event_data": {"k": "v"},
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = forwarder(&server, true).forward(&message(), Some("tok-1")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_forward_without_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = forwarder(&server, true).forward(&message(), None).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_forward_surfaces_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = forwarder(&server, true).forward(&message(), None).await;
    assert!(matches!(
        result,
        Err(ForwardError::UpstreamStatus { status: 503 })
    ));
}

#[tokio::test]
async fn test_forward_without_target_is_not_configured() {
    let forwarder = EventForwarder::new(reqwest::Client::new(), None, true);

    let result = forwarder.forward(&message(), None).await;
    assert!(matches!(result, Err(ForwardError::NotConfigured)));
}

#[tokio::test]
async fn test_detached_forward_posts_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let forwarder = Arc::new(forwarder(&server, true));
    let handle = forwarder.forward_detached(message()).unwrap();

    // The spawned task owns the payload; wait for it before the mock
    // verifies.
    handle.await.unwrap();
}

#[tokio::test]
async fn test_detached_forward_skips_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let forwarder = Arc::new(forwarder(&server, false));
    let handle = forwarder.forward_detached(message());

    assert!(handle.is_none());
    assert!(!forwarder.is_enabled());
}
