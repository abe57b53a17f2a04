//! Common test utilities for channel-relay integration tests
//!
//! This module provides:
//! - Mock implementations of the relay's seams (ChannelDirectory, MessageSink,
//!   SignatureVerifier, AccessTokenSource) with recorded calls
//! - Ed25519 signing fixtures for exercising the signature gate
//! - A harness that builds a router plus handles into the mocks

use axum::Router;
use channel_relay_core::channel::{
    ChannelDirectory, ChannelRecord, ChannelResolver, ChannelTarget, DeliveryError, MessageSink,
};
use channel_relay_core::command::CommandResponder;
use channel_relay_core::ledger::CommandLedger;
use channel_relay_core::signature::{Ed25519Verifier, SignatureError, SignatureVerifier};
use channel_relay_core::{CategoryId, ChannelId};
use channel_relay_service::forwarder::EventForwarder;
use channel_relay_service::paypal::{AccessTokenSource, TokenError};
use channel_relay_service::{create_router, AppState};
use ed25519_dalek::{Signer, SigningKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// Channel id every harness target points at.
#[allow(dead_code)]
pub const TEST_CHANNEL_ID: &str = "chan-100";

/// Category the test channel belongs to.
#[allow(dead_code)]
pub const TEST_CATEGORY_ID: &str = "cat-200";

/// Route the payment webhook is mounted at in tests.
#[allow(dead_code)]
pub const PAYPAL_PATH: &str = "/paypal/webhook";

// ============================================================================
// Signing Fixtures
// ============================================================================

/// Deterministic signing key for request fixtures.
#[allow(dead_code)]
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// Hex signature over `timestamp ++ body`, the platform's signed message.
#[allow(dead_code)]
pub fn sign_body(key: &SigningKey, timestamp: &str, body: &[u8]) -> String {
    let mut message = timestamp.as_bytes().to_vec();
    message.extend_from_slice(body);
    hex::encode(key.sign(&message).to_bytes())
}

// ============================================================================
// Mock Signature Verifier
// ============================================================================

/// Wraps the real Ed25519 verifier and counts calls, so tests can assert the
/// gate ran (or never ran) relative to the rest of the pipeline.
pub struct CountingVerifier {
    inner: Ed25519Verifier,
    calls: Arc<Mutex<usize>>,
}

impl CountingVerifier {
    #[allow(dead_code)]
    pub fn new(key: &SigningKey) -> (Self, Arc<Mutex<usize>>) {
        let public_hex = hex::encode(key.verifying_key().to_bytes());
        let calls = Arc::new(Mutex::new(0));
        let verifier = Self {
            inner: Ed25519Verifier::from_hex(&public_hex).unwrap(),
            calls: calls.clone(),
        };
        (verifier, calls)
    }
}

impl SignatureVerifier for CountingVerifier {
    fn verify(
        &self,
        timestamp: &str,
        body: &[u8],
        signature_hex: &str,
    ) -> Result<(), SignatureError> {
        *self.calls.lock().unwrap() += 1;
        self.inner.verify(timestamp, body, signature_hex)
    }
}

// ============================================================================
// Mock Channel Directory
// ============================================================================

/// In-memory directory seeded per test.
pub struct MapDirectory {
    channels: HashMap<ChannelId, ChannelRecord>,
}

impl MapDirectory {
    #[allow(dead_code)]
    pub fn new(records: Vec<ChannelRecord>) -> Self {
        Self {
            channels: records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect(),
        }
    }
}

impl ChannelDirectory for MapDirectory {
    fn find(&self, id: &ChannelId) -> Option<ChannelRecord> {
        self.channels.get(id).cloned()
    }
}

/// A record for [`TEST_CHANNEL_ID`] parented under `category`.
#[allow(dead_code)]
pub fn test_channel_record(category: &str) -> ChannelRecord {
    ChannelRecord {
        id: ChannelId::new(TEST_CHANNEL_ID).unwrap(),
        parent_id: Some(CategoryId::new(category).unwrap()),
        name: Some("relay-orders".to_string()),
    }
}

// ============================================================================
// Mock Message Sink
// ============================================================================

/// Records every delivered message; optionally fails with a fixed status.
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<(ChannelId, String)>>>,
    fail_status: Option<u16>,
}

impl RecordingSink {
    #[allow(dead_code)]
    pub fn new(fail_status: Option<u16>) -> (Self, Arc<Mutex<Vec<(ChannelId, String)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            sent: sent.clone(),
            fail_status,
        };
        (sink, sent)
    }
}

#[async_trait::async_trait]
impl MessageSink for RecordingSink {
    async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), DeliveryError> {
        if let Some(status) = self.fail_status {
            return Err(DeliveryError::UpstreamStatus { status });
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.clone(), text.to_string()));
        Ok(())
    }
}

// ============================================================================
// Mock Token Source
// ============================================================================

/// Token source answering from a canned result.
pub struct StaticTokenSource {
    result: Result<String, u16>,
}

impl StaticTokenSource {
    #[allow(dead_code)]
    pub fn ok(token: &str) -> Self {
        Self {
            result: Ok(token.to_string()),
        }
    }

    #[allow(dead_code)]
    pub fn failing(status: u16) -> Self {
        Self {
            result: Err(status),
        }
    }
}

#[async_trait::async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, TokenError> {
        match &self.result {
            Ok(token) => Ok(token.clone()),
            Err(status) => Err(TokenError::UpstreamStatus { status: *status }),
        }
    }
}

// ============================================================================
// Test Harness
// ============================================================================

/// How the harness should wire the mocks for one test.
pub struct HarnessConfig {
    /// Configured relay destination; defaults to the test channel + category.
    pub target: ChannelTarget,
    /// Directory contents; defaults to the test channel in the right
    /// category.
    pub channels: Vec<ChannelRecord>,
    /// When set, every delivery fails with this status.
    pub delivery_fail_status: Option<u16>,
    /// Downstream forward target, usually a wiremock server.
    pub forward_target: Option<Url>,
    /// Whether the chat route's detached forward is active.
    pub forwarding_enabled: bool,
    /// Token source for the payment route.
    pub token_source: Arc<dyn AccessTokenSource>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target: ChannelTarget::new(
                ChannelId::new(TEST_CHANNEL_ID).unwrap(),
                CategoryId::new(TEST_CATEGORY_ID).unwrap(),
            ),
            channels: vec![test_channel_record(TEST_CATEGORY_ID)],
            delivery_fail_status: None,
            forward_target: None,
            forwarding_enabled: false,
            token_source: Arc::new(StaticTokenSource::ok("test-token")),
        }
    }
}

/// One router under test plus handles into its mocks.
pub struct RelayHarness {
    pub app: Router,
    /// Key whose public half the router's verifier trusts.
    pub key: SigningKey,
    /// Number of times the signature gate ran.
    pub verifier_calls: Arc<Mutex<usize>>,
    /// Every message the sink delivered, in order.
    pub sent: Arc<Mutex<Vec<(ChannelId, String)>>>,
    /// The command ledger behind the router.
    pub ledger: Arc<CommandLedger>,
}

impl RelayHarness {
    #[allow(dead_code)]
    pub fn new(config: HarnessConfig) -> Self {
        let key = signing_key();
        let (verifier, verifier_calls) = CountingVerifier::new(&key);
        let (sink, sent) = RecordingSink::new(config.delivery_fail_status);
        let ledger = Arc::new(CommandLedger::new());

        let state = AppState {
            verifier: Some(Arc::new(verifier)),
            resolver: Arc::new(ChannelResolver::new(
                Arc::new(MapDirectory::new(config.channels)),
                Arc::new(sink),
            )),
            target: config.target,
            responder: Arc::new(CommandResponder::new("https://pay.example/checkout")),
            ledger: ledger.clone(),
            token_source: config.token_source,
            forwarder: Arc::new(EventForwarder::new(
                reqwest::Client::new(),
                config.forward_target,
                config.forwarding_enabled,
            )),
        };

        Self {
            app: create_router(state, PAYPAL_PATH),
            key,
            verifier_calls,
            sent,
            ledger,
        }
    }

    #[allow(dead_code)]
    pub fn with_defaults() -> Self {
        Self::new(HarnessConfig::default())
    }
}

// ============================================================================
// Request Helpers
// ============================================================================

/// A signed POST to `/discord` carrying `body`.
#[allow(dead_code)]
pub fn signed_discord_request(
    key: &SigningKey,
    body: &str,
) -> axum::http::Request<axum::body::Body> {
    let timestamp = "1700000000";
    let signature = sign_body(key, timestamp, body.as_bytes());

    axum::http::Request::builder()
        .method("POST")
        .uri("/discord")
        .header("content-type", "application/json")
        .header("x-signature-ed25519", signature)
        .header("x-signature-timestamp", timestamp)
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

/// Collect a response body as text.
#[allow(dead_code)]
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
