//! # Channel Relay HTTP Service
//!
//! Axum front end for the relay: receives payment-provider and chat-platform
//! webhooks, verifies signatures, normalizes payloads, and relays summaries
//! into the configured chat channel.
//!
//! ## Endpoints
//!
//! - `POST /discord` - chat interactions: ping, handshake, commands, events
//! - `POST <paypal path>` - payment notifications, forwarded downstream
//! - `GET /` - welcome text
//! - `GET /health` - liveness probe
//!
//! ## Request pipeline
//!
//! Signature verification (chat route only) runs against the raw body before
//! anything is parsed; the body is then decoded exactly once into a tagged
//! event kind, and handlers branch on the kind.

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use channel_relay_core::channel::{
    ChannelResolver, ChannelTarget, DeliveryError, ResolutionError,
};
use channel_relay_core::command::CommandResponder;
use channel_relay_core::event::{
    EventSource, InboundEvent, InboundKind, NormalizationError, NormalizedMessage,
};
use channel_relay_core::ledger::CommandLedger;
use channel_relay_core::signature::{
    enforce_signature, SignatureError, SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

pub mod chat;
pub mod config;
pub mod forwarder;
pub mod paypal;

use crate::config::RelayConfigError;
use crate::forwarder::{EventForwarder, ForwardError};
use crate::paypal::{AccessTokenSource, TokenError};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Signature verifier for the chat route. `None` fails closed: every
    /// signed route rejects until a key is configured.
    pub verifier: Option<Arc<dyn SignatureVerifier>>,
    /// Channel lookup and delivery.
    pub resolver: Arc<ChannelResolver>,
    /// Configured relay destination, re-checked per request.
    pub target: ChannelTarget,
    /// Canned command replies.
    pub responder: Arc<CommandResponder>,
    /// Per-username command ledger, owned here and passed by handle.
    pub ledger: Arc<CommandLedger>,
    /// OAuth token source for the payment forward.
    pub token_source: Arc<dyn AccessTokenSource>,
    /// Downstream event forwarder.
    pub forwarder: Arc<EventForwarder>,
}

// ============================================================================
// Error Handling
// ============================================================================

/// Request-boundary error for the relay handlers.
///
/// Every variant maps to one HTTP status with a fixed plain-text body;
/// details that would leak internals stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum RelayHandlerError {
    /// Maps to: `401 Unauthorized` ("Invalid request signature").
    #[error("invalid request signature: {0}")]
    Signature(#[from] SignatureError),

    /// Maps to: `400 Bad Request` ("Malformed payload").
    #[error("malformed payload: {0}")]
    Normalization(#[from] NormalizationError),

    /// Maps to: `500`, `404`, or `400` depending on the variant.
    #[error("channel resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Maps to: `500 Internal Server Error` ("Error sending message to
    /// Discord channel").
    #[error("message delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// Maps to: `500 Internal Server Error` (generic body).
    #[error("token exchange failed: {0}")]
    Token(#[from] TokenError),

    /// Maps to: `500 Internal Server Error` (generic body).
    #[error("downstream forward failed: {0}")]
    Forward(#[from] ForwardError),
}

impl IntoResponse for RelayHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Signature(e) => {
                warn!(error = %e, "Rejected request with invalid signature");
                (StatusCode::UNAUTHORIZED, "Invalid request signature")
            }
            Self::Normalization(e) => {
                warn!(error = %e, "Rejected malformed payload");
                (StatusCode::BAD_REQUEST, "Malformed payload")
            }
            Self::Resolution(ResolutionError::ConfigMissing) => {
                error!("Channel target missing from configuration");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error")
            }
            Self::Resolution(e @ ResolutionError::ChannelNotFound(_)) => {
                warn!(error = %e, "Destination channel not found");
                (StatusCode::NOT_FOUND, "Channel not found")
            }
            Self::Resolution(e @ ResolutionError::CategoryMismatch { .. }) => {
                warn!(error = %e, "Destination channel outside the configured category");
                (
                    StatusCode::BAD_REQUEST,
                    "Channel does not belong to the specified category",
                )
            }
            Self::Delivery(e) => {
                error!(error = %e, "Error sending message to Discord channel");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error sending message to Discord channel",
                )
            }
            Self::Token(e) => {
                error!(error = %e, "Failed to obtain payment-provider access token");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            Self::Forward(e) => {
                error!(error = %e, "Failed to forward payment event downstream");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        (status, message).into_response()
    }
}

/// Service-level errors for server startup and shutdown.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Failed to bind to the listen address (exit code 1).
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    /// The server stopped with an error (exit code 2).
    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    /// Configuration problem surfaced at startup (exit code 3).
    #[error("Configuration error: {0}")]
    Configuration(#[from] RelayConfigError),
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create the HTTP router with all endpoints.
///
/// `paypal_webhook_path` is configurable because deployments mount the
/// payment webhook wherever their provider dashboard points; it must start
/// with `/`.
pub fn create_router(state: AppState, paypal_webhook_path: &str) -> Router {
    let webhook_routes = Router::new()
        .route(paypal_webhook_path, post(handle_paypal_webhook))
        .route("/discord", post(handle_discord_webhook));

    let service_routes = Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health));

    Router::new()
        .merge(webhook_routes)
        .merge(service_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start the HTTP server with graceful shutdown on SIGINT/SIGTERM.
pub async fn start_server(
    state: AppState,
    paypal_webhook_path: &str,
    host: &str,
    port: u16,
) -> Result<(), ServiceError> {
    if !paypal_webhook_path.starts_with('/') {
        return Err(ServiceError::Configuration(RelayConfigError::Invalid {
            key: "PAYPAL_WEBHOOK_URL",
            message: "route path must start with '/'".to_string(),
        }));
    }

    let app = create_router(state, paypal_webhook_path);

    let address = format!("{}:{}", host, port);
    let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
        ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        }
    })?;

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
            _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Welcome text for the root path.
async fn handle_index() -> &'static str {
    "Welcome to the Channel Relay application!"
}

/// Liveness probe.
async fn handle_health() -> &'static str {
    "OK"
}

/// Handle chat-platform webhooks.
///
/// The signature gate runs first, against the raw body; nothing below it
/// executes for an unverifiable request. The body is then decoded once and
/// the handler branches on the kind.
#[instrument(skip(state, headers, body))]
async fn handle_discord_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayHandlerError> {
    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let signature = header_str(&headers, SIGNATURE_HEADER);
    enforce_signature(state.verifier.as_deref(), timestamp, signature, &body)?;

    let event = InboundEvent::from_bytes(EventSource::ChatPlatform, &body)?;

    match InboundKind::from_event(&event)? {
        InboundKind::Ping => {
            info!("Acknowledged liveness ping");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        InboundKind::Handshake => {
            info!("Answered endpoint-verification handshake");
            Ok(Json(serde_json::json!({ "type": 1 })).into_response())
        }
        InboundKind::Command(invocation) => {
            info!(
                command = %invocation.command_name,
                user = %invocation.username,
                "Handling remote command"
            );
            let reply = state.responder.respond(invocation, &state.ledger);
            Ok(Json(reply.into_interaction_response()).into_response())
        }
        InboundKind::Event(message) | InboundKind::Payment(message) => {
            relay_to_channel(&state, message).await
        }
    }
}

/// The generic event path: resolve the configured channel, deliver the
/// formatted message, then hand the event to the forwarder as a detached
/// task. The response depends on delivery, never on the forward.
async fn relay_to_channel(
    state: &AppState,
    message: NormalizedMessage,
) -> Result<Response, RelayHandlerError> {
    let channel = state.resolver.resolve(&state.target)?;

    channel.send_text(&message.channel_message()).await?;
    info!(
        event_type = %message.event_type,
        channel = %channel.record().id,
        "Message sent to Discord channel"
    );

    state.forwarder.forward_detached(message);

    Ok((StatusCode::OK, "Message sent to Discord channel").into_response())
}

/// Handle payment-provider webhooks: normalize, obtain an upstream token,
/// forward the normalized event downstream, and acknowledge.
#[instrument(skip(state, body))]
async fn handle_paypal_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, RelayHandlerError> {
    let event = InboundEvent::from_bytes(EventSource::PaymentProvider, &body)?;

    let message = match InboundKind::from_event(&event)? {
        InboundKind::Payment(message) => message,
        _ => {
            return Err(RelayHandlerError::Normalization(
                NormalizationError::MalformedPayload {
                    reason: "expected a payment notification".to_string(),
                },
            ));
        }
    };

    match message.event_type.as_str() {
        "CHECKOUT.ORDER.APPROVED" => {
            info!(label_notes = %message.label_notes, "Order approved");
        }
        "PAYMENT.SALE.COMPLETED" => {
            info!(label_notes = %message.label_notes, "Payment completed");
        }
        other => {
            info!(event_type = %other, "Unhandled payment event type");
        }
    }

    let token = state.token_source.access_token().await?;
    state.forwarder.forward(&message, Some(&token)).await?;

    info!(event_type = %message.event_type, "Payment event forwarded downstream");
    Ok((StatusCode::OK, "Event processed successfully").into_response())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware.
///
/// - Extracts or generates an `x-correlation-id`
/// - Logs request start and completion with structured fields
/// - Propagates the correlation id through response headers
#[instrument(skip(request, next), fields(method = %request.method(), uri = %request.uri(), correlation_id))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let start = std::time::Instant::now();
    let mut response = next.run(request).await;
    let duration = start.elapsed();

    let status = response.status();
    if status.is_server_error() {
        error!(status = %status, duration_ms = duration.as_millis() as u64, "Request failed");
    } else if status.is_client_error() {
        warn!(status = %status, duration_ms = duration.as_millis() as u64, "Request rejected");
    } else {
        info!(status = %status, duration_ms = duration.as_millis() as u64, "Request completed");
    }

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert("x-correlation-id", header_value);
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
