//! Inbound webhook decoding and payload normalization.
//!
//! Every request body is parsed exactly once, at the boundary, into an
//! [`InboundKind`] variant. Handlers branch on the variant instead of probing
//! raw JSON for fields, so a half-shaped payload can never reach delivery
//! code.

use crate::{ChannelId, Username};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Sentinel used when a payment resource carries no payer note.
pub const NO_NOTES: &str = "No notes";

/// Errors produced while decoding an inbound payload.
#[derive(Debug, Error)]
pub enum NormalizationError {
    /// The body was not valid JSON at all.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The body parsed as JSON but matches none of the known shapes, or a
    /// matched shape carried fields of the wrong type.
    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },
}

impl NormalizationError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Inbound Envelope
// ============================================================================

/// Which provider a payload arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// The payment provider's webhook route.
    PaymentProvider,
    /// The chat platform's interaction route.
    ChatPlatform,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentProvider => write!(f, "paypal"),
            Self::ChatPlatform => write!(f, "discord"),
        }
    }
}

/// One inbound webhook request body, parsed but not yet interpreted.
///
/// Immutable once constructed; dropped as soon as the response is sent.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub source: EventSource,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}

impl InboundEvent {
    /// Parse raw request bytes into an envelope.
    ///
    /// Callers must run the signature gate on the raw bytes first; parsing
    /// normalizes whitespace, so the signed bytes are never reconstructed
    /// from the parsed value.
    pub fn from_bytes(source: EventSource, raw: &[u8]) -> Result<Self, NormalizationError> {
        let payload = serde_json::from_slice(raw)?;
        Ok(Self {
            source,
            received_at: Utc::now(),
            payload,
        })
    }
}

// ============================================================================
// Tagged Event Union
// ============================================================================

/// The tagged union every inbound payload decodes to.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    /// `{"type": 0}` liveness probe; acknowledged, never relayed.
    Ping,
    /// `{"type": 1}` endpoint-verification handshake; answered in kind.
    Handshake,
    /// A remote command invocation (`command` + `user` + `channel`).
    Command(CommandInvocation),
    /// Chat-platform business event carrying a nested `event` object.
    Event(NormalizedMessage),
    /// Payment-provider notification (`event_type` + `resource`).
    Payment(NormalizedMessage),
}

impl InboundKind {
    /// Decode the envelope into its kind.
    ///
    /// Dispatch order is fixed: ping, handshake, command, nested event,
    /// payment shape. Anything else is malformed. Decoding the same envelope
    /// twice yields structurally equal results.
    pub fn from_event(event: &InboundEvent) -> Result<Self, NormalizationError> {
        let body = &event.payload;

        match body.get("type").and_then(Value::as_i64) {
            Some(0) => return Ok(Self::Ping),
            Some(1) => return Ok(Self::Handshake),
            _ => {}
        }

        if let (Some(command), Some(user), Some(channel)) =
            (body.get("command"), body.get("user"), body.get("channel"))
        {
            return Ok(Self::Command(CommandInvocation::from_parts(
                command, user, channel,
            )?));
        }

        if let Some(nested) = body.get("event") {
            if nested.get("type").is_some() && nested.get("data").is_some() {
                return Ok(Self::Event(NormalizedMessage::from_nested_event(nested)?));
            }
        }

        if let (Some(event_type), Some(resource)) = (body.get("event_type"), body.get("resource"))
        {
            return Ok(Self::Payment(NormalizedMessage::from_payment(
                event_type, resource,
            )?));
        }

        Err(NormalizationError::malformed(
            "no recognized shape (expected ping, handshake, command, event, or payment fields)",
        ))
    }
}

// ============================================================================
// Normalized Message
// ============================================================================

/// Canonical relay message derived from a provider payload.
///
/// Serializes as the downstream forward body (`event_type`, `label_notes`,
/// `event_data`); `timestamp` only exists for channel-message formatting and
/// is omitted from serialization when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMessage {
    pub event_type: String,
    pub label_notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub event_data: Value,
}

impl NormalizedMessage {
    fn from_nested_event(nested: &Value) -> Result<Self, NormalizationError> {
        let event_type = nested
            .get("type")
            .and_then(value_as_string)
            .ok_or_else(|| NormalizationError::malformed("event.type must be a string"))?;
        let event_data = nested
            .get("data")
            .cloned()
            .ok_or_else(|| NormalizationError::malformed("event.data is required"))?;
        let timestamp = nested.get("timestamp").and_then(value_as_string);

        Ok(Self {
            event_type,
            label_notes: NO_NOTES.to_string(),
            timestamp,
            event_data,
        })
    }

    fn from_payment(event_type: &Value, resource: &Value) -> Result<Self, NormalizationError> {
        let event_type = value_as_string(event_type)
            .ok_or_else(|| NormalizationError::malformed("event_type must be a string"))?;

        // A missing or non-string payer note degrades to the sentinel rather
        // than failing the whole notification.
        let label_notes = resource
            .get("note_to_payer")
            .and_then(Value::as_str)
            .unwrap_or(NO_NOTES)
            .to_string();

        let event_data = serde_json::json!({
            "event_type": event_type.clone(),
            "resource": resource,
        });

        Ok(Self {
            event_type,
            label_notes,
            timestamp: None,
            event_data,
        })
    }

    /// Render the fixed channel message.
    ///
    /// Line order and labels are load-bearing: downstream consumers parse
    /// this text, and event data is always pretty-printed with two-space
    /// indentation.
    pub fn channel_message(&self) -> String {
        let data = serde_json::to_string_pretty(&self.event_data).unwrap_or_default();
        format!(
            "Event Type: {}\nTimestamp: {}\nEvent Data: {}",
            self.event_type,
            self.timestamp.as_deref().unwrap_or("unknown"),
            data
        )
    }
}

// ============================================================================
// Command Invocation
// ============================================================================

/// One remote command invocation, as decoded from the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command_name: String,
    pub username: Username,
    pub user_id: Option<String>,
    pub channel_id: Option<ChannelId>,
}

impl CommandInvocation {
    fn from_parts(command: &Value, user: &Value, channel: &Value) -> Result<Self, NormalizationError> {
        let command_name = command
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| NormalizationError::malformed("command must be a non-empty string"))?
            .to_string();

        let username = user
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| NormalizationError::malformed("user.username is required"))?;
        let username = Username::new(username)
            .map_err(|e| NormalizationError::malformed(e.to_string()))?;

        let user_id = user.get("id").and_then(value_as_string);
        let channel_id = channel
            .get("id")
            .and_then(value_as_string)
            .and_then(|s| ChannelId::new(s).ok());

        Ok(Self {
            command_name,
            username,
            user_id,
            channel_id,
        })
    }
}

/// Providers send ids as strings or bare numbers; accept both.
fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
