//! Ed25519 request-signature verification.
//!
//! The chat platform signs `timestamp ++ body` with the application's key
//! and sends the hex-encoded signature and the timestamp in request headers.
//! Verification runs against the raw body bytes before any parsing, and the
//! gate fails closed: no configured key, missing headers, or a bad signature
//! all reject the request.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

/// Header carrying the hex-encoded Ed25519 signature.
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";

/// Header carrying the timestamp that prefixes the signed message.
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Reasons a request signature is rejected.
///
/// Every variant is a rejection; there is no bypass path.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// A required signature header was absent.
    #[error("missing required header '{header}'")]
    MissingHeader { header: &'static str },

    /// No verifying key is configured, so nothing can ever verify.
    #[error("no verifying key is configured")]
    NotConfigured,

    /// The key or signature was not valid hex of the expected length.
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    /// The signature does not match the timestamp and body.
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Verifies a request signature against a pre-shared public key.
pub trait SignatureVerifier: Send + Sync {
    /// Check `signature_hex` against the message `timestamp ++ body`.
    fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str)
        -> Result<(), SignatureError>;
}

/// Ed25519 verifier holding the chat application's public key.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Build a verifier from the 32-byte hex public key the platform
    /// publishes for the application.
    pub fn from_hex(public_key_hex: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(public_key_hex).map_err(|e| SignatureError::Malformed {
            what: "public key",
            reason: e.to_string(),
        })?;
        let bytes: [u8; 32] =
            bytes
                .try_into()
                .map_err(|b: Vec<u8>| SignatureError::Malformed {
                    what: "public key",
                    reason: format!("expected 32 bytes, got {}", b.len()),
                })?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|e| SignatureError::Malformed {
            what: "public key",
            reason: e.to_string(),
        })?;

        Ok(Self { key })
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(
        &self,
        timestamp: &str,
        body: &[u8],
        signature_hex: &str,
    ) -> Result<(), SignatureError> {
        let raw = hex::decode(signature_hex).map_err(|e| SignatureError::Malformed {
            what: "signature",
            reason: e.to_string(),
        })?;
        let signature = Signature::from_slice(&raw).map_err(|e| SignatureError::Malformed {
            what: "signature",
            reason: e.to_string(),
        })?;

        // The signed message is the timestamp followed by the raw body
        // bytes, in that order.
        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify(&message, &signature)
            .map_err(|_| SignatureError::VerificationFailed)
    }
}

/// Fail-closed signature gate.
///
/// Rejects unless a verifier is configured, both headers are present, and
/// the signature checks out against the raw body.
pub fn enforce_signature(
    verifier: Option<&dyn SignatureVerifier>,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), SignatureError> {
    let verifier = verifier.ok_or(SignatureError::NotConfigured)?;
    let timestamp = timestamp.ok_or(SignatureError::MissingHeader {
        header: TIMESTAMP_HEADER,
    })?;
    let signature = signature.ok_or(SignatureError::MissingHeader {
        header: SIGNATURE_HEADER,
    })?;

    verifier.verify(timestamp, body, signature)
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
