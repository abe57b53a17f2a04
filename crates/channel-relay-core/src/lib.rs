//! # Channel Relay Core
//!
//! Core domain logic for the channel-relay webhook service.
//!
//! This crate contains the relay pipeline's building blocks: decoding inbound
//! webhook bodies into a tagged event union, verifying request signatures,
//! resolving the destination channel, answering remote commands, and the
//! per-user command ledger.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions ([`channel::ChannelDirectory`],
//!   [`channel::MessageSink`], [`signature::SignatureVerifier`])
//! - Infrastructure implementations are injected at runtime by the service
//!   crate
//! - All domain identifiers are validated newtypes, never raw strings
//!
//! ## Usage
//!
//! ```rust
//! use channel_relay_core::{ChannelId, Username};
//!
//! let channel = ChannelId::new("1335811004398829679").unwrap();
//! let user = Username::new("alice").unwrap();
//! assert_eq!(channel.as_str(), "1335811004398829679");
//! assert_eq!(user.as_str(), "alice");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod channel;
pub mod command;
pub mod event;
pub mod ledger;
pub mod signature;

pub use channel::{ChannelRecord, ChannelResolver, ChannelTarget, ResolvedChannel};
pub use command::{CommandResponder, ReplyPayload};
pub use event::{CommandInvocation, EventSource, InboundEvent, InboundKind, NormalizedMessage};
pub use ledger::CommandLedger;
pub use signature::{Ed25519Verifier, SignatureVerifier};

// ============================================================================
// Validation Errors
// ============================================================================

/// Errors that occur when validating domain identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required value was empty.
    #[error("{field} cannot be empty")]
    Required { field: &'static str },

    /// The value exceeds the maximum allowed length.
    #[error("{field} cannot be longer than {max_length} characters")]
    TooLong { field: &'static str, max_length: usize },

    /// The value contains characters outside the allowed set.
    #[error("{field} contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: &'static str,
        invalid_chars: String,
    },
}

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Chat-platform channel identifier.
///
/// Platform snowflakes are numeric strings, but test fixtures use short
/// opaque ids, so the rules stay loose: non-empty, at most 64 characters,
/// no whitespace or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Maximum length of a channel identifier.
    pub const MAX_LENGTH: usize = 64;

    /// Create a new channel id, validating the format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_identifier("channel id", &value, Self::MAX_LENGTH)?;
        Ok(Self(value))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Chat-platform category (parent channel) identifier.
///
/// Same shape as [`ChannelId`]; kept distinct so the two cannot be swapped
/// in a resolver call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    /// Maximum length of a category identifier.
    pub const MAX_LENGTH: usize = 64;

    /// Create a new category id, validating the format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_identifier("category id", &value, Self::MAX_LENGTH)?;
        Ok(Self(value))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CategoryId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Chat-platform username, the command ledger key.
///
/// Display names vary wildly between platforms, so only the boundaries are
/// enforced: non-empty, at most 128 characters, no control characters, no
/// leading or trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Maximum length of a username.
    pub const MAX_LENGTH: usize = 128;

    /// Create a new username, validating the format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required { field: "username" });
        }

        if value.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "username",
                max_length: Self::MAX_LENGTH,
            });
        }

        if value.trim() != value {
            return Err(ValidationError::InvalidCharacters {
                field: "username",
                invalid_chars: "leading or trailing whitespace".to_string(),
            });
        }

        let invalid: String = value.chars().filter(|c| c.is_control()).collect();
        if !invalid.is_empty() {
            return Err(ValidationError::InvalidCharacters {
                field: "username",
                invalid_chars: invalid,
            });
        }

        Ok(Self(value))
    }

    /// Get the username as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Username {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Shared identifier validation: non-empty, bounded length, printable, no
/// whitespace.
fn validate_identifier(
    field: &'static str,
    value: &str,
    max_length: usize,
) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required { field });
    }

    if value.len() > max_length {
        return Err(ValidationError::TooLong { field, max_length });
    }

    let invalid: String = value
        .chars()
        .filter(|c| c.is_whitespace() || c.is_control())
        .collect();
    if !invalid.is_empty() {
        return Err(ValidationError::InvalidCharacters {
            field,
            invalid_chars: invalid,
        });
    }

    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
