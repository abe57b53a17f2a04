//! Destination-channel resolution and message delivery.
//!
//! The resolver owns the two seams the service injects infrastructure
//! through: a [`ChannelDirectory`] for channel lookups (backed by the cache
//! the service warms at startup) and a [`MessageSink`] for actual delivery
//! (backed by the chat platform's REST API).

use crate::{CategoryId, ChannelId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// A channel as the chat platform reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub id: ChannelId,
    /// Parent category, when the channel sits under one.
    pub parent_id: Option<CategoryId>,
    pub name: Option<String>,
}

/// Configured relay destination.
///
/// Both halves are optional so a partially configured process degrades to a
/// per-request configuration error instead of an unguarded panic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTarget {
    pub channel_id: Option<ChannelId>,
    pub category_id: Option<CategoryId>,
}

impl ChannelTarget {
    /// A fully configured target.
    pub fn new(channel_id: ChannelId, category_id: CategoryId) -> Self {
        Self {
            channel_id: Some(channel_id),
            category_id: Some(category_id),
        }
    }
}

/// Synchronous, in-memory channel lookup.
pub trait ChannelDirectory: Send + Sync {
    /// Find a channel by id. `None` means the directory has never heard of
    /// it.
    fn find(&self, id: &ChannelId) -> Option<ChannelRecord>;
}

/// The narrow message-delivery interface into the chat client.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one plain-text message to a channel.
    async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), DeliveryError>;
}

/// Failures while resolving the relay destination, in evaluation order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Channel id or category id missing from configuration.
    ///
    /// Maps to: `500 Internal Server Error` ("Server configuration error").
    #[error("channel target is not configured")]
    ConfigMissing,

    /// The directory knows no channel with the configured id.
    ///
    /// Maps to: `404 Not Found` ("Channel not found").
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    /// The channel exists but sits under a different parent category.
    ///
    /// Maps to: `400 Bad Request` ("Channel does not belong to the specified
    /// category").
    #[error("channel {channel} does not belong to category {expected}")]
    CategoryMismatch {
        channel: ChannelId,
        expected: CategoryId,
    },
}

/// Message delivery failures reported by the sink.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The chat API answered with a non-success status.
    #[error("chat API returned status {status}")]
    UpstreamStatus { status: u16 },

    /// The request never completed.
    #[error("chat API request failed: {reason}")]
    Transport { reason: String },
}

/// Resolves the configured target against the directory and hands out
/// delivery handles.
pub struct ChannelResolver {
    directory: Arc<dyn ChannelDirectory>,
    sink: Arc<dyn MessageSink>,
}

impl ChannelResolver {
    pub fn new(directory: Arc<dyn ChannelDirectory>, sink: Arc<dyn MessageSink>) -> Self {
        Self { directory, sink }
    }

    /// Resolve the target to a deliverable channel.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// 1. both target halves are configured
    /// 2. the channel exists in the directory
    /// 3. the channel's parent matches the configured category
    pub fn resolve(&self, target: &ChannelTarget) -> Result<ResolvedChannel<'_>, ResolutionError> {
        let (channel_id, category_id) = match (&target.channel_id, &target.category_id) {
            (Some(channel), Some(category)) => (channel, category),
            _ => return Err(ResolutionError::ConfigMissing),
        };

        let record = self
            .directory
            .find(channel_id)
            .ok_or_else(|| ResolutionError::ChannelNotFound(channel_id.clone()))?;

        if record.parent_id.as_ref() != Some(category_id) {
            return Err(ResolutionError::CategoryMismatch {
                channel: channel_id.clone(),
                expected: category_id.clone(),
            });
        }

        Ok(ResolvedChannel {
            record,
            sink: self.sink.as_ref(),
        })
    }
}

/// Delivery handle for one successfully resolved channel.
pub struct ResolvedChannel<'a> {
    record: ChannelRecord,
    sink: &'a dyn MessageSink,
}

impl ResolvedChannel<'_> {
    /// The directory record the resolution matched.
    pub fn record(&self) -> &ChannelRecord {
        &self.record
    }

    /// Deliver one text message to the resolved channel.
    pub async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        self.sink.send_text(&self.record.id, text).await
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
