//! Chat-platform REST client and the startup channel cache.
//!
//! The REST client is the only piece of the service that talks to the chat
//! platform: it posts channel messages (as the resolver's [`MessageSink`])
//! and lists the guild's channels once at startup to warm the
//! [`CachedChannelDirectory`].

use async_trait::async_trait;
use channel_relay_core::channel::{ChannelDirectory, ChannelRecord, DeliveryError, MessageSink};
use channel_relay_core::{CategoryId, ChannelId};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from the chat platform's REST API.
#[derive(Debug, Error)]
pub enum ChatApiError {
    /// The request never completed.
    #[error("chat API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("chat API returned status {status}")]
    UnexpectedStatus { status: u16 },
}

/// REST client for the chat platform, authenticated as the bot.
#[derive(Clone)]
pub struct DiscordRestClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl DiscordRestClient {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }

    /// List every channel in the guild, for warming the lookup cache.
    #[instrument(skip(self))]
    pub async fn fetch_guild_channels(
        &self,
        guild_id: &str,
    ) -> Result<Vec<ChannelRecord>, ChatApiError> {
        let url = format!("{}/guilds/{}/channels", self.api_base, guild_id);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatApiError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }

        let channels: Vec<GuildChannel> = response.json().await?;
        debug!(count = channels.len(), "Fetched guild channel list");

        Ok(channels
            .into_iter()
            .filter_map(GuildChannel::into_record)
            .collect())
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }
}

#[async_trait]
impl MessageSink for DiscordRestClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DeliveryError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }

        debug!(channel = %channel, "Message delivered");
        Ok(())
    }
}

impl fmt::Debug for DiscordRestClient {
    // The bot token never lands in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordRestClient")
            .field("api_base", &self.api_base)
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

/// Channel shape returned by the guild-channels endpoint; only the fields
/// the cache needs.
#[derive(Debug, Deserialize)]
struct GuildChannel {
    id: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl GuildChannel {
    /// Convert to a domain record, skipping channels whose ids do not parse.
    fn into_record(self) -> Option<ChannelRecord> {
        let id = ChannelId::new(self.id).ok()?;
        let parent_id = self.parent_id.and_then(|p| CategoryId::new(p).ok());
        Some(ChannelRecord {
            id,
            parent_id,
            name: self.name,
        })
    }
}

// ============================================================================
// Channel Cache
// ============================================================================

/// Immutable channel cache warmed once at startup.
///
/// A failed warm-up leaves the cache empty rather than blocking boot;
/// lookups then resolve to not-found until the process restarts.
#[derive(Debug, Default)]
pub struct CachedChannelDirectory {
    channels: HashMap<ChannelId, ChannelRecord>,
}

impl CachedChannelDirectory {
    pub fn new(records: Vec<ChannelRecord>) -> Self {
        let channels = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl ChannelDirectory for CachedChannelDirectory {
    fn find(&self, id: &ChannelId) -> Option<ChannelRecord> {
        self.channels.get(id).cloned()
    }
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
