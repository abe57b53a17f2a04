//! Environment-driven service configuration.
//!
//! All settings arrive as flat environment variables, the deployment style
//! this service inherits. [`RelayConfig::load`] reads them through the
//! `config` crate; [`RelayConfig::into_settings`] validates everything in a
//! single pass, naming every missing variable at once, and hands back typed
//! values the rest of the service can use without re-checking.

use channel_relay_core::channel::ChannelTarget;
use channel_relay_core::signature::Ed25519Verifier;
use channel_relay_core::{CategoryId, ChannelId};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors that occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum RelayConfigError {
    /// One or more required environment variables are unset or empty.
    #[error("missing required environment variables: {}", .names.join(", "))]
    MissingVariables { names: Vec<&'static str> },

    /// A variable is set but its value is unusable.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    /// The environment source itself could not be read.
    #[error("failed to read configuration from the environment: {0}")]
    Load(#[from] config::ConfigError),
}

// ============================================================================
// Raw Environment Values
// ============================================================================

/// Raw environment values, one field per variable.
///
/// `None` means the variable is unset. Nothing here is validated; that is
/// [`RelayConfig::into_settings`]'s job.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,

    pub discord_bot_token: Option<String>,
    pub discord_public_key: Option<String>,
    pub discord_category_id: Option<String>,
    pub discord_channel_id: Option<String>,
    pub discord_client_id: Option<String>,
    pub discord_guild_id: Option<String>,
    /// Downstream URL the outbound forwarder posts normalized events to.
    pub discord_webhook_url: Option<String>,
    pub discord_api_base: String,

    pub paypal_client_id: Option<String>,
    pub paypal_client_secret: Option<String>,
    /// Route path the payment webhook is mounted at, e.g. `/paypal/webhook`.
    pub paypal_webhook_url: Option<String>,
    pub paypal_api_base: String,

    /// Whether the chat route's fire-and-forget forward is active.
    pub forwarding_enabled: Option<bool>,

    /// Checkout URL behind the `buy` command's link button.
    pub payment_link_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            discord_bot_token: None,
            discord_public_key: None,
            discord_category_id: None,
            discord_channel_id: None,
            discord_client_id: None,
            discord_guild_id: None,
            discord_webhook_url: None,
            discord_api_base: "https://discord.com/api/v10".to_string(),
            paypal_client_id: None,
            paypal_client_secret: None,
            paypal_webhook_url: None,
            paypal_api_base: "https://api-m.sandbox.paypal.com".to_string(),
            forwarding_enabled: None,
            payment_link_url: "https://www.paypal.com/checkoutnow".to_string(),
        }
    }
}

impl RelayConfig {
    /// Read configuration from flat environment variables.
    ///
    /// Variable names map to lowercase field names (`DISCORD_BOT_TOKEN` to
    /// `discord_bot_token`); `PORT` and `FORWARDING_ENABLED` are parsed into
    /// their typed forms.
    pub fn load() -> Result<Self, RelayConfigError> {
        let source = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        Ok(source.try_deserialize()?)
    }

    /// Validate without consuming, naming every missing variable in one
    /// error.
    pub fn validate(&self) -> Result<(), RelayConfigError> {
        self.clone().into_settings().map(|_| ())
    }

    /// Validate and convert into ready-to-use settings.
    pub fn into_settings(self) -> Result<RelaySettings, RelayConfigError> {
        let mut missing = Vec::new();

        let bot_token = required(self.discord_bot_token, "DISCORD_BOT_TOKEN", &mut missing);
        let public_key = required(self.discord_public_key, "DISCORD_PUBLIC_KEY", &mut missing);
        let category_id = required(self.discord_category_id, "DISCORD_CATEGORY_ID", &mut missing);
        let channel_id = required(self.discord_channel_id, "DISCORD_CHANNEL_ID", &mut missing);
        let client_id = required(self.discord_client_id, "DISCORD_CLIENT_ID", &mut missing);
        let guild_id = required(self.discord_guild_id, "DISCORD_GUILD_ID", &mut missing);
        let webhook_url = required(self.discord_webhook_url, "DISCORD_WEBHOOK_URL", &mut missing);
        let paypal_client_id = required(self.paypal_client_id, "PAYPAL_CLIENT_ID", &mut missing);
        let paypal_client_secret = required(
            self.paypal_client_secret,
            "PAYPAL_CLIENT_SECRET",
            &mut missing,
        );
        let paypal_webhook_path =
            required(self.paypal_webhook_url, "PAYPAL_WEBHOOK_URL", &mut missing);
        let forwarding_enabled = match self.forwarding_enabled {
            Some(value) => value,
            None => {
                missing.push("FORWARDING_ENABLED");
                false
            }
        };

        if !missing.is_empty() {
            return Err(RelayConfigError::MissingVariables { names: missing });
        }

        let verifier =
            Ed25519Verifier::from_hex(&public_key).map_err(|e| RelayConfigError::Invalid {
                key: "DISCORD_PUBLIC_KEY",
                message: e.to_string(),
            })?;

        let channel_id = ChannelId::new(channel_id).map_err(|e| RelayConfigError::Invalid {
            key: "DISCORD_CHANNEL_ID",
            message: e.to_string(),
        })?;
        let category_id = CategoryId::new(category_id).map_err(|e| RelayConfigError::Invalid {
            key: "DISCORD_CATEGORY_ID",
            message: e.to_string(),
        })?;

        let forward_target = Url::parse(&webhook_url).map_err(|e| RelayConfigError::Invalid {
            key: "DISCORD_WEBHOOK_URL",
            message: e.to_string(),
        })?;

        if !paypal_webhook_path.starts_with('/') {
            return Err(RelayConfigError::Invalid {
                key: "PAYPAL_WEBHOOK_URL",
                message: "route path must start with '/'".to_string(),
            });
        }

        for (key, value) in [
            ("DISCORD_API_BASE", &self.discord_api_base),
            ("PAYPAL_API_BASE", &self.paypal_api_base),
            ("PAYMENT_LINK_URL", &self.payment_link_url),
        ] {
            Url::parse(value).map_err(|e| RelayConfigError::Invalid {
                key,
                message: e.to_string(),
            })?;
        }

        Ok(RelaySettings {
            host: self.host,
            port: self.port,
            bot_token,
            verifier,
            guild_id,
            client_id,
            channel_target: ChannelTarget::new(channel_id, category_id),
            discord_api_base: self.discord_api_base,
            forward_target,
            forwarding_enabled,
            paypal_client_id,
            paypal_client_secret,
            paypal_api_base: self.paypal_api_base,
            paypal_webhook_path,
            payment_link_url: self.payment_link_url,
        })
    }
}

/// Pull a required value out, or record its variable name as missing.
fn required(
    value: Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

// ============================================================================
// Validated Settings
// ============================================================================

/// Validated, ready-to-use configuration.
#[derive(Clone)]
pub struct RelaySettings {
    pub host: String,
    pub port: u16,

    pub bot_token: String,
    pub verifier: Ed25519Verifier,
    pub guild_id: String,
    pub client_id: String,
    pub channel_target: ChannelTarget,
    pub discord_api_base: String,

    pub forward_target: Url,
    pub forwarding_enabled: bool,

    pub paypal_client_id: String,
    pub paypal_client_secret: String,
    pub paypal_api_base: String,
    pub paypal_webhook_path: String,

    pub payment_link_url: String,
}

impl fmt::Debug for RelaySettings {
    // Secrets never land in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bot_token", &"<redacted>")
            .field("guild_id", &self.guild_id)
            .field("client_id", &self.client_id)
            .field("channel_target", &self.channel_target)
            .field("discord_api_base", &self.discord_api_base)
            .field("forward_target", &self.forward_target.as_str())
            .field("forwarding_enabled", &self.forwarding_enabled)
            .field("paypal_client_id", &self.paypal_client_id)
            .field("paypal_client_secret", &"<redacted>")
            .field("paypal_api_base", &self.paypal_api_base)
            .field("paypal_webhook_path", &self.paypal_webhook_path)
            .field("payment_link_url", &self.payment_link_url)
            .finish()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
