//! # Channel Relay Service
//!
//! Binary entry point for the channel-relay HTTP service.
//!
//! This executable:
//! - Initializes structured logging
//! - Loads and validates configuration from the environment
//! - Builds the signature verifier, chat client, channel cache, token
//!   source, and downstream forwarder
//! - Starts the HTTP server with graceful shutdown

use channel_relay_core::channel::ChannelResolver;
use channel_relay_core::command::CommandResponder;
use channel_relay_core::ledger::CommandLedger;
use channel_relay_core::signature::SignatureVerifier;
use channel_relay_service::chat::{CachedChannelDirectory, DiscordRestClient};
use channel_relay_service::config::RelayConfig;
use channel_relay_service::forwarder::EventForwarder;
use channel_relay_service::paypal::PaypalOauthClient;
use channel_relay_service::{start_server, AppState, ServiceError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// One shared timeout for every outbound HTTP call: chat sends, the token
/// exchange, and downstream forwards. Single attempt, no retry.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "channel_relay_service=info,channel_relay_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Channel Relay service");

    // Load configuration. Every missing required variable is named in one
    // error so a misconfigured deployment fails in a single round.
    let settings = match RelayConfig::load().and_then(RelayConfig::into_settings) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };
    debug!(?settings, "Loaded configuration");

    let http = match reqwest::Client::builder().timeout(HTTP_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build the HTTP client; aborting");
            std::process::exit(3);
        }
    };

    let chat = Arc::new(DiscordRestClient::new(
        http.clone(),
        settings.discord_api_base.clone(),
        settings.bot_token.clone(),
    ));

    // Warm the channel cache with one REST fetch. A failure here leaves the
    // cache empty and the service still boots: lookups resolve to not-found
    // until a restart, while ping, handshake, and payment routes keep
    // working.
    let directory = match chat.fetch_guild_channels(&settings.guild_id).await {
        Ok(records) => {
            info!(
                guild = %settings.guild_id,
                channels = records.len(),
                "Warmed channel cache"
            );
            CachedChannelDirectory::new(records)
        }
        Err(e) => {
            warn!(
                guild = %settings.guild_id,
                error = %e,
                "Failed to warm channel cache; starting with an empty directory"
            );
            CachedChannelDirectory::default()
        }
    };

    let resolver = Arc::new(ChannelResolver::new(Arc::new(directory), chat));

    let token_source = Arc::new(PaypalOauthClient::new(
        http.clone(),
        settings.paypal_api_base.clone(),
        settings.paypal_client_id.clone(),
        settings.paypal_client_secret.clone(),
    ));

    let forwarder = Arc::new(EventForwarder::new(
        http,
        Some(settings.forward_target.clone()),
        settings.forwarding_enabled,
    ));

    let state = AppState {
        verifier: Some(Arc::new(settings.verifier.clone()) as Arc<dyn SignatureVerifier>),
        resolver,
        target: settings.channel_target.clone(),
        responder: Arc::new(CommandResponder::new(settings.payment_link_url.clone())),
        ledger: Arc::new(CommandLedger::new()),
        token_source,
        forwarder,
    };

    info!(
        host = %settings.host,
        port = settings.port,
        paypal_path = %settings.paypal_webhook_path,
        forwarding = settings.forwarding_enabled,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(
        state,
        &settings.paypal_webhook_path,
        &settings.host,
        settings.port,
    )
    .await
    {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}
