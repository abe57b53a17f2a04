//! Outbound event forwarding to the downstream relay endpoint.
//!
//! One POST per event, single attempt, no retry; the shared client's timeout
//! bounds the call. The payment route awaits [`EventForwarder::forward`]
//! because its HTTP response depends on the outcome; the chat route uses
//! [`EventForwarder::forward_detached`], which spawns a task that logs its
//! own result and never surfaces it to the request that triggered it.

use channel_relay_core::event::NormalizedMessage;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

/// Errors from a downstream forward attempt.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// No downstream URL is configured.
    #[error("no forward target is configured")]
    NotConfigured,

    /// The request never completed.
    #[error("forward request failed: {reason}")]
    Transport { reason: String },

    /// The downstream answered with a non-success status.
    #[error("downstream returned status {status}")]
    UpstreamStatus { status: u16 },
}

/// Posts normalized events to the configured downstream URL.
#[derive(Debug)]
pub struct EventForwarder {
    http: reqwest::Client,
    target: Option<Url>,
    enabled: bool,
}

impl EventForwarder {
    pub fn new(http: reqwest::Client, target: Option<Url>, enabled: bool) -> Self {
        Self {
            http,
            target,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Single forwarding attempt. The downstream must answer 2xx.
    pub async fn forward(
        &self,
        message: &NormalizedMessage,
        bearer: Option<&str>,
    ) -> Result<(), ForwardError> {
        let target = self.target.as_ref().ok_or(ForwardError::NotConfigured)?;

        let mut request = self.http.post(target.clone()).json(message);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| ForwardError::Transport {
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(ForwardError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }

    /// Fire-and-forget forward for the chat route.
    ///
    /// Honors the forwarding flag; when active, the spawned task owns the
    /// payload and logs its own outcome. The handle is returned for tests
    /// that need to await completion.
    pub fn forward_detached(self: &Arc<Self>, message: NormalizedMessage) -> Option<JoinHandle<()>> {
        if !self.enabled {
            info!(
                event_type = %message.event_type,
                "Forwarding disabled; skipping outbound post"
            );
            return None;
        }

        let forwarder = Arc::clone(self);
        Some(tokio::spawn(async move {
            match forwarder.forward(&message, None).await {
                Ok(()) => info!(
                    event_type = %message.event_type,
                    "Forwarded event downstream"
                ),
                Err(e) => warn!(
                    event_type = %message.event_type,
                    error = %e,
                    "Outbound forward failed"
                ),
            }
        }))
    }
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;
