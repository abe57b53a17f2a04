//! Payment-provider OAuth token source.
//!
//! The downstream forward of a payment event is authenticated with a bearer
//! token obtained through the provider's client-credentials flow. A fresh
//! token is requested per event; callers see failures as a generic 500 while
//! the detail stays in the logs.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from the OAuth token exchange.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The request never completed.
    #[error("token request failed: {reason}")]
    Transport { reason: String },

    /// The endpoint answered with a non-success status.
    #[error("token endpoint returned status {status}")]
    UpstreamStatus { status: u16 },

    /// The endpoint answered 2xx but without a usable `access_token`.
    #[error("token response carried no access_token")]
    MalformedResponse,
}

/// Narrow interface to the payment provider's token endpoint.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// A bearer token for authenticating the downstream forward.
    async fn access_token(&self) -> Result<String, TokenError>;
}

/// Client-credentials OAuth client for the payment provider.
#[derive(Clone)]
pub struct PaypalOauthClient {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl PaypalOauthClient {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Token-endpoint response; fields beyond the token itself are ignored.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[async_trait]
impl AccessTokenSource for PaypalOauthClient {
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String, TokenError> {
        let url = format!("{}/v1/oauth2/token", self.api_base);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| TokenError::Transport {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(TokenError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| TokenError::Transport {
            reason: e.to_string(),
        })?;

        let token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::MalformedResponse)?;

        debug!("Obtained payment-provider access token");
        Ok(token)
    }
}

impl fmt::Debug for PaypalOauthClient {
    // The client secret never lands in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaypalOauthClient")
            .field("api_base", &self.api_base)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[path = "paypal_tests.rs"]
mod tests;
