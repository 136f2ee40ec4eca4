//! Access-token lifecycle for authenticated (structure) requests.
//!
//! The [`TokenManager`] is the only writer. It publishes each new token
//! through a `watch` channel as one immutable [`AccessToken`], so a reader
//! never sees a token paired with another token's expiry.

use crate::config::EsiConfig;
use crate::error::{AuthError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Shortest pause between two refreshes, even for tokens that expire within the margin
const MIN_REFRESH_WAIT: Duration = Duration::from_secs(1);

/// A bearer token and the instant it stops being valid
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    /// Bearer token value
    pub token: String,
    /// Expiry reported by the token endpoint
    pub expires_at: DateTime<Utc>,
}

/// Payload of the OAuth token endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// New access token
    pub access_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: u64,
    /// Token type (always "Bearer")
    #[serde(default)]
    pub token_type: String,
    /// Rotated refresh token, when the endpoint issues one
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Read side of the shared token state
#[derive(Clone, Debug)]
pub struct TokenReader {
    rx: watch::Receiver<Option<AccessToken>>,
}

impl TokenReader {
    /// A reader that always sees `token`
    pub fn fixed(token: AccessToken) -> Self {
        let (_tx, rx) = watch::channel(Some(token));
        Self { rx }
    }

    /// Current bearer token, if one has been published
    pub fn current(&self) -> Option<String> {
        self.rx.borrow().as_ref().map(|t| t.token.clone())
    }

    /// Current token together with its expiry
    pub fn snapshot(&self) -> Option<AccessToken> {
        self.rx.borrow().clone()
    }
}

/// Keeps a single bearer token fresh
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    refresh_token: String,
    margin: Duration,
    tx: watch::Sender<Option<AccessToken>>,
}

impl TokenManager {
    /// Create a manager with no token published yet
    pub fn new(
        http: reqwest::Client,
        esi: &EsiConfig,
        client_id: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            http,
            token_url: esi.token_url.clone(),
            client_id: client_id.into(),
            refresh_token: refresh_token.into(),
            margin: esi.token_refresh_margin,
            tx,
        }
    }

    /// A reader for the published token
    pub fn reader(&self) -> TokenReader {
        TokenReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Exchange the refresh token for a new access token
    ///
    /// A rotated refresh token in the response replaces the configured one.
    pub async fn refresh(&mut self) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
        ];

        let response = self.http.post(&self.token_url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.bytes().await?;
        let tokens: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        if tokens.access_token.is_empty() {
            return Err(AuthError::MalformedResponse("empty access_token".into()).into());
        }

        if let Some(rotated) = tokens.refresh_token.as_deref() {
            if !rotated.is_empty() && rotated != self.refresh_token {
                debug!("Token endpoint rotated the refresh token");
                self.refresh_token = rotated.to_string();
            }
        }

        Ok(tokens)
    }

    /// Refresh and publish the new token to every reader
    pub async fn refresh_and_publish(&mut self) -> Result<AccessToken> {
        let tokens = self.refresh().await?;
        let lifetime = chrono::Duration::seconds(i64::try_from(tokens.expires_in).map_err(
            |_| AuthError::MalformedResponse(format!("expires_in {} out of range", tokens.expires_in)),
        )?);

        let token = AccessToken {
            token: tokens.access_token,
            expires_at: Utc::now() + lifetime,
        };
        self.tx.send_replace(Some(token.clone()));
        Ok(token)
    }

    /// How long to wait before the next refresh
    fn until_refresh(&self) -> Duration {
        match self.tx.borrow().as_ref() {
            Some(token) => {
                let refresh_at = token.expires_at
                    - chrono::Duration::from_std(self.margin).unwrap_or(chrono::Duration::zero());
                (refresh_at - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
                    .max(MIN_REFRESH_WAIT)
            }
            None => Duration::ZERO,
        }
    }

    /// Refresh loop: sleep until shortly before expiry, refresh, repeat
    ///
    /// Exits on cancellation. A failed refresh is logged and ends the loop;
    /// authenticated fetches fail from then on.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Token refresher started");

        loop {
            let wait = self.until_refresh();
            debug!(wait_secs = wait.as_secs(), "Next token refresh scheduled");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.refresh_and_publish() => result,
            };

            match result {
                Ok(token) => {
                    info!(expires_at = %token.expires_at, "Refreshed access token");
                }
                Err(e) => {
                    error!(error = %e, "Failed to refresh access token, token refresher stopping");
                    break;
                }
            }
        }

        info!("Token refresher stopped");
    }
}
