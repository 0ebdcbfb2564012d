//! Access-token providers.

use crate::object_store::TokenProvider;
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Default OAuth2 token endpoint for Dropbox.
pub const DEFAULT_TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// Tokens are refreshed this long before the expiry the server announced.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token response carries no `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(4 * 60 * 60);

/// Provider that always hands out the same token.
#[derive(Clone)]
pub struct StaticTokenProvider(String);

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticTokenProvider(..)")
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> StoreResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Provider that exchanges a long-lived refresh token for short-lived access tokens.
///
/// Uses the OAuth2 `refresh_token` grant, authenticating the app with HTTP basic auth.
/// The access token is cached and reused until shortly before it expires; concurrent callers
/// wait on the same refresh rather than issuing their own.
pub struct RefreshTokenProvider {
    client: reqwest::Client,
    token_url: String,
    app_key: String,
    app_secret: String,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for RefreshTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenProvider")
            .field("token_url", &self.token_url)
            .field("app_key", &self.app_key)
            .finish_non_exhaustive()
    }
}

impl RefreshTokenProvider {
    /// Creates a provider against the default Dropbox token endpoint.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Auth` if any credential is blank, or `StoreError::Transport` if
    /// the HTTP client cannot be built.
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        Self::with_token_url(DEFAULT_TOKEN_URL, app_key, app_secret, refresh_token, timeout)
    }

    /// Creates a provider against an explicit token endpoint.
    pub fn with_token_url(
        token_url: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let app_key = app_key.into();
        let app_secret = app_secret.into();
        let refresh_token = refresh_token.into();
        for (name, value) in [
            ("app key", &app_key),
            ("app secret", &app_secret),
            ("refresh token", &refresh_token),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::Auth(format!("{name} is not configured")));
            }
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token_url: token_url.into(),
            app_key,
            app_secret,
            refresh_token,
            cached: Mutex::new(None),
        })
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> StoreResult<CachedToken> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.app_key, Some(&self.app_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!(
                "cannot refresh access token ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("malformed token response: {e}")))?;

        debug!(expires_in = ?token.expires_in, "access token refreshed");
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: refresh_deadline(Instant::now(), token.expires_in),
        })
    }
}

fn refresh_deadline(now: Instant, expires_in: Option<u64>) -> Instant {
    let lifetime = expires_in
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_LIFETIME);
    now + lifetime.saturating_sub(EXPIRY_MARGIN)
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn access_token(&self) -> StoreResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }
        let fresh = self.refresh().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}
