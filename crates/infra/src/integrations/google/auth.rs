//! OAuth token management for the calendar gateway.
//!
//! The interactive authorization flow that produces the refresh token is
//! external bootstrap; this module only exchanges the stored refresh token
//! for access tokens and caches them until near expiry.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use tokio::sync::RwLock;
use tracing::debug;
use voxcal_domain::{Result, VoxCalError};

use crate::config::GoogleConfig;
use crate::http::HttpClient;

use super::types::TokenResponse;

const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Refresh an access token this long before it actually expires.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges the stored refresh token for access tokens on demand.
pub struct GoogleAuthManager {
    http: HttpClient,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_endpoint: String,
    cached: RwLock<Option<CachedToken>>,
}

impl GoogleAuthManager {
    pub fn new(config: &GoogleConfig, http: HttpClient) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            cached: RwLock::new(None),
        }
    }

    /// Override the token endpoint (for testing against a mock server).
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Current access token, refreshed when missing or near expiry.
    pub async fn access_token(&self) -> Result<String> {
        let now = Utc::now();

        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at - Duration::seconds(EXPIRY_MARGIN_SECONDS) > now {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(EXPIRY_MARGIN_SECONDS) > now {
                return Ok(token.access_token.clone());
            }
        }

        debug!("refreshing calendar access token");
        let refreshed = self.refresh(now).await?;
        let access_token = refreshed.access_token.clone();
        *cached = Some(refreshed);
        Ok(access_token)
    }

    async fn refresh(&self, now: DateTime<Utc>) -> Result<CachedToken> {
        let request = self.http.request(Method::POST, &self.token_endpoint).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ]);

        let response = self.http.send(request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(VoxCalError::Auth(format!("token refresh failed ({status}): {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| VoxCalError::Auth(format!("failed to parse token response: {e}")))?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}
