//! Registry authentication
//!
//! [`AuthHeaderBuilder`] obtains a fresh `Authorization` header value.
//! [`TokenCache`] keeps the current value and makes sure concurrent callers
//! that all saw it rejected converge on a single refresh. Both waiting for the
//! cache and building a header stay within the caller's deadline.

use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use odb_core::RequestContext;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Produces an `Authorization` header value for registry calls
#[async_trait]
pub trait AuthHeaderBuilder: Send + Sync {
    /// `timeout` of `None` leaves the build unbounded
    async fn build(&self, timeout: Option<Duration>) -> Result<String>;
}

/// OAuth2 client-credentials grant against the UAA token endpoint
pub struct ClientCredentialsAuth {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

/// Named in timeouts while waiting for another caller's build
const TOKEN_CACHE: &str = "auth token cache";

fn default_token_type() -> String {
    "bearer".to_string()
}

impl ClientCredentialsAuth {
    pub fn new(
        uaa_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: format!("{}/oauth/token", uaa_url.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl AuthHeaderBuilder for ClientCredentialsAuth {
    async fn build(&self, timeout: Option<Duration>) -> Result<String> {
        if timeout.is_some_and(|left| left.is_zero()) {
            return Err(RegistryError::Timeout(self.token_url.clone()));
        }
        tracing::debug!(token_url = %self.token_url, "Requesting registry access token");

        let mut request = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")]);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::from_transport(&self.token_url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::from_transport(&self.token_url, e))?;

        if status.is_server_error() {
            return Err(RegistryError::from_status(status.as_u16(), &body));
        }
        if !status.is_success() {
            return Err(RegistryError::Auth(format!(
                "token endpoint answered {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| RegistryError::Auth(e.to_string()))?;
        Ok(format!("{} {}", token.token_type, token.access_token))
    }
}

/// Cached auth header with single-flight refresh
///
/// The mutex is held across the builder call, so at most one build runs at a
/// time and everyone waiting on the lock sees its result. A caller gives up
/// waiting when its own deadline passes.
pub struct TokenCache {
    builder: Arc<dyn AuthHeaderBuilder>,
    current: Mutex<Option<String>>,
}

impl TokenCache {
    pub fn new(builder: Arc<dyn AuthHeaderBuilder>) -> Self {
        Self {
            builder,
            current: Mutex::new(None),
        }
    }

    async fn lock(&self, ctx: &RequestContext) -> Result<MutexGuard<'_, Option<String>>> {
        match ctx.remaining() {
            Some(left) => tokio::time::timeout(left, self.current.lock())
                .await
                .map_err(|_| RegistryError::Timeout(TOKEN_CACHE.to_string())),
            None => Ok(self.current.lock().await),
        }
    }

    /// Current header, building one on first use
    pub async fn header(&self, ctx: &RequestContext) -> Result<String> {
        let mut current = self.lock(ctx).await?;
        if let Some(header) = current.as_ref() {
            return Ok(header.clone());
        }

        let header = self.builder.build(ctx.remaining()).await?;
        *current = Some(header.clone());
        Ok(header)
    }

    /// Replace a header the registry rejected
    ///
    /// If another caller already replaced `stale`, its value is returned
    /// without building again.
    pub async fn refresh(&self, ctx: &RequestContext, stale: &str) -> Result<String> {
        let mut current = self.lock(ctx).await?;
        if let Some(header) = current.as_ref()
            && header != stale
        {
            return Ok(header.clone());
        }

        tracing::debug!("Refreshing registry auth header");
        match self.builder.build(ctx.remaining()).await {
            Ok(header) => {
                *current = Some(header.clone());
                Ok(header)
            }
            Err(e) => {
                *current = None;
                Err(e)
            }
        }
    }
}
