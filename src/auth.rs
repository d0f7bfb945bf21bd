//! Access token resolution with transparent refresh.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use log::info;
use serde::Deserialize;
use wreq::Client;

use crate::clock::Clock;
use crate::model::User;
use crate::repository::Store;
use crate::repository::StoreError;

/// Tokens reported as valid for less than this are refreshed anyway, so a
/// token returned to a caller cannot expire mid-cycle.
const EXPIRY_LEEWAY_SECS: i64 = 30;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("Token refresh request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Token refresh rejected with status {status} for user `{user_id}`")]
    RefreshRejected { user_id: String, status: u16 },

    #[error("Failed to parse token response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<wreq::Error> for AuthError {
    fn from(e: wreq::Error) -> Self {
        AuthError::RequestFailed(Box::new(e))
    }
}

/// A usable access token plus the user row as currently persisted (the
/// refresh may have rewritten the credential fields).
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub access_token: String,
    pub user: User,
}

/// Resolves a currently-valid access token for a user, refreshing and
/// persisting new credentials when the stored token is expired or nearly so.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn resolve(&self, user: &User) -> Result<ResolvedToken, AuthError>;
}

#[derive(Deserialize)]
struct WireTokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct OAuthTokenProvider {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl OAuthTokenProvider {
    pub fn new(
        token_url: String,
        client_id: String,
        client_secret: String,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let client = Client::builder()
            .build()
            .expect("Failed to create client");

        Self {
            client,
            token_url,
            client_id,
            client_secret,
            store,
            clock,
        }
    }

    async fn refresh(&self, user: &User) -> Result<WireTokenResponse, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", &user.refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::RefreshRejected {
                user_id: user.id.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn resolve(&self, user: &User) -> Result<ResolvedToken, AuthError> {
        let now = self.clock.now();
        if user.expires_at - Duration::seconds(EXPIRY_LEEWAY_SECS) > now {
            return Ok(ResolvedToken {
                access_token: user.access_token.clone(),
                user: user.clone(),
            });
        }

        let tokens = self.refresh(user).await?;

        // Persist the new credentials before handing the token out, so a
        // retried cycle never sees the stale row. Nothing is written on a
        // failed exchange.
        let mut updated = user.clone();
        updated.access_token = tokens.access_token.clone();
        if let Some(refresh_token) = tokens.refresh_token {
            updated.refresh_token = refresh_token;
        }
        updated.expires_at = now + Duration::seconds(tokens.expires_in);

        info!("Saving refreshed access token. user_id={}", user.id);
        let user = self.store.upsert_user(&updated).await?;

        Ok(ResolvedToken {
            access_token: tokens.access_token,
            user,
        })
    }
}
