//! Token verification against the external identity service

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token rejected by the identity service")]
    InvalidToken,
    #[error("identity service returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
pub struct VerifiedUser {
    pub uid: String,
}

/// Verifies client-presented id tokens with the identity service before a
/// session is allowed into a room.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    verify_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(verify_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            verify_url,
            api_key,
        }
    }

    /// Exchange an id token for the verified user identity
    pub async fn verify_id_token(&self, token: &str) -> Result<VerifiedUser, AuthError> {
        let resp = self
            .http
            .post(&self.verify_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "id_token": token }))
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => {
                let user: VerifiedUser =
                    resp.json().await.map_err(|_| AuthError::InvalidToken)?;
                debug!(uid = %user.uid, "token verified");
                Ok(user)
            }
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::BAD_REQUEST => {
                Err(AuthError::InvalidToken)
            }
            status => Err(AuthError::Status(status)),
        }
    }
}
