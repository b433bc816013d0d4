//! Thin REST client for the profile document store

use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned status {0}")]
    Status(StatusCode),
    #[error("store returned an unreadable document")]
    Decode(#[source] serde_json::Error),
}

/// Document-oriented HTTP client. Paths are relative to the configured base
/// URL; authentication rides in a bearer header on every request.
#[derive(Clone)]
pub struct DocumentClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DocumentClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Fetch one document. A missing document is `Ok(None)`, not an error.
    pub async fn get_document(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = resp.bytes().await?;
                let doc = serde_json::from_slice(&body).map_err(StoreError::Decode)?;
                Ok(Some(doc))
            }
            status => Err(StoreError::Status(status)),
        }
    }

    /// Merge the given fields into a document
    pub async fn patch_document(&self, path: &str, body: &Value) -> Result<(), StoreError> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Status(status))
        }
    }
}
