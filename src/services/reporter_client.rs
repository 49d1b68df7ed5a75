//! HTTP client the frontend uses to reach the reporter.

use crate::models::archive::{ArchiveUrl, StoredArchive};
use bytes::Bytes;
use reqwest::{
    StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use std::time::Duration;
use thiserror::Error;

const JSON: &str = "application/json";

/// Content type reported when the reporter omits one.
pub const DEFAULT_PASSTHROUGH_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("reporter request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status. The message is the upstream body text.
    #[error("{body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed reporter response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A reporter response passed back to the caller untouched.
#[derive(Debug, Clone)]
pub struct Passthrough {
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct ReporterClient {
    http: reqwest::Client,
    base: String,
}

impl ReporterClient {
    /// Every request carries `timeout` as its deadline.
    pub fn new(base: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// `GET {base}/api/archives`, validated as a list of `{name, url}`.
    pub async fn list(&self) -> Result<Vec<ArchiveUrl>, UpstreamError> {
        let url = format!("{}/api/archives", self.base);
        let (_, body) = self.get_expecting_ok(&url).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `GET url`, returning the body and its content type as received.
    pub async fn fetch(&self, url: &str) -> Result<Passthrough, UpstreamError> {
        let (content_type, body) = self.get_expecting_ok(url).await?;
        Ok(Passthrough {
            content_type: content_type.unwrap_or_else(|| DEFAULT_PASSTHROUGH_TYPE.to_string()),
            body,
        })
    }

    /// `POST {base}/api/archive` with `body` streamed through. Returns the
    /// key the reporter assigned.
    pub async fn create(
        &self,
        body: reqwest::Body,
        content_type: Option<&str>,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/api/archive", self.base);
        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, content_type.unwrap_or(JSON))
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if status != StatusCode::CREATED {
            return Err(UpstreamError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let stored: StoredArchive = serde_json::from_slice(&bytes)?;
        Ok(stored.key)
    }

    async fn get_expecting_ok(&self, url: &str) -> Result<(Option<String>, Bytes), UpstreamError> {
        let resp = self.http.get(url).header(ACCEPT, JSON).send().await?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?;
        if status != StatusCode::OK {
            return Err(UpstreamError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok((content_type, body))
    }
}
