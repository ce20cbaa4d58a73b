//! Byte fetching collaborator
//!
//! The orchestrator only needs `fetch(url) -> bytes`. The default
//! implementation streams over HTTP(S) with reqwest and stops reading as
//! soon as the body crosses the configured size cap.

use crate::config::AnalysisSettings;
use crate::error::{AnalysisError, ErrorCode, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};

/// Download capability
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Fetch the full body behind `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Get the name of this fetcher (for logging)
    fn name(&self) -> &'static str;
}

/// reqwest-backed fetcher with a per-request timeout and a streaming size cap
pub struct HttpFetcher {
    client: reqwest::Client,
    max_size: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_size: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tunelens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                AnalysisError::new(
                    ErrorCode::DownloadFailed,
                    format!("Failed to build HTTP client: {}", e),
                )
            })?;
        Ok(Self { client, max_size })
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Result<Self> {
        Self::new(settings.download_timeout, settings.max_file_size)
    }
}

fn map_request_error(url: &str, e: reqwest::Error) -> AnalysisError {
    let code = if e.is_timeout() {
        ErrorCode::DownloadTimeout
    } else {
        ErrorCode::DownloadFailed
    };
    AnalysisError::new(code, format!("Download of {} failed: {}", url, e))
        .with_detail("url", url)
        .with_detail("cause", e.to_string())
}

#[async_trait]
impl AudioFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let mut err = AnalysisError::new(
                ErrorCode::DownloadFailed,
                format!("Download of {} returned HTTP {}", url, status),
            )
            .with_detail("url", url)
            .with_detail("status", status.as_u16());
            // Client errors will not fix themselves on retry
            err.retryable = status.is_server_error();
            return Err(err);
        }

        if let Some(length) = response.content_length() {
            if length > self.max_size {
                return Err(AnalysisError::file_too_large(length, self.max_size));
            }
        }

        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_request_error(url, e))?
        {
            trace!("Received {} bytes", chunk.len());
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_size {
                return Err(AnalysisError::file_too_large(body.len() as u64, self.max_size));
            }
        }

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
