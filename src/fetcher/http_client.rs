use crate::config::BackendConfig;
use crate::error::DataError;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

pub struct HttpClient {
    inner: reqwest::Client,
    config: BackendConfig,
}

impl HttpClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// GET a URL and return the body of a 2xx response.
    ///
    /// Only connectivity failures are retried, and only up to
    /// `max_retries` times; a non-success status is returned as-is.
    pub async fn get_text(&self, url: &Url) -> Result<String, DataError> {
        // Delays run 2f, 4f, 8f ms with f ≈ retry_delay_ms / 2, i.e. retry_delay_ms·2^k,
        // each scaled by a random jitter in [0, 1) and capped at timeout_secs.
        let backoff = ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_delay_ms.max(1) / 2 + 1)
            .max_delay(Duration::from_secs(self.config.timeout_secs.max(1)))
            .map(jitter)
            .take(self.config.max_retries as usize);

        let mut attempt = 0u32;
        RetryIf::spawn(
            backoff,
            || {
                attempt += 1;
                self.get_once(url, attempt)
            },
            |e: &DataError| {
                let retry = e.is_retryable();
                if retry && self.config.max_retries > 0 {
                    warn!("GET {} failed: {} (will retry)", url, e);
                }
                retry
            },
        )
        .await
    }

    async fn get_once(&self, url: &Url, attempt: u32) -> Result<String, DataError> {
        debug!("GET {} (attempt {})", url, attempt);

        let resp = self
            .inner
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DataError::Connectivity(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!("GET {} → HTTP {}", url, status);
            return Err(DataError::Api {
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| DataError::Connectivity(format!("failed to read response body: {e}")))
    }
}
