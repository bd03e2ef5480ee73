use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::index::FilingReference;
use super::rate_limiter::RateLimiter;

pub const FILING_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const INDEX_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient failure fetching {url}: {reason}")]
    Transient {
        url: String,
        reason: String,
        status: Option<u16>,
    },
    #[error("permanent failure fetching {url}: {reason}")]
    Permanent {
        url: String,
        reason: String,
        status: Option<u16>,
    },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Transient { status, .. } | FetchError::Permanent { status, .. } => *status,
        }
    }
}

/// 4xx responses point at a bad reference and must not be retried; anything
/// server-side or rate-related can be.
fn status_is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// One Form 4 document as fetched, before any XML cleanup.
#[derive(Debug)]
pub struct RawFiling {
    pub url: Url,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// HTTP client for SEC endpoints. All requests go through the shared
/// rate limiter and carry the identifying User-Agent the SEC requires.
pub struct EdgarClient {
    http: Client,
    user_agent: String,
    archives_url: Url,
    limiter: RateLimiter,
}

impl EdgarClient {
    pub fn new(
        user_agent: &str,
        min_request_interval: Duration,
        archives_url: Url,
    ) -> anyhow::Result<Self> {
        let http = Client::builder().gzip(true).build()?;
        Ok(EdgarClient {
            http,
            user_agent: user_agent.to_string(),
            archives_url,
            limiter: RateLimiter::new(min_request_interval),
        })
    }

    pub async fn get_text(&self, url: &Url, timeout: Duration) -> Result<String, FetchError> {
        self.limiter.wait().await;
        debug!("Fetching URL: {}", url);

        let response = self
            .http
            .get(url.as_str())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                reason: e.to_string(),
                status: None,
            })?;

        let status = response.status();
        debug!("Response status for {}: {}", url, status);

        if !status.is_success() {
            let reason = format!("HTTP status {}", status);
            return Err(if status_is_transient(status) {
                FetchError::Transient {
                    url: url.to_string(),
                    reason,
                    status: Some(status.as_u16()),
                }
            } else {
                FetchError::Permanent {
                    url: url.to_string(),
                    reason,
                    status: Some(status.as_u16()),
                }
            });
        }

        response.text().await.map_err(|e| FetchError::Transient {
            url: url.to_string(),
            reason: format!("Failed to read body: {}", e),
            status: None,
        })
    }

    pub async fn fetch_filing(&self, reference: &FilingReference) -> Result<RawFiling, FetchError> {
        let url = reference
            .url(&self.archives_url)
            .map_err(|e| FetchError::Permanent {
                url: reference.path.clone(),
                reason: e.to_string(),
                status: None,
            })?;
        let body = self.get_text(&url, FILING_FETCH_TIMEOUT).await?;
        Ok(RawFiling {
            url,
            body,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        assert!(status_is_transient(StatusCode::SERVICE_UNAVAILABLE));
        assert!(status_is_transient(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(status_is_transient(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!status_is_transient(StatusCode::NOT_FOUND));
        assert!(!status_is_transient(StatusCode::FORBIDDEN));
        assert!(!status_is_transient(StatusCode::BAD_REQUEST));
    }
}
