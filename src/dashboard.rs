use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::MonitorConfig;
use crate::trade::TradeRecord;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_UPLOAD_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("dashboard rejected the API key (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("dashboard rejected the payload: {message}")]
    Rejected { message: String },
    #[error("transient upload failure: {reason}")]
    Transient { reason: String },
}

impl UploadError {
    /// Only transient failures may be retried; a bad key or a rejected
    /// payload is a configuration problem that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, UploadError::Transient { .. })
    }
}

/// Aggregate figures the dashboard shows alongside the trade table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunTotals {
    pub mega_trade_count: usize,
    pub mega_trade_total_value: f64,
    pub min_trade_value: f64,
}

#[derive(Debug, Serialize)]
pub struct UploadPayload<'a> {
    /// ISO 8601 timestamp of the run, shown as "last refreshed".
    pub run_time: String,
    pub trades: &'a [TradeRecord],
    pub summary: RunTotals,
}

fn error_for_status(status: StatusCode, message: Option<String>) -> Option<UploadError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UploadError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::BAD_REQUEST => UploadError::Rejected {
            message: message.unwrap_or_else(|| "no server message".to_string()),
        },
        _ => UploadError::Transient {
            reason: format!("HTTP status {}", status),
        },
    })
}

/// Client for the dashboard sink. The sink merges each uploaded batch into
/// its stored dataset and dedupes on its own composite key, so sending only
/// the records this run discovered is sufficient.
pub struct DashboardClient {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl DashboardClient {
    pub fn new(config: &MonitorConfig) -> anyhow::Result<Self> {
        Ok(DashboardClient {
            http: Client::builder().build()?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn upload_once(&self, payload: &UploadPayload<'_>) -> Result<(), UploadError> {
        let response = self
            .http
            .post(self.endpoint.as_str())
            .header("X-API-KEY", &self.api_key)
            .timeout(UPLOAD_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|e| UploadError::Transient {
                reason: e.to_string(),
            })?;

        let status = response.status();
        // The dashboard puts a human-readable reason in {"message": ...} on 400.
        let message = if status == StatusCode::BAD_REQUEST {
            response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        } else {
            None
        };

        match error_for_status(status, message) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Uploads the batch, retrying transient failures with doubling backoff.
    /// Fatal errors and exhausted retries are returned to the caller, which
    /// must abort the run without marking anything as seen.
    pub async fn upload(&self, payload: &UploadPayload<'_>) -> Result<(), UploadError> {
        let mut backoff = Duration::from_secs(1);

        for attempt in 1..=MAX_UPLOAD_ATTEMPTS {
            match self.upload_once(payload).await {
                Ok(()) => {
                    info!(
                        "Uploaded {} trade(s) to {}",
                        payload.trades.len(),
                        self.endpoint
                    );
                    return Ok(());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if attempt == MAX_UPLOAD_ATTEMPTS => {
                    return Err(UploadError::Transient {
                        reason: format!("giving up after {} attempts: {}", attempt, err),
                    });
                }
                Err(err) => {
                    warn!(
                        "Upload attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, MAX_UPLOAD_ATTEMPTS, err, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }

        unreachable!("retry loop always returns")
    }
}
