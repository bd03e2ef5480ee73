use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::trade::TransactionCode;

/// Which transaction codes survive filtering and which of those get a
/// derived dollar value.
#[derive(Debug, Clone)]
pub struct CodePolicy {
    pub accepted: HashSet<TransactionCode>,
    pub value_eligible: HashSet<TransactionCode>,
}

impl Default for CodePolicy {
    fn default() -> Self {
        CodePolicy {
            accepted: HashSet::from([
                TransactionCode::PURCHASE,
                TransactionCode::SALE,
                TransactionCode::EXERCISE,
                TransactionCode::CONVERSION,
                TransactionCode::VOLUNTARY,
            ]),
            value_eligible: HashSet::from([TransactionCode::PURCHASE, TransactionCode::SALE]),
        }
    }
}

impl CodePolicy {
    pub fn accepts(&self, code: TransactionCode) -> bool {
        self.accepted.contains(&code)
    }

    pub fn is_value_trade(&self, code: TransactionCode) -> bool {
        self.value_eligible.contains(&code)
    }
}

/// Parses a comma-separated code list like "P,S,M".
pub fn parse_code_list(value: &str) -> Result<HashSet<TransactionCode>> {
    value
        .split(',')
        .map(|part| TransactionCode::new(part))
        .collect()
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub api_key: String,
    pub user_agent: String,
    pub endpoint: Url,
    pub archives_url: Url,
    pub request_delay: Duration,
    pub seen_keys_file: PathBuf,
    pub codes: CodePolicy,
    /// P/S trades below this estimated dollar value are not uploaded.
    pub min_trade_value: f64,
    pub mega_trade_threshold: f64,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        // The dashboard key has gone by two names historically; accept both.
        let api_key = std::env::var("DASHBOARD_API_KEY")
            .or_else(|_| std::env::var("DASHBOARD_PRIVATE_KEY"))
            .map_err(|_| anyhow!("DASHBOARD_API_KEY environment variable not set"))?;

        // The SEC requires a descriptive User-Agent with contact info.
        let user_agent = std::env::var("SEC_USER_AGENT").unwrap_or_else(|_| {
            "InsiderTradingMonitor (contact@example.com)".to_string()
        });

        let endpoint = std::env::var("DASHBOARD_ENDPOINT")
            .unwrap_or_else(|_| "http://127.0.0.1:8000/api/upload_trades".to_string());
        let endpoint = Url::parse(&endpoint)
            .with_context(|| format!("Invalid DASHBOARD_ENDPOINT: {}", endpoint))?;

        let archives_url = std::env::var("SEC_ARCHIVES_URL")
            .unwrap_or_else(|_| crate::edgar::index::EDGAR_ARCHIVES_URL.to_string());
        let archives_url = Url::parse(&archives_url)
            .with_context(|| format!("Invalid SEC_ARCHIVES_URL: {}", archives_url))?;

        let request_delay = match std::env::var("REQUEST_DELAY_MS") {
            Ok(ms) => Duration::from_millis(
                ms.parse()
                    .with_context(|| format!("Invalid REQUEST_DELAY_MS: {}", ms))?,
            ),
            Err(_) => Duration::from_millis(150),
        };

        let seen_keys_file = PathBuf::from(
            std::env::var("SEEN_KEYS_FILE").unwrap_or_else(|_| "data/seen_trades.json".to_string()),
        );

        let mut codes = CodePolicy::default();
        if let Ok(list) = std::env::var("ACCEPTED_CODES") {
            codes.accepted = parse_code_list(&list)?;
        }
        if let Ok(list) = std::env::var("VALUE_CODES") {
            codes.value_eligible = parse_code_list(&list)?;
        }

        let min_trade_value = parse_env_f64("MIN_TRADE_VALUE", 1_000_000.0)?;
        let mega_trade_threshold = parse_env_f64("MEGA_TRADE_THRESHOLD", 10_000_000.0)?;

        Ok(Self {
            api_key,
            user_agent,
            endpoint,
            archives_url,
            request_delay,
            seen_keys_file,
            codes,
            min_trade_value,
            mega_trade_threshold,
        })
    }
}

fn parse_env_f64(name: &str, default: f64) -> Result<f64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_list() {
        let codes = parse_code_list("P,S,M").unwrap();
        assert_eq!(codes.len(), 3);
        assert!(codes.contains(&TransactionCode::PURCHASE));
        assert!(codes.contains(&TransactionCode::EXERCISE));
        assert!(!codes.contains(&TransactionCode::VOLUNTARY));
    }

    #[test]
    fn test_parse_code_list_rejects_garbage() {
        assert!(parse_code_list("P,,S").is_err());
        assert!(parse_code_list("P,SALE").is_err());
    }

    #[test]
    fn test_default_policy() {
        let policy = CodePolicy::default();
        assert!(policy.accepts(TransactionCode::PURCHASE));
        assert!(policy.accepts(TransactionCode::VOLUNTARY));
        assert!(!policy.accepts(TransactionCode::new("A").unwrap()));
        assert!(policy.is_value_trade(TransactionCode::SALE));
        assert!(!policy.is_value_trade(TransactionCode::EXERCISE));
    }
}
