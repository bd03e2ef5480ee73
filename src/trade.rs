use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Single-letter SEC transaction code (P=purchase, S=sale, M/X=exercise,
/// V=voluntary filing, plus the grant/disposition codes we filter out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionCode(char);

impl TransactionCode {
    pub const PURCHASE: TransactionCode = TransactionCode('P');
    pub const SALE: TransactionCode = TransactionCode('S');
    pub const EXERCISE: TransactionCode = TransactionCode('M');
    pub const CONVERSION: TransactionCode = TransactionCode('X');
    pub const VOLUNTARY: TransactionCode = TransactionCode('V');

    pub fn new(code: &str) -> Result<Self> {
        let trimmed = code.trim().to_uppercase();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_uppercase() => Ok(TransactionCode(c)),
            _ => Err(anyhow!("Invalid transaction code: {:?}", code)),
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl std::str::FromStr for TransactionCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        TransactionCode::new(s)
    }
}

impl std::fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TransactionCode {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        TransactionCode::new(&s)
    }
}

impl From<TransactionCode> for String {
    fn from(code: TransactionCode) -> String {
        code.0.to_string()
    }
}

/// Canonical insider trade, one per reported transaction entry.
/// `value` is only populated for cash transactions (P/S), where
/// shares * price is economically meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub code: TransactionCode,
    pub ticker: String,
    pub shares: f64,
    pub price: f64,
    pub value: Option<f64>,
    pub company_name: String,
    pub filer: String,
    pub person_title: String,
}

impl TradeRecord {
    /// Stable identity for deduplication: filing accession number plus the
    /// entry's position within the filing. Field values can legitimately
    /// repeat across filings, so they are not part of the key.
    pub fn identity_key(accession_number: &str, entry_index: usize) -> String {
        format!("{}:{}", accession_number, entry_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_code_parsing() {
        assert_eq!(TransactionCode::new("P").unwrap(), TransactionCode::PURCHASE);
        assert_eq!(TransactionCode::new(" s ").unwrap(), TransactionCode::SALE);
        assert!(TransactionCode::new("").is_err());
        assert!(TransactionCode::new("PS").is_err());
        assert!(TransactionCode::new("1").is_err());
    }

    #[test]
    fn test_transaction_code_serde_round_trip() {
        let json = serde_json::to_string(&TransactionCode::SALE).unwrap();
        assert_eq!(json, "\"S\"");
        let back: TransactionCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TransactionCode::SALE);
    }

    #[test]
    fn test_identity_key_uses_position_not_fields() {
        let a = TradeRecord::identity_key("0000320193-24-000001", 0);
        let b = TradeRecord::identity_key("0000320193-24-000001", 1);
        assert_ne!(a, b);
        assert_eq!(a, "0000320193-24-000001:0");
    }

    #[test]
    fn test_trade_record_serializes_all_fields() {
        let record = TradeRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            code: TransactionCode::SALE,
            ticker: "AAPL".to_string(),
            shares: 1000.0,
            price: 12.5,
            value: Some(12500.0),
            company_name: "Apple Inc.".to_string(),
            filer: "Cook Timothy".to_string(),
            person_title: "CEO".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2024-03-15");
        assert_eq!(json["code"], "S");
        assert_eq!(json["value"], 12500.0);

        let back: TradeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
