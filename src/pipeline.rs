use anyhow::Result;
use chrono::Local;
use log::{info, warn};
use std::collections::BTreeMap;

use crate::config::MonitorConfig;
use crate::dashboard::{DashboardClient, RunTotals, UploadPayload};
use crate::edgar::client::EdgarClient;
use crate::edgar::form4;
use crate::edgar::index::FilingReference;
use crate::store;
use crate::trade::{TradeRecord, TransactionCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// At least one filing was skipped; the rest of the batch went through.
    CompletedWithErrors,
    /// Fatal uploader error; nothing was marked as seen.
    Aborted,
}

#[derive(Debug)]
pub struct RunSummary {
    pub status: RunStatus,
    pub filings_processed: usize,
    pub filings_skipped: usize,
    pub entries_seen: usize,
    pub entries_filtered: usize,
    pub entries_skipped: usize,
    pub entries_below_min_value: usize,
    pub records_uploaded: usize,
    pub code_counts: BTreeMap<TransactionCode, usize>,
    /// Total estimated dollar value across value-eligible (P/S) trades.
    pub total_value: f64,
    pub totals: RunTotals,
    pub fatal: Option<String>,
    /// The uploaded batch, for the console report.
    pub trades: Vec<TradeRecord>,
}

fn batch_totals(
    trades: &[TradeRecord],
    config: &MonitorConfig,
) -> (BTreeMap<TransactionCode, usize>, f64, RunTotals) {
    let mut code_counts = BTreeMap::new();
    let mut total_value = 0.0;
    let mut totals = RunTotals {
        min_trade_value: config.min_trade_value,
        ..RunTotals::default()
    };

    for trade in trades {
        *code_counts.entry(trade.code).or_insert(0) += 1;
        if let Some(value) = trade.value {
            total_value += value;
            if value >= config.mega_trade_threshold {
                totals.mega_trade_count += 1;
                totals.mega_trade_total_value += value;
            }
        }
    }

    (code_counts, total_value, totals)
}

/// Runs the full pipeline over an ordered list of filing references:
/// fetch, clean, parse, extract, dedup, then one upload at the end.
/// Per-filing failures are logged and skipped; only a fatal upload error
/// aborts the run. Seen keys are persisted only after a successful upload.
pub async fn run(
    config: &MonitorConfig,
    edgar: &EdgarClient,
    dashboard: &DashboardClient,
    references: &[FilingReference],
) -> Result<RunSummary> {
    let seen = store::load_seen_keys(&config.seen_keys_file)?;
    info!(
        "Processing {} filing(s), {} key(s) already seen",
        references.len(),
        seen.len()
    );

    let mut filings_processed = 0;
    let mut filings_skipped = 0;
    let mut entries_seen = 0;
    let mut entries_filtered = 0;
    let mut entries_skipped = 0;
    let mut entries_below_min_value = 0;
    let mut keyed_records: Vec<(String, TradeRecord)> = Vec::new();

    for (i, reference) in references.iter().enumerate() {
        info!(
            "Parsing filing {}/{}: {}",
            i + 1,
            references.len(),
            reference.accession_number()
        );

        let raw = match edgar.fetch_filing(reference).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Skipping {} ({} failure): {}",
                    reference.accession_number(),
                    if e.is_transient() { "transient" } else { "permanent" },
                    e
                );
                filings_skipped += 1;
                continue;
            }
        };

        let cleaned = match form4::clean_xml(&raw.body) {
            Ok(cleaned) => cleaned,
            Err(e) => {
                warn!("Skipping {}: {}", reference.accession_number(), e);
                filings_skipped += 1;
                continue;
            }
        };
        let doc = match form4::parse_document(&cleaned) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skipping {}: {}", reference.accession_number(), e);
                filings_skipped += 1;
                continue;
            }
        };

        let outcome = form4::extract_trades(&doc, &config.codes);
        filings_processed += 1;
        entries_seen += outcome.entries_seen;
        entries_filtered += outcome.entries_filtered;
        entries_skipped += outcome.entries_skipped;

        for (entry_index, record) in outcome.trades {
            // Small P/S trades carry little signal for the dashboard.
            if let Some(value) = record.value {
                if value < config.min_trade_value {
                    entries_below_min_value += 1;
                    continue;
                }
            }
            let key = TradeRecord::identity_key(reference.accession_number(), entry_index);
            keyed_records.push((key, record));
        }
    }

    let (new_records, updated_seen) = store::filter_new(keyed_records, &seen);
    let (code_counts, total_value, totals) = batch_totals(&new_records, config);

    let mut summary = RunSummary {
        status: if filings_skipped > 0 {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        },
        filings_processed,
        filings_skipped,
        entries_seen,
        entries_filtered,
        entries_skipped,
        entries_below_min_value,
        records_uploaded: 0,
        code_counts,
        total_value,
        totals,
        fatal: None,
        trades: new_records,
    };

    if summary.trades.is_empty() {
        info!("No new trades this run, skipping upload");
        return Ok(summary);
    }

    let payload = UploadPayload {
        run_time: Local::now().to_rfc3339(),
        trades: &summary.trades,
        summary: summary.totals.clone(),
    };

    match dashboard.upload(&payload).await {
        Ok(()) => {
            summary.records_uploaded = summary.trades.len();
            store::save_seen_keys(&config.seen_keys_file, &updated_seen)?;
        }
        Err(e) => {
            warn!("Upload failed, aborting run: {}", e);
            summary.status = RunStatus::Aborted;
            summary.fatal = Some(e.to_string());
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use url::Url;

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            api_key: "test-key".to_string(),
            user_agent: "test (test@example.com)".to_string(),
            endpoint: Url::parse("http://127.0.0.1:8000/api/upload_trades").unwrap(),
            archives_url: Url::parse("http://127.0.0.1:8000/archives").unwrap(),
            request_delay: std::time::Duration::from_millis(0),
            seen_keys_file: PathBuf::from("seen.json"),
            codes: Default::default(),
            min_trade_value: 1_000_000.0,
            mega_trade_threshold: 10_000_000.0,
        }
    }

    fn trade(code: char, value: Option<f64>) -> TradeRecord {
        TradeRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            code: TransactionCode::new(&code.to_string()).unwrap(),
            ticker: "TST".to_string(),
            shares: 100.0,
            price: 10.0,
            value,
            company_name: "Test Co".to_string(),
            filer: "Doe Jane".to_string(),
            person_title: "Director".to_string(),
        }
    }

    #[test]
    fn test_batch_totals_counts_codes_and_mega_trades() {
        let config = test_config();
        let trades = vec![
            trade('S', Some(15_000_000.0)),
            trade('S', Some(2_000_000.0)),
            trade('P', Some(12_000_000.0)),
            trade('M', None),
        ];
        let (counts, total, totals) = batch_totals(&trades, &config);

        assert_eq!(counts[&TransactionCode::SALE], 2);
        assert_eq!(counts[&TransactionCode::PURCHASE], 1);
        assert_eq!(counts[&TransactionCode::EXERCISE], 1);
        assert_eq!(total, 29_000_000.0);
        assert_eq!(totals.mega_trade_count, 2);
        assert_eq!(totals.mega_trade_total_value, 27_000_000.0);
        assert_eq!(totals.min_trade_value, 1_000_000.0);
    }

    #[test]
    fn test_batch_totals_ignores_valueless_trades() {
        let config = test_config();
        let (counts, total, totals) = batch_totals(&[trade('X', None)], &config);
        assert_eq!(counts.len(), 1);
        assert_eq!(total, 0.0);
        assert_eq!(totals.mega_trade_count, 0);
    }

    #[test]
    fn test_code_counts_are_ordered() {
        let config = test_config();
        let trades = vec![trade('S', None), trade('M', None), trade('P', None)];
        let (counts, _, _) = batch_totals(&trades, &config);
        let codes: Vec<String> = counts.keys().map(|c| c.to_string()).collect();
        assert_eq!(codes, vec!["M", "P", "S"]);
    }

    #[test]
    fn test_filter_new_round_trip_matches_run_semantics() {
        // Mirrors the dedup step of `run`: second pass over identical keyed
        // records yields nothing new.
        let keyed = vec![
            (TradeRecord::identity_key("acc-1", 0), trade('S', Some(2_000_000.0))),
            (TradeRecord::identity_key("acc-1", 3), trade('P', Some(5_000_000.0))),
        ];
        let (first, updated) = store::filter_new(keyed.clone(), &HashSet::new());
        assert_eq!(first.len(), 2);
        let (second, _) = store::filter_new(keyed, &updated);
        assert!(second.is_empty());
    }
}
