use crate::config::MonitorConfig;
use crate::pipeline::{RunStatus, RunSummary};
use crate::trade::TradeRecord;

const TOP_TRADES: usize = 20;

/// Formats a float with thousands separators and a fixed number of decimals.
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// One fixed-width row of the console report.
pub fn format_report_row(trade: &TradeRecord) -> String {
    let price = if trade.price > 0.0 {
        format!("${}", format_thousands(trade.price, 2))
    } else {
        "N/A".to_string()
    };
    let value = match trade.value {
        Some(v) => format!("${}", format_thousands(v, 2)),
        None => "N/A".to_string(),
    };

    format!(
        "{:<10} {:<4} {:<8} {:>12} {:>14} {:>20} {:<25} {:<25} {:<20}",
        trade.date.to_string(),
        trade.code.to_string(),
        truncate(&trade.ticker, 8),
        format_thousands(trade.shares, 0),
        price,
        value,
        truncate(&trade.company_name, 25),
        truncate(&trade.filer, 25),
        truncate(&trade.person_title, 20),
    )
}

pub fn print_report(config: &MonitorConfig, summary: &RunSummary) {
    let divider = "=".repeat(145);

    println!("\n{}", divider);
    println!("AGGREGATE INSIDER TRADING REPORT");
    println!("{}", divider);

    println!(
        "Filings processed: {} (skipped: {}); entries seen: {}, filtered by code: {}, \
         dropped invalid: {}, below value threshold: {}",
        summary.filings_processed,
        summary.filings_skipped,
        summary.entries_seen,
        summary.entries_filtered,
        summary.entries_skipped,
        summary.entries_below_min_value,
    );

    println!("\nSUMMARY OF TRANSACTIONS FOUND:");
    let mut counts: Vec<_> = summary.code_counts.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1));
    for (code, count) in counts {
        println!("  Code {}: {} transactions", code, count);
    }

    println!("\nTotal new records: {}", summary.trades.len());
    println!("Records uploaded: {}", summary.records_uploaded);
    println!(
        "Total estimated dollar value (P/S only): ${}",
        format_thousands(summary.total_value, 2)
    );
    println!(
        "Mega trades (>= ${}): {} valued at ${}",
        format_thousands(config.mega_trade_threshold, 2),
        summary.totals.mega_trade_count,
        format_thousands(summary.totals.mega_trade_total_value, 2)
    );

    let mut sorted: Vec<&TradeRecord> = summary.trades.iter().collect();
    sorted.sort_by(|a, b| {
        b.value
            .unwrap_or(0.0)
            .partial_cmp(&a.value.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!(
        "\n{:<10} {:<4} {:<8} {:>12} {:>14} {:>20} {:<25} {:<25} {:<20}",
        "Date", "Code", "Ticker", "Shares", "Price", "Value (USD)", "Company", "Filer", "Title"
    );
    println!("{}", "-".repeat(145));
    for trade in sorted.iter().take(TOP_TRADES) {
        println!("{}", format_report_row(trade));
    }
    println!("{}", "-".repeat(145));

    match summary.status {
        RunStatus::Completed => println!("Run completed."),
        RunStatus::CompletedWithErrors => println!(
            "Run completed with errors: {} filing(s) skipped.",
            summary.filings_skipped
        ),
        RunStatus::Aborted => println!(
            "Run ABORTED: {}",
            summary.fatal.as_deref().unwrap_or("unknown fatal error")
        ),
    }
}
