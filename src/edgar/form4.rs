use chrono::NaiveDate;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node};
use thiserror::Error;

use crate::config::CodePolicy;
use crate::trade::{TradeRecord, TransactionCode};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no <ownershipDocument> block found in filing")]
    MissingDocument,
    #[error("malformed XML: {0}")]
    Malformed(String),
}

static DOCUMENT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<ownershipDocument").unwrap());
static DOCUMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</ownershipDocument>").unwrap());
static XML_DECLARATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\?xml[^>]*\?>").unwrap());

/// Isolates the `<ownershipDocument>` XML block from the full-submission TXT
/// container EDGAR serves, dropping the BOM, the XML declaration and any
/// surrounding SGML wrapper. Filings without an end tag keep everything from
/// the start tag onward.
pub fn clean_xml(raw: &str) -> Result<String, ParseError> {
    let raw = raw.trim_start_matches('\u{feff}');

    let start = DOCUMENT_START
        .find(raw)
        .ok_or(ParseError::MissingDocument)?
        .start();
    let block = match DOCUMENT_END.find_at(raw, start) {
        Some(end) => &raw[start..end.end()],
        None => &raw[start..],
    };

    Ok(XML_DECLARATION.replace_all(block, "").trim().to_string())
}

pub fn parse_document(cleaned: &str) -> Result<Document<'_>, ParseError> {
    Document::parse(cleaned).map_err(|e| ParseError::Malformed(e.to_string()))
}

fn tag_matches(node: &Node, target: &str) -> bool {
    node.is_element() && node.tag_name().name().ends_with(target)
}

/// Namespace-agnostic field lookup inside `scope`. Matches the first element
/// (document order) whose local tag name ends with `target`, then reads
/// either the nested `<value>` child some filer software wraps fields in, or
/// the element's own text. Wrappers holding only a `footnoteId` have neither
/// and come back as `None`, as does any field the filing simply omits.
pub fn extract_value(scope: Node, target: &str) -> Option<String> {
    let container = scope.descendants().find(|n| tag_matches(n, target))?;

    for node in container.descendants().skip(1) {
        if node.is_element() && node.tag_name().name() == "value" {
            if let Some(text) = node.text() {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }

    container
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Numeric variant of `extract_value`; strips thousands separators.
pub fn extract_number(scope: Node, target: &str) -> Option<f64> {
    extract_value(scope, target).and_then(|v| v.replace(',', "").trim().parse().ok())
}

fn flag_set(scope: Node, target: &str) -> bool {
    matches!(
        extract_value(scope, target).as_deref(),
        Some("1") | Some("true")
    )
}

/// Reporting owner's relationship to the issuer. Prefers an explicit title;
/// falls back to the boolean relationship flags, combining all that are set.
fn owner_relationship(root: Node) -> String {
    for tag in ["officerTitle", "rptOwnerTitle"] {
        if let Some(title) = extract_value(root, tag) {
            return title;
        }
    }

    let mut flags = Vec::new();
    if flag_set(root, "isDirector") {
        flags.push("Director".to_string());
    }
    if flag_set(root, "isOfficer") {
        flags.push("Officer".to_string());
    }
    if flag_set(root, "isTenPercentOwner") {
        flags.push("10% Owner".to_string());
    }
    if flag_set(root, "isOther") {
        match extract_value(root, "otherText") {
            Some(text) => flags.push(text),
            None => flags.push("Other (Filer Specified)".to_string()),
        }
    }

    if flags.is_empty() {
        "Other".to_string()
    } else {
        flags.join(", ")
    }
}

#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// Kept trades, each paired with the entry's position in the filing.
    pub trades: Vec<(usize, TradeRecord)>,
    pub entries_seen: usize,
    /// Entries whose code is outside the accepted set. Routine filtering,
    /// not an error.
    pub entries_filtered: usize,
    /// Entries dropped for a missing or unparseable required field.
    pub entries_skipped: usize,
}

/// Builds canonical trade records from a parsed filing. Walks the
/// non-derivative table, then the derivative table; validation failures are
/// isolated per entry and never abort the rest of the filing.
pub fn extract_trades(doc: &Document, policy: &CodePolicy) -> ExtractionOutcome {
    let root = doc.root_element();
    let mut outcome = ExtractionOutcome::default();

    let issuer_name = extract_value(root, "issuerName");
    let ticker = extract_value(root, "issuerTradingSymbol").map(|t| t.to_uppercase());
    let filer = extract_value(root, "rptOwnerName");
    let person_title = owner_relationship(root);

    let transactions = root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "nonDerivativeTransaction")
        .chain(
            root.descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == "derivativeTransaction"),
        );

    for (index, transaction) in transactions.enumerate() {
        outcome.entries_seen += 1;

        let code = match extract_value(transaction, "transactionCode")
            .and_then(|c| TransactionCode::new(&c).ok())
        {
            Some(code) if policy.accepts(code) => code,
            Some(code) => {
                debug!("Entry {}: code {} outside accepted set", index, code);
                outcome.entries_filtered += 1;
                continue;
            }
            None => {
                warn!("Entry {} skipped: no usable transaction code", index);
                outcome.entries_skipped += 1;
                continue;
            }
        };

        // Extraction is scoped to this transaction's subtree so same-named
        // fields in other rows cannot bleed in.
        let date = extract_value(transaction, "transactionDate")
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());
        let shares = extract_number(transaction, "transactionShares");
        let price = extract_number(transaction, "transactionPricePerShare").unwrap_or(0.0);

        let (ticker, company_name, filer, date, shares) =
            match (&ticker, &issuer_name, &filer, date, shares) {
                (Some(t), Some(c), Some(f), Some(d), Some(s)) if s > 0.0 => {
                    (t.clone(), c.clone(), f.clone(), d, s)
                }
                (t, c, f, d, s) => {
                    let mut missing = Vec::new();
                    if t.is_none() {
                        missing.push("ticker");
                    }
                    if c.is_none() {
                        missing.push("issuer name");
                    }
                    if f.is_none() {
                        missing.push("filer name");
                    }
                    if d.is_none() {
                        missing.push("transaction date");
                    }
                    if s.unwrap_or(0.0) <= 0.0 {
                        missing.push("share count");
                    }
                    warn!("Entry {} skipped: missing {}", index, missing.join(", "));
                    outcome.entries_skipped += 1;
                    continue;
                }
            };

        let value = if policy.is_value_trade(code) {
            Some(shares * price)
        } else {
            None
        };

        outcome.trades.push((
            index,
            TradeRecord {
                date,
                code,
                ticker,
                shares,
                price,
                value,
                company_name,
                filer,
                person_title: person_title.clone(),
            },
        ));
    }

    outcome
}
