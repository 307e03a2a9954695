//! Supported-ticker universe: structured view of the ticker archive lines.
//!
//! The vendor CSV has the columns
//! `ticker,exchange,assetType,priceCurrency,startDate,endDate`. Older or
//! trimmed lists may carry the ticker column alone, so every column after the
//! first is optional.

use crate::domain::{Symbol, Ticker};
use chrono::NaiveDate;

/// Parse raw archive lines into tickers, in file order.
///
/// The header row and rows whose first column is not a valid symbol are
/// skipped. Malformed dates become `None`.
pub fn parse_tickers(lines: &[String]) -> Vec<Ticker> {
    let joined = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(joined.as_bytes());

    let mut tickers = Vec::with_capacity(lines.len());
    let mut skipped = 0usize;

    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(row, error = %e, "unreadable ticker row");
                skipped += 1;
                continue;
            }
        };

        let first = record.get(0).unwrap_or_default();
        if row == 0 && first.eq_ignore_ascii_case("ticker") {
            continue;
        }

        let Ok(symbol) = Symbol::parse(first) else {
            skipped += 1;
            continue;
        };

        tickers.push(Ticker {
            symbol,
            exchange: text(record.get(1)),
            asset_type: text(record.get(2)),
            currency: text(record.get(3)),
            start_date: date(record.get(4)),
            end_date: date(record.get(5)),
        });
    }

    if skipped > 0 {
        tracing::debug!(skipped, kept = tickers.len(), "skipped ticker rows");
    }
    tickers
}

/// Tickers whose symbol starts with `prefix` (case-insensitive).
pub fn search<'a>(tickers: &'a [Ticker], prefix: &str) -> Vec<&'a Ticker> {
    let prefix = prefix.trim().to_ascii_uppercase();
    tickers
        .iter()
        .filter(|t| t.symbol.as_str().starts_with(&prefix))
        .collect()
}

fn text(field: Option<&str>) -> Option<String> {
    field.filter(|s| !s.is_empty()).map(String::from)
}

fn date(field: Option<&str>) -> Option<NaiveDate> {
    field.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}
