//! Vendor-neutral price records.
//!
//! Every field a vendor may omit is an `Option`; an absent field stays
//! `None` rather than being replaced by a sentinel value.

use super::Symbol;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Latest trade for a symbol (live / intraday view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub symbol: Symbol,
    /// Time of the last trade in the exchange's own offset.
    pub last_trade: Option<DateTime<FixedOffset>>,
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
}

impl Price {
    /// Change since the previous close, when both sides are known.
    pub fn change(&self) -> Option<f64> {
        Some(self.price? - self.previous_close?)
    }

    /// Percent change since the previous close.
    pub fn change_percent(&self) -> Option<f64> {
        let prev = self.previous_close?;
        if prev == 0.0 {
            return None;
        }
        Some((self.price? - prev) / prev * 100.0)
    }
}

/// End-of-day record (split/dividend adjusted where the vendor offers it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub date: Option<DateTime<Utc>>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

/// Company metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub symbol: Symbol,
    pub name: String,
    pub exchange: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
