use super::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the vendor's supported-ticker list.
///
/// Only `symbol` is guaranteed; rows from bare one-column lists leave the
/// rest empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: Symbol,
    pub exchange: Option<String>,
    pub asset_type: Option<String>,
    pub currency: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Ticker {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            exchange: None,
            asset_type: None,
            currency: None,
            start_date: None,
            end_date: None,
        }
    }
}
