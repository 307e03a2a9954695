use crate::data::FinanceError;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit of a [`DateRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeUnit {
    Days,
    Months,
    Years,
}

/// A look-back window ending today, e.g. "1 year".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub time: u32,
    pub unit: RangeUnit,
}

impl DateRange {
    pub fn days(time: u32) -> Self {
        Self { time, unit: RangeUnit::Days }
    }

    pub fn months(time: u32) -> Self {
        Self { time, unit: RangeUnit::Months }
    }

    pub fn years(time: u32) -> Self {
        Self { time, unit: RangeUnit::Years }
    }

    /// First day of the window that ends on `today`.
    ///
    /// Month arithmetic clamps to the end of shorter months (Mar 31 - 1 month
    /// is Feb 28/29).
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        let start = match self.unit {
            RangeUnit::Days => today.checked_sub_days(Days::new(u64::from(self.time))),
            RangeUnit::Months => today.checked_sub_months(Months::new(self.time)),
            RangeUnit::Years => today.checked_sub_months(Months::new(self.time.saturating_mul(12))),
        };
        start.unwrap_or(NaiveDate::MIN)
    }

    /// Start date in the `YYYY-MM-DD` form vendors expect.
    pub fn start_param(&self, today: NaiveDate) -> String {
        self.start_date(today).format("%Y-%m-%d").to_string()
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::years(1)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.unit {
            RangeUnit::Days => "d",
            RangeUnit::Months => "m",
            RangeUnit::Years => "y",
        };
        write!(f, "{}{suffix}", self.time)
    }
}

impl FromStr for DateRange {
    type Err = FinanceError;

    /// Parses `30d`, `6m`, `1y` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let invalid = || {
            FinanceError::Other(format!("invalid date range '{s}' (expected e.g. 30d, 6m, 1y)"))
        };
        let Some((split, _)) = s.char_indices().last() else {
            return Err(invalid());
        };
        let (num, unit) = s.split_at(split);
        let time: u32 = num.parse().map_err(|_| invalid())?;
        let unit = match unit {
            "d" => RangeUnit::Days,
            "m" => RangeUnit::Months,
            "y" => RangeUnit::Years,
            _ => return Err(invalid()),
        };
        Ok(Self { time, unit })
    }
}
