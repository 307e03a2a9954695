//! Tiingo REST wire format and its mapping onto domain records.

use crate::data::FinanceError;
use crate::domain::{Meta, Price, Quote, Symbol};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// One element of `GET iex/{ticker}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IexQuote {
    pub ticker: Option<String>,
    pub last_sale_timestamp: Option<String>,
    pub last: Option<f64>,
    pub prev_close: Option<f64>,
}

/// One element of `GET tiingo/daily/{ticker}/prices`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EodPrice {
    pub date: Option<String>,
    pub adj_open: Option<f64>,
    pub adj_high: Option<f64>,
    pub adj_low: Option<f64>,
    pub adj_close: Option<f64>,
    // Adjusted volume is fractional after splits.
    pub adj_volume: Option<f64>,
}

/// Body of `GET tiingo/daily/{ticker}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Info {
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub exchange_code: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn malformed(field: &str, value: &str, e: impl std::fmt::Display) -> FinanceError {
    FinanceError::ResponseFormatChanged(format!("{field} '{value}': {e}"))
}

fn symbol_or(raw: Option<&str>, fallback: &Symbol) -> Symbol {
    raw.and_then(|t| Symbol::parse(t).ok())
        .unwrap_or_else(|| fallback.clone())
}

impl IexQuote {
    pub fn into_price(self, requested: &Symbol) -> Result<Price, FinanceError> {
        let last_trade = self
            .last_sale_timestamp
            .as_deref()
            .map(|raw| DateTime::parse_from_rfc3339(raw).map_err(|e| malformed("lastSaleTimestamp", raw, e)))
            .transpose()?;

        Ok(Price {
            symbol: symbol_or(self.ticker.as_deref(), requested),
            last_trade,
            price: self.last,
            previous_close: self.prev_close,
        })
    }
}

impl EodPrice {
    pub fn into_quote(self, symbol: &Symbol) -> Result<Quote, FinanceError> {
        let date = self
            .date
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| malformed("date", raw, e))
            })
            .transpose()?;

        Ok(Quote {
            symbol: symbol.clone(),
            date,
            open: self.adj_open,
            high: self.adj_high,
            low: self.adj_low,
            close: self.adj_close,
            volume: self.adj_volume.map(|v| v.max(0.0).round() as u64),
        })
    }
}

fn info_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, FinanceError> {
    raw.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| malformed(field, s, e)))
        .transpose()
}

impl Info {
    pub fn into_meta(self, requested: &Symbol) -> Result<Meta, FinanceError> {
        Ok(Meta {
            symbol: symbol_or(self.ticker.as_deref(), requested),
            start_date: info_date("startDate", self.start_date.as_deref())?,
            end_date: info_date("endDate", self.end_date.as_deref())?,
            name: self.name.unwrap_or_default(),
            exchange: self.exchange_code.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn iex_quote_maps_to_price() {
        let quotes: Vec<IexQuote> = serde_json::from_str(
            r#"[{"ticker":"AAPL","lastSaleTimestamp":"2024-06-07T15:59:59.952960117-04:00",
                 "last":196.89,"prevClose":194.48,"open":194.65,"volume":53103912}]"#,
        )
        .unwrap();

        let price = quotes[0].clone().into_price(&sym("aapl")).unwrap();
        assert_eq!(price.symbol.as_str(), "AAPL");
        assert_eq!(price.price, Some(196.89));
        assert_eq!(price.previous_close, Some(194.48));
        let ts = price.last_trade.unwrap();
        assert_eq!(ts.offset().local_minus_utc(), -4 * 3600);
        assert_eq!((ts.hour(), ts.minute()), (15, 59));
    }

    #[test]
    fn absent_fields_stay_none() {
        let quote: IexQuote = serde_json::from_str(r#"{"ticker":"MSFT"}"#).unwrap();
        let price = quote.into_price(&sym("MSFT")).unwrap();
        assert_eq!(price.last_trade, None);
        assert_eq!(price.price, None);
        assert_eq!(price.previous_close, None);
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let quote: IexQuote =
            serde_json::from_str(r#"{"ticker":"MSFT","lastSaleTimestamp":"yesterday"}"#).unwrap();
        assert!(matches!(
            quote.into_price(&sym("MSFT")),
            Err(FinanceError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn wrong_type_fails_to_decode() {
        let result = serde_json::from_str::<IexQuote>(r#"{"ticker":"MSFT","last":"cheap"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn eod_uses_adjusted_fields() {
        let eod: EodPrice = serde_json::from_str(
            r#"{"date":"2024-06-07T00:00:00.000Z","close":196.89,"adjClose":196.64,
                "adjOpen":194.4,"adjHigh":196.69,"adjLow":194.11,"adjVolume":53103912.4}"#,
        )
        .unwrap();

        let quote = eod.into_quote(&sym("AAPL")).unwrap();
        assert_eq!(quote.close, Some(196.64));
        assert_eq!(quote.open, Some(194.4));
        assert_eq!(quote.volume, Some(53103912));
        assert_eq!(quote.date.unwrap().day(), 7);
    }

    #[test]
    fn info_maps_to_meta() {
        let info: Info = serde_json::from_str(
            r#"{"ticker":"AAPL","name":"Apple Inc","exchangeCode":"NASDAQ",
                "description":"Designs phones.","startDate":"1980-12-12","endDate":null}"#,
        )
        .unwrap();

        let meta = info.into_meta(&sym("AAPL")).unwrap();
        assert_eq!(meta.name, "Apple Inc");
        assert_eq!(meta.exchange, "NASDAQ");
        assert_eq!(meta.start_date, NaiveDate::from_ymd_opt(1980, 12, 12));
        assert_eq!(meta.end_date, None);
    }

    #[test]
    fn info_without_text_fields() {
        let info: Info = serde_json::from_str(r#"{"startDate":"12/12/1980"}"#).unwrap();
        assert!(info.into_meta(&sym("AAPL")).is_err());

        let info: Info = serde_json::from_str("{}").unwrap();
        let meta = info.into_meta(&sym("AAPL")).unwrap();
        assert_eq!(meta.symbol.as_str(), "AAPL");
        assert!(meta.name.is_empty());
    }
}
