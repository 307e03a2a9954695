//! Yahoo Finance client.
//!
//! Two unofficial endpoints: the v7 quote snapshot and the v8 chart. Yahoo
//! has no published contract for either, so every field is optional and
//! structural surprises surface as `ResponseFormatChanged`.

use super::http::{join_url, HttpClient};
use super::provider::FinanceError;
use crate::config::MomentConfig;
use crate::domain::{Quote, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Yahoo's symbol for the Nasdaq Composite index.
pub const NASDAQ_COMPOSITE: &str = "^IXIC";

/// Quote snapshot from the v7 endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuote {
    pub symbol: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub short_name: Option<String>,
    pub is_post_market: Option<bool>,
    pub regular_market_price: Option<f64>,
    pub regular_market_change: Option<f64>,
    pub regular_market_change_percent: Option<f64>,
    pub regular_market_time: Option<i64>,
    pub post_market_price: Option<f64>,
    pub post_market_change: Option<f64>,
    pub post_market_change_percent: Option<f64>,
    pub post_market_time: Option<i64>,
    pub trailing_annual_dividend_rate: Option<f64>,
    pub trailing_annual_dividend_yield: Option<f64>,
}

impl YahooQuote {
    pub fn market_time(&self) -> Option<DateTime<Utc>> {
        self.regular_market_time.and_then(|t| DateTime::from_timestamp(t, 0))
    }

    pub fn post_market_time(&self) -> Option<DateTime<Utc>> {
        self.post_market_time.and_then(|t| DateTime::from_timestamp(t, 0))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResult,
}

#[derive(Debug, Deserialize)]
struct QuoteResult {
    result: Option<Vec<YahooQuote>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Header block of a chart response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartMeta {
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub exchange_name: Option<String>,
    pub instrument_type: Option<String>,
    pub first_trade_date: Option<i64>,
    pub regular_market_time: Option<i64>,
    pub regular_market_price: Option<f64>,
    pub chart_previous_close: Option<f64>,
    pub data_granularity: Option<String>,
    pub range: Option<String>,
    pub timezone: Option<String>,
    pub exchange_timezone_name: Option<String>,
    #[serde(rename = "gmtoffset")]
    pub gmt_offset: Option<i64>,
    pub valid_ranges: Option<Vec<String>>,
}

/// Parsed chart: meta plus one quote per trading bar, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub meta: ChartMeta,
    pub quotes: Vec<Quote>,
}

pub struct YahooFinance {
    http: HttpClient,
    base_url: String,
}

impl YahooFinance {
    pub fn new(config: &MomentConfig) -> Result<Self, FinanceError> {
        let http = HttpClient::for_provider("yahoo_finance", &config.http)?;
        Ok(Self::with_client(http, config.yahoo.base_url.clone()))
    }

    pub fn with_client(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.http.is_available()
    }

    fn quote_url(&self, symbols: &[Symbol]) -> String {
        let list: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        join_url(
            &self.base_url,
            &format!("v7/finance/quote?format=json&symbols={}", list.join(",")),
        )
    }

    fn chart_url(&self, symbol: &Symbol, interval: &str, range: &str) -> String {
        join_url(
            &self.base_url,
            &format!("v8/finance/chart/{symbol}?includePrePost=false&interval={interval}&range={range}"),
        )
    }

    /// Quote snapshots for `symbols`. Unknown symbols are simply absent.
    pub fn quotes(&self, symbols: &[Symbol]) -> Result<Vec<YahooQuote>, FinanceError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let envelope: QuoteEnvelope = self.http.get_json(&self.quote_url(symbols), &[])?;
        parse_quotes(envelope)
    }

    /// Snapshot of the Nasdaq Composite index.
    pub fn nasdaq_composite(&self) -> Result<YahooQuote, FinanceError> {
        let symbol = Symbol::parse(NASDAQ_COMPOSITE)?;
        self.quotes(std::slice::from_ref(&symbol))?
            .into_iter()
            .next()
            .ok_or_else(|| FinanceError::SymbolNotFound {
                symbol: NASDAQ_COMPOSITE.into(),
            })
    }

    /// Daily chart for the last month, regular session only.
    pub fn monthly_chart(&self, symbol: &Symbol) -> Result<Chart, FinanceError> {
        self.chart(symbol, "1d", "1mo")
    }

    /// Chart bars at `interval` covering `range` (Yahoo spellings: `1d`, `1mo`, `5y`).
    pub fn chart(&self, symbol: &Symbol, interval: &str, range: &str) -> Result<Chart, FinanceError> {
        let url = self.chart_url(symbol, interval, range);
        let resp: ChartResponse = self
            .http
            .get_json(&url, &[])
            .map_err(|e| e.for_symbol(symbol))?;
        let chart = parse_chart(symbol, resp)?;
        tracing::debug!(%symbol, bars = chart.quotes.len(), "yahoo chart");
        Ok(chart)
    }
}

fn parse_quotes(envelope: QuoteEnvelope) -> Result<Vec<YahooQuote>, FinanceError> {
    match (envelope.quote_response.result, envelope.quote_response.error) {
        (Some(quotes), _) => Ok(quotes),
        (None, Some(err)) => Err(FinanceError::ResponseFormatChanged(format!(
            "{}: {}",
            err.code, err.description
        ))),
        (None, None) => Ok(Vec::new()),
    }
}

fn parse_chart(symbol: &Symbol, resp: ChartResponse) -> Result<Chart, FinanceError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => FinanceError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => FinanceError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => FinanceError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FinanceError::ResponseFormatChanged("result array is empty".into()))?;

    // A symbol with no trades in range has no timestamp array at all.
    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut quotes = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| FinanceError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        // Holidays and halted sessions come back as all-null bars.
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none() {
            continue;
        }

        quotes.push(Quote {
            symbol: symbol.clone(),
            date: Some(date),
            open,
            high,
            low,
            close,
            volume,
        });
    }

    Ok(Chart {
        meta: data.meta.unwrap_or_default(),
        quotes,
    })
}
