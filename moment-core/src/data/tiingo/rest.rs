//! Tiingo REST client.
//!
//! `iex/{t}` for the live price, `tiingo/daily/{t}/prices` for end-of-day
//! records and `tiingo/daily/{t}` for company metadata. The supported-ticker
//! list comes from the layered archive cache, which needs no API key.

use super::model::{EodPrice, IexQuote, Info};
use crate::config::{MomentConfig, TiingoConfig};
use crate::data::archive::ArchiveStore;
use crate::data::cache::TickerCache;
use crate::data::download::HttpArchiveSource;
use crate::data::http::{join_url, HttpClient};
use crate::data::provider::{FinanceError, FinanceSource};
use crate::data::universe::parse_tickers;
use crate::domain::{DateRange, Meta, Price, Quote, Symbol, Ticker};
use chrono::Local;
use serde::de::DeserializeOwned;

pub struct Tiingo {
    http: HttpClient,
    config: TiingoConfig,
    cache: TickerCache,
}

impl Tiingo {
    /// Client wired from configuration: one breaker shared by REST calls and
    /// the archive download, archive stored under `cache.dir`.
    pub fn new(config: &MomentConfig) -> Result<Self, FinanceError> {
        let http = HttpClient::for_provider("tiingo", &config.http)?;
        let source = HttpArchiveSource::new(http.clone(), config.tiingo.tickers_url.clone());
        let cache = TickerCache::new(source, ArchiveStore::new(&config.cache.dir))
            .with_ttl(config.cache.ttl());
        Ok(Self::with_parts(http, config.tiingo.clone(), cache))
    }

    pub fn with_parts(http: HttpClient, config: TiingoConfig, cache: TickerCache) -> Self {
        Self {
            http,
            config,
            cache,
        }
    }

    pub fn ticker_cache(&self) -> &TickerCache {
        &self.cache
    }

    pub fn is_available(&self) -> bool {
        self.http.is_available()
    }

    fn get<T: DeserializeOwned>(&self, symbol: &Symbol, path: &str) -> Result<T, FinanceError> {
        let token = format!("Token {}", self.config.require_api_key()?);
        let url = join_url(&self.config.base_url, path);
        tracing::debug!(%url, "tiingo request");
        self.http
            .get_json(
                &url,
                &[
                    ("Authorization", token.as_str()),
                    ("Content-Type", "application/json"),
                ],
            )
            .map_err(|e| e.for_symbol(symbol))
    }

    /// End-of-day records from the start of `range` onward.
    fn eod(&self, symbol: &Symbol, range: DateRange) -> Result<Vec<EodPrice>, FinanceError> {
        let start = range.start_param(Local::now().date_naive());
        let path = format!("tiingo/daily/{}/prices?startDate={start}", symbol.to_lowercase());
        self.get(symbol, &path)
    }
}

fn not_found(symbol: &Symbol) -> FinanceError {
    FinanceError::SymbolNotFound {
        symbol: symbol.to_string(),
    }
}

impl FinanceSource for Tiingo {
    fn name(&self) -> &str {
        "tiingo"
    }

    fn tickers(&self) -> Vec<Ticker> {
        parse_tickers(&self.cache.get())
    }

    fn price(&self, symbol: &Symbol) -> Result<Price, FinanceError> {
        let quotes: Vec<IexQuote> = self.get(symbol, &format!("iex/{}", symbol.to_lowercase()))?;
        quotes
            .into_iter()
            .next()
            .ok_or_else(|| not_found(symbol))?
            .into_price(symbol)
    }

    // A start date keeps the response in the daily date format even for today.
    fn quote(&self, symbol: &Symbol) -> Result<Quote, FinanceError> {
        self.eod(symbol, DateRange::days(0))?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(symbol))?
            .into_quote(symbol)
    }

    fn meta(&self, symbol: &Symbol) -> Result<Meta, FinanceError> {
        let info: Info = self.get(symbol, &format!("tiingo/daily/{}", symbol.to_lowercase()))?;
        info.into_meta(symbol)
    }

    fn history(&self, symbol: &Symbol, range: DateRange) -> Result<Vec<Quote>, FinanceError> {
        // A range without trading days is an empty history, not a missing symbol.
        let records = self.eod(symbol, range)?;
        records.into_iter().map(|r| r.into_quote(symbol)).collect()
    }
}
