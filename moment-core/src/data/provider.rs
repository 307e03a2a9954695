//! Finance source trait and structured error types.
//!
//! The FinanceSource trait abstracts over vendors (Tiingo today) so the chart
//! layer and the CLI can be driven by a fake in tests.

use crate::domain::{DateRange, Meta, Price, Quote, Symbol, Ticker};
use rayon::prelude::*;
use thiserror::Error;

/// Structured error types for vendor and cache operations.
///
/// These are designed to be displayable directly by the CLI.
#[derive(Debug, Error)]
pub enum FinanceError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("invalid symbol: '{0}'")]
    InvalidSymbol(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("finance error: {0}")]
    Other(String),
}

impl FinanceError {
    /// Re-key a generic 404 onto the symbol that was being looked up.
    pub fn for_symbol(self, symbol: &Symbol) -> Self {
        match self {
            FinanceError::NotFound(_) => FinanceError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            other => other,
        }
    }
}

/// A vendor of ticker lists, live prices, end-of-day quotes and metadata.
///
/// All calls block; callers that need concurrency use the batch methods
/// (which fan out over rayon) or run the source on a worker thread.
pub trait FinanceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Every ticker the vendor supports. Failures surface as an empty list.
    fn tickers(&self) -> Vec<Ticker>;

    /// Latest trade for a symbol.
    fn price(&self, symbol: &Symbol) -> Result<Price, FinanceError>;

    /// Today's end-of-day record for a symbol.
    fn quote(&self, symbol: &Symbol) -> Result<Quote, FinanceError>;

    /// Company metadata for a symbol.
    fn meta(&self, symbol: &Symbol) -> Result<Meta, FinanceError>;

    /// End-of-day records from the start of `range` until today, oldest first.
    fn history(&self, symbol: &Symbol, range: DateRange) -> Result<Vec<Quote>, FinanceError>;

    fn prices(&self, symbols: &[Symbol]) -> Result<Vec<Price>, FinanceError> {
        batch(symbols, |s| self.price(s))
    }

    fn quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, FinanceError> {
        batch(symbols, |s| self.quote(s))
    }

    fn metas(&self, symbols: &[Symbol]) -> Result<Vec<Meta>, FinanceError> {
        batch(symbols, |s| self.meta(s))
    }
}

/// Run one lookup per symbol in parallel.
///
/// Results keep the order of `symbols`; the first error fails the whole batch.
pub fn batch<T, F>(symbols: &[Symbol], call: F) -> Result<Vec<T>, FinanceError>
where
    T: Send,
    F: Fn(&Symbol) -> Result<T, FinanceError> + Send + Sync,
{
    symbols.par_iter().map(call).collect()
}
