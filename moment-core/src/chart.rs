//! Chart shaping: price history into plottable points, latest trade into
//! display strings.

use crate::data::{FinanceError, FinanceSource};
use crate::domain::{DateRange, Price, Quote, Symbol};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Shown when the last trade has no price.
pub const EMPTY_PRICE: &str = "-.--";

/// Shown when the last trade has no timestamp.
pub const EMPTY_TIME: &str = "--:-- --/--/----";

const TRADE_TIME_FORMAT: &str = "%H:%M:%S %m/%d/%Y";

/// One plotted close. `x` counts plotted points, so it stays contiguous when
/// days without a close are skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataPoint {
    pub x: usize,
    pub y: f64,
    pub date: Option<DateTime<Utc>>,
}

/// Latest trade formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trade {
    pub price: String,
    pub time: String,
}

impl Trade {
    pub fn empty() -> Self {
        Self {
            price: EMPTY_PRICE.into(),
            time: EMPTY_TIME.into(),
        }
    }
}

impl From<&Price> for Trade {
    /// The time is rendered in the offset the exchange reported.
    fn from(price: &Price) -> Self {
        Self {
            price: price
                .price
                .map_or_else(|| EMPTY_PRICE.to_string(), |p| format!("{p:.2}")),
            time: price
                .last_trade
                .map_or_else(|| EMPTY_TIME.to_string(), |t| t.format(TRADE_TIME_FORMAT).to_string()),
        }
    }
}

/// Turn end-of-day quotes into chart points, skipping quotes with no close.
pub fn to_chart_data(quotes: &[Quote]) -> Vec<ChartDataPoint> {
    quotes
        .iter()
        .filter_map(|q| q.close.map(|close| (q.date, close)))
        .enumerate()
        .map(|(x, (date, y))| ChartDataPoint { x, y, date })
        .collect()
}

pub struct ChartInteractor<S: FinanceSource + ?Sized> {
    source: Arc<S>,
}

impl<S: FinanceSource + ?Sized> ChartInteractor<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Closing prices of `symbol` over `range`, oldest first.
    pub fn chart(&self, symbol: &str, range: DateRange) -> Result<Vec<ChartDataPoint>, FinanceError> {
        let symbol = valid_symbol(symbol)?;
        let history = self.source.history(&symbol, range)?;
        Ok(to_chart_data(&history))
    }

    pub fn most_recent_trade(&self, symbol: &str) -> Result<Trade, FinanceError> {
        let symbol = valid_symbol(symbol)?;
        let price = self.source.price(&symbol)?;
        Ok(Trade::from(&price))
    }
}

fn valid_symbol(raw: &str) -> Result<Symbol, FinanceError> {
    Symbol::parse(raw).map_err(|e| {
        tracing::error!(symbol = raw, "cannot chart an invalid symbol");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Meta, Ticker};
    use chrono::{DateTime, FixedOffset, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        last_trade: Option<DateTime<FixedOffset>>,
        price: Option<f64>,
    }

    fn quote(symbol: &Symbol, day: u32, close: Option<f64>) -> Quote {
        Quote {
            symbol: symbol.clone(),
            date: Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).single(),
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    impl FinanceSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn tickers(&self) -> Vec<Ticker> {
            Vec::new()
        }

        fn price(&self, symbol: &Symbol) -> Result<Price, FinanceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Price {
                symbol: symbol.clone(),
                last_trade: self.last_trade,
                price: self.price,
                previous_close: None,
            })
        }

        fn quote(&self, symbol: &Symbol) -> Result<Quote, FinanceError> {
            Ok(quote(symbol, 3, Some(1.0)))
        }

        fn meta(&self, symbol: &Symbol) -> Result<Meta, FinanceError> {
            Err(FinanceError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
        }

        fn history(&self, symbol: &Symbol, _range: DateRange) -> Result<Vec<Quote>, FinanceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                quote(symbol, 3, Some(10.0)),
                quote(symbol, 4, None),
                quote(symbol, 5, Some(12.5)),
            ])
        }
    }

    #[test]
    fn chart_skips_missing_closes() {
        let interactor = ChartInteractor::new(Arc::new(FakeSource::default()));
        let points = interactor.chart("aapl", DateRange::months(1)).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!((points[0].x, points[0].y), (0, 10.0));
        assert_eq!((points[1].x, points[1].y), (1, 12.5));
        assert_eq!(points[1].date, Utc.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).single());
    }

    #[test]
    fn invalid_symbol_never_reaches_the_source() {
        let source = Arc::new(FakeSource::default());
        let interactor = ChartInteractor::new(Arc::clone(&source));

        assert!(matches!(interactor.chart("", DateRange::default()), Err(FinanceError::InvalidSymbol(_))));
        assert!(matches!(interactor.most_recent_trade("   "), Err(FinanceError::InvalidSymbol(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn trade_formatting() {
        let offset = FixedOffset::west_opt(4 * 3600).unwrap();
        let source = FakeSource {
            last_trade: offset.with_ymd_and_hms(2024, 6, 7, 15, 59, 59).single(),
            price: Some(196.894),
            ..Default::default()
        };
        let interactor = ChartInteractor::new(Arc::new(source));

        let trade = interactor.most_recent_trade("AAPL").unwrap();
        assert_eq!(trade.price, "196.89");
        assert_eq!(trade.time, "15:59:59 06/07/2024");
    }

    #[test]
    fn trade_placeholders() {
        let interactor = ChartInteractor::new(Arc::new(FakeSource::default()));
        assert_eq!(interactor.most_recent_trade("AAPL").unwrap(), Trade::empty());
    }

    #[test]
    fn works_behind_a_trait_object() {
        let source: Arc<dyn FinanceSource> = Arc::new(FakeSource::default());
        let interactor = ChartInteractor::new(source);
        assert_eq!(interactor.source().name(), "fake");
    }
}
