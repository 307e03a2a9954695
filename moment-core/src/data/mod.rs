//! Vendor access and caching

pub mod archive;
pub mod cache;
pub mod circuit_breaker;
pub mod download;
pub mod http;
pub mod provider;
pub mod tiingo;
pub mod universe;
pub mod yahoo;

pub use archive::{ArchiveStatus, ArchiveStore};
pub use cache::{Lookup, TickerCache, Tier};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use download::{ArchiveSource, HttpArchiveSource};
pub use http::HttpClient;
pub use provider::{batch, FinanceError, FinanceSource};
pub use tiingo::{Tiingo, TiingoStream, Watcher};
pub use universe::parse_tickers;
pub use yahoo::{Chart, ChartMeta, YahooFinance, YahooQuote};
