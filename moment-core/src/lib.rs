//! Moment Core: ticker data acquisition, caching and chart shaping.
//!
//! This crate contains everything behind the `moment` binary:
//! - Domain types (symbols, tickers, prices, quotes, metadata, date ranges)
//! - Layered supported-ticker cache (memory, saved archive, remote download)
//! - Tiingo REST and IEX websocket clients, Yahoo Finance client
//! - Shared HTTP layer with retry and circuit breaker
//! - Chart shaping and a periodic refresh helper

pub mod chart;
pub mod config;
pub mod data;
pub mod domain;
pub mod repeater;

pub use config::MomentConfig;
pub use data::{FinanceError, FinanceSource};
