//! Moment CLI: supported tickers, prices, history, charts and live trades.
//!
//! Commands:
//! - `tickers` lists the supported-ticker universe through the layered cache
//! - `price`, `quote`, `meta`, `history`, `chart` query Tiingo REST
//! - `watch` polls the most recent trade on a fixed period
//! - `stream` prints live trades from the IEX websocket
//! - `yahoo` queries the Yahoo Finance quote and chart endpoints
//! - `cache status` / `cache clear` inspect or drop the saved ticker archive

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use moment_core::chart::{ChartInteractor, Trade};
use moment_core::data::universe::search;
use moment_core::data::{
    parse_tickers, ArchiveStore, Tier, Tiingo, TiingoStream, YahooFinance, YahooQuote,
};
use moment_core::domain::{DateRange, Quote, Symbol};
use moment_core::repeater::{Repeater, DEFAULT_PERIOD};
use moment_core::{FinanceSource, MomentConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "moment", about = "Moment: stock tickers, quotes and charts")]
struct Cli {
    /// Path to a TOML config file. Defaults to the per-user config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the cache directory.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Debug logging on stderr.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported tickers (memory, saved archive, then download).
    Tickers {
        /// Only tickers starting with this prefix.
        #[arg(long)]
        search: Option<String>,

        /// Show at most this many rows.
        #[arg(long)]
        limit: Option<usize>,

        /// Drop every cached layer first.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Latest IEX price.
    Price {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Most recent end-of-day quote.
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Company metadata.
    Meta {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// End-of-day history.
    History {
        symbol: String,

        /// Look-back window, e.g. 5d, 6m, 1y.
        #[arg(long, default_value = "1y")]
        range: DateRange,
    },
    /// Closing-price chart points.
    Chart {
        symbol: String,

        #[arg(long, default_value = "1y")]
        range: DateRange,
    },
    /// Poll the most recent trade until Ctrl-C.
    Watch {
        symbol: String,

        /// Seconds between polls.
        #[arg(long, default_value_t = DEFAULT_PERIOD.as_secs())]
        period: u64,
    },
    /// Print live trades from the IEX websocket until Ctrl-C.
    Stream {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Yahoo Finance endpoints.
    Yahoo {
        #[command(subcommand)]
        action: YahooAction,
    },
    /// Ticker archive management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum YahooAction {
    /// Quote snapshots.
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Chart bars.
    Chart {
        symbol: String,

        #[arg(long, default_value = "1d")]
        interval: String,

        #[arg(long, default_value = "1mo")]
        range: String,
    },
    /// NASDAQ Composite snapshot.
    Nasdaq,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report the saved ticker archive.
    Status,
    /// Delete the saved ticker archive.
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = MomentConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.cache_dir {
        config.cache.dir = dir;
    }
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Tickers {
            search,
            limit,
            refresh,
        } => run_tickers(&config, &out, search.as_deref(), limit, refresh),
        Commands::Price { symbols } => {
            let tiingo = Tiingo::new(&config)?;
            let prices = tiingo.prices(&parse_symbols(&symbols)?)?;
            out.print(&prices, |prices| {
                println!("{:<8} {:>10} {:>10} {:>8}  {}", "Symbol", "Price", "Prev", "Chg %", "Last trade");
                println!("{}", "-".repeat(70));
                for p in prices {
                    println!(
                        "{:<8} {:>10} {:>10} {:>8}  {}",
                        p.symbol,
                        fmt_num(p.price),
                        fmt_num(p.previous_close),
                        fmt_num(p.change_percent()),
                        p.last_trade.map_or_else(|| "-".into(), |t| t.to_rfc3339()),
                    );
                }
            })
        }
        Commands::Quote { symbols } => {
            let tiingo = Tiingo::new(&config)?;
            let quotes = tiingo.quotes(&parse_symbols(&symbols)?)?;
            out.print(&quotes, |quotes| print_quotes(quotes))
        }
        Commands::Meta { symbols } => {
            let tiingo = Tiingo::new(&config)?;
            let metas = tiingo.metas(&parse_symbols(&symbols)?)?;
            out.print(&metas, |metas| {
                for m in metas {
                    println!("{} ({}) on {}", m.name, m.symbol, m.exchange);
                    if let (Some(start), Some(end)) = (m.start_date, m.end_date) {
                        println!("  Listed data: {start} to {end}");
                    }
                    if !m.description.is_empty() {
                        println!("  {}", m.description);
                    }
                    println!();
                }
            })
        }
        Commands::History { symbol, range } => {
            let tiingo = Tiingo::new(&config)?;
            let symbol = Symbol::parse(&symbol)?;
            let quotes = tiingo.history(&symbol, range)?;
            out.print(&quotes, |quotes| print_quotes(quotes))
        }
        Commands::Chart { symbol, range } => {
            let chart = ChartInteractor::new(Arc::new(Tiingo::new(&config)?));
            let points = chart.chart(&symbol, range)?;
            out.print(&points, |points| {
                println!("{:>5}  {:<12} {:>10}", "x", "Date", "Close");
                println!("{}", "-".repeat(30));
                for p in points {
                    let date = p.date.map_or_else(|| "-".into(), |d| d.format("%Y-%m-%d").to_string());
                    println!("{:>5}  {:<12} {:>10.2}", p.x, date, p.y);
                }
            })
        }
        Commands::Watch { symbol, period } => run_watch(&config, symbol, period),
        Commands::Stream { symbols } => run_stream(&config, &out, &symbols),
        Commands::Yahoo { action } => run_yahoo(&config, &out, action),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config, &out),
            CacheAction::Clear => {
                let store = ArchiveStore::new(&config.cache.dir);
                store.clear();
                println!("Removed: {}", store.path().display());
                Ok(())
            }
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "moment_core=debug,moment=debug" } else { "moment_core=info,moment=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Table or JSON, chosen once by `--json`.
struct Output {
    json: bool,
}

impl Output {
    fn print<T: Serialize + ?Sized>(&self, value: &T, table: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            table(value);
        }
        Ok(())
    }
}

fn parse_symbols(raw: &[String]) -> Result<Vec<Symbol>> {
    raw.iter()
        .map(|s| Symbol::parse(s).with_context(|| format!("invalid symbol '{s}'")))
        .collect()
}

fn fmt_num(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.2}"))
}

fn print_quotes(quotes: &[Quote]) {
    println!(
        "{:<8} {:<12} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "Symbol", "Date", "Open", "High", "Low", "Close", "Volume"
    );
    println!("{}", "-".repeat(78));
    for q in quotes {
        println!(
            "{:<8} {:<12} {:>10} {:>10} {:>10} {:>10} {:>12}",
            q.symbol,
            q.date.map_or_else(|| "-".into(), |d| d.format("%Y-%m-%d").to_string()),
            fmt_num(q.open),
            fmt_num(q.high),
            fmt_num(q.low),
            fmt_num(q.close),
            q.volume.map_or_else(|| "-".into(), |v| v.to_string()),
        );
    }
}

fn run_tickers(
    config: &MomentConfig,
    out: &Output,
    prefix: Option<&str>,
    limit: Option<usize>,
    refresh: bool,
) -> Result<()> {
    let tiingo = Tiingo::new(config)?;
    let cache = tiingo.ticker_cache();
    if refresh {
        cache.clear();
    }

    let lookup = cache.get_with_tier();
    let tickers = parse_tickers(&lookup.tickers);
    let source = match lookup.tier {
        Tier::FreshMemory => "memory",
        Tier::DiskFallback => "saved archive",
        Tier::RemoteFetch => "download",
    };
    tracing::info!(source, attempts = lookup.attempts, rows = tickers.len(), "ticker list resolved");

    let mut shown = match prefix {
        Some(p) => search(&tickers, p),
        None => tickers.iter().collect(),
    };
    if let Some(n) = limit {
        shown.truncate(n);
    }

    out.print(&shown, |shown| {
        if tickers.is_empty() {
            println!("No supported tickers available (source: {source}).");
            return;
        }
        println!("{} of {} tickers (source: {source})", shown.len(), tickers.len());
        println!();
        println!(
            "{:<10} {:<10} {:<8} {:<5} {:<12} {:<12}",
            "Symbol", "Exchange", "Type", "Ccy", "Start", "End"
        );
        println!("{}", "-".repeat(62));
        for t in shown.iter() {
            println!(
                "{:<10} {:<10} {:<8} {:<5} {:<12} {:<12}",
                t.symbol,
                t.exchange.as_deref().unwrap_or("-"),
                t.asset_type.as_deref().unwrap_or("-"),
                t.currency.as_deref().unwrap_or("-"),
                t.start_date.map_or_else(|| "-".into(), |d| d.to_string()),
                t.end_date.map_or_else(|| "-".into(), |d| d.to_string()),
            );
        }
    })
}

fn run_watch(config: &MomentConfig, symbol: String, period: u64) -> Result<()> {
    let chart = ChartInteractor::new(Arc::new(Tiingo::new(config)?));
    // Fail fast on a bad symbol or missing key instead of logging every period.
    let first = chart.most_recent_trade(&symbol)?;
    println!("{symbol}  {}  {}", first.price, first.time);

    let mut repeater = Repeater::start(Duration::from_secs(period.max(1)), false, move || {
        match chart.most_recent_trade(&symbol) {
            Ok(trade) => println!("{symbol}  {}  {}", trade.price, trade.time),
            Err(e) => tracing::warn!(%symbol, error = %e, "poll failed"),
        }
    })?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    rt.block_on(tokio::signal::ctrl_c()).context("waiting for Ctrl-C")?;

    repeater.stop();
    Ok(())
}

fn run_stream(config: &MomentConfig, out: &Output, symbols: &[String]) -> Result<()> {
    let symbols = parse_symbols(symbols)?;
    let stream = TiingoStream::new(&config.tiingo)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building stream runtime")?;
    rt.block_on(print_trades(&stream, &symbols, out))
}

async fn print_trades(stream: &TiingoStream, symbols: &[Symbol], out: &Output) -> Result<()> {
    let (watcher, mut prices) = stream.subscribe(symbols).await?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted, unsubscribing");
                break;
            }
            price = prices.recv() => match price {
                Some(price) if out.json => println!("{}", serde_json::to_string(&price)?),
                Some(price) => {
                    let trade = Trade::from(&price);
                    println!("{:<8} {:>10}  {}", price.symbol, trade.price, trade.time);
                }
                None => {
                    tracing::warn!("stream ended");
                    break;
                }
            },
        }
    }

    watcher.unsubscribe().await;
    Ok(())
}

fn run_yahoo(config: &MomentConfig, out: &Output, action: YahooAction) -> Result<()> {
    let yahoo = YahooFinance::new(config)?;
    match action {
        YahooAction::Quote { symbols } => {
            let quotes = yahoo.quotes(&parse_symbols(&symbols)?)?;
            out.print(&quotes, |quotes| print_yahoo_quotes(quotes))
        }
        YahooAction::Nasdaq => {
            let quote = yahoo.nasdaq_composite()?;
            out.print(&quote, |quote| print_yahoo_quotes(std::slice::from_ref(quote)))
        }
        YahooAction::Chart {
            symbol,
            interval,
            range,
        } => {
            let symbol = Symbol::parse(&symbol)?;
            let chart = yahoo.chart(&symbol, &interval, &range)?;
            out.print(&chart, |chart| {
                let meta = &chart.meta;
                println!(
                    "{} on {} ({}, {} bars, {})",
                    meta.symbol.as_deref().unwrap_or(symbol.as_str()),
                    meta.exchange_name.as_deref().unwrap_or("-"),
                    meta.currency.as_deref().unwrap_or("-"),
                    chart.quotes.len(),
                    meta.data_granularity.as_deref().unwrap_or(interval.as_str()),
                );
                println!();
                print_quotes(&chart.quotes);
            })
        }
    }
}

fn print_yahoo_quotes(quotes: &[YahooQuote]) {
    println!("{:<8} {:<24} {:>10} {:>9} {:>8}  {}", "Symbol", "Name", "Price", "Chg", "Chg %", "Time");
    println!("{}", "-".repeat(80));
    for q in quotes {
        // After hours the post-market fields carry the live numbers.
        let post = q.is_post_market.unwrap_or(false) && q.post_market_price.is_some();
        let (price, change, pct, time) = if post {
            (q.post_market_price, q.post_market_change, q.post_market_change_percent, q.post_market_time())
        } else {
            (
                q.regular_market_price,
                q.regular_market_change,
                q.regular_market_change_percent,
                q.market_time(),
            )
        };
        println!(
            "{:<8} {:<24} {:>10} {:>9} {:>8}  {}",
            q.symbol.as_deref().unwrap_or("-"),
            q.short_name.as_deref().unwrap_or("-"),
            fmt_num(price),
            fmt_num(change),
            fmt_num(pct),
            time.map_or_else(|| "-".into(), |t| t.to_rfc3339()),
        );
    }
}

fn run_cache_status(config: &MomentConfig, out: &Output) -> Result<()> {
    let store = ArchiveStore::new(&config.cache.dir);
    let status = store.status();

    if out.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let Some(status) = status else {
        println!("No saved ticker archive at {}", store.path().display());
        return Ok(());
    };

    println!("Archive:   {}", status.path.display());
    println!("Size:      {}", format_size(status.size_bytes));
    println!(
        "Modified:  {}",
        status
            .modified
            .map_or_else(|| "-".into(), |m| m.format("%Y-%m-%d %H:%M:%S").to_string())
    );
    println!("BLAKE3:    {}", status.blake3);
    println!("Tickers:   {}", store.extract().len());
    println!("Memory TTL: {}h", config.cache.ttl_hours);
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
