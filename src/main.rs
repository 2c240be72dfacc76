mod binder;
mod config;
mod error;
mod fetcher;
mod indicators;
mod models;
mod server;
mod utils;

use anyhow::{Context, Result, bail};
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::binder::ViewBinder;
use crate::config::AppConfig;
use crate::fetcher::cleaner::normalise_symbol;
use crate::fetcher::{BackendClient, MarketDataSource};
use crate::indicators::{IndicatorWindows, compute};
use crate::server::AppState;

#[derive(Parser)]
#[command(name = "stock-dashboard", about = "Stock price dashboard over an OHLCV backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the dashboard page and render API
    Serve {
        /// Address to listen on (overrides server.bind_addr)
        #[arg(short, long, env = "STOCKDASH_BIND")]
        bind: Option<String>,
    },

    /// Fetch one symbol from the backend and print its indicators
    Fetch {
        symbol: String,

        /// Start date, YYYY-MM-DD (default: today minus the lookback)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End date, YYYY-MM-DD (default: today)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "stock_dashboard=info,warn",
        1 => "stock_dashboard=debug,tower_http=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = AppConfig::load()?;
    let windows = IndicatorWindows::from(&config.indicators);

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind_addr.clone());
            let client = BackendClient::new(&config.backend).context("Failed to build backend client")?;
            info!(
                "Backend {} | windows MA {}/{} vol {}",
                config.backend.base_url, windows.ma_short, windows.ma_long, windows.vol_window
            );

            let binder = ViewBinder::new(client, windows, config.server.min_date);
            let state = Arc::new(AppState::new(binder, config));
            server::serve(state, &bind).await?;
        }

        Command::Fetch { symbol, from, to } => {
            let _t = utils::Timer::start("Fetch");
            let today = Local::now().date_naive();
            let end = to.unwrap_or(today);
            let start = from.unwrap_or_else(|| {
                end.checked_sub_days(Days::new(config.server.default_lookback_days.unsigned_abs()))
                    .unwrap_or(config.server.min_date)
            });
            let symbol = normalise_symbol(&symbol);

            let client = BackendClient::new(&config.backend)?;
            let table = match client.fetch_history(&symbol, start, end).await {
                Ok(t) => t,
                Err(e) => bail!("{} [{}]", e.user_message(), e.category()),
            };
            let ind = compute(&table, windows);

            println!("─────────────────────────────────");
            println!("  {} — {} → {}", table.symbol(), start, end);
            println!("─────────────────────────────────");
            println!("  Rows        : {}", table.len());
            println!(
                "  Span        : {} → {}",
                table.first_date().map(|d| d.to_string()).unwrap_or("—".into()),
                table.last_date().map(|d| d.to_string()).unwrap_or("—".into())
            );
            println!("  Volume      : {}", utils::fmt_number(table.total_volume()));
            println!(
                "  Last close  : {}",
                utils::fmt_value(table.bars().last().map(|b| b.close), 2)
            );
            for series in [&ind.ma_short, &ind.ma_long, &ind.volatility] {
                println!(
                    "  {:<12}: {} ({} points)",
                    series.label,
                    utils::fmt_value(series.last().map(|p| p.value), 2),
                    series.len()
                );
            }
            println!(
                "  {:<12}: {}%",
                ind.daily_return.label,
                utils::fmt_value(ind.daily_return.last().map(|p| p.value * 100.0), 2)
            );
            println!("─────────────────────────────────");
        }

        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
