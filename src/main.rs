// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/futures_ledger

 # incremental run (uses state.json watermark)
 cargo run --release

 # backfill from a date, or rebuild positions offline
 cargo run --release -- 2025-01-01
 cargo run --release -- --aggregate-only
*/
/*
=============================================================================
Project : futures_ledger — Binance Futures fills -> position round-trips
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Pulls USDⓈ-M futures fills (userTrades) incrementally, keeps an
          append-only fills table, and regenerates per-position round-trips
          (entry VWAP, realized PnL, fees, duration) on every run.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod aggregator;
mod binance;          // signer + REST models
mod config;
mod domain;
mod error;
mod gateway_binance;  // USDⓈ-M Futures REST (positionRisk, userTrades)
mod metrics;
mod normalize;
mod positions;
mod posttrade;
mod recorder;
mod state;

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Args, Cli};
use crate::domain::RawFill;
use crate::error::Error;
use crate::gateway_binance::{symbols_to_query, BinanceFutures};
use crate::state::Watermark;

#[tokio::main]
async fn main() -> ExitCode {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("futures_ledger: pipeline start");

    match run(cli).await {
        Ok(()) => {
            info!("pipeline completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "pipeline failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    // ---- Load config ----
    let args = config::load(&cli)?;
    info!(
        base_url = %args.base_url,
        fills = %args.fills_file.display(),
        positions = %args.positions_file.display(),
        state = %args.state_file.display(),
        aggregate_only = args.aggregate_only,
        start_time_ms = ?args.start_time_ms,
        "startup config"
    );

    metrics::init();

    if !args.aggregate_only {
        let appended = fetch_stage(&args).await?;
        if appended == 0 {
            info!("no new trades fetched");
        }
    }

    // ---- Aggregate (every run, new trades or not) ----
    let summary = regenerate_positions(&args)?;
    metrics::observe(&summary);
    finish_metrics(&args)
}

/// Full regeneration of the positions table from the fills table.
fn regenerate_positions(args: &Args) -> Result<posttrade::Summary, Error> {
    let raw = recorder::read_fills(&args.fills_file)?;
    let positions = aggregator::aggregate(&raw)?;
    recorder::write_positions(&args.positions_file, &positions)?;
    Ok(posttrade::report(&positions))
}

/// Fetch -> append fills -> persist watermark. Returns number of new trades.
async fn fetch_stage(args: &Args) -> Result<usize, Error> {
    let watermark = Watermark::load(&args.state_file);
    info!(last_trade_time_ms = watermark.last_trade_time_ms, symbols = watermark.last_id_by_symbol.len(), "loaded watermark");

    let gw = BinanceFutures::new(args)?;

    let active = gw.active_symbols().await;
    if active.is_empty() {
        warn!("no active symbols found");
    }
    let historical = recorder::historical_symbols(&args.fills_file);
    let symbols = symbols_to_query(&active, &args.symbols, &historical);
    if symbols.is_empty() {
        warn!("no symbols to query");
        return Ok(0);
    }
    info!(count = symbols.len(), "fetching trades");

    let (trades, watermark) = gw.fetch_new_trades(&symbols, args.start_time_ms, watermark).await;
    if trades.is_empty() {
        return Ok(0);
    }
    let fresh: Vec<RawFill> = trades.into_iter().map(RawFill::from).collect();

    // fills first, watermark after: a failed write never skips trades next run
    recorder::append_fills(&args.fills_file, &fresh)?;
    watermark.save(&args.state_file)?;
    Ok(fresh.len())
}

fn finish_metrics(args: &Args) -> Result<(), Error> {
    if let Some(path) = &args.metrics_file {
        metrics::write_textfile(path)?;
        info!(path = %path.display(), "metrics written");
    }
    Ok(())
}
