// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : futures_ledger — Binance Futures fills -> position round-trips
Module  : config.rs
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
use chrono::{NaiveDate, TimeZone, Utc};
use clap::Parser;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Command line
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "futures_ledger", version, about = "Aggregate Binance Futures fills into position round-trips")]
pub struct Cli {
    /// Backfill from this date (YYYY-MM-DD, UTC) instead of the saved watermark
    pub start_date: Option<String>,

    /// Skip fetching; rebuild the positions table from the stored fills only
    #[arg(long)]
    pub aggregate_only: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("API_KEY and SECRET_KEY must be set (env or .env)")]
    MissingCredentials,
    #[error("invalid start date {0:?}, expected YYYY-MM-DD")]
    InvalidStartDate(String),
    #[error("invalid BASE_URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Clone, Debug)]
pub struct Args {
    // credentials (None only in aggregate-only mode)
    pub api_key: Option<String>,
    pub api_secret: Option<String>,

    // REST
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub max_limit: u32,
    pub recv_window: u64,

    // files
    pub fills_file: PathBuf,
    pub positions_file: PathBuf,
    pub state_file: PathBuf,
    pub metrics_file: Option<PathBuf>,

    // run
    pub symbols: Vec<String>, // extra symbols to always query
    pub start_time_ms: Option<i64>,
    pub aggregate_only: bool,
}

/// `YYYY-MM-DD` -> epoch millis at 00:00 UTC.
pub fn parse_start_date(s: &str) -> Result<i64, ConfigError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp_millis())
        .ok_or_else(|| ConfigError::InvalidStartDate(s.to_string()))
}

/// SYMBOLS=btcusdt, ETHUSDT ,,SOLUSDT -> [BTCUSDT, ETHUSDT, SOLUSDT]
pub fn parse_symbols(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_ascii_uppercase())
        .collect()
}

pub fn load(cli: &Cli) -> Result<Args, ConfigError> {
    // Pastikan .env dibaca (API_KEY, SECRET_KEY, dll)
    let _ = dotenv();
    load_from(cli, |k| env::var(k).ok())
}

/// Same as `load`, with an injectable lookup (tests).
pub fn load_from<F>(cli: &Cli, get: F) -> Result<Args, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let num = |k: &str| get(k).and_then(|v| v.trim().parse::<u64>().ok());

    // ===== Credentials =====
    let api_key = non_empty("API_KEY");
    let api_secret = non_empty("SECRET_KEY");
    if !cli.aggregate_only && (api_key.is_none() || api_secret.is_none()) {
        return Err(ConfigError::MissingCredentials);
    }

    // ===== REST =====
    let base_url = get("BASE_URL").unwrap_or_else(|| "https://fapi.binance.com".to_string());
    Url::parse(&base_url).map_err(|e| ConfigError::InvalidBaseUrl {
        url: base_url.clone(),
        reason: e.to_string(),
    })?;
    let request_timeout_secs = num("REQUEST_TIMEOUT_SECS").unwrap_or(10);
    let max_retries = num("MAX_RETRIES").unwrap_or(5) as u32;
    let max_limit = num("MAX_LIMIT").unwrap_or(1000).clamp(1, 1000) as u32;
    let recv_window = num("RECV_WINDOW").unwrap_or(5000);

    // ===== Files =====
    let path_or = |k: &str, default: &str| PathBuf::from(non_empty(k).unwrap_or_else(|| default.to_string()));
    let fills_file = path_or("FILLS_FILE", "futures_fills.csv");
    let positions_file = path_or("POSITIONS_FILE", "futures_positions.csv");
    let state_file = path_or("STATE_FILE", "state.json");
    let metrics_file = non_empty("METRICS_FILE").map(PathBuf::from);

    // ===== Run =====
    let symbols = get("SYMBOLS").map(|s| parse_symbols(&s)).unwrap_or_default();
    let start_time_ms = cli.start_date.as_deref().map(parse_start_date).transpose()?;

    Ok(Args {
        api_key,
        api_secret,
        base_url,
        request_timeout_secs,
        max_retries,
        max_limit,
        recv_window,
        fills_file,
        positions_file,
        state_file,
        metrics_file,
        symbols,
        start_time_ms,
        aggregate_only: cli.aggregate_only,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let args = load_from(&Cli::default(), lookup(&[("API_KEY", "k"), ("SECRET_KEY", "s")])).unwrap();
        assert_eq!(args.base_url, "https://fapi.binance.com");
        assert_eq!(args.fills_file, PathBuf::from("futures_fills.csv"));
        assert_eq!(args.positions_file, PathBuf::from("futures_positions.csv"));
        assert_eq!(args.state_file, PathBuf::from("state.json"));
        assert_eq!((args.request_timeout_secs, args.max_retries, args.max_limit), (10, 5, 1000));
        assert_eq!(args.metrics_file, None);
        assert_eq!(args.start_time_ms, None);
        assert!(args.symbols.is_empty());
    }

    #[test]
    fn credentials_required_unless_aggregate_only() {
        assert_eq!(
            load_from(&Cli::default(), lookup(&[("API_KEY", "k")])).unwrap_err(),
            ConfigError::MissingCredentials
        );
        let cli = Cli { aggregate_only: true, ..Default::default() };
        let args = load_from(&cli, lookup(&[])).unwrap();
        assert!(args.aggregate_only);
        assert_eq!(args.api_key, None);
    }

    #[test]
    fn overrides_and_clamps() {
        let cli = Cli { start_date: Some("2024-03-01".into()), aggregate_only: true };
        let args = load_from(
            &cli,
            lookup(&[
                ("MAX_LIMIT", "5000"),
                ("MAX_RETRIES", "2"),
                ("SYMBOLS", "btcusdt, ETHUSDT ,,"),
                ("METRICS_FILE", "/tmp/ledger.prom"),
            ]),
        )
        .unwrap();
        assert_eq!(args.max_limit, 1000);
        assert_eq!(args.max_retries, 2);
        assert_eq!(args.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(args.metrics_file, Some(PathBuf::from("/tmp/ledger.prom")));
        assert_eq!(args.start_time_ms, Some(1_709_251_200_000));
    }

    #[test]
    fn bad_inputs() {
        assert_eq!(parse_start_date("01/03/2024"), Err(ConfigError::InvalidStartDate("01/03/2024".into())));
        let cli = Cli { aggregate_only: true, ..Default::default() };
        assert!(matches!(
            load_from(&cli, lookup(&[("BASE_URL", "not a url")])),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }
}
