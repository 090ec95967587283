// ===============================
// src/error.rs
// ===============================
use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway_binance::GatewayError;
use crate::normalize::NormalizeError;
use crate::positions::AggregateError;

/// File-backed stores (fills/positions tables, watermark, metrics textfile).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metrics encode: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("normalize: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("aggregate: {0}")]
    Aggregate(#[from] AggregateError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}
