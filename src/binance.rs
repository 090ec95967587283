// ===============================
// src/binance.rs
// ===============================
//
// Helpers for Binance USDⓈ-M Futures REST: request signing + wire models.
//
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::RawFill;

pub const USER_TRADES_PATH: &str = "/fapi/v1/userTrades";
pub const POSITION_RISK_PATH: &str = "/fapi/v2/positionRisk";

pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn sign_query(secret: &str, query: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key");
    mac.update(query.as_bytes());
    let sig = mac.finalize().into_bytes();
    hex::encode(sig)
}

/// `k=v&k=v` with values url-encoded, in the given order.
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Query string plus trailing `signature=` over it.
pub fn signed_query(secret: &str, params: &[(String, String)]) -> String {
    let query = encode_query(params);
    let sig = sign_query(secret, &query);
    format!("{}&signature={}", query, sig)
}

// ---- REST models ----

/// One element of `/fapi/v1/userTrades`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTrade {
    pub symbol: String,
    pub id: u64,
    #[serde(default)]
    pub order_id: u64,
    pub side: String,
    #[serde(default)]
    pub position_side: Option<String>,
    pub price: String,
    pub qty: String,
    #[serde(default)]
    pub quote_qty: String,
    #[serde(default)]
    pub realized_pnl: String,
    #[serde(default)]
    pub commission: String,
    #[serde(default)]
    pub commission_asset: String,
    pub time: i64,
    #[serde(default)]
    pub buyer: bool,
    #[serde(default)]
    pub maker: bool,
}

impl From<UserTrade> for RawFill {
    fn from(t: UserTrade) -> Self {
        RawFill {
            symbol: t.symbol,
            id: t.id.to_string(),
            order_id: t.order_id.to_string(),
            side: t.side,
            position_side: t.position_side.unwrap_or_default(),
            price: t.price,
            qty: t.qty,
            quote_qty: t.quote_qty,
            realized_pnl: t.realized_pnl,
            commission: t.commission,
            commission_asset: t.commission_asset,
            time: t.time.to_string(),
            buyer: t.buyer.to_string(),
            maker: t.maker.to_string(),
        }
    }
}

/// Subset of `/fapi/v2/positionRisk`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: String,
    pub position_amt: String,
}

impl PositionRisk {
    pub fn is_open(&self) -> bool {
        self.position_amt.trim().parse::<f64>().map(|q| q != 0.0).unwrap_or(false)
    }
}
