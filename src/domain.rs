// ===============================
// src/domain.rs
// ===============================
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side { Buy, Sell }
impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Venue position-accounting mode. `Both` = net mode (default when unset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionMode {
    #[default]
    Both,
    Long,
    Short,
}
impl PositionMode {
    /// Unknown or missing values fall back to net mode.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => PositionMode::Long,
            "SHORT" => PositionMode::Short,
            _ => PositionMode::Both,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self { PositionMode::Both => "BOTH", PositionMode::Long => "LONG", PositionMode::Short => "SHORT" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction { Long, Short }
impl Direction {
    pub fn from_delta(delta: f64) -> Self { if delta > 0.0 { Direction::Long } else { Direction::Short } }
    pub fn sign(&self) -> f64 { match self { Direction::Long => 1.0, Direction::Short => -1.0 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status { Open, Closed }

/// One row of the fills table, exactly as received (all text).
/// Field names follow the `/fapi/v1/userTrades` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFill {
    #[serde(default)] pub symbol: String,
    #[serde(default)] pub id: String,
    #[serde(default)] pub order_id: String,
    #[serde(default)] pub side: String,
    #[serde(default)] pub position_side: String,
    #[serde(default)] pub price: String,
    #[serde(default)] pub qty: String,
    #[serde(default)] pub quote_qty: String,
    #[serde(default)] pub realized_pnl: String,
    #[serde(default)] pub commission: String,
    #[serde(default)] pub commission_asset: String,
    #[serde(default)] pub time: String,
    #[serde(default)] pub buyer: String,
    #[serde(default)] pub maker: String,
}

/// Normalized fill, ready for the aggregation fold.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub symbol: String,
    pub mode: PositionMode,
    pub side: Side,
    pub qty: f64,
    pub price: f64,
    pub commission: f64,
    pub realized_pnl: f64,
    pub time: DateTime<Utc>,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey { pub symbol: String, pub mode: PositionMode }
impl PositionKey {
    pub fn of(fill: &Fill) -> Self { Self { symbol: fill.symbol.clone(), mode: fill.mode } }
}

/// One position round-trip (or the still-open tail of one).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRecord {
    pub symbol: String,
    pub position_side: PositionMode,
    pub direction: Direction,
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub duration_min: Option<f64>,
    pub max_position_qty: f64,
    pub entry_qty: f64,
    pub entry_vwap: f64,
    pub realized_pnl: f64,
    pub commission: f64,
    pub net_pnl_after_fees: f64,
    pub fills: u32,
    pub status: Status,
    pub net_qty: Option<f64>,
}
