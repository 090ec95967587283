// ===============================
// src/positions.rs (round-trip tracker)
// ===============================
//
// State machine per (symbol, positionSide):
//   ABSENT -> OPEN -> (extend / reduce)* -> CLOSED -> ABSENT
//                                        \-> flip: CLOSED + new OPEN in the same fill
//
// Entry VWAP only accrues from fills in the opening direction; reducing fills
// never move the entry price. Commission and realizedPnl of a flip fill go
// entirely to the leg being closed.
//

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Direction, Fill, PositionMode, PositionRecord, Side, Status};

/// |netQty| below this is flat.
pub const FLAT_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("inconsistent position state for {symbol}/{mode}: {reason}")]
    Inconsistent { symbol: String, mode: &'static str, reason: String },
}

/// Signed quantity delta of a fill relative to its position side.
/// SHORT legs grow on SELL; LONG and BOTH (net) grow on BUY.
pub fn signed_qty(fill: &Fill) -> f64 {
    match (fill.mode, fill.side) {
        (PositionMode::Short, Side::Sell) => fill.qty,
        (PositionMode::Short, Side::Buy) => -fill.qty,
        (_, Side::Buy) => fill.qty,
        (_, Side::Sell) => -fill.qty,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    pub symbol: String,
    pub mode: PositionMode,
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub direction: Direction,
    pub net_qty: f64,
    pub qty_opened: f64,
    pub entry_notional: f64,
    pub max_abs_qty: f64,
    pub fills: u32,
    pub commission: f64,
    pub realized_pnl: f64,
}

impl PositionState {
    /// Fresh accumulator; direction comes from the sign of the opening delta.
    pub fn open(fill: &Fill, delta: f64) -> Self {
        Self {
            symbol: fill.symbol.clone(),
            mode: fill.mode,
            open_time: fill.time,
            close_time: None,
            direction: Direction::from_delta(delta),
            net_qty: 0.0,
            qty_opened: 0.0,
            entry_notional: 0.0,
            max_abs_qty: 0.0,
            fills: 0,
            commission: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.net_qty.abs() < FLAT_EPSILON
    }

    fn fault(&self, reason: impl Into<String>) -> AggregateError {
        AggregateError::Inconsistent {
            symbol: self.symbol.clone(),
            mode: self.mode.as_str(),
            reason: reason.into(),
        }
    }

    fn check(&self) -> Result<(), AggregateError> {
        let sums = [
            self.net_qty,
            self.qty_opened,
            self.entry_notional,
            self.max_abs_qty,
            self.commission,
            self.realized_pnl,
        ];
        if sums.iter().any(|v| !v.is_finite()) {
            return Err(self.fault("non-finite accumulator"));
        }
        if self.entry_notional < 0.0 {
            return Err(self.fault(format!("negative entry notional {}", self.entry_notional)));
        }
        if self.qty_opened * self.direction.sign() < 0.0 {
            return Err(self.fault(format!(
                "entry quantity {} against {:?} direction",
                self.qty_opened, self.direction
            )));
        }
        Ok(())
    }

    /// Immutable record of this accumulator. Closed iff `close_time` is set;
    /// open records carry the residual `net_qty`.
    pub fn emit(&self) -> Result<PositionRecord, AggregateError> {
        self.check()?;

        let entry_qty = self.qty_opened.abs();
        let entry_vwap = if entry_qty > 0.0 { self.entry_notional / entry_qty } else { 0.0 };
        let duration_min = self
            .close_time
            .map(|ct| (ct - self.open_time).num_milliseconds() as f64 / 60_000.0);
        let status = if self.close_time.is_some() { Status::Closed } else { Status::Open };

        Ok(PositionRecord {
            symbol: self.symbol.clone(),
            position_side: self.mode,
            direction: self.direction,
            open_time: self.open_time,
            close_time: self.close_time,
            duration_min,
            max_position_qty: self.max_abs_qty,
            entry_qty,
            entry_vwap,
            realized_pnl: self.realized_pnl,
            commission: self.commission,
            net_pnl_after_fees: self.realized_pnl - self.commission,
            fills: self.fills,
            status,
            net_qty: match status {
                Status::Open => Some(self.net_qty),
                Status::Closed => None,
            },
        })
    }
}

/// Outcome of one fold step for a single key.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// State flushed by this fill (close or the closing leg of a flip).
    pub closed: Option<PositionState>,
    /// State left live for the key afterwards.
    pub live: Option<PositionState>,
}

/// Apply one fill to the key's live state (if any).
pub fn advance(slot: Option<PositionState>, fill: &Fill) -> Advance {
    let delta = signed_qty(fill);

    let mut st = match slot {
        Some(st) if !st.is_flat() => st,
        _ => PositionState::open(fill, delta),
    };

    st.fills += 1;
    st.commission += fill.commission;
    st.realized_pnl += fill.realized_pnl;

    let prev_net = st.net_qty;
    let new_net = prev_net + delta;

    // arah sama -> akumulasi entry VWAP
    if st.direction.sign() * delta > 0.0 {
        st.qty_opened += delta;
        st.entry_notional += fill.price * delta.abs();
    }

    st.net_qty = new_net;
    st.max_abs_qty = st.max_abs_qty.max(new_net.abs());

    // a sign cross that lands within epsilon of zero is a plain close
    let crossed = (prev_net > 0.0 && new_net < 0.0) || (prev_net < 0.0 && new_net > 0.0);
    if crossed && new_net.abs() >= FLAT_EPSILON {
        st.close_time = Some(fill.time);
        st.net_qty = 0.0;

        let mut next = PositionState::open(fill, new_net);
        next.fills = 1;
        next.net_qty = new_net;
        next.qty_opened = new_net;
        next.entry_notional = fill.price * new_net.abs();
        next.max_abs_qty = new_net.abs();

        return Advance { closed: Some(st), live: Some(next) };
    }

    if st.is_flat() {
        st.close_time = Some(fill.time);
        return Advance { closed: Some(st), live: None };
    }

    Advance { closed: None, live: Some(st) }
}
