// ===============================
// src/posttrade.rs
// ===============================
use std::fmt;
use tracing::info;

use crate::domain::{PositionRecord, Status};

/// Run-level roll-up of the positions table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub open: usize,
    pub closed: usize,
    pub total_net_pnl: f64,
    pub total_commission: f64,
    pub open_commission: f64,
}

pub fn summarize(positions: &[PositionRecord]) -> Summary {
    positions.iter().fold(Summary::default(), |mut s, p| {
        match p.status {
            Status::Open => {
                s.open += 1;
                s.open_commission += p.commission;
            }
            Status::Closed => s.closed += 1,
        }
        s.total_net_pnl += p.net_pnl_after_fees;
        s.total_commission += p.commission;
        s
    })
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.open + self.closed == 0 {
            return write!(f, "No positions");
        }
        write!(
            f,
            "Positions Summary: open={} closed={} net_pnl_after_fees=${:.2} commission=${:.2}",
            self.open, self.closed, self.total_net_pnl, self.total_commission
        )
    }
}

pub fn report(positions: &[PositionRecord]) -> Summary {
    let s = summarize(positions);
    info!(
        open = s.open,
        closed = s.closed,
        net_pnl_after_fees = s.total_net_pnl,
        commission = s.total_commission,
        "{}", s
    );
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, PositionMode};
    use chrono::{TimeZone, Utc};

    fn rec(status: Status, rpnl: f64, fee: f64) -> PositionRecord {
        PositionRecord {
            symbol: "BTCUSDT".into(),
            position_side: PositionMode::Both,
            direction: Direction::Long,
            open_time: Utc.timestamp_opt(0, 0).unwrap(),
            close_time: None,
            duration_min: None,
            max_position_qty: 1.0,
            entry_qty: 1.0,
            entry_vwap: 1.0,
            realized_pnl: rpnl,
            commission: fee,
            net_pnl_after_fees: rpnl - fee,
            fills: 1,
            status,
            net_qty: None,
        }
    }

    #[test]
    fn rolls_up_counts_and_money() {
        let s = summarize(&[
            rec(Status::Closed, 10.0, 0.5),
            rec(Status::Closed, -4.0, 0.25),
            rec(Status::Open, 1.0, 0.25),
        ]);
        assert_eq!((s.open, s.closed), (1, 2));
        assert!((s.total_net_pnl - 6.0).abs() < 1e-12);
        assert!((s.total_commission - 1.0).abs() < 1e-12);
        assert_eq!(s.open_commission, 0.25);
        assert_eq!(
            s.to_string(),
            "Positions Summary: open=1 closed=2 net_pnl_after_fees=$6.00 commission=$1.00"
        );
    }

    #[test]
    fn empty_summary() {
        assert_eq!(summarize(&[]).to_string(), "No positions");
    }
}
