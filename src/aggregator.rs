// ===============================
// src/aggregator.rs
// ===============================
//
// Drives the per-key fold over normalized fills and collects records.
// Output: every CLOSED round-trip + every still-OPEN tail, by open_time.
//

use ahash::AHashMap as HashMap;
use tracing::{debug, info};

use crate::domain::{Fill, PositionKey, PositionRecord, RawFill, Status};
use crate::error::Error;
use crate::normalize::normalize;
use crate::positions::{advance, AggregateError, PositionState};

/// Owns the live accumulators; one per (symbol, positionSide).
#[derive(Debug, Default)]
pub struct Aggregator {
    live: HashMap<PositionKey, PositionState>,
    records: Vec<PositionRecord>,
}

impl Aggregator {
    pub fn new() -> Self { Self::default() }

    /// Feed one fill. Fills must arrive in normalized order.
    pub fn push(&mut self, fill: &Fill) -> Result<(), AggregateError> {
        let key = PositionKey::of(fill);
        let step = advance(self.live.remove(&key), fill);

        if let Some(done) = step.closed {
            debug!(symbol = %done.symbol, mode = done.mode.as_str(), fills = done.fills, "position closed");
            self.records.push(done.emit()?);
        }
        if let Some(st) = step.live {
            self.live.insert(key, st);
        }
        Ok(())
    }

    /// Flush remaining live states as OPEN and return the sorted collection.
    pub fn finish(mut self) -> Result<Vec<PositionRecord>, AggregateError> {
        let mut open: Vec<PositionState> = self.live.into_iter().map(|(_, st)| st).collect();
        open.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.mode.cmp(&b.mode)));
        for st in &open {
            self.records.push(st.emit()?);
        }

        // stable: ties keep emission order (closing leg before its flip successor)
        self.records.sort_by(|a, b| {
            a.open_time
                .cmp(&b.open_time)
                .then_with(|| a.symbol.cmp(&b.symbol))
                .then_with(|| a.position_side.cmp(&b.position_side))
        });
        Ok(self.records)
    }
}

/// Fold already-normalized fills.
pub fn aggregate_fills(fills: &[Fill]) -> Result<Vec<PositionRecord>, AggregateError> {
    let mut agg = Aggregator::new();
    for f in fills {
        agg.push(f)?;
    }
    agg.finish()
}

/// Raw fills -> position round-trips. Re-runnable; no hidden state.
pub fn aggregate(raw: &[RawFill]) -> Result<Vec<PositionRecord>, Error> {
    let fills = normalize(raw)?;
    let out = aggregate_fills(&fills)?;

    let open = out.iter().filter(|r| r.status == Status::Open).count();
    info!(
        fills = fills.len(),
        positions = out.len(),
        closed = out.len() - open,
        open,
        "aggregated fills into positions"
    );
    Ok(out)
}
