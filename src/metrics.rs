// ===============================
// src/metrics.rs
// ===============================
//
// Prometheus registry for a batch run. No HTTP endpoint: when METRICS_FILE
// is set the registry is dumped in text format at the end of the run
// (node_exporter textfile collector style).
//
use once_cell::sync::Lazy;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::fs;
use std::path::Path;

use crate::error::StoreError;
use crate::posttrade::Summary;
use crate::recorder::tmp_path;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static FILLS_FETCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ledger_fills_fetched_total", "fills fetched from userTrades per symbol"),
        &["symbol"],
    )
    .unwrap()
});

pub static HTTP_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ledger_http_retries_total", "retried REST calls (label: reason = status or transport)"),
        &["reason"],
    )
    .unwrap()
});

pub static POSITIONS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("ledger_positions", "positions in the last aggregation (label: status)"),
        &["status"],
    )
    .unwrap()
});

pub static NET_PNL: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("ledger_net_pnl_after_fees", "sum of realizedPnl - commission over all positions").unwrap()
});

pub static COMMISSION: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("ledger_commission", "commission over all positions (label: status)"),
        &["status"],
    )
    .unwrap()
});

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(FILLS_FETCHED.clone())),
        REGISTRY.register(Box::new(HTTP_RETRIES.clone())),
        REGISTRY.register(Box::new(POSITIONS.clone())),
        REGISTRY.register(Box::new(NET_PNL.clone())),
        REGISTRY.register(Box::new(COMMISSION.clone())),
    ] {
        // AlreadyReg on repeated init is fine
        let _ = m;
    }
}

pub fn observe(summary: &Summary) {
    POSITIONS.with_label_values(&["open"]).set(summary.open as i64);
    POSITIONS.with_label_values(&["closed"]).set(summary.closed as i64);
    NET_PNL.set(summary.total_net_pnl);
    COMMISSION.with_label_values(&["open"]).set(summary.open_commission);
    COMMISSION.with_label_values(&["closed"]).set(summary.total_commission - summary.open_commission);
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Result<Vec<u8>, StoreError> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf)?;
    Ok(buf)
}

pub fn write_textfile(path: &Path) -> Result<(), StoreError> {
    let tmp = tmp_path(path);
    fs::write(&tmp, encode_metrics()?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textfile_contains_observed_values() {
        init();
        observe(&Summary {
            open: 2,
            closed: 5,
            total_net_pnl: 12.5,
            total_commission: 1.5,
            open_commission: 0.5,
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.prom");
        write_textfile(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("ledger_positions{status=\"closed\"} 5"));
        assert!(text.contains("ledger_net_pnl_after_fees 12.5"));
    }
}
