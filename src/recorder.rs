// ===============================
// src/recorder.rs
// ===============================
//
// CSV tables on disk:
// - fills table     : append-only, dedup by (symbol, id), sorted by time.
// - positions table : regenerated from scratch on every run.
// Writes go to `<file>.tmp` first, then rename (no half-written tables).
//
use std::collections::{BTreeSet, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::{PositionRecord, RawFill};
use crate::error::StoreError;
use crate::normalize::parse_time;

pub fn tmp_path(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn atomic_write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    {
        let mut wtr = csv::Writer::from_path(&tmp)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path)?;
    info!(rows = rows.len(), path = %path.display(), "wrote table");
    Ok(())
}

/// Missing or empty file -> no rows.
pub fn read_fills(path: &Path) -> Result<Vec<RawFill>, StoreError> {
    match fs::metadata(path) {
        Ok(m) if m.len() > 0 => {}
        _ => return Ok(Vec::new()),
    }
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut out = Vec::new();
    for row in rdr.deserialize::<RawFill>() {
        out.push(row?);
    }
    Ok(out)
}

/// Symbols already present in the fills table.
pub fn historical_symbols(path: &Path) -> Vec<String> {
    match read_fills(path) {
        Ok(rows) => rows
            .into_iter()
            .map(|r| r.symbol)
            .filter(|s| !s.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        Err(e) => {
            warn!(error = %e, "could not load historical symbols");
            Vec::new()
        }
    }
}

/// Append new fills. Existing rows win on duplicate (symbol, id).
/// Returns total rows in the table.
pub fn append_fills(path: &Path, new_fills: &[RawFill]) -> Result<usize, StoreError> {
    if new_fills.is_empty() {
        info!("no new fills to append");
        return Ok(0);
    }

    let existing = read_fills(path)?;
    let existing_len = existing.len();

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut combined: Vec<RawFill> = existing
        .into_iter()
        .chain(new_fills.iter().cloned())
        .filter(|f| seen.insert((f.symbol.clone(), f.id.trim().to_string())))
        .collect();

    combined.sort_by_key(|f| parse_time(&f.time));

    atomic_write_csv(path, &combined)?;
    info!(
        existing = existing_len,
        appended = combined.len() - existing_len,
        total = combined.len(),
        "fills table updated"
    );
    Ok(combined.len())
}

/// Regenerate the positions table. Empty input leaves the file alone.
pub fn write_positions(path: &Path, positions: &[PositionRecord]) -> Result<usize, StoreError> {
    if positions.is_empty() {
        warn!("no positions to write");
        return Ok(0);
    }
    atomic_write_csv(path, positions)?;
    Ok(positions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;

    fn fill(symbol: &str, id: u64, time: i64, side: &str, qty: &str) -> RawFill {
        RawFill {
            symbol: symbol.into(),
            id: id.to_string(),
            side: side.into(),
            position_side: "BOTH".into(),
            price: "100".into(),
            qty: qty.into(),
            commission: "0.01".into(),
            time: time.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn append_dedups_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fills.csv");

        let total = append_fills(&path, &[fill("BTCUSDT", 2, 2_000, "BUY", "1")]).unwrap();
        assert_eq!(total, 1);

        let mut dup = fill("BTCUSDT", 2, 2_000, "BUY", "1");
        dup.qty = "999".into();
        let total = append_fills(
            &path,
            &[dup, fill("BTCUSDT", 1, 1_000, "BUY", "1"), fill("ETHUSDT", 2, 1_500, "SELL", "3")],
        )
        .unwrap();
        assert_eq!(total, 3);

        let rows = read_fills(&path).unwrap();
        let ids: Vec<(&str, &str)> = rows.iter().map(|r| (r.symbol.as_str(), r.id.as_str())).collect();
        assert_eq!(ids, vec![("BTCUSDT", "1"), ("ETHUSDT", "2"), ("BTCUSDT", "2")]);
        assert_eq!(rows[2].qty, "1");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn empty_or_missing_table_reads_as_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fills.csv");
        assert!(read_fills(&path).unwrap().is_empty());
        fs::write(&path, "").unwrap();
        assert!(read_fills(&path).unwrap().is_empty());
        assert!(historical_symbols(&path).is_empty());
    }

    #[test]
    fn historical_symbols_are_sorted_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fills.csv");
        append_fills(
            &path,
            &[fill("SOLUSDT", 1, 1, "BUY", "1"), fill("BTCUSDT", 1, 2, "BUY", "1"), fill("SOLUSDT", 2, 3, "BUY", "1")],
        )
        .unwrap();
        assert_eq!(historical_symbols(&path), vec!["BTCUSDT".to_string(), "SOLUSDT".to_string()]);
    }

    #[test]
    fn positions_table_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("positions.csv");

        let fills = vec![
            fill("BTCUSDT", 1, 1_700_000_000_000, "BUY", "1"),
            fill("BTCUSDT", 2, 1_700_000_060_000, "SELL", "1"),
            fill("BTCUSDT", 3, 1_700_000_120_000, "SELL", "2"),
        ];
        let positions = aggregate(&fills).unwrap();
        assert_eq!(write_positions(&path, &positions).unwrap(), 2);
        assert_eq!(write_positions(&path, &positions).unwrap(), 2);

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("symbol,position_side,direction,open_time,close_time,duration_min"));
        assert!(header.ends_with("fills,status,net_qty"));
        assert_eq!(lines.clone().count(), 2);
        assert!(lines.next().unwrap().contains(",CLOSED,"));

        assert_eq!(write_positions(&path, &[]).unwrap(), 0);
        assert!(path.exists());
    }
}
