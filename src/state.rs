// ===============================
// src/state.rs (fetch watermark)
// ===============================
//
// Watermark JSON, e.g.:
//   {"last_trade_time_ms": 1700000000000, "last_id_by_symbol": {"BTCUSDT": 4242}}
//
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::binance::UserTrade;
use crate::error::StoreError;
use crate::recorder::tmp_path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    #[serde(default)]
    pub last_trade_time_ms: i64,
    #[serde(default)]
    pub last_id_by_symbol: BTreeMap<String, u64>,
}

impl Watermark {
    /// Missing or unreadable file -> fresh watermark.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(StoreError::from)
            .and_then(|s| serde_json::from_str::<Watermark>(&s).map_err(StoreError::from));
        match parsed {
            Ok(wm) => {
                debug!(?wm, "watermark loaded");
                wm
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "could not load watermark, starting fresh");
                Self::default()
            }
        }
    }

    /// Atomic save (tmp + rename).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let tmp = tmp_path(path);
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "watermark saved");
        Ok(())
    }

    pub fn last_id(&self, symbol: &str) -> Option<u64> {
        self.last_id_by_symbol.get(symbol).copied()
    }

    /// Advance (never rewind) time and per-symbol id marks.
    pub fn update(&mut self, trades: &[UserTrade]) {
        for t in trades {
            self.last_trade_time_ms = self.last_trade_time_ms.max(t.time);
            let id = self.last_id_by_symbol.entry(t.symbol.clone()).or_insert(0);
            *id = (*id).max(t.id);
        }
    }

    /// Fold one fetch pass in. A failed symbol with no id mark is re-queried
    /// by time next run, so the time mark stays put until it succeeds.
    pub fn commit(&mut self, fetched: &[UserTrade], failed: &[String]) {
        let held = failed.iter().any(|s| self.last_id(s).is_none());
        let prior = self.last_trade_time_ms;
        self.update(fetched);
        if held && self.last_trade_time_ms != prior {
            warn!(kept_ms = prior, "time-mode symbol failed, time watermark not advanced");
            self.last_trade_time_ms = prior;
        }
    }
}
