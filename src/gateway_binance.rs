// ===============================
// src/gateway_binance.rs
// ===============================
//
// Binance USDⓈ-M Futures REST (read-only):
// - positionRisk -> symbols with open exposure
// - userTrades   -> paginated fills, resumable via Watermark
// Retry on 429/418/5xx + transport errors with capped exponential backoff.
//
use rand::Rng;
use reqwest::StatusCode;
use std::collections::BTreeSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::binance::{signed_query, timestamp_ms, PositionRisk, UserTrade, POSITION_RISK_PATH, USER_TRADES_PATH};
use crate::config::Args;
use crate::metrics::{FILLS_FETCHED, HTTP_RETRIES};
use crate::state::Watermark;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{path} -> HTTP {status}: {body}")]
    Status { path: String, status: u16, body: String },
    #[error("{path}: gave up after {attempts} attempts")]
    RetriesExhausted { path: String, attempts: u32 },
    #[error("{path}: undecodable payload: {source}")]
    Decode { path: String, source: serde_json::Error },
    #[error("missing API credentials")]
    MissingCredentials,
}

/// 429 (rate limit), 418 (IP ban) and 5xx are worth retrying.
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 || status.is_server_error()
}

/// min(60s, 2^attempt s + jitter[0,1) s)
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = 2f64.powi(attempt.min(6) as i32);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64((base + jitter).min(60.0))
}

/// Sorted union of active, configured and historical symbols.
pub fn symbols_to_query(active: &[String], configured: &[String], historical: &[String]) -> Vec<String> {
    active
        .iter()
        .chain(configured)
        .chain(historical)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct BinanceFutures {
    http: reqwest::Client,
    rest_base: String,
    api_key: String,
    api_secret: String,
    recv_window: u64,
    max_retries: u32,
    limit: u32,
}

impl BinanceFutures {
    pub fn new(args: &Args) -> Result<Self, GatewayError> {
        let (api_key, api_secret) = match (&args.api_key, &args.api_secret) {
            (Some(k), Some(s)) => (k.clone(), s.clone()),
            _ => return Err(GatewayError::MissingCredentials),
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(args.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            rest_base: args.base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            recv_window: args.recv_window,
            max_retries: args.max_retries.max(1),
            limit: args.max_limit,
        })
    }

    /// Signed GET; timestamp + signature are rebuilt on every attempt so a long
    /// backoff never trips recvWindow.
    async fn signed_get(&self, path: &str, params: &[(String, String)]) -> Result<String, GatewayError> {
        for attempt in 0..self.max_retries {
            let mut full = params.to_vec();
            full.push(("recvWindow".to_string(), self.recv_window.to_string()));
            full.push(("timestamp".to_string(), timestamp_ms().to_string()));
            let url = format!("{}{}?{}", self.rest_base, path, signed_query(&self.api_secret, &full));

            let last = attempt + 1 >= self.max_retries;
            match self.http.get(&url).header("X-MBX-APIKEY", &self.api_key).send().await {
                Ok(rsp) if rsp.status().is_success() => return Ok(rsp.text().await?),
                Ok(rsp) if is_retryable(rsp.status()) => {
                    let status = rsp.status().as_u16();
                    HTTP_RETRIES.with_label_values(&[&status.to_string()]).inc();
                    if last {
                        break;
                    }
                    let wait = backoff_delay(attempt);
                    warn!(%path, status, attempt = attempt + 1, max = self.max_retries, wait_s = wait.as_secs_f64(), "retryable status");
                    sleep(wait).await;
                }
                Ok(rsp) => {
                    let status = rsp.status().as_u16();
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(GatewayError::Status { path: path.to_string(), status, body });
                }
                Err(e) => {
                    HTTP_RETRIES.with_label_values(&["transport"]).inc();
                    if last {
                        error!(?e, %path, "request failed, no retries left");
                        break;
                    }
                    let wait = backoff_delay(attempt);
                    warn!(?e, %path, attempt = attempt + 1, max = self.max_retries, wait_s = wait.as_secs_f64(), "request error");
                    sleep(wait).await;
                }
            }
        }
        Err(GatewayError::RetriesExhausted { path: path.to_string(), attempts: self.max_retries })
    }

    /// Symbols with non-zero positionAmt. Errors degrade to an empty list.
    pub async fn active_symbols(&self) -> Vec<String> {
        let body = match self.signed_get(POSITION_RISK_PATH, &[]).await {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "fetch active positions failed");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<PositionRisk>>(&body) {
            Ok(risks) => {
                let symbols: Vec<String> = risks
                    .into_iter()
                    .filter(|p| p.is_open())
                    .map(|p| p.symbol)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                info!(count = symbols.len(), "symbols with open positions");
                symbols
            }
            Err(e) => {
                error!(?e, "bad positionRisk payload");
                Vec::new()
            }
        }
    }

    /// All trades for one symbol after `from_id` (exclusive) or from `start_ms`.
    async fn fetch_symbol(
        &self,
        symbol: &str,
        mut from_id: Option<u64>,
        start_ms: Option<i64>,
    ) -> Result<Vec<UserTrade>, GatewayError> {
        let mut out: Vec<UserTrade> = Vec::new();
        let mut page = 0u32;
        loop {
            page += 1;
            let mut params = vec![
                ("symbol".to_string(), symbol.to_string()),
                ("limit".to_string(), self.limit.to_string()),
            ];
            let time_mode = from_id.is_none();
            match (from_id, start_ms) {
                (Some(id), _) => params.push(("fromId".to_string(), (id + 1).to_string())),
                (None, Some(ms)) if ms > 0 => params.push(("startTime".to_string(), ms.to_string())),
                _ => {}
            }

            let body = self.signed_get(USER_TRADES_PATH, &params).await?;
            let mut trades: Vec<UserTrade> = serde_json::from_str(&body).map_err(|source| GatewayError::Decode {
                path: USER_TRADES_PATH.to_string(),
                source,
            })?;
            if trades.is_empty() {
                debug!(%symbol, page, "no more trades");
                break;
            }
            let page_len = trades.len();

            if let (true, Some(ms)) = (time_mode, start_ms) {
                trades.retain(|t| t.time >= ms);
            }
            if let Some(last) = trades.last() {
                from_id = Some(last.id);
            }
            debug!(%symbol, page, fetched = trades.len(), from_id = ?from_id, "page");
            out.extend(trades);

            if page_len < self.limit as usize || from_id.is_none() {
                break;
            }
        }
        Ok(out)
    }

    /// Fetch new trades for every symbol; a failing symbol is logged and skipped.
    /// `start_override` (explicit backfill) forces time mode for all symbols.
    pub async fn fetch_new_trades(
        &self,
        symbols: &[String],
        start_override: Option<i64>,
        mut watermark: Watermark,
    ) -> (Vec<UserTrade>, Watermark) {
        let start_ms = start_override.or(Some(watermark.last_trade_time_ms));
        let mut all = Vec::new();
        let mut failed = Vec::new();

        for symbol in symbols {
            let from_id = if start_override.is_some() { None } else { watermark.last_id(symbol) };
            match self.fetch_symbol(symbol, from_id, start_ms).await {
                Ok(trades) if !trades.is_empty() => {
                    info!(%symbol, trades = trades.len(), "fetched");
                    FILLS_FETCHED.with_label_values(&[symbol]).inc_by(trades.len() as u64);
                    all.extend(trades);
                }
                Ok(_) => debug!(%symbol, "no new trades"),
                Err(e) => {
                    error!(%symbol, error = %e, "fetch failed, skipping symbol");
                    failed.push(symbol.clone());
                }
            }
        }

        watermark.commit(&all, &failed);
        info!(total = all.len(), failed = failed.len(), "total trades fetched");
        (all, watermark)
    }
}
