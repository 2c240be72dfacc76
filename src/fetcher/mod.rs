pub mod cleaner;
pub mod http_client;

use crate::config::BackendConfig;
use crate::error::DataError;
use crate::models::{ApiEnvelope, OhlcvTable};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info, warn};
use url::Url;

use self::cleaner::{clean_records, normalise_symbol};
use self::http_client::HttpClient;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable OHLCV source. The view binder only talks to this.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily bars for `symbol` in `[start, end]`, ascending by date.
    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<OhlcvTable, DataError>;
}

// ── Backend API client ────────────────────────────────────────────────────────

pub struct BackendClient {
    client: HttpClient,
    base_url: Url,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid backend base URL {:?}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Backend base URL {:?} cannot carry a path", config.base_url);
        }

        Ok(Self {
            client: HttpClient::new(config)?,
            base_url,
        })
    }

    /// `{base}/data/stock/{symbol}?from=YYYY-MM-DD&to=YYYY-MM-DD`
    pub fn history_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["data", "stock", symbol]);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("from", &start.format("%Y-%m-%d").to_string())
            .append_pair("to", &end.format("%Y-%m-%d").to_string());
        url
    }
}

/// Turn a response body into a table. Split out so it can be tested without
/// a socket.
pub fn parse_history_body(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    body: &str,
) -> Result<OhlcvTable, DataError> {
    let envelope: ApiEnvelope = serde_json::from_str(body)?;

    if normalise_symbol(&envelope.symbol) != normalise_symbol(symbol) {
        warn!(
            "Backend returned data for {} when {} was requested",
            envelope.symbol, symbol
        );
    }

    let no_data = || DataError::NoData {
        symbol: symbol.to_string(),
        start,
        end,
    };

    if envelope.data.is_empty() {
        debug!("{}: empty data list for {} → {}", symbol, start, end);
        return Err(no_data());
    }

    let bars = clean_records(symbol, envelope.data);
    if bars.is_empty() {
        return Err(no_data());
    }

    Ok(OhlcvTable::from_bars(symbol, bars))
}

#[async_trait]
impl MarketDataSource for BackendClient {
    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<OhlcvTable, DataError> {
        if symbol.trim().is_empty() {
            return Err(DataError::Validation("symbol must not be empty".into()));
        }
        if start > end {
            return Err(DataError::Validation(format!(
                "start date {start} is after end date {end}"
            )));
        }

        let url = self.history_url(symbol, start, end);
        info!("Fetching {} {} → {} from {}", symbol, start, end, url);

        let body = self.client.get_text(&url).await?;
        let table = parse_history_body(symbol, start, end, &body)?;

        debug!(
            "{}: {} bars ({:?} → {:?})",
            symbol,
            table.len(),
            table.first_date(),
            table.last_date()
        );
        Ok(table)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
