//! View binder: turns the page's control state into a render instruction.
//!
//! ## Cycle
//!
//! 1. Validate the request state (symbol, dates, bounds).
//! 2. If symbol and dates match the last successful fetch, reuse that table
//!    and its indicators; toggle changes never refetch.
//! 3. Otherwise fetch once, compute indicators, and remember the result.
//! 4. Render the toggled figure set, or an error message instead of charts.
//!
//! Each cycle carries a [`Ticket`] from the [`RequestSequencer`]; a cycle
//! that has been overtaken by a newer request is answered with
//! `Superseded` instead of charts.

pub mod render;

use crate::error::DataError;
use crate::fetcher::MarketDataSource;
use crate::fetcher::cleaner::normalise_symbol;
use crate::indicators::{IndicatorSet, IndicatorWindows, compute};
use crate::models::OhlcvTable;
use crate::utils::Timer;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use self::render::{Dashboard, render};

const MISSING_INPUT: &str = "Please ensure a stock symbol, start date, and end date are selected.";
const MAX_SYMBOL_LEN: usize = 15;

// ── Request state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggles {
    pub ma_short: bool,
    pub ma_long: bool,
    pub daily_returns: bool,
    pub volatility: bool,
}

impl Default for Toggles {
    /// Both moving averages on, extra charts off.
    fn default() -> Self {
        Self {
            ma_short: true,
            ma_long: true,
            daily_returns: false,
            volatility: false,
        }
    }
}

/// Everything the user controls on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState {
    pub symbol: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub toggles: Toggles,
}

/// The part of the request state that decides what to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataQuery {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy)]
pub struct DateBounds {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

/// Parse a `YYYY-MM-DD` control value; blank means "not selected".
pub fn parse_date_input(raw: Option<&str>) -> Result<Option<NaiveDate>, DataError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| DataError::Validation(format!("'{s}' is not a valid date (expected YYYY-MM-DD)."))),
    }
}

impl RequestState {
    pub fn validate(&self, bounds: DateBounds) -> Result<DataQuery, DataError> {
        let symbol = normalise_symbol(&self.symbol);
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Err(DataError::Validation(MISSING_INPUT.into()));
        };
        if symbol.is_empty() {
            return Err(DataError::Validation(MISSING_INPUT.into()));
        }

        let valid_chars = symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if symbol.len() > MAX_SYMBOL_LEN || !valid_chars {
            return Err(DataError::Validation(format!(
                "'{symbol}' is not a valid stock symbol."
            )));
        }
        if start > end {
            return Err(DataError::Validation(format!(
                "Start date {start} is after end date {end}."
            )));
        }
        if start < bounds.min {
            return Err(DataError::Validation(format!(
                "Start date must be on or after {}.",
                bounds.min
            )));
        }
        if end > bounds.max {
            return Err(DataError::Validation(format!(
                "End date must be on or before {}.",
                bounds.max
            )));
        }

        Ok(DataQuery { symbol, start, end })
    }
}

// ── Render instruction ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderInstruction {
    Charts(Dashboard),
    Error {
        category: &'static str,
        message: String,
    },
    Superseded,
}

impl From<&DataError> for RenderInstruction {
    fn from(e: &DataError) -> Self {
        Self::Error {
            category: e.category(),
            message: e.user_message(),
        }
    }
}

// ── Sequencing ────────────────────────────────────────────────────────────────

/// Hands out increasing sequence numbers so stale cycles can be discarded.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket<'_> {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            seq,
            latest: &self.latest,
        }
    }
}

#[derive(Debug)]
pub struct Ticket<'a> {
    seq: u64,
    latest: &'a AtomicU64,
}

impl Ticket<'_> {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// False once a newer ticket has been issued.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.seq
    }
}

// ── Binder ────────────────────────────────────────────────────────────────────

struct Snapshot {
    query: DataQuery,
    table: OhlcvTable,
    indicators: IndicatorSet,
}

pub struct ViewBinder<S> {
    source: S,
    windows: IndicatorWindows,
    min_date: NaiveDate,
    last: Option<Snapshot>,
}

impl<S: MarketDataSource> ViewBinder<S> {
    pub fn new(source: S, windows: IndicatorWindows, min_date: NaiveDate) -> Self {
        Self {
            source,
            windows,
            min_date,
            last: None,
        }
    }

    pub fn bounds(&self) -> DateBounds {
        DateBounds {
            min: self.min_date,
            max: chrono::Local::now().date_naive(),
        }
    }

    /// Last successfully fetched table, if any.
    pub fn table(&self) -> Option<&OhlcvTable> {
        self.last.as_ref().map(|s| &s.table)
    }

    pub fn indicators(&self) -> Option<&IndicatorSet> {
        self.last.as_ref().map(|s| &s.indicators)
    }

    /// Run one fetch-compute-render cycle for `state`.
    pub async fn update(&mut self, state: &RequestState, ticket: &Ticket<'_>) -> RenderInstruction {
        let query = match state.validate(self.bounds()) {
            Ok(q) => q,
            Err(e) => {
                debug!("Rejected request #{}: {}", ticket.seq(), e);
                return RenderInstruction::from(&e);
            }
        };

        let _t = Timer::start(format!("render #{} {}", ticket.seq(), query.symbol));

        // The cached snapshot is only replaced once a fetch has succeeded, so a
        // failed or abandoned cycle leaves the previous table in place.
        if self.last.as_ref().is_none_or(|s| s.query != query) {
            if !ticket.is_current() {
                return RenderInstruction::Superseded;
            }
            let table = match self.source.fetch_history(&query.symbol, query.start, query.end).await {
                Ok(table) => table,
                Err(e) => {
                    warn!("#{}: {} ({})", ticket.seq(), e, e.category());
                    return RenderInstruction::from(&e);
                }
            };
            let indicators = compute(&table, self.windows);
            info!(
                "{}: {} bars, {} → {}",
                query.symbol,
                table.len(),
                query.start,
                query.end
            );
            self.last = Some(Snapshot { query, table, indicators });
        } else {
            debug!("#{}: reusing cached bars for {}", ticket.seq(), query.symbol);
        }

        let dashboard = match &self.last {
            Some(s) => render(&s.table, &s.indicators, self.windows, &state.toggles),
            None => return RenderInstruction::Superseded,
        };

        if !ticket.is_current() {
            debug!("#{}: overtaken by a newer request, discarding", ticket.seq());
            return RenderInstruction::Superseded;
        }
        RenderInstruction::Charts(dashboard)
    }
}
