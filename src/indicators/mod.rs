//! Derived statistics over a daily close series.
//!
//! Every function here is a pure function of its inputs: same table in, same
//! series out, bit for bit. Windowed metrics omit their warm-up days instead
//! of padding them, so a window of `w` over `n` bars yields `n - (w - 1)`
//! points (none if `w > n`).

use crate::config::IndicatorConfig;
use crate::models::{OhlcvTable, Series};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndicatorWindows {
    pub ma_short: usize,
    pub ma_long: usize,
    pub vol_window: usize,
}

impl Default for IndicatorWindows {
    fn default() -> Self {
        Self {
            ma_short: 50,
            ma_long: 200,
            vol_window: 30,
        }
    }
}

impl From<&IndicatorConfig> for IndicatorWindows {
    fn from(cfg: &IndicatorConfig) -> Self {
        Self {
            ma_short: cfg.ma_short,
            ma_long: cfg.ma_long,
            vol_window: cfg.vol_window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub ma_short: Series,
    pub ma_long: Series,
    /// Fractional change, e.g. 0.02 for +2%.
    pub daily_return: Series,
    pub volatility: Series,
}

/// Compute every indicator the dashboard can show.
pub fn compute(table: &OhlcvTable, windows: IndicatorWindows) -> IndicatorSet {
    let dates = table.dates();
    let closes = table.closes();

    IndicatorSet {
        ma_short: moving_average(&dates, &closes, windows.ma_short),
        ma_long: moving_average(&dates, &closes, windows.ma_long),
        daily_return: daily_return(&dates, &closes),
        volatility: rolling_std(&dates, &closes, windows.vol_window),
    }
}

/// Trailing windows `(end_index, window)` for every index with full history.
fn windows_of(values: &[f64], w: usize) -> impl Iterator<Item = (usize, &[f64])> {
    let valid = w > 0 && w <= values.len();
    values
        .windows(w.max(1))
        .enumerate()
        .filter(move |_| valid)
        .map(move |(start, win)| (start + w - 1, win))
}

/// Simple moving average of `closes` over `w` days.
pub fn moving_average(dates: &[NaiveDate], closes: &[f64], w: usize) -> Series {
    let mut out = Series::new(format!("{w}-Day MA"));
    for (i, win) in windows_of(closes, w) {
        out.push(dates[i], win.iter().sum::<f64>() / w as f64);
    }
    out
}

/// Day-over-day change `(c[i] - c[i-1]) / c[i-1]`, from the second day.
///
/// A zero previous close yields an infinite or NaN value; it is passed
/// through untouched.
pub fn daily_return(dates: &[NaiveDate], closes: &[f64]) -> Series {
    let mut out = Series::new("Daily Return");
    for (i, pair) in closes.windows(2).enumerate() {
        out.push(dates[i + 1], (pair[1] - pair[0]) / pair[0]);
    }
    out
}

/// Sample standard deviation (n - 1 denominator) of `closes` over `w` days.
/// Needs `w >= 2`; smaller windows produce an empty series.
pub fn rolling_std(dates: &[NaiveDate], closes: &[f64], w: usize) -> Series {
    let mut out = Series::new(format!("{w}-Day Volatility"));
    if w < 2 {
        return out;
    }
    for (i, win) in windows_of(closes, w) {
        let mean = win.iter().sum::<f64>() / w as f64;
        let ss: f64 = win.iter().map(|c| (c - mean).powi(2)).sum();
        out.push(dates[i], (ss / (w - 1) as f64).sqrt());
    }
    out
}
