use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// ── Daily bar ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

// ── OHLCV table ───────────────────────────────────────────────────────────────

/// One symbol's daily bars, ascending by date, dates unique.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OhlcvTable {
    symbol: String,
    bars: Vec<DailyBar>,
}

impl OhlcvTable {
    /// Sorts by date and drops repeated dates (first occurrence wins).
    pub fn from_bars(symbol: impl Into<String>, mut bars: Vec<DailyBar>) -> Self {
        let symbol = symbol.into();
        bars.sort_by_key(|b| b.date);

        let before = bars.len();
        bars.dedup_by_key(|b| b.date);
        if bars.len() < before {
            warn!("{}: dropped {} bars with duplicate dates", symbol, before - bars.len());
        }

        Self { symbol, bars }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.bars.binary_search_by_key(&date, |b| b.date).is_ok()
    }

    /// Saturates instead of overflowing on absurd backend volumes.
    pub fn total_volume(&self) -> u64 {
        self.bars.iter().map(|b| b.volume).fold(0u64, u64::saturating_add)
    }
}

// ── Indicator series ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Derived metric aligned to a table's dates. Holds only the defined entries;
/// warm-up days are absent rather than NaN.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, date: NaiveDate, value: f64) {
        self.points.push(SeriesPoint { date, value });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn last(&self) -> Option<SeriesPoint> {
        self.points.last().copied()
    }
}

// ── Raw backend payload ───────────────────────────────────────────────────────

/// Top-level body of `GET /data/stock/{symbol}`.
/// Records stay untyped so a bad row can be dropped without failing the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub symbol: String,
    pub data: Vec<Value>,
}

/// One record of `data[]` before coercion. Numbers may arrive as strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBarRecord {
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default)]
    pub open: Option<Value>,
    #[serde(default)]
    pub high: Option<Value>,
    #[serde(default)]
    pub low: Option<Value>,
    #[serde(default)]
    pub close: Option<Value>,
    #[serde(default)]
    pub volume: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    #[test]
    fn table_is_sorted_and_deduplicated() {
        let table = OhlcvTable::from_bars("TEST", vec![bar(3, 3.0), bar(1, 1.0), bar(3, 9.0), bar(2, 2.0)]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(table.first_date(), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(table.last_date(), NaiveDate::from_ymd_opt(2024, 3, 3));
        assert_eq!(table.total_volume(), 300);
    }

    #[test]
    fn total_volume_saturates() {
        let mut a = bar(1, 1.0);
        a.volume = u64::MAX - 1;
        let mut b = bar(2, 1.0);
        b.volume = u64::MAX - 1;
        let table = OhlcvTable::from_bars("TEST", vec![a, b]);
        assert_eq!(table.total_volume(), u64::MAX);
    }

    #[test]
    fn contains_date_uses_table_dates() {
        let table = OhlcvTable::from_bars("TEST", vec![bar(1, 1.0), bar(4, 4.0)]);
        assert!(table.contains_date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()));
        assert!(!table.contains_date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
    }

    #[test]
    fn envelope_requires_symbol_and_data() {
        assert!(serde_json::from_str::<ApiEnvelope>(r#"{"symbol":"X","data":[]}"#).is_ok());
        assert!(serde_json::from_str::<ApiEnvelope>(r#"{"symbol":"X","records":[]}"#).is_err());
        assert!(serde_json::from_str::<ApiEnvelope>(r#"{"symbol":"X","data":"nope"}"#).is_err());
    }
}
