use crate::models::{DailyBar, RawBarRecord};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::warn;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse a price given as a JSON number or a numeric string.
/// 155.0 → 155.0 | "1,234.56" → 1234.56 | "not-a-number" → None
pub fn parse_price(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim().replace(',', "");
            if s.is_empty() || s == "N/A" || s == "-" {
                return None;
            }
            s.parse().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse a volume string with optional K/M/B suffix.
/// "1.2M" → 1,200,000 | "345K" → 345,000 | "12,345" → 12345
pub fn parse_volume_shorthand(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase().replace(',', "");
    if s.is_empty() || s == "N/A" || s == "-" {
        return None;
    }

    let (num_str, multiplier) = match s.chars().last()? {
        'B' => (&s[..s.len() - 1], 1_000_000_000.0),
        'M' => (&s[..s.len() - 1], 1_000_000.0),
        'K' => (&s[..s.len() - 1], 1_000.0),
        _ => (s.as_str(), 1.0),
    };

    let num: f64 = num_str.trim().parse().ok()?;
    let scaled = num * multiplier;
    whole_non_negative(if multiplier > 1.0 { scaled.round() } else { scaled })
}

/// Volume as a JSON integer, an integral float, or a shorthand string.
pub fn parse_volume(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_non_negative)),
        Value::String(s) => parse_volume_shorthand(s),
        _ => None,
    }
}

fn whole_non_negative(n: f64) -> Option<u64> {
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 {
        Some(n as u64)
    } else {
        None
    }
}

/// Parse "2024-01-31" or an ISO datetime such as "2024-01-31T00:00:00".
pub fn parse_date(v: &Value) -> Option<NaiveDate> {
    let s = v.as_str()?.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    // Trailing offsets / fractional seconds: the date part is all we need.
    s.get(..10)
        .filter(|_| s.as_bytes().get(10) == Some(&b'T'))
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

// ── Record → DailyBar ─────────────────────────────────────────────────────────

/// Coerce one raw record. Any missing or unparseable field drops the record.
pub fn record_to_bar(symbol: &str, record: &RawBarRecord) -> Option<DailyBar> {
    let date = record.date.as_ref().and_then(parse_date);
    let open = record.open.as_ref().and_then(parse_price);
    let high = record.high.as_ref().and_then(parse_price);
    let low = record.low.as_ref().and_then(parse_price);
    let close = record.close.as_ref().and_then(parse_price);
    let volume = record.volume.as_ref().and_then(parse_volume);

    match (date, open, high, low, close, volume) {
        (Some(date), Some(open), Some(high), Some(low), Some(close), Some(volume)) => {
            Some(DailyBar { date, open, high, low, close, volume })
        }
        _ => {
            warn!("{}: dropping incomplete record {:?}", symbol, record);
            None
        }
    }
}

/// Coerce every element of `data[]`, dropping non-objects and incomplete rows.
pub fn clean_records(symbol: &str, data: Vec<Value>) -> Vec<DailyBar> {
    let total = data.len();
    let bars: Vec<DailyBar> = data
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawBarRecord>(v).ok())
        .filter_map(|r| record_to_bar(symbol, &r))
        .collect();

    if bars.len() < total {
        warn!("{}: kept {} of {} records", symbol, bars.len(), total);
    }
    bars
}

// ── Tests ─────────────────────────────────────────────────────────────────────
