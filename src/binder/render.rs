//! Pure assembly of chart figures from a table, its indicators and the
//! toggle state. Output is Plotly-compatible JSON (`data` + `layout`).

use super::Toggles;
use crate::indicators::{IndicatorSet, IndicatorWindows};
use crate::models::{OhlcvTable, Series};
use chrono::NaiveDate;
use serde::Serialize;

const PLACEHOLDER_TEXT: &str = "No data found or chart hidden";

// ── Figure model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Scatter,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub x: Vec<NaiveDate>,
    /// Non-finite values become `null` gaps.
    pub y: Vec<Option<f64>>,
    #[serde(rename = "type")]
    pub kind: TraceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
}

impl Trace {
    fn line(name: impl Into<String>, x: Vec<NaiveDate>, y: Vec<f64>, color: Option<&'static str>) -> Self {
        Self {
            x,
            y: finite(y),
            kind: TraceKind::Scatter,
            mode: Some("lines"),
            name: name.into(),
            line: color.map(|color| Line { color }),
        }
    }

    fn bar(name: impl Into<String>, x: Vec<NaiveDate>, y: Vec<f64>) -> Self {
        Self {
            x,
            y: finite(y),
            kind: TraceKind::Bar,
            mode: None,
            name: name.into(),
            line: None,
        }
    }

    fn from_series(series: &Series, color: Option<&'static str>) -> Self {
        let x = series.points.iter().map(|p| p.date).collect();
        let y = series.points.iter().map(|p| p.value).collect();
        Self::line(series.label.clone(), x, y, color)
    }
}

fn finite(values: Vec<f64>) -> Vec<Option<f64>> {
    values.into_iter().map(|v| v.is_finite().then_some(v)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Text>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Font {
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub text: &'static str,
    pub xref: &'static str,
    pub yref: &'static str,
    pub showarrow: bool,
    pub font: Font,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Text,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub showlegend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovermode: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl Figure {
    fn chart(title: String, x_title: &str, y_title: &str, hovermode: &'static str, data: Vec<Trace>) -> Self {
        let axis = |t: &str| Axis {
            title: Some(Text { text: t.to_string() }),
            visible: true,
        };
        Self {
            data,
            layout: Layout {
                title: Text { text: title },
                xaxis: axis(x_title),
                yaxis: axis(y_title),
                showlegend: true,
                hovermode: Some(hovermode),
                annotations: Vec::new(),
            },
        }
    }

    /// Empty figure with hidden axes, shown for hidden or unavailable charts.
    pub fn placeholder(title: impl Into<String>) -> Self {
        let hidden = Axis {
            title: None,
            visible: false,
        };
        Self {
            data: Vec::new(),
            layout: Layout {
                title: Text { text: title.into() },
                xaxis: hidden.clone(),
                yaxis: hidden,
                showlegend: false,
                hovermode: None,
                annotations: vec![Annotation {
                    text: PLACEHOLDER_TEXT,
                    xref: "paper",
                    yref: "paper",
                    showarrow: false,
                    font: Font { size: 16 },
                }],
            },
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.data.is_empty()
    }

    pub fn trace_names(&self) -> Vec<&str> {
        self.data.iter().map(|t| t.name.as_str()).collect()
    }
}

/// The four chart regions of the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub symbol: String,
    pub price: Figure,
    pub volume: Figure,
    pub daily_returns: Figure,
    pub volatility: Figure,
}

// ── Assembly ──────────────────────────────────────────────────────────────────

pub fn render(
    table: &OhlcvTable,
    indicators: &IndicatorSet,
    windows: IndicatorWindows,
    toggles: &Toggles,
) -> Dashboard {
    let symbol = table.symbol();
    let dates = table.dates();

    // Price: close plus whichever MAs are switched on and have any points.
    let mut price_traces = vec![Trace::line("Close", dates.clone(), table.closes(), Some("blue"))];
    if toggles.ma_short && !indicators.ma_short.is_empty() {
        price_traces.push(Trace::from_series(&indicators.ma_short, Some("orange")));
    }
    if toggles.ma_long && !indicators.ma_long.is_empty() {
        price_traces.push(Trace::from_series(&indicators.ma_long, Some("purple")));
    }
    let price = Figure::chart(
        format!("{symbol} Stock Price with Moving Averages"),
        "Date",
        "Price (USD)",
        "x unified",
        price_traces,
    );

    let volumes = table.bars().iter().map(|b| b.volume as f64).collect();
    let volume = Figure::chart(
        format!("{symbol} Trading Volume"),
        "Date",
        "Volume",
        "x unified",
        vec![Trace::bar("Volume", dates, volumes)],
    );

    let daily_returns = if toggles.daily_returns && !indicators.daily_return.is_empty() {
        let r = &indicators.daily_return;
        let x = r.points.iter().map(|p| p.date).collect();
        let y = r.points.iter().map(|p| p.value * 100.0).collect();
        Figure::chart(
            format!("{symbol} Daily Return Rates (%)"),
            "Date",
            "Return (%)",
            "x unified",
            vec![Trace::bar("Daily Return", x, y)],
        )
    } else {
        Figure::placeholder("Daily Returns (Toggle On or No Data)")
    };

    let volatility = if toggles.volatility && !indicators.volatility.is_empty() {
        Figure::chart(
            format!("{symbol} {}-Day Price Volatility", windows.vol_window),
            "Date",
            "Standard Deviation",
            "closest",
            vec![Trace::from_series(&indicators.volatility, None)],
        )
    } else {
        Figure::placeholder("Volatility (Toggle On or No Data)")
    };

    Dashboard {
        symbol: symbol.to_string(),
        price,
        volume,
        daily_returns,
        volatility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute;
    use crate::models::DailyBar;

    fn table(n: usize) -> OhlcvTable {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 100.0 + (i % 7) as f64;
                DailyBar {
                    date: start + chrono::Days::new(i as u64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 500,
                }
            })
            .collect();
        OhlcvTable::from_bars("ACME", bars)
    }

    fn windows() -> IndicatorWindows {
        IndicatorWindows {
            ma_short: 5,
            ma_long: 20,
            vol_window: 10,
        }
    }

    fn render_with(t: &OhlcvTable, toggles: Toggles) -> Dashboard {
        let ind = compute(t, windows());
        render(t, &ind, windows(), &toggles)
    }

    #[test]
    fn default_toggles_show_both_averages_and_hide_extras() {
        let t = table(30);
        let dash = render_with(&t, Toggles::default());
        assert_eq!(dash.price.trace_names(), vec!["Close", "5-Day MA", "20-Day MA"]);
        assert_eq!(dash.price.layout.title.text, "ACME Stock Price with Moving Averages");
        assert_eq!(dash.volume.data[0].kind, TraceKind::Bar);
        assert_eq!(dash.volume.data[0].y.len(), 30);
        assert!(dash.daily_returns.is_placeholder());
        assert!(dash.volatility.is_placeholder());
        assert_eq!(
            dash.volatility.layout.title.text,
            "Volatility (Toggle On or No Data)"
        );
    }

    #[test]
    fn toggles_select_traces() {
        let t = table(30);
        let dash = render_with(
            &t,
            Toggles {
                ma_short: false,
                ma_long: true,
                daily_returns: true,
                volatility: true,
            },
        );
        assert_eq!(dash.price.trace_names(), vec!["Close", "20-Day MA"]);
        assert_eq!(dash.daily_returns.data[0].y.len(), 29);
        assert_eq!(dash.volatility.data[0].y.len(), 21);
        assert_eq!(dash.volatility.layout.title.text, "ACME 10-Day Price Volatility");
        assert_eq!(dash.volatility.layout.hovermode, Some("closest"));
    }

    #[test]
    fn returns_are_rendered_as_percentages() {
        let t = table(3);
        let dash = render_with(
            &t,
            Toggles {
                daily_returns: true,
                ..Toggles::default()
            },
        );
        let y = dash.daily_returns.data[0].y[0].unwrap();
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unavailable_average_is_left_out() {
        let t = table(10);
        let dash = render_with(&t, Toggles::default());
        assert_eq!(dash.price.trace_names(), vec!["Close", "5-Day MA"]);
    }

    #[test]
    fn placeholder_serializes_with_hidden_axes() {
        let v = serde_json::to_value(Figure::placeholder("Hidden")).unwrap();
        assert_eq!(v["data"], serde_json::json!([]));
        assert_eq!(v["layout"]["xaxis"]["visible"], false);
        assert_eq!(v["layout"]["annotations"][0]["text"], PLACEHOLDER_TEXT);
    }

    #[test]
    fn trace_dates_serialize_as_iso_strings() {
        let t = table(2);
        let dash = render_with(&t, Toggles::default());
        let v = serde_json::to_value(&dash.price).unwrap();
        assert_eq!(v["data"][0]["x"][0], "2023-01-02");
        assert_eq!(v["data"][0]["type"], "scatter");
        assert_eq!(v["data"][0]["mode"], "lines");
        assert_eq!(v["data"][0]["line"]["color"], "blue");
    }
}
