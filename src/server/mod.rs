//! Dashboard HTTP surface.
//!
//! - `GET /`               dashboard page
//! - `GET /api/dashboard`  one view-binder cycle, JSON render instruction
//! - `GET /health`         liveness
//!
//! The binder sits behind an async mutex, so cycles run one at a time.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
};
use chrono::{Days, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::binder::{RenderInstruction, RequestSequencer, RequestState, Toggles, ViewBinder, parse_date_input};
use crate::config::AppConfig;
use crate::fetcher::MarketDataSource;

const INDEX_HTML: &str = include_str!("index.html");

pub struct AppState<S> {
    binder: Mutex<ViewBinder<S>>,
    sequencer: RequestSequencer,
    config: AppConfig,
}

impl<S: MarketDataSource> AppState<S> {
    pub fn new(binder: ViewBinder<S>, config: AppConfig) -> Self {
        Self {
            binder: Mutex::new(binder),
            sequencer: RequestSequencer::new(),
            config,
        }
    }
}

pub fn router<S: MarketDataSource + 'static>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index::<S>))
        .route("/api/dashboard", get(dashboard::<S>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve<S: MarketDataSource + 'static>(state: Arc<AppState<S>>, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("Dashboard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")
}

// ── Page ──────────────────────────────────────────────────────────────────────

async fn index<S: MarketDataSource>(State(state): State<Arc<AppState<S>>>) -> Html<String> {
    Html(render_index(&state.config, Local::now().date_naive()))
}

/// Fill the page template with the configured defaults and date bounds.
fn render_index(config: &AppConfig, today: chrono::NaiveDate) -> String {
    let lookback = Days::new(config.server.default_lookback_days.unsigned_abs());
    let start = today.checked_sub_days(lookback).unwrap_or(config.server.min_date);
    let start = start.max(config.server.min_date);

    INDEX_HTML
        .replace("{{SYMBOL}}", &config.server.default_symbol)
        .replace("{{START}}", &start.to_string())
        .replace("{{END}}", &today.to_string())
        .replace("{{MIN_DATE}}", &config.server.min_date.to_string())
        .replace("{{MAX_DATE}}", &today.to_string())
        .replace("{{MA_SHORT}}", &config.indicators.ma_short.to_string())
        .replace("{{MA_LONG}}", &config.indicators.ma_long.to_string())
        .replace("{{VOL_WINDOW}}", &config.indicators.vol_window.to_string())
}

// ── Render endpoint ───────────────────────────────────────────────────────────

/// Query string of `/api/dashboard`; mirrors the page controls.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub symbol: String,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub ma_short: bool,
    #[serde(default)]
    pub ma_long: bool,
    #[serde(default)]
    pub returns: bool,
    #[serde(default)]
    pub volatility: bool,
}

#[derive(Debug, Serialize)]
struct DashboardResponse {
    seq: u64,
    #[serde(flatten)]
    instruction: RenderInstruction,
}

async fn dashboard<S: MarketDataSource>(
    State(state): State<Arc<AppState<S>>>,
    Query(q): Query<DashboardQuery>,
) -> impl IntoResponse {
    let ticket = state.sequencer.issue();
    let toggles = Toggles {
        ma_short: q.ma_short,
        ma_long: q.ma_long,
        daily_returns: q.returns,
        volatility: q.volatility,
    };

    let dates = parse_date_input(q.start.as_deref())
        .and_then(|start| Ok((start, parse_date_input(q.end.as_deref())?)));

    let instruction = match dates {
        Ok((start, end)) => {
            let request = RequestState {
                symbol: q.symbol,
                start,
                end,
                toggles,
            };
            state.binder.lock().await.update(&request, &ticket).await
        }
        Err(e) => RenderInstruction::from(&e),
    };

    Json(DashboardResponse {
        seq: ticket.seq(),
        instruction,
    })
}

// ── Health ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::fetcher::BackendClient;
    use crate::indicators::IndicatorWindows;
    use chrono::NaiveDate;

    /// Mock data backend with a fixed 30-day history for any symbol.
    async fn spawn_backend() -> String {
        let router = Router::new().route(
            "/data/stock/:symbol",
            get(|axum::extract::Path(symbol): axum::extract::Path<String>| async move {
                if symbol == "MISSING" {
                    return (axum::http::StatusCode::NOT_FOUND, String::new());
                }
                let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
                let data: Vec<_> = (0..30u64)
                    .map(|i| {
                        let c = 100.0 + i as f64;
                        serde_json::json!({
                            "date": (start + Days::new(i)).to_string(),
                            "open": c, "high": c + 1.0, "low": c - 1.0, "close": c,
                            "volume": 1000 + i,
                        })
                    })
                    .collect();
                let body = serde_json::json!({ "symbol": symbol, "data": data });
                (axum::http::StatusCode::OK, body.to_string())
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    /// Dashboard server wired to the mock backend; returns its base URL.
    async fn spawn_dashboard() -> String {
        let mut config = AppConfig::default();
        config.backend = BackendConfig {
            base_url: spawn_backend().await,
            ..BackendConfig::default()
        };
        let client = BackendClient::new(&config.backend).unwrap();
        let binder = ViewBinder::new(
            client,
            IndicatorWindows { ma_short: 5, ma_long: 20, vol_window: 10 },
            config.server.min_date,
        );
        let state = Arc::new(AppState::new(binder, config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.ok();
        });
        format!("http://{addr}")
    }

    async fn get_json(url: String) -> serde_json::Value {
        reqwest::get(url).await.unwrap().json().await.unwrap()
    }

    #[tokio::test]
    async fn dashboard_endpoint_renders_charts() {
        let base = spawn_dashboard().await;
        let v = get_json(format!(
            "{base}/api/dashboard?symbol=test&start=2024-01-01&end=2024-01-30&ma_short=true&returns=true"
        ))
        .await;

        assert_eq!(v["status"], "charts");
        assert_eq!(v["seq"], 1);
        assert_eq!(v["symbol"], "TEST");
        let names: Vec<_> = v["price"]["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Close", "5-Day MA"]);
        assert_eq!(v["daily_returns"]["data"][0]["type"], "bar");
        assert_eq!(v["volatility"]["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn dashboard_endpoint_reports_api_errors() {
        let base = spawn_dashboard().await;
        let v = get_json(format!(
            "{base}/api/dashboard?symbol=MISSING&start=2024-01-01&end=2024-01-30"
        ))
        .await;
        assert_eq!(v["status"], "error");
        assert_eq!(v["category"], "api_error");
        assert!(v.get("price").is_none());
    }

    #[tokio::test]
    async fn dashboard_endpoint_rejects_bad_dates() {
        let base = spawn_dashboard().await;
        let v = get_json(format!("{base}/api/dashboard?symbol=AAPL&start=01-01-2024&end=2024-01-30")).await;
        assert_eq!(v["status"], "error");
        assert_eq!(v["category"], "validation_error");
    }

    #[tokio::test]
    async fn index_and_health() {
        let base = spawn_dashboard().await;
        let html = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(html.contains("Stock Visualization Dashboard"));
        assert!(!html.contains("{{"));

        let v = get_json(format!("{base}/health")).await;
        assert_eq!(v["status"], "ok");
    }

    #[test]
    fn index_defaults_follow_config() {
        let config = AppConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let html = render_index(&config, today);
        assert!(html.contains(r#"value="AAPL""#));
        assert!(html.contains(r#"value="2024-04-01""#));
        assert!(html.contains(r#"max="2024-06-30""#));
        assert!(html.contains(r#"min="2010-01-01""#));
    }
}
