use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Backend data API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after a connectivity failure. 0 = single attempt.
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Indicator window sizes, in trading days
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_ma_short")]
    pub ma_short: usize,

    #[serde(default = "default_ma_long")]
    pub ma_long: usize,

    #[serde(default = "default_vol_window")]
    pub vol_window: usize,
}

/// Dashboard web server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_symbol")]
    pub default_symbol: String,

    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: i64,

    #[serde(default = "default_min_date")]
    pub min_date: NaiveDate,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    concat!("stock-dashboard/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_ma_short() -> usize {
    50
}
fn default_ma_long() -> usize {
    200
}
fn default_vol_window() -> usize {
    30
}
fn default_bind_addr() -> String {
    "127.0.0.1:8050".to_string()
}
fn default_symbol() -> String {
    "AAPL".to_string()
}
fn default_lookback_days() -> i64 {
    90
}
fn default_min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or_default()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_short: default_ma_short(),
            ma_long: default_ma_long(),
            vol_window: default_vol_window(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            default_symbol: default_symbol(),
            default_lookback_days: default_lookback_days(),
            min_date: default_min_date(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// `STOCKDASH_BACKEND__BASE_URL` → `backend.base_url`
fn env_source() -> config::Environment {
    config::Environment::with_prefix("STOCKDASH")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::load_with_env(env_source())
    }

    fn load_with_env(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(env)
            .build()
            .context("Failed to read configuration sources")?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        if ind.ma_short == 0 || ind.ma_long == 0 {
            bail!("indicators.ma_short and indicators.ma_long must be > 0");
        }
        if ind.vol_window < 2 {
            bail!("indicators.vol_window must be >= 2 (got {})", ind.vol_window);
        }
        if self.server.default_lookback_days < 0 {
            bail!("server.default_lookback_days must not be negative");
        }
        url::Url::parse(&self.backend.base_url)
            .with_context(|| format!("backend.base_url {:?} is not a URL", self.backend.base_url))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.backend.base_url, "http://localhost:8000");
        assert_eq!(cfg.backend.max_retries, 0);
        assert_eq!(cfg.indicators.ma_short, 50);
        assert_eq!(cfg.indicators.ma_long, 200);
        assert_eq!(cfg.indicators.vol_window, 30);
        assert_eq!(cfg.server.min_date, NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"backend": {"base_url": "http://api.internal:9000"}}"#)
                .unwrap();
        assert_eq!(cfg.backend.base_url, "http://api.internal:9000");
        assert_eq!(cfg.backend.timeout_secs, 10);
        assert_eq!(cfg.server.default_symbol, "AAPL");
    }

    #[test]
    fn rejects_degenerate_windows() {
        let mut cfg = AppConfig::default();
        cfg.indicators.vol_window = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.indicators.ma_short = 0;
        assert!(cfg.validate().is_err());
    }

    fn env_from(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_source().source(Some(map))
    }

    #[test]
    fn env_override_uses_single_underscore_after_prefix() {
        let cfg = AppConfig::load_with_env(env_from(&[
            ("STOCKDASH_BACKEND__BASE_URL", "http://override:9000"),
            ("STOCKDASH_INDICATORS__VOL_WINDOW", "20"),
        ]))
        .unwrap();
        assert_eq!(cfg.backend.base_url, "http://override:9000");
        assert_eq!(cfg.indicators.vol_window, 20);
    }

    #[test]
    fn env_override_with_double_underscore_prefix_is_ignored() {
        let cfg = AppConfig::load_with_env(env_from(&[(
            "STOCKDASH__BACKEND__BASE_URL",
            "http://ignored:9000",
        )]))
        .unwrap();
        assert_ne!(cfg.backend.base_url, "http://ignored:9000");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let mut cfg = AppConfig::default();
        cfg.backend.base_url = "not a url".into();
        assert!(cfg.validate().is_err());
    }
}
