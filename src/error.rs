use chrono::NaiveDate;
use thiserror::Error;

/// Every way a dashboard cycle can fail. All variants are recovered at the
/// view binder and rendered as a single message.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("backend unreachable: {0}")]
    Connectivity(String),

    #[error("backend returned HTTP {status}")]
    Api { status: u16 },

    #[error("no data for {symbol} between {start} and {end}")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("malformed backend response: {0}")]
    Parse(String),
}

impl DataError {
    /// Stable machine-readable name, sent to the page alongside the message.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Connectivity(_) => "connectivity_error",
            Self::Api { .. } => "api_error",
            Self::NoData { .. } => "no_data_error",
            Self::Parse(_) => "parse_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Connectivity(_) => {
                "Error: Could not reach the data service. Please check that the backend is running and try again.".to_string()
            }
            Self::Api { status } => format!(
                "Error: The data service rejected the request (HTTP {status}). Please check the symbol or try again later."
            ),
            Self::NoData { symbol, start, end } => format!(
                "Error: No data found for symbol '{symbol}' from {start} to {end}. Please check the symbol or try a different range."
            ),
            Self::Parse(_) => {
                "Error: The data service returned a response that could not be read.".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
