use std::time::Duration;

use thiserror::Error;

/// Input validation errors for asset ids and ledger transactions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("asset id cannot be empty")]
    EmptyAssetId,
    #[error("asset id length {len} exceeds max {max}")]
    AssetIdTooLong { len: usize, max: usize },
    #[error("asset id contains invalid character '{ch}' at index {index}")]
    AssetIdInvalidChar { ch: char, index: usize },

    #[error("unknown transaction type '{value}', expected purchase or sale")]
    UnknownTransactionType { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be greater than zero, got {value}")]
    NonPositiveValue { field: &'static str, value: f64 },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("unknown sort key '{value}', expected price, date or quantity")]
    UnknownSortKey { value: String },

    #[error("import must contain at least one transaction")]
    EmptyImport,
    #[error("import rejected: {reason}")]
    InvalidImport { reason: String },
}

/// Terminal failure of an upstream market data call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("upstream request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("market data circuit breaker is open; retry in {}s", .retry_after.as_secs())]
    BreakerOpen { retry_after: Duration },

    #[error("failed to decode upstream payload: {message}")]
    Decode { message: String },

    #[error("invalid market data request: {message}")]
    InvalidRequest { message: String },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn upstream(status: u16, body: &str) -> Self {
        const MAX_BODY_CHARS: usize = 200;
        let message = if body.trim().is_empty() {
            String::from("empty response body")
        } else {
            body.trim().chars().take(MAX_BODY_CHARS).collect()
        };
        Self::Upstream { status, message }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Network and timeout failures are the only ones counted by the circuit breaker.
    pub const fn trips_breaker(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    pub const fn is_breaker_open(&self) -> bool {
        matches!(self, Self::BreakerOpen { .. })
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Network { .. } => "fetch.network",
            Self::Timeout { .. } => "fetch.timeout",
            Self::Upstream { .. } => "fetch.upstream",
            Self::BreakerOpen { .. } => "fetch.breaker_open",
            Self::Decode { .. } => "fetch.decode",
            Self::InvalidRequest { .. } => "fetch.invalid_request",
        }
    }
}

/// Failure reading or writing the persisted transaction snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ledger storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger snapshot is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("ledger storage unavailable: {0}")]
    Unavailable(String),
}

/// Rejected configuration value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Top-level error type for ledger mutations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
