use std::env;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::retry::RetryConfig;

pub const DEFAULT_API_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Settings for the upstream market data gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataConfig {
    pub base_url: String,
    /// CoinGecko demo key, sent as `x-cg-demo-api-key` when present.
    pub api_key: Option<String>,
    /// Upper bound for a single network attempt.
    pub request_timeout: Duration,
    /// `0` disables client-side throttling.
    pub requests_per_minute: u32,
    pub retry: RetryConfig,
    pub breaker: CircuitBreakerConfig,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_API_BASE_URL),
            api_key: None,
            request_timeout: Duration::from_secs(10),
            requests_per_minute: 30,
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl MarketDataConfig {
    /// Defaults overridden by `CRYPTOFOLIO_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = non_empty(lookup("CRYPTOFOLIO_API_BASE_URL")) {
            config.base_url = base_url;
        }
        config.api_key = non_empty(lookup("CRYPTOFOLIO_API_KEY"))
            .or_else(|| non_empty(lookup("COINGECKO_API_KEY")));

        if let Some(raw) = non_empty(lookup("CRYPTOFOLIO_TIMEOUT_MS")) {
            let millis = parse_u64("CRYPTOFOLIO_TIMEOUT_MS", &raw)?;
            if millis == 0 {
                return Err(ConfigError::InvalidEnv {
                    name: "CRYPTOFOLIO_TIMEOUT_MS",
                    value: raw,
                    reason: String::from("timeout must be greater than zero"),
                });
            }
            config.request_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = non_empty(lookup("CRYPTOFOLIO_REQUESTS_PER_MINUTE")) {
            let limit = parse_u64("CRYPTOFOLIO_REQUESTS_PER_MINUTE", &raw)?;
            config.requests_per_minute =
                u32::try_from(limit).map_err(|_| ConfigError::InvalidEnv {
                    name: "CRYPTOFOLIO_REQUESTS_PER_MINUTE",
                    value: raw,
                    reason: String::from("value is too large"),
                })?;
        }

        if let Some(raw) = non_empty(lookup("CRYPTOFOLIO_MAX_RETRIES")) {
            let retries = parse_u64("CRYPTOFOLIO_MAX_RETRIES", &raw)?;
            config.retry.max_retries =
                u32::try_from(retries).map_err(|_| ConfigError::InvalidEnv {
                    name: "CRYPTOFOLIO_MAX_RETRIES",
                    value: raw,
                    reason: String::from("value is too large"),
                })?;
        }

        if let Some(raw) = non_empty(lookup("CRYPTOFOLIO_RETRY_JITTER")) {
            config.retry.backoff.jitter = parse_bool("CRYPTOFOLIO_RETRY_JITTER", &raw)?;
        }

        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn without_throttling(mut self) -> Self {
        self.requests_per_minute = 0;
        self
    }

    pub(crate) fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_u64(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|error| ConfigError::InvalidEnv {
        name,
        value: raw.to_owned(),
        reason: error.to_string(),
    })
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value: raw.to_owned(),
            reason: String::from("expected true or false"),
        }),
    }
}
