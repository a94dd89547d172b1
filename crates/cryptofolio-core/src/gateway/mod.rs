//! Upstream market data access.
//!
//! [`MarketDataGateway`] is the only component that talks to the network. Each
//! logical call is admitted by the [`CircuitBreaker`], then run under the
//! [`RetryPolicy`]; every attempt is throttled and bounded by a timeout.
//!
//! | Operation | Upstream endpoint |
//! |-----------|-------------------|
//! | [`MarketDataSource::fetch_quotes`] | `GET /coins/markets` |
//! | [`MarketDataSource::fetch_historical_series`] | `GET /coins/{id}/market_chart` |

mod payload;

use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::clock::{Clock, SystemClock};
use crate::config::MarketDataConfig;
use crate::events::{ResilienceObserver, TracingObserver};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::retry::RetryPolicy;
use crate::{AssetId, FetchError, HistoricalSeries, QuoteSet};

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Contract consumed by the price cache.
pub trait MarketDataSource: Send + Sync {
    fn fetch_quotes<'a>(&'a self, assets: &'a [AssetId]) -> SourceFuture<'a, QuoteSet>;

    fn fetch_historical_series<'a>(
        &'a self,
        asset: &'a AssetId,
        days: u32,
    ) -> SourceFuture<'a, HistoricalSeries>;
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// CoinGecko-backed market data source.
pub struct MarketDataGateway {
    http: Arc<dyn HttpClient>,
    config: MarketDataConfig,
    auth: HttpAuth,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    limiter: Option<DirectRateLimiter>,
    clock: Arc<dyn Clock>,
}

impl MarketDataGateway {
    pub fn new(config: MarketDataConfig) -> Self {
        Self::with_parts(
            Arc::new(ReqwestHttpClient::new()),
            config,
            Arc::new(SystemClock),
            Arc::new(TracingObserver),
        )
    }

    pub fn with_http_client(http: Arc<dyn HttpClient>, config: MarketDataConfig) -> Self {
        Self::with_parts(http, config, Arc::new(SystemClock), Arc::new(TracingObserver))
    }

    pub fn with_parts(
        http: Arc<dyn HttpClient>,
        config: MarketDataConfig,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn ResilienceObserver>,
    ) -> Self {
        let auth = match &config.api_key {
            Some(key) => HttpAuth::coingecko_demo_key(key.clone()),
            None => HttpAuth::None,
        };
        let limiter = NonZeroU32::new(config.requests_per_minute)
            .map(|limit| RateLimiter::direct(Quota::per_minute(limit)));

        Self {
            http,
            auth,
            retry: RetryPolicy::with_observer(config.retry.clone(), observer.clone()),
            breaker: CircuitBreaker::with_parts(config.breaker, clock.clone(), observer),
            limiter,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    fn markets_url(&self, assets: &[AssetId]) -> String {
        let ids = assets
            .iter()
            .map(AssetId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/coins/markets?ids={}&vs_currency=usd&price_change_percentage=1h,24h,7d",
            self.config.trimmed_base_url(),
            urlencoding::encode(&ids)
        )
    }

    fn market_chart_url(&self, asset: &AssetId, days: u32) -> String {
        format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={days}",
            self.config.trimmed_base_url(),
            urlencoding::encode(asset.as_str())
        )
    }

    /// Breaker admission, then retries; only transport failures reach the breaker.
    async fn execute_guarded(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let permit = self.breaker.try_acquire()?;
        let timeout = self.config.request_timeout;

        let outcome = self
            .retry
            .execute(|attempt| {
                let request = request.clone();
                async move {
                    if let Some(limiter) = &self.limiter {
                        limiter.until_ready().await;
                    }
                    tracing::debug!(url = %request.url, attempt, "requesting market data");

                    match tokio::time::timeout(timeout, self.http.execute(request)).await {
                        Ok(Ok(response)) => Ok(response),
                        Ok(Err(error)) => Err(error.into_fetch_error(timeout)),
                        Err(_) => Err(FetchError::Timeout { after: timeout }),
                    }
                }
            })
            .await;

        match &outcome {
            Ok(_) => permit.record_success(),
            Err(error) if error.trips_breaker() => permit.record_failure(error),
            Err(_) => drop(permit),
        }

        outcome
    }

    fn request(&self, url: String) -> HttpRequest {
        HttpRequest::get(url)
            .with_auth(&self.auth)
            .with_timeout(self.config.request_timeout)
    }
}

impl std::fmt::Debug for MarketDataGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataGateway")
            .field("base_url", &self.config.base_url)
            .field("breaker", &self.breaker.state())
            .finish_non_exhaustive()
    }
}

impl MarketDataSource for MarketDataGateway {
    fn fetch_quotes<'a>(&'a self, assets: &'a [AssetId]) -> SourceFuture<'a, QuoteSet> {
        Box::pin(async move {
            if assets.is_empty() {
                return Err(FetchError::invalid_request(
                    "quote request requires at least one asset",
                ));
            }

            let request = self.request(self.markets_url(assets));
            let response = self.execute_guarded(request).await?;
            let quotes = payload::parse_markets(&response.body, assets, self.clock.now())?;

            tracing::debug!(assets = assets.len(), "fetched live quotes");
            Ok(quotes)
        })
    }

    fn fetch_historical_series<'a>(
        &'a self,
        asset: &'a AssetId,
        days: u32,
    ) -> SourceFuture<'a, HistoricalSeries> {
        Box::pin(async move {
            if days == 0 {
                return Err(FetchError::invalid_request(
                    "historical series request requires at least one day",
                ));
            }

            let request = self.request(self.market_chart_url(asset, days));
            let response = self.execute_guarded(request).await?;
            let series = payload::parse_market_chart(&response.body, asset, days)?;

            tracing::debug!(asset = %asset, days, points = series.len(), "fetched historical series");
            Ok(series)
        })
    }
}
