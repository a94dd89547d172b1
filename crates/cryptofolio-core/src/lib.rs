//! # Cryptofolio Core
//!
//! Resilient crypto market data access and a portfolio ledger engine.
//!
//! ## Overview
//!
//! - **Market data gateway** for CoinGecko quotes and historical series
//! - **Retry policy** with 3s/9s exponential backoff
//! - **Circuit breaker** that fails fast after repeated transport failures
//! - **Price cache** serving live, stale or unavailable data, never an error
//! - **Series sampler** producing weekly chart points
//! - **Portfolio ledger** with balances, realized/total profit, filter and sort
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Key-value cache collaborator with memory and file backends |
//! | [`circuit_breaker`] | Fail-fast gate over upstream calls |
//! | [`clock`] | Wall-clock abstraction for cooldowns and TTLs |
//! | [`config`] | Gateway configuration and environment overrides |
//! | [`domain`] | Domain models (AssetId, Quote, Transaction) |
//! | [`error`] | Error taxonomy |
//! | [`events`] | Structured retry and breaker events |
//! | [`gateway`] | Upstream market data source |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`ledger`] | Portfolio ledger, profit math, queries and stores |
//! | [`price_cache`] | Read-through cache with stale fallback |
//! | [`retry`] | Retry configuration and executor |
//! | [`sampler`] | Weekly downsampling for charts |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   PriceCache    │────▶│  CacheBackend    │
//! └────────┬────────┘     └──────────────────┘
//!          │ miss
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ MarketData      │────▶│ Circuit Breaker  │
//! │ Gateway         │     │ + Retry Policy   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  HttpClient     │
//! └─────────────────┘
//! ```
//!
//! The [`PortfolioLedger`] is independent of this chain; it consumes the
//! price map produced by [`QuoteSet::current_prices`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cryptofolio_core::{AssetId, MarketDataConfig, MarketDataGateway, MemoryCacheStore, PriceCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Arc::new(MarketDataGateway::new(MarketDataConfig::from_env()?));
//!     let cache = PriceCache::new(gateway, Arc::new(MemoryCacheStore::new()));
//!
//!     let quotes = cache.get_or_fetch(&AssetId::parse_many(["bitcoin", "ethereum"])?).await;
//!     println!("{} quotes ({})", quotes.len(), quotes.provenance);
//!     Ok(())
//! }
//! ```

mod atomic_file;
pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http_client;
pub mod ledger;
pub mod price_cache;
pub mod retry;
pub mod sampler;

pub use cache::{CacheBackend, JsonFileCacheStore, MemoryCacheStore};
pub use circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MarketDataConfig;

pub use domain::{
    parse_date, AssetId, HistoricalPoint, HistoricalSeries, Provenance, Quote, QuoteSet,
    Transaction, TransactionDraft, TransactionType, UtcDateTime,
};

pub use error::{ConfigError, FetchError, LedgerError, PersistenceError, ValidationError};
pub use events::{EventKind, RecordingObserver, ResilienceEvent, ResilienceObserver, TracingObserver};
pub use gateway::{MarketDataGateway, MarketDataSource, SourceFuture};

pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

pub use ledger::{
    JsonFileStore, MemoryTransactionStore, PortfolioLedger, SortDirection, SortKey,
    TransactionFilter, TransactionStore,
};
pub use price_cache::{CachePolicy, HistorySnapshot, PriceCache};
pub use retry::{Backoff, RetryConfig, RetryPolicy};
pub use sampler::{Chart, ChartPoint, Downsample, HistoricalSeriesSampler};
