//! Read-through cache in front of a [`MarketDataSource`].
//!
//! Lookups never fail. A fresh entry is served as live; on a miss the source
//! is called once per key no matter how many callers are waiting, and a
//! failed call degrades to the last stored entry (stale) or to a placeholder
//! with every field unavailable.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::cache::CacheBackend;
use crate::clock::{Clock, SystemClock};
use crate::gateway::MarketDataSource;
use crate::{AssetId, FetchError, HistoricalSeries, Provenance, QuoteSet, UtcDateTime};

/// Freshness and retention windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub quote_ttl: Duration,
    pub history_ttl: Duration,
    /// How long the backend keeps an entry for stale fallback after it stops being fresh.
    pub stale_retention: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            quote_ttl: Duration::from_secs(10 * 60),
            history_ttl: Duration::from_secs(6 * 60 * 60),
            stale_retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Historical series plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySnapshot {
    pub series: HistoricalSeries,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Stored form of a cached payload.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    payload: T,
    created_at: UtcDateTime,
    ttl_secs: u64,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: UtcDateTime) -> bool {
        now.duration_since(self.created_at) > Duration::from_secs(self.ttl_secs)
    }
}

enum Resolved<T> {
    Live(T),
    Stale(T, String),
    Missing(String),
}

/// Per-key single-flight registry.
struct InFlight<T> {
    calls: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T: Clone> InFlight<T> {
    fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Joins the call already running for `key`, or starts one with `init`.
    ///
    /// If the leading caller is cancelled another waiter takes over `init`.
    async fn run<F, Fut>(&self, key: &str, init: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = self
            .lock()
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let value = cell.get_or_init(init).await.clone();

        let mut calls = self.lock();
        if calls.get(key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            calls.remove(key);
        }
        value
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<T>>>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct PriceCache {
    source: Arc<dyn MarketDataSource>,
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    quotes_in_flight: InFlight<QuoteSet>,
    history_in_flight: InFlight<HistorySnapshot>,
}

impl PriceCache {
    pub fn new(source: Arc<dyn MarketDataSource>, backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_parts(source, backend, Arc::new(SystemClock), CachePolicy::default())
    }

    pub fn with_parts(
        source: Arc<dyn MarketDataSource>,
        backend: Arc<dyn CacheBackend>,
        clock: Arc<dyn Clock>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            source,
            backend,
            clock,
            policy,
            quotes_in_flight: InFlight::new(),
            history_in_flight: InFlight::new(),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Quotes for `assets`, tagged live, stale or unavailable.
    pub async fn get_or_fetch(&self, assets: &[AssetId]) -> QuoteSet {
        let assets = canonical_assets(assets);
        let key = quotes_key(&assets);

        if let Some(set) = self.fresh::<QuoteSet>(&key).await {
            tracing::debug!(key = %key, "quote cache hit");
            return set.into_live();
        }

        let (key, assets) = (key.as_str(), assets.as_slice());
        self.quotes_in_flight
            .run(key, || async move {
                tracing::debug!(key = %key, "quote cache miss");
                let fetch = self.source.fetch_quotes(assets);
                match self.read_through(key, self.policy.quote_ttl, fetch).await {
                    Resolved::Live(set) => set.into_live(),
                    Resolved::Stale(set, message) => {
                        tracing::warn!(key = %key, %message, "serving stale quotes");
                        set.into_stale(message)
                    }
                    Resolved::Missing(message) => {
                        tracing::warn!(key = %key, %message, "quotes unavailable");
                        QuoteSet::unavailable(assets, self.clock.now(), message)
                    }
                }
            })
            .await
    }

    /// Historical series for one asset, with the same fallback rules as quotes.
    pub async fn get_or_fetch_history(&self, asset: &AssetId, days: u32) -> HistorySnapshot {
        let key = history_key(asset, days);

        if let Some(series) = self.fresh::<HistoricalSeries>(&key).await {
            tracing::debug!(key = %key, "history cache hit");
            return HistorySnapshot {
                series,
                provenance: Provenance::Live,
                message: None,
            };
        }

        let key = key.as_str();
        self.history_in_flight
            .run(key, || async move {
                tracing::debug!(key = %key, "history cache miss");
                let fetch = self.source.fetch_historical_series(asset, days);
                match self.read_through(key, self.policy.history_ttl, fetch).await {
                    Resolved::Live(series) => HistorySnapshot {
                        series,
                        provenance: Provenance::Live,
                        message: None,
                    },
                    Resolved::Stale(series, message) => {
                        tracing::warn!(key = %key, %message, "serving stale history");
                        HistorySnapshot {
                            series,
                            provenance: Provenance::Stale,
                            message: Some(message),
                        }
                    }
                    Resolved::Missing(message) => {
                        tracing::warn!(key = %key, %message, "history unavailable");
                        HistorySnapshot {
                            series: HistoricalSeries::empty(asset.clone(), days),
                            provenance: Provenance::Unavailable,
                            message: Some(message),
                        }
                    }
                }
            })
            .await
    }

    async fn read_through<T, Fut>(&self, key: &str, ttl: Duration, fetch: Fut) -> Resolved<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let cached = match self.load::<T>(key).await {
            Some(entry) if !entry.is_expired(self.clock.now()) => {
                return Resolved::Live(entry.payload)
            }
            other => other,
        };

        match fetch.await {
            Ok(value) => {
                self.store(key, &value, ttl).await;
                Resolved::Live(value)
            }
            Err(error) => {
                let message = error.to_string();
                match cached {
                    Some(entry) => Resolved::Stale(entry.payload, message),
                    None => Resolved::Missing(message),
                }
            }
        }
    }

    async fn fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.load::<T>(key)
            .await
            .filter(|entry| !entry.is_expired(self.clock.now()))
            .map(|entry| entry.payload)
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = self.backend.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "discarding undecodable cache entry");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let entry = CacheEntry {
            payload: value,
            created_at: self.clock.now(),
            ttl_secs: ttl.as_secs(),
        };
        match serde_json::to_string(&entry) {
            Ok(raw) => {
                let retention = ttl.max(self.policy.stale_retention);
                self.backend.set(key.to_owned(), raw, retention).await;
            }
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "failed to encode cache entry");
            }
        }
    }
}

impl std::fmt::Debug for PriceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceCache")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn canonical_assets(assets: &[AssetId]) -> Vec<AssetId> {
    let mut assets = assets.to_vec();
    assets.sort();
    assets.dedup();
    assets
}

fn quotes_key(assets: &[AssetId]) -> String {
    let ids = assets
        .iter()
        .map(AssetId::as_str)
        .collect::<Vec<_>>()
        .join(",");
    format!("quotes:{ids}")
}

fn history_key(asset: &AssetId, days: u32) -> String {
    format!("history:{asset}:{days}")
}
