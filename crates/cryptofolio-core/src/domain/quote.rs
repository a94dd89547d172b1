use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AssetId, UtcDateTime};

/// Where a [`QuoteSet`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Fresh data from the cache or a successful upstream call.
    Live,
    /// Last known data served because the upstream call failed.
    Stale,
    /// Nothing known; every field is unavailable.
    Unavailable,
}

impl Provenance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Stale => "stale",
            Self::Unavailable => "unavailable",
        }
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priced snapshot of one asset. `None` means the upstream did not report the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub asset: AssetId,
    pub price: Option<f64>,
    pub change_1h: Option<f64>,
    pub change_24h: Option<f64>,
    pub change_7d: Option<f64>,
    pub as_of: UtcDateTime,
}

impl Quote {
    pub fn new(
        asset: AssetId,
        price: Option<f64>,
        change_1h: Option<f64>,
        change_24h: Option<f64>,
        change_7d: Option<f64>,
        as_of: UtcDateTime,
    ) -> Self {
        Self {
            asset,
            price: finite(price),
            change_1h: finite(change_1h),
            change_24h: finite(change_24h),
            change_7d: finite(change_7d),
            as_of,
        }
    }

    /// Quote with every field unknown.
    pub fn unknown(asset: AssetId, as_of: UtcDateTime) -> Self {
        Self::new(asset, None, None, None, None, as_of)
    }

    pub fn is_unknown(&self) -> bool {
        self.price.is_none()
            && self.change_1h.is_none()
            && self.change_24h.is_none()
            && self.change_7d.is_none()
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Quotes keyed by asset plus a provenance tag and an optional diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSet {
    pub quotes: BTreeMap<AssetId, Quote>,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QuoteSet {
    pub fn live(quotes: impl IntoIterator<Item = Quote>) -> Self {
        Self {
            quotes: quotes
                .into_iter()
                .map(|quote| (quote.asset.clone(), quote))
                .collect(),
            provenance: Provenance::Live,
            message: None,
        }
    }

    /// Sentinel set where every requested asset is unavailable.
    pub fn unavailable(
        assets: &[AssetId],
        as_of: UtcDateTime,
        message: impl Into<String>,
    ) -> Self {
        Self {
            quotes: assets
                .iter()
                .map(|asset| (asset.clone(), Quote::unknown(asset.clone(), as_of)))
                .collect(),
            provenance: Provenance::Unavailable,
            message: Some(message.into()),
        }
    }

    pub fn into_live(self) -> Self {
        Self {
            provenance: Provenance::Live,
            message: None,
            ..self
        }
    }

    pub fn into_stale(self, message: impl Into<String>) -> Self {
        Self {
            provenance: Provenance::Stale,
            message: Some(message.into()),
            ..self
        }
    }

    pub fn get(&self, asset: &AssetId) -> Option<&Quote> {
        self.quotes.get(asset)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Known prices only, in the shape the ledger profit calculations consume.
    pub fn current_prices(&self) -> HashMap<AssetId, f64> {
        self.quotes
            .iter()
            .filter_map(|(asset, quote)| quote.price.map(|price| (asset.clone(), price)))
            .collect()
    }
}
