use serde::{Deserialize, Serialize};

use crate::{AssetId, UtcDateTime};

/// One `(timestamp, price)` sample of a historical series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub ts: UtcDateTime,
    pub price: f64,
}

impl HistoricalPoint {
    pub const fn new(ts: UtcDateTime, price: f64) -> Self {
        Self { ts, price }
    }
}

/// Ordered price series for one asset, oldest point first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub asset: AssetId,
    pub days: u32,
    pub points: Vec<HistoricalPoint>,
}

impl HistoricalSeries {
    pub fn new(asset: AssetId, days: u32, points: Vec<HistoricalPoint>) -> Self {
        Self {
            asset,
            days,
            points,
        }
    }

    pub fn empty(asset: AssetId, days: u32) -> Self {
        Self::new(asset, days, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
