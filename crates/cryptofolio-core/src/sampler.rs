//! Weekly downsampling of daily price series for charts.

use std::iter::FusedIterator;

use serde::Serialize;

use crate::{HistoricalPoint, HistoricalSeries};

/// One labelled chart sample, e.g. `("Mar 05", 61000.0)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub price: f64,
}

/// Picks every `stride`-th point starting at index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoricalSeriesSampler {
    stride: usize,
}

impl Default for HistoricalSeriesSampler {
    fn default() -> Self {
        Self { stride: 7 }
    }
}

impl HistoricalSeriesSampler {
    /// `stride` of zero is treated as one.
    pub fn with_stride(stride: usize) -> Self {
        Self {
            stride: stride.max(1),
        }
    }

    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Lazily yields `floor(len / stride)` points; a trailing partial stride is dropped.
    pub fn downsample<'a>(&self, series: &'a HistoricalSeries) -> Downsample<'a> {
        Downsample {
            points: &series.points,
            stride: self.stride,
            next: 0,
            remaining: series.points.len() / self.stride,
        }
    }
}

/// Iterator returned by [`HistoricalSeriesSampler::downsample`].
#[derive(Debug, Clone)]
pub struct Downsample<'a> {
    points: &'a [HistoricalPoint],
    stride: usize,
    next: usize,
    remaining: usize,
}

impl Iterator for Downsample<'_> {
    type Item = ChartPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let point = self.points.get(self.next)?;
        self.remaining -= 1;
        self.next += self.stride;

        Some(ChartPoint {
            label: point.ts.month_day_label(),
            price: point.price,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Downsample<'_> {}

impl FusedIterator for Downsample<'_> {}

/// Parallel label and price vectors, the shape chart widgets consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Chart {
    pub labels: Vec<String>,
    pub prices: Vec<f64>,
}

impl Chart {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<ChartPoint> for Chart {
    fn from_iter<I: IntoIterator<Item = ChartPoint>>(iter: I) -> Self {
        let (labels, prices) = iter
            .into_iter()
            .map(|point| (point.label, point.price))
            .unzip();
        Self { labels, prices }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{AssetId, UtcDateTime};

    fn daily_series(start: &str, days: usize) -> HistoricalSeries {
        let start = UtcDateTime::parse(start).expect("timestamp");
        let points = (0..days)
            .map(|day| {
                HistoricalPoint::new(
                    start.saturating_add(Duration::from_secs(86_400 * day as u64)),
                    day as f64,
                )
            })
            .collect();
        HistoricalSeries::new(AssetId::parse("bitcoin").expect("asset"), days as u32, points)
    }

    #[test]
    fn ninety_days_yield_twelve_weekly_points() {
        let series = daily_series("2024-01-01T00:00:00Z", 90);
        let sampled: Vec<ChartPoint> = HistoricalSeriesSampler::default()
            .downsample(&series)
            .collect();

        assert_eq!(sampled.len(), 12);
        assert_eq!(sampled[0].price, 0.0);
        assert_eq!(sampled[11].price, 77.0);
        assert_eq!(sampled[0].label, "Jan 01");
        assert_eq!(sampled[1].label, "Jan 08");
    }

    #[test]
    fn reports_exact_length_and_stays_exhausted() {
        let series = daily_series("2024-02-26T00:00:00Z", 15);
        let mut points = HistoricalSeriesSampler::default().downsample(&series);

        assert_eq!(points.len(), 2);
        assert_eq!(points.next().map(|p| p.label), Some(String::from("Feb 26")));
        assert_eq!(points.next().map(|p| p.label), Some(String::from("Mar 04")));
        assert_eq!(points.len(), 0);
        assert!(points.next().is_none());
        assert!(points.next().is_none());
    }

    #[test]
    fn short_series_yields_nothing() {
        let series = daily_series("2024-01-01T00:00:00Z", 6);
        assert_eq!(HistoricalSeriesSampler::default().downsample(&series).count(), 0);
    }

    #[test]
    fn chart_collects_parallel_vectors() {
        let series = daily_series("2024-12-25T00:00:00Z", 14);
        let chart: Chart = HistoricalSeriesSampler::default().downsample(&series).collect();

        assert_eq!(chart.labels, vec!["Dec 25", "Jan 01"]);
        assert_eq!(chart.prices, vec![0.0, 7.0]);
    }

    #[test]
    fn zero_stride_is_clamped() {
        assert_eq!(HistoricalSeriesSampler::with_stride(0).stride(), 1);
    }
}
