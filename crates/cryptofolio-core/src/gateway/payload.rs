//! Typed records for the CoinGecko feed.
//!
//! Every field is optional; anything the upstream omits becomes `None` on
//! the resulting [`Quote`] instead of a decode failure.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{AssetId, FetchError, HistoricalPoint, HistoricalSeries, Quote, QuoteSet, UtcDateTime};

/// One row of `GET /coins/markets`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MarketRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h_in_currency: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_7d_in_currency: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Body of `GET /coins/{id}/market_chart`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MarketChart {
    #[serde(default)]
    pub prices: Vec<(f64, Option<f64>)>,
}

pub(crate) fn parse_markets(
    body: &str,
    requested: &[AssetId],
    fetched_at: UtcDateTime,
) -> Result<QuoteSet, FetchError> {
    let rows: Vec<MarketRow> = serde_json::from_str(body)
        .map_err(|e| FetchError::decode(format!("markets payload: {e}")))?;

    let mut by_id: HashMap<String, MarketRow> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id.as_deref()?.trim().to_ascii_lowercase();
            Some((id, row))
        })
        .collect();

    let quotes = requested.iter().map(|asset| match by_id.remove(asset.as_str()) {
        Some(row) => {
            let as_of = row
                .last_updated
                .as_deref()
                .and_then(|raw| UtcDateTime::parse(raw).ok())
                .unwrap_or(fetched_at);
            Quote::new(
                asset.clone(),
                row.current_price,
                row.price_change_percentage_1h_in_currency,
                row.price_change_percentage_24h_in_currency,
                row.price_change_percentage_7d_in_currency,
                as_of,
            )
        }
        None => Quote::unknown(asset.clone(), fetched_at),
    });

    Ok(QuoteSet::live(quotes))
}

pub(crate) fn parse_market_chart(
    body: &str,
    asset: &AssetId,
    days: u32,
) -> Result<HistoricalSeries, FetchError> {
    let chart: MarketChart = serde_json::from_str(body)
        .map_err(|e| FetchError::decode(format!("market chart payload: {e}")))?;

    let points = chart
        .prices
        .into_iter()
        .filter_map(|(millis, price)| {
            let price = price.filter(|p| p.is_finite())?;
            if !millis.is_finite() {
                return None;
            }
            let ts = UtcDateTime::from_unix_millis(millis as i64)?;
            Some(HistoricalPoint::new(ts, price))
        })
        .collect();

    Ok(HistoricalSeries::new(asset.clone(), days, points))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str) -> AssetId {
        AssetId::parse(id).expect("valid asset id")
    }

    #[test]
    fn missing_fields_become_unknown() {
        let now = UtcDateTime::parse("2024-03-05T12:00:00Z").expect("timestamp");
        let body = r#"[
            {"id":"bitcoin","current_price":64000.5,"price_change_percentage_24h_in_currency":-1.25},
            {"id":"ethereum"}
        ]"#;

        let set = parse_markets(body, &[asset("bitcoin"), asset("ethereum")], now)
            .expect("payload decodes");

        let btc = set.get(&asset("bitcoin")).expect("bitcoin quote");
        assert_eq!(btc.price, Some(64000.5));
        assert_eq!(btc.change_1h, None);
        assert_eq!(btc.change_24h, Some(-1.25));
        assert_eq!(btc.as_of, now);
        assert!(set.get(&asset("ethereum")).expect("ethereum quote").is_unknown());
    }

    #[test]
    fn requested_asset_absent_from_payload_is_unknown() {
        let now = UtcDateTime::now();
        let set = parse_markets("[]", &[asset("dogecoin")], now).expect("empty array decodes");

        assert_eq!(set.len(), 1);
        assert!(set.get(&asset("dogecoin")).expect("placeholder").is_unknown());
    }

    #[test]
    fn upstream_timestamp_is_used_when_present() {
        let now = UtcDateTime::now();
        let body = r#"[{"id":"bitcoin","current_price":1.0,"last_updated":"2024-03-05T11:59:30.123Z"}]"#;

        let set = parse_markets(body, &[asset("bitcoin")], now).expect("payload decodes");
        let expected = UtcDateTime::parse("2024-03-05T11:59:30.123Z").expect("timestamp");
        assert_eq!(set.get(&asset("bitcoin")).expect("quote").as_of, expected);
    }

    #[test]
    fn non_array_payload_is_a_decode_error() {
        let error = parse_markets(r#"{"error":"rate limited"}"#, &[asset("bitcoin")], UtcDateTime::now())
            .expect_err("object is not a market list");
        assert_eq!(error.code(), "fetch.decode");
    }

    #[test]
    fn chart_skips_null_prices() {
        let body = r#"{"prices":[[1709596800000,61000.0],[1709683200000,null],[1709769600000,63500.25]]}"#;

        let series = parse_market_chart(body, &asset("bitcoin"), 90).expect("chart decodes");

        assert_eq!(series.len(), 2);
        assert_eq!(series.points[0].ts.unix_millis(), 1_709_596_800_000);
        assert_eq!(series.points[1].price, 63500.25);
    }

    #[test]
    fn chart_without_prices_is_empty() {
        let series = parse_market_chart("{}", &asset("bitcoin"), 7).expect("chart decodes");
        assert!(series.is_empty());
        assert_eq!(series.days, 7);
    }
}
