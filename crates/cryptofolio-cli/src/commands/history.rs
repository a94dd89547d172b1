use cryptofolio_core::{
    AssetId, Chart, HistoricalSeries, HistoricalSeriesSampler, PriceCache, Provenance,
};
use serde::Serialize;

use crate::cli::HistoryArgs;
use crate::error::CliError;
use crate::output::{cell, Table};

use super::CommandResult;

#[derive(Debug, Serialize)]
struct HistoryResponseData<'a> {
    asset: &'a AssetId,
    days: u32,
    provenance: Provenance,
    chart: Chart,
    #[serde(skip_serializing_if = "Option::is_none")]
    series: Option<&'a HistoricalSeries>,
}

pub async fn run(args: &HistoryArgs, cache: &PriceCache) -> Result<CommandResult, CliError> {
    if args.days == 0 {
        return Err(CliError::Command(String::from("--days must be at least 1")));
    }
    let asset = AssetId::parse(&args.id)?;
    let snapshot = cache.get_or_fetch_history(&asset, args.days).await;

    let sampler = HistoricalSeriesSampler::with_stride(args.stride);
    let mut table = Table::new(vec!["date", "price_usd"]);
    let chart: Chart = sampler
        .downsample(&snapshot.series)
        .inspect(|point| table.push(vec![point.label.clone(), cell(Some(point.price), 2)]))
        .collect();

    let data = serde_json::to_value(HistoryResponseData {
        asset: &asset,
        days: args.days,
        provenance: snapshot.provenance,
        chart,
        series: args.raw.then_some(&snapshot.series),
    })?;

    Ok(CommandResult::ok(data, table)
        .with_provenance(snapshot.provenance, snapshot.message.as_deref()))
}
