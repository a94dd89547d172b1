use cryptofolio_core::{AssetId, PriceCache};

use crate::cli::QuoteArgs;
use crate::error::CliError;
use crate::output::{cell, Table};

use super::CommandResult;

pub async fn run(args: &QuoteArgs, cache: &PriceCache) -> Result<CommandResult, CliError> {
    let assets = AssetId::parse_many(&args.ids)?;
    let quotes = cache.get_or_fetch(&assets).await;

    let mut table = Table::new(vec!["asset", "price_usd", "1h_%", "24h_%", "7d_%", "as_of"]);
    for quote in quotes.quotes.values() {
        table.push(vec![
            quote.asset.to_string(),
            cell(quote.price, 2),
            cell(quote.change_1h, 2),
            cell(quote.change_24h, 2),
            cell(quote.change_7d, 2),
            quote.as_of.to_string(),
        ]);
    }

    let provenance = quotes.provenance;
    let message = quotes.message.clone();
    let data = serde_json::to_value(&quotes)?;
    Ok(CommandResult::ok(data, table).with_provenance(provenance, message.as_deref()))
}
