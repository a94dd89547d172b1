use std::collections::HashMap;

use cryptofolio_core::ledger::sort_with;
use cryptofolio_core::{
    parse_date, AssetId, PortfolioLedger, Provenance, SortDirection, SortKey, Transaction,
    TransactionDraft, TransactionFilter,
};
use serde::Serialize;
use serde_json::json;

use crate::cli::{
    AddArgs, Cli, ExportArgs, ImportArgs, LedgerArgs, LedgerCommand, ListArgs, RemoveArgs,
    SummaryArgs,
};
use crate::error::CliError;
use crate::output::{cell, Table};

use super::{open_ledger, price_cache, CommandResult};

#[derive(Debug, Serialize)]
struct ListedTransaction<'a> {
    index: usize,
    #[serde(flatten)]
    transaction: &'a Transaction,
}

#[derive(Debug, Serialize)]
struct SummaryData {
    balances: Vec<BalanceRow>,
    realized_profit: f64,
    total_profit: f64,
    prices: Provenance,
}

#[derive(Debug, Serialize)]
struct BalanceRow {
    asset: AssetId,
    quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<f64>,
}

pub async fn run(args: &LedgerArgs, cli: &Cli) -> Result<CommandResult, CliError> {
    let ledger = open_ledger(cli).await?;
    match &args.command {
        LedgerCommand::List(list) => run_list(list, &ledger).await,
        LedgerCommand::Add(add) => run_add(add, &ledger).await,
        LedgerCommand::Remove(remove) => run_remove(remove, &ledger).await,
        LedgerCommand::Summary(summary) => run_summary(summary, &ledger, cli).await,
        LedgerCommand::Export(export) => run_export(export, &ledger).await,
        LedgerCommand::Import(import) => run_import(import, &ledger).await,
    }
}

fn transaction_table() -> Table {
    Table::new(vec!["index", "asset", "type", "quantity", "price_usd", "timestamp"])
}

fn transaction_row(index: usize, tx: &Transaction) -> Vec<String> {
    vec![
        index.to_string(),
        tx.asset().to_string(),
        tx.kind().to_string(),
        tx.quantity().to_string(),
        cell(Some(tx.price_per_unit()), 2),
        tx.timestamp().to_string(),
    ]
}

fn build_filter(args: &ListArgs) -> Result<TransactionFilter, CliError> {
    Ok(TransactionFilter {
        search_text: args.search.clone(),
        asset: args.asset.as_deref().map(AssetId::parse).transpose()?,
        kind: args.kind.as_deref().map(str::parse).transpose()?,
        date: args.date.as_deref().map(parse_date).transpose()?,
    })
}

async fn run_list(args: &ListArgs, ledger: &PortfolioLedger) -> Result<CommandResult, CliError> {
    let criteria = build_filter(args)?;
    let key = args.sort.as_deref().map(str::parse::<SortKey>).transpose()?;
    let direction = if args.desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };

    let all = ledger.snapshot().await;
    let matched = indexed_matches(&all, &criteria, key, direction);

    let mut table = transaction_table();
    let listed: Vec<ListedTransaction<'_>> = matched
        .into_iter()
        .map(|(index, transaction)| {
            table.push(transaction_row(index, transaction));
            ListedTransaction { index, transaction }
        })
        .collect();

    let data = json!({ "count": listed.len(), "transactions": listed });
    Ok(CommandResult::ok(data, table))
}

/// Matching transactions paired with their ledger position, which is what
/// `ledger remove` takes.
fn indexed_matches<'a>(
    all: &'a [Transaction],
    criteria: &TransactionFilter,
    key: Option<SortKey>,
    direction: SortDirection,
) -> Vec<(usize, &'a Transaction)> {
    let mut matched: Vec<(usize, &Transaction)> = all
        .iter()
        .enumerate()
        .filter(|(_, transaction)| criteria.matches(transaction))
        .collect();
    sort_with(&mut matched, key, direction, |(_, transaction)| *transaction);
    matched
}

async fn run_add(args: &AddArgs, ledger: &PortfolioLedger) -> Result<CommandResult, CliError> {
    let draft = TransactionDraft {
        asset: args.asset.clone(),
        kind: args.kind.clone(),
        quantity: args.quantity,
        price_per_unit: args.price,
        timestamp: args.timestamp.clone(),
    };
    let transaction = ledger.add_draft(&draft).await?;
    let index = ledger.len().await.saturating_sub(1);

    let mut table = transaction_table();
    table.push(transaction_row(index, &transaction));
    let data = serde_json::to_value(ListedTransaction {
        index,
        transaction: &transaction,
    })?;
    Ok(CommandResult::ok(data, table))
}

async fn run_remove(args: &RemoveArgs, ledger: &PortfolioLedger) -> Result<CommandResult, CliError> {
    let removed = ledger.remove_transaction_at(args.index).await?;
    let remaining = ledger.len().await;

    let mut table = Table::new(vec!["index", "removed", "remaining"]);
    table.push(vec![
        args.index.to_string(),
        removed.to_string(),
        remaining.to_string(),
    ]);
    let data = json!({ "index": args.index, "removed": removed, "remaining": remaining });

    let result = CommandResult::ok(data, table);
    if removed {
        Ok(result)
    } else {
        Ok(result.with_warning(format!(
            "no transaction at index {}; ledger unchanged",
            args.index
        )))
    }
}

async fn run_summary(
    args: &SummaryArgs,
    ledger: &PortfolioLedger,
    cli: &Cli,
) -> Result<CommandResult, CliError> {
    let balances = ledger.balances().await;
    let assets: Vec<AssetId> = balances.keys().cloned().collect();

    let (prices, provenance, message) = if args.offline || assets.is_empty() {
        (HashMap::new(), Provenance::Unavailable, None)
    } else {
        let quotes = price_cache(cli)?.get_or_fetch(&assets).await;
        (quotes.current_prices(), quotes.provenance, quotes.message)
    };

    let realized_profit = ledger.realized_profit().await;
    let total_profit = ledger.total_profit(&prices).await;

    let mut table = Table::new(vec!["asset", "quantity", "price_usd"]);
    let rows: Vec<BalanceRow> = balances
        .into_iter()
        .map(|(asset, quantity)| {
            let price = prices.get(&asset).copied();
            table.push(vec![asset.to_string(), quantity.to_string(), cell(price, 2)]);
            BalanceRow {
                asset,
                quantity,
                price,
            }
        })
        .collect();
    table.push(vec![String::from("realized_profit"), String::new(), cell(Some(realized_profit), 2)]);
    table.push(vec![String::from("total_profit"), String::new(), cell(Some(total_profit), 2)]);

    let data = serde_json::to_value(SummaryData {
        balances: rows,
        realized_profit,
        total_profit,
        prices: provenance,
    })?;

    let result = CommandResult::ok(data, table);
    if args.offline || assets.is_empty() {
        return Ok(result);
    }
    Ok(result.with_provenance(provenance, message.as_deref()))
}

async fn run_export(args: &ExportArgs, ledger: &PortfolioLedger) -> Result<CommandResult, CliError> {
    let json = ledger.export_json().await?;
    let count = ledger.len().await;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, json.as_bytes()).await?;
            let mut table = Table::new(vec!["path", "count"]);
            table.push(vec![path.display().to_string(), count.to_string()]);
            let data = json!({ "path": path.display().to_string(), "count": count });
            Ok(CommandResult::ok(data, table))
        }
        None => {
            let data: serde_json::Value = serde_json::from_str(&json)?;
            let mut table = transaction_table();
            for (index, tx) in ledger.snapshot().await.iter().enumerate() {
                table.push(transaction_row(index, tx));
            }
            Ok(CommandResult::ok(data, table))
        }
    }
}

async fn run_import(args: &ImportArgs, ledger: &PortfolioLedger) -> Result<CommandResult, CliError> {
    let json = tokio::fs::read_to_string(&args.file).await?;
    let count = ledger.import_json(&json).await?;

    let mut table = Table::new(vec!["file", "imported"]);
    table.push(vec![args.file.display().to_string(), count.to_string()]);
    let data = json!({ "file": args.file.display().to_string(), "imported": count });
    Ok(CommandResult::ok(data, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptofolio_core::{TransactionType, UtcDateTime};

    fn tx(asset: &str, price: f64) -> Transaction {
        Transaction::new(
            AssetId::parse(asset).expect("asset"),
            TransactionType::Purchase,
            1.0,
            price,
            UtcDateTime::parse("2024-03-01T10:00:00Z").expect("timestamp"),
        )
        .expect("valid")
    }

    #[test]
    fn matches_keep_their_ledger_positions_after_sorting() {
        let all = vec![tx("bitcoin", 300.0), tx("ethereum", 10.0), tx("bitcoin", 100.0)];
        let criteria = TransactionFilter::default();

        let sorted = indexed_matches(
            &all,
            &criteria,
            Some(SortKey::Price),
            SortDirection::Ascending,
        );
        let positions: Vec<usize> = sorted.iter().map(|(index, _)| *index).collect();
        assert_eq!(positions, vec![1, 2, 0]);
    }

    #[test]
    fn filtered_matches_report_original_positions() {
        let all = vec![tx("bitcoin", 100.0), tx("ethereum", 10.0), tx("bitcoin", 100.0)];
        let criteria = TransactionFilter {
            asset: Some(AssetId::parse("bitcoin").expect("asset")),
            ..TransactionFilter::default()
        };

        let matched = indexed_matches(&all, &criteria, None, SortDirection::Ascending);
        let positions: Vec<usize> = matched.iter().map(|(index, _)| *index).collect();
        assert_eq!(positions, vec![0, 2]);
    }

    #[test]
    fn list_filter_rejects_unknown_type() {
        let args = ListArgs {
            search: None,
            asset: None,
            kind: Some(String::from("swap")),
            date: None,
            sort: None,
            desc: false,
        };
        assert!(matches!(build_filter(&args), Err(CliError::Validation(_))));
    }
}
