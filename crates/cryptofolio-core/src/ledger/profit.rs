//! Pure balance and profit calculations over a transaction slice.

use std::collections::{BTreeMap, HashMap};

use crate::{AssetId, Transaction, TransactionType};

/// Net quantity held: purchases add, sales subtract.
pub fn balance(transactions: &[Transaction], asset: &AssetId) -> f64 {
    transactions
        .iter()
        .filter(|tx| tx.asset() == asset)
        .map(|tx| tx.kind().sign() * tx.quantity())
        .sum()
}

pub fn balances(transactions: &[Transaction]) -> BTreeMap<AssetId, f64> {
    let mut out = BTreeMap::new();
    for tx in transactions {
        *out.entry(tx.asset().clone()).or_insert(0.0) += tx.kind().sign() * tx.quantity();
    }
    out
}

/// Per asset, sale notional minus purchase notional, summed.
///
/// Not lot-matched: an open long position makes this negative.
pub fn realized_profit(transactions: &[Transaction]) -> f64 {
    let mut by_asset: BTreeMap<&AssetId, f64> = BTreeMap::new();
    for tx in transactions {
        let signed = match tx.kind() {
            TransactionType::Sale => tx.total(),
            TransactionType::Purchase => -tx.total(),
        };
        *by_asset.entry(tx.asset()).or_insert(0.0) += signed;
    }
    by_asset.values().sum()
}

/// Every leg revalued against `current_prices`; sales count as `(price - current) * qty`.
///
/// Assets missing from the map contribute nothing.
pub fn total_profit(transactions: &[Transaction], current_prices: &HashMap<AssetId, f64>) -> f64 {
    transactions
        .iter()
        .filter_map(|tx| {
            let current = *current_prices.get(tx.asset())?;
            let diff = match tx.kind() {
                TransactionType::Purchase => current - tx.price_per_unit(),
                TransactionType::Sale => tx.price_per_unit() - current,
            };
            Some(diff * tx.quantity())
        })
        .sum()
}
