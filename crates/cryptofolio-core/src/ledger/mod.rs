//! Portfolio ledger engine.
//!
//! [`PortfolioLedger`] owns the ordered transaction list and the store it is
//! persisted to. Every mutation is built on a copy, saved as a full snapshot
//! and only then swapped in, all while holding the ledger lock: a failed save
//! leaves the in-memory list untouched and two writers never interleave.

mod profit;
mod query;
mod store;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{AssetId, LedgerError, Transaction, TransactionDraft, ValidationError};

pub use profit::{balance, balances, realized_profit, total_profit};
pub use query::{filter, sort, sort_with, SortDirection, SortKey, TransactionFilter};
pub use store::{JsonFileStore, MemoryTransactionStore, StoreFuture, TransactionStore};

pub struct PortfolioLedger {
    store: Arc<dyn TransactionStore>,
    transactions: Mutex<Vec<Transaction>>,
}

impl PortfolioLedger {
    /// Loads the persisted snapshot.
    pub async fn load(store: Arc<dyn TransactionStore>) -> Result<Self, LedgerError> {
        let transactions = store.load().await?;
        Ok(Self::new(store, transactions))
    }

    pub fn new(store: Arc<dyn TransactionStore>, transactions: Vec<Transaction>) -> Self {
        Self {
            store,
            transactions: Mutex::new(transactions),
        }
    }

    /// Appends a validated transaction.
    pub async fn add_transaction(&self, transaction: Transaction) -> Result<(), LedgerError> {
        let mut guard = self.transactions.lock().await;
        let mut next = guard.clone();
        next.push(transaction);

        self.store.save(&next).await?;
        *guard = next;

        tracing::info!(len = guard.len(), "transaction added");
        Ok(())
    }

    /// Validates raw input and appends it. Invalid drafts never touch the ledger.
    pub async fn add_draft(&self, draft: &TransactionDraft) -> Result<Transaction, LedgerError> {
        let transaction = draft.validate()?;
        self.add_transaction(transaction.clone()).await?;
        Ok(transaction)
    }

    /// Removes the transaction at `index`. Out-of-range indexes are a no-op
    /// and return `Ok(false)`.
    pub async fn remove_transaction_at(&self, index: usize) -> Result<bool, LedgerError> {
        let mut guard = self.transactions.lock().await;
        if index >= guard.len() {
            tracing::debug!(index, len = guard.len(), "remove index out of range");
            return Ok(false);
        }

        let mut next = guard.clone();
        next.remove(index);

        self.store.save(&next).await?;
        *guard = next;

        tracing::info!(index, len = guard.len(), "transaction removed");
        Ok(true)
    }

    /// Replaces the whole ledger with the transactions in `json`.
    ///
    /// The import is all-or-nothing: an empty list or any invalid record
    /// rejects it and the ledger keeps its current content.
    pub async fn import_json(&self, json: &str) -> Result<usize, LedgerError> {
        let imported: Vec<Transaction> =
            serde_json::from_str(json).map_err(|error| ValidationError::InvalidImport {
                reason: error.to_string(),
            })?;
        if imported.is_empty() {
            return Err(ValidationError::EmptyImport.into());
        }

        let mut guard = self.transactions.lock().await;
        self.store.save(&imported).await?;
        let count = imported.len();
        *guard = imported;

        tracing::info!(count, "ledger replaced by import");
        Ok(count)
    }

    /// Pretty-printed JSON snapshot, readable back by [`Self::import_json`].
    pub async fn export_json(&self) -> Result<String, LedgerError> {
        let guard = self.transactions.lock().await;
        serde_json::to_string_pretty(&*guard)
            .map_err(|error| LedgerError::Persistence(error.into()))
    }

    pub async fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.transactions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.lock().await.is_empty()
    }

    pub async fn balance(&self, asset: &AssetId) -> f64 {
        profit::balance(&self.transactions.lock().await, asset)
    }

    pub async fn balances(&self) -> BTreeMap<AssetId, f64> {
        profit::balances(&self.transactions.lock().await)
    }

    pub async fn realized_profit(&self) -> f64 {
        profit::realized_profit(&self.transactions.lock().await)
    }

    pub async fn total_profit(&self, current_prices: &HashMap<AssetId, f64>) -> f64 {
        profit::total_profit(&self.transactions.lock().await, current_prices)
    }

    /// Matching transactions, sorted if `key` is set.
    pub async fn query(
        &self,
        criteria: &TransactionFilter,
        key: Option<SortKey>,
        direction: SortDirection,
    ) -> Vec<Transaction> {
        let mut matched = query::filter(self.transactions.lock().await.iter(), criteria);
        query::sort(&mut matched, key, direction);
        matched
    }
}

impl std::fmt::Debug for PortfolioLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioLedger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TransactionType, UtcDateTime};

    fn tx(id: &str, kind: TransactionType, quantity: f64, price: f64) -> Transaction {
        Transaction::new(
            AssetId::parse(id).expect("asset"),
            kind,
            quantity,
            price,
            UtcDateTime::parse("2024-03-01T10:00:00Z").expect("timestamp"),
        )
        .expect("valid")
    }

    #[tokio::test]
    async fn mutations_are_persisted_as_full_snapshots() {
        let store = Arc::new(MemoryTransactionStore::new());
        let ledger = PortfolioLedger::load(store.clone()).await.expect("load");

        ledger
            .add_transaction(tx("bitcoin", TransactionType::Purchase, 1.0, 100.0))
            .await
            .expect("add");
        ledger
            .add_transaction(tx("bitcoin", TransactionType::Sale, 1.0, 150.0))
            .await
            .expect("add");

        assert_eq!(store.saved(), ledger.snapshot().await);
        assert!(ledger.remove_transaction_at(0).await.expect("remove"));
        assert_eq!(store.saved().len(), 1);
        assert_eq!(store.saved()[0].kind(), TransactionType::Sale);
    }

    #[tokio::test]
    async fn out_of_range_remove_is_a_no_op() {
        let store = Arc::new(MemoryTransactionStore::new());
        let ledger = PortfolioLedger::new(
            store.clone(),
            vec![tx("bitcoin", TransactionType::Purchase, 1.0, 100.0)],
        );

        assert!(!ledger.remove_transaction_at(1).await.expect("no-op"));
        assert_eq!(ledger.len().await, 1);
        assert!(store.saved().is_empty());
    }

    #[tokio::test]
    async fn failed_save_keeps_last_good_state() {
        let store = Arc::new(MemoryTransactionStore::new());
        let ledger = PortfolioLedger::new(store.clone(), Vec::new());
        store.fail_saves(true);

        let error = ledger
            .add_transaction(tx("bitcoin", TransactionType::Purchase, 1.0, 100.0))
            .await
            .expect_err("store rejects writes");

        assert!(matches!(error, LedgerError::Persistence(_)));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn export_then_import_round_trips() {
        let source = PortfolioLedger::new(
            Arc::new(MemoryTransactionStore::new()),
            vec![
                tx("bitcoin", TransactionType::Purchase, 1.0, 100.0),
                tx("ethereum", TransactionType::Sale, 2.0, 10.0),
            ],
        );
        let json = source.export_json().await.expect("export");

        let target = PortfolioLedger::new(Arc::new(MemoryTransactionStore::new()), Vec::new());
        assert_eq!(target.import_json(&json).await.expect("import"), 2);
        assert_eq!(target.snapshot().await, source.snapshot().await);
    }

    #[tokio::test]
    async fn import_is_all_or_nothing() {
        let existing = vec![tx("bitcoin", TransactionType::Purchase, 1.0, 100.0)];
        let ledger = PortfolioLedger::new(Arc::new(MemoryTransactionStore::new()), existing.clone());

        let empty = ledger.import_json("[]").await.expect_err("empty import");
        assert!(matches!(
            empty,
            LedgerError::Validation(ValidationError::EmptyImport)
        ));

        let one_bad = r#"[
            {"asset":"ethereum","type":"purchase","quantity":1,"price_per_unit":10,"timestamp":"2024-03-01T10:00:00Z"},
            {"asset":"ethereum","type":"swap","quantity":1,"price_per_unit":10,"timestamp":"2024-03-01T10:00:00Z"}
        ]"#;
        let invalid = ledger.import_json(one_bad).await.expect_err("invalid record");
        assert!(matches!(
            invalid,
            LedgerError::Validation(ValidationError::InvalidImport { .. })
        ));

        assert_eq!(ledger.snapshot().await, existing);
    }

    #[tokio::test]
    async fn query_filters_then_sorts() {
        let ledger = PortfolioLedger::new(
            Arc::new(MemoryTransactionStore::new()),
            vec![
                tx("bitcoin", TransactionType::Purchase, 1.0, 300.0),
                tx("ethereum", TransactionType::Purchase, 2.0, 10.0),
                tx("bitcoin", TransactionType::Purchase, 3.0, 100.0),
            ],
        );
        let criteria = TransactionFilter {
            asset: Some(AssetId::parse("bitcoin").expect("asset")),
            ..TransactionFilter::default()
        };

        let result = ledger
            .query(&criteria, Some(SortKey::Price), SortDirection::Ascending)
            .await;

        let prices: Vec<f64> = result.iter().map(Transaction::price_per_unit).collect();
        assert_eq!(prices, vec![100.0, 300.0]);
    }
}
