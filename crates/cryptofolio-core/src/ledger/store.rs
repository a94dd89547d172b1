//! Persistence collaborator for the full transaction snapshot.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::atomic_file::write_atomically;
use crate::{PersistenceError, Transaction};

pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, PersistenceError>> + Send + 'a>>;

/// Single named resource holding the ordered transaction list.
pub trait TransactionStore: Send + Sync {
    fn load(&self) -> StoreFuture<'_, Vec<Transaction>>;

    fn save<'a>(&'a self, transactions: &'a [Transaction]) -> StoreFuture<'a, ()>;
}

/// JSON file on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransactionStore for JsonFileStore {
    fn load(&self) -> StoreFuture<'_, Vec<Transaction>> {
        Box::pin(async move {
            let raw = match tokio::fs::read_to_string(&self.path).await {
                Ok(raw) => raw,
                Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(error) => return Err(error.into()),
            };
            if raw.trim().is_empty() {
                return Ok(Vec::new());
            }

            let transactions: Vec<Transaction> = serde_json::from_str(&raw)?;
            tracing::debug!(path = %self.path.display(), count = transactions.len(), "loaded ledger");
            Ok(transactions)
        })
    }

    fn save<'a>(&'a self, transactions: &'a [Transaction]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let raw = serde_json::to_string_pretty(transactions)?;
            write_atomically(&self.path, raw).await?;

            tracing::debug!(path = %self.path.display(), count = transactions.len(), "saved ledger");
            Ok(())
        })
    }
}

/// In-process store; `fail_saves` simulates an unavailable backend.
#[derive(Debug, Default)]
pub struct MemoryTransactionStore {
    transactions: Mutex<Vec<Transaction>>,
    fail_saves: AtomicBool,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<Transaction> {
        self.transactions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn load(&self) -> StoreFuture<'_, Vec<Transaction>> {
        let transactions = self.saved();
        Box::pin(async move { Ok(transactions) })
    }

    fn save<'a>(&'a self, transactions: &'a [Transaction]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(PersistenceError::Unavailable(String::from(
                    "memory store is configured to fail",
                )));
            }
            *self
                .transactions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = transactions.to_vec();
            Ok(())
        })
    }
}
