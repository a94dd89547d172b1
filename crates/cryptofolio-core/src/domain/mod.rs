//! # Domain Models
//!
//! Canonical domain types for cryptofolio market data and the portfolio ledger.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AssetId`] | Validated upstream asset id (`bitcoin`, `tether`) |
//! | [`Quote`] | Price plus 1h/24h/7d percent changes, each possibly unknown |
//! | [`QuoteSet`] | Quotes keyed by asset with a [`Provenance`] tag |
//! | [`HistoricalSeries`] | Ordered daily `(timestamp, price)` points |
//! | [`Transaction`] | Validated purchase or sale |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Invariants are enforced at construction and at deserialization, so an
//! invalid [`Transaction`] can never reach the ledger.

mod asset;
mod quote;
mod series;
mod timestamp;
mod transaction;

pub use asset::AssetId;
pub use quote::{Provenance, Quote, QuoteSet};
pub use series::{HistoricalPoint, HistoricalSeries};
pub use timestamp::{parse_date, UtcDateTime};
pub use transaction::{Transaction, TransactionDraft, TransactionType};
