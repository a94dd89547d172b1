use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::timestamp::parse_date;
use crate::{AssetId, UtcDateTime, ValidationError};

/// Direction of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransactionType {
    Purchase,
    Sale,
}

impl TransactionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Sale => "sale",
        }
    }

    /// Signed multiplier applied to quantities when computing balances.
    pub const fn sign(self) -> f64 {
        match self {
            Self::Purchase => 1.0,
            Self::Sale => -1.0,
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "purchase" | "buy" => Ok(Self::Purchase),
            "sale" | "sell" => Ok(Self::Sale),
            _ => Err(ValidationError::UnknownTransactionType {
                value: input.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for TransactionType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionType> for String {
    fn from(value: TransactionType) -> Self {
        value.as_str().to_owned()
    }
}

/// A validated ledger entry. Quantity and price are always finite and strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransactionRecord")]
pub struct Transaction {
    asset: AssetId,
    #[serde(rename = "type")]
    kind: TransactionType,
    quantity: f64,
    price_per_unit: f64,
    timestamp: UtcDateTime,
}

impl Transaction {
    pub fn new(
        asset: AssetId,
        kind: TransactionType,
        quantity: f64,
        price_per_unit: f64,
        timestamp: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_positive("quantity", quantity)?;
        validate_positive("price_per_unit", price_per_unit)?;

        Ok(Self {
            asset,
            kind,
            quantity,
            price_per_unit,
            timestamp,
        })
    }

    pub fn purchase(
        asset: AssetId,
        quantity: f64,
        price_per_unit: f64,
        timestamp: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        Self::new(asset, TransactionType::Purchase, quantity, price_per_unit, timestamp)
    }

    pub fn sale(
        asset: AssetId,
        quantity: f64,
        price_per_unit: f64,
        timestamp: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        Self::new(asset, TransactionType::Sale, quantity, price_per_unit, timestamp)
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub const fn kind(&self) -> TransactionType {
        self.kind
    }

    pub const fn quantity(&self) -> f64 {
        self.quantity
    }

    pub const fn price_per_unit(&self) -> f64 {
        self.price_per_unit
    }

    pub const fn timestamp(&self) -> UtcDateTime {
        self.timestamp
    }

    /// Notional value: quantity times price per unit.
    pub fn total(&self) -> f64 {
        self.quantity * self.price_per_unit
    }
}

/// Wire shape of a transaction before validation.
#[derive(Debug, Deserialize)]
struct TransactionRecord {
    asset: String,
    #[serde(rename = "type")]
    kind: String,
    quantity: f64,
    price_per_unit: f64,
    timestamp: UtcDateTime,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = ValidationError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        Self::new(
            AssetId::parse(&record.asset)?,
            record.kind.parse()?,
            record.quantity,
            record.price_per_unit,
            record.timestamp,
        )
    }
}

/// Unvalidated transaction input as it arrives from a form or command line.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub asset: String,
    pub kind: String,
    pub quantity: f64,
    pub price_per_unit: f64,
    /// RFC3339 UTC timestamp or a `YYYY-MM-DD` date; `None` means now.
    pub timestamp: Option<String>,
}

impl TransactionDraft {
    pub fn validate(&self) -> Result<Transaction, ValidationError> {
        let timestamp = match self.timestamp.as_deref() {
            None => UtcDateTime::now(),
            Some(raw) => parse_timestamp(raw)?,
        };

        Transaction::new(
            AssetId::parse(&self.asset)?,
            self.kind.parse()?,
            self.quantity,
            self.price_per_unit,
            timestamp,
        )
    }
}

impl TryFrom<TransactionDraft> for Transaction {
    type Error = ValidationError;

    fn try_from(draft: TransactionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

fn parse_timestamp(raw: &str) -> Result<UtcDateTime, ValidationError> {
    UtcDateTime::parse(raw).or_else(|_| parse_date(raw).map(UtcDateTime::start_of_day))
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> UtcDateTime {
        UtcDateTime::parse("2024-05-01T12:00:00Z").expect("timestamp")
    }

    fn btc() -> AssetId {
        AssetId::parse("bitcoin").expect("asset id")
    }

    #[test]
    fn rejects_zero_quantity_and_negative_price() {
        let err = Transaction::purchase(btc(), 0.0, 10.0, ts()).expect_err("must fail");
        assert!(matches!(
            err,
            ValidationError::NonPositiveValue {
                field: "quantity",
                ..
            }
        ));

        let err = Transaction::sale(btc(), 1.0, -3.0, ts()).expect_err("must fail");
        assert!(matches!(
            err,
            ValidationError::NonPositiveValue {
                field: "price_per_unit",
                ..
            }
        ));

        let err = Transaction::sale(btc(), f64::NAN, 1.0, ts()).expect_err("must fail");
        assert!(matches!(err, ValidationError::NonFiniteValue { .. }));
    }

    #[test]
    fn transaction_type_parses_case_insensitively() {
        assert_eq!("Purchase".parse::<TransactionType>(), Ok(TransactionType::Purchase));
        assert_eq!(" SALE ".parse::<TransactionType>(), Ok(TransactionType::Sale));
        assert!(matches!(
            "transfer".parse::<TransactionType>(),
            Err(ValidationError::UnknownTransactionType { .. })
        ));
    }

    #[test]
    fn draft_accepts_plain_dates() {
        let draft = TransactionDraft {
            asset: String::from("Ethereum"),
            kind: String::from("sale"),
            quantity: 2.0,
            price_per_unit: 15.0,
            timestamp: Some(String::from("2024-02-10")),
        };

        let tx = draft.validate().expect("valid draft");
        assert_eq!(tx.asset().as_str(), "ethereum");
        assert_eq!(tx.kind(), TransactionType::Sale);
        assert_eq!(tx.timestamp().format_rfc3339(), "2024-02-10T00:00:00Z");
        assert_eq!(tx.total(), 30.0);
    }

    #[test]
    fn draft_with_unknown_type_is_rejected() {
        let draft = TransactionDraft {
            asset: String::from("bitcoin"),
            kind: String::from("airdrop"),
            quantity: 1.0,
            price_per_unit: 1.0,
            timestamp: None,
        };
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::UnknownTransactionType { .. })
        ));
    }

    #[test]
    fn deserialization_enforces_invariants() {
        let valid = r#"{"asset":"bitcoin","type":"purchase","quantity":1.5,"price_per_unit":100.0,"timestamp":"2024-05-01T12:00:00Z"}"#;
        let tx: Transaction = serde_json::from_str(valid).expect("valid record");
        assert_eq!(tx.quantity(), 1.5);

        let invalid = r#"{"asset":"bitcoin","type":"purchase","quantity":0.0,"price_per_unit":100.0,"timestamp":"2024-05-01T12:00:00Z"}"#;
        assert!(serde_json::from_str::<Transaction>(invalid).is_err());
    }

    #[test]
    fn serializes_with_type_field() {
        let tx = Transaction::purchase(btc(), 1.0, 2.0, ts()).expect("valid");
        let json = serde_json::to_value(&tx).expect("serializable");
        assert_eq!(json["type"], "purchase");
        assert_eq!(json["asset"], "bitcoin");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }
}
