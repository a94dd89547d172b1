use std::cmp::Ordering;
use std::str::FromStr;

use time::Date;

use crate::{AssetId, Transaction, TransactionType, ValidationError};

/// Criteria combined with logical AND. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Case-insensitive substring of the asset id or the type name.
    pub search_text: Option<String>,
    pub asset: Option<AssetId>,
    pub kind: Option<TransactionType>,
    /// Calendar day (UTC); time of day is ignored.
    pub date: Option<Date>,
}

impl TransactionFilter {
    pub fn is_empty(&self) -> bool {
        self.search_text
            .as_deref()
            .map_or(true, |text| text.trim().is_empty())
            && self.asset.is_none()
            && self.kind.is_none()
            && self.date.is_none()
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some(needle) = self
            .search_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            let needle = needle.to_lowercase();
            let in_asset = transaction.asset().as_str().contains(&needle);
            let in_kind = transaction.kind().as_str().contains(&needle);
            if !in_asset && !in_kind {
                return false;
            }
        }

        self.asset
            .as_ref()
            .map_or(true, |asset| transaction.asset() == asset)
            && self.kind.map_or(true, |kind| transaction.kind() == kind)
            && self
                .date
                .map_or(true, |date| transaction.timestamp().date() == date)
    }
}

/// Returns the transactions matching `criteria`, in their original order.
pub fn filter<'a, I>(transactions: I, criteria: &TransactionFilter) -> Vec<Transaction>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .filter(|transaction| criteria.matches(transaction))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Price,
    Date,
    Quantity,
}

impl FromStr for SortKey {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(Self::Price),
            "date" => Ok(Self::Date),
            "quantity" => Ok(Self::Quantity),
            _ => Err(ValidationError::UnknownSortKey {
                value: input.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Stable sort. Descending is the exact reverse of ascending, so ties also
/// come out reversed. `None` leaves the order unchanged.
pub fn sort(transactions: &mut [Transaction], key: Option<SortKey>, direction: SortDirection) {
    sort_with(transactions, key, direction, |transaction| transaction);
}

/// [`sort`] over items that carry a transaction, e.g. `(index, &Transaction)` pairs.
pub fn sort_with<T, F>(items: &mut [T], key: Option<SortKey>, direction: SortDirection, get: F)
where
    F: Fn(&T) -> &Transaction,
{
    let Some(key) = key else {
        return;
    };

    items.sort_by(|a, b| compare(get(a), get(b), key));
    if direction == SortDirection::Descending {
        items.reverse();
    }
}

fn compare(a: &Transaction, b: &Transaction, key: SortKey) -> Ordering {
    match key {
        SortKey::Price => a.price_per_unit().total_cmp(&b.price_per_unit()),
        SortKey::Date => a.timestamp().cmp(&b.timestamp()),
        SortKey::Quantity => a.quantity().total_cmp(&b.quantity()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UtcDateTime;

    fn tx(asset: &str, kind: TransactionType, quantity: f64, price: f64, ts: &str) -> Transaction {
        Transaction::new(
            AssetId::parse(asset).expect("asset"),
            kind,
            quantity,
            price,
            UtcDateTime::parse(ts).expect("timestamp"),
        )
        .expect("valid transaction")
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("bitcoin", TransactionType::Purchase, 1.0, 100.0, "2024-03-01T09:00:00Z"),
            tx("ethereum", TransactionType::Purchase, 2.0, 10.0, "2024-03-01T18:30:00Z"),
            tx("bitcoin", TransactionType::Sale, 0.5, 150.0, "2024-03-02T08:00:00Z"),
        ]
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let all = sample();
        let criteria = TransactionFilter {
            search_text: Some(String::from("   ")),
            ..TransactionFilter::default()
        };

        assert!(criteria.is_empty());
        assert_eq!(filter(&all, &criteria), all);
    }

    #[test]
    fn search_text_matches_asset_or_type_ignoring_case() {
        let all = sample();

        let by_asset = TransactionFilter {
            search_text: Some(String::from("ETH")),
            ..TransactionFilter::default()
        };
        assert_eq!(filter(&all, &by_asset).len(), 1);

        let by_type = TransactionFilter {
            search_text: Some(String::from("Sal")),
            ..TransactionFilter::default()
        };
        let sales = filter(&all, &by_type);
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].kind(), TransactionType::Sale);
    }

    #[test]
    fn criteria_are_combined_with_and() {
        let all = sample();
        let criteria = TransactionFilter {
            asset: Some(AssetId::parse("BITCOIN").expect("asset")),
            kind: Some(TransactionType::Purchase),
            ..TransactionFilter::default()
        };

        let matched = filter(&all, &criteria);
        assert_eq!(matched, vec![all[0].clone()]);
    }

    #[test]
    fn date_matches_whole_calendar_day() {
        let all = sample();
        let criteria = TransactionFilter {
            date: Some(crate::parse_date("2024-03-01").expect("date")),
            ..TransactionFilter::default()
        };

        assert_eq!(filter(&all, &criteria).len(), 2);
    }

    #[test]
    fn sort_is_stable_and_descending_reverses_ascending() {
        let mut ascending = sample();
        ascending.push(tx("solana", TransactionType::Purchase, 2.0, 5.0, "2024-03-03T00:00:00Z"));
        let mut descending = ascending.clone();

        sort(&mut ascending, Some(SortKey::Quantity), SortDirection::Ascending);
        sort(&mut descending, Some(SortKey::Quantity), SortDirection::Descending);

        let quantities: Vec<f64> = ascending.iter().map(Transaction::quantity).collect();
        assert_eq!(quantities, vec![0.5, 1.0, 2.0, 2.0]);
        assert_eq!(ascending[2].asset().as_str(), "ethereum");
        assert_eq!(ascending[3].asset().as_str(), "solana");

        descending.reverse();
        assert_eq!(descending, ascending);
    }

    #[test]
    fn sort_with_carries_positions_along() {
        let all = sample();
        let mut indexed: Vec<(usize, &Transaction)> = all.iter().enumerate().collect();

        sort_with(&mut indexed, Some(SortKey::Price), SortDirection::Descending, |(_, tx)| *tx);

        let order: Vec<usize> = indexed.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn sort_without_key_keeps_order() {
        let mut transactions = sample();
        sort(&mut transactions, None, SortDirection::Descending);
        assert_eq!(transactions, sample());
    }

    #[test]
    fn sort_keys_parse_by_name() {
        assert_eq!("Price".parse::<SortKey>(), Ok(SortKey::Price));
        assert_eq!("date".parse::<SortKey>(), Ok(SortKey::Date));
        assert!("volume".parse::<SortKey>().is_err());
    }
}
