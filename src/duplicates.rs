use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::Result;
use crate::models::{DuplicateCandidate, ParsedTransaction, StoredTransaction};
use crate::store::Store;

/// How close a stored record must be to count as the same movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicatePolicy {
    /// Allowed amount difference, as a percentage of the incoming amount.
    pub amount_tolerance_pct: Decimal,
    /// Allowed distance in days; 0 means the same calendar day.
    pub day_window: u32,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            amount_tolerance_pct: Decimal::ONE,
            day_window: 0,
        }
    }
}

impl DuplicatePolicy {
    pub fn amount_matches(&self, incoming: Decimal, stored: Decimal) -> bool {
        let band = incoming.abs() * self.amount_tolerance_pct / Decimal::ONE_HUNDRED;
        (stored - incoming).abs() <= band
    }

    pub fn matches(&self, incoming: &ParsedTransaction, stored: &StoredTransaction) -> bool {
        (stored.date - incoming.date).num_days().unsigned_abs() <= u64::from(self.window_days())
            && self.amount_matches(incoming.amount, stored.amount)
    }

    fn window_days(&self) -> u32 {
        self.day_window.min(MAX_DAY_WINDOW)
    }

    fn window(&self) -> Duration {
        Duration::days(i64::from(self.window_days()))
    }
}

/// Largest day window honoured; wider settings are capped.
pub const MAX_DAY_WINDOW: u32 = 366;

fn days_before(date: NaiveDate, window: Duration) -> NaiveDate {
    date.checked_sub_signed(window).unwrap_or(NaiveDate::MIN)
}

fn days_after(date: NaiveDate, window: Duration) -> NaiveDate {
    date.checked_add_signed(window).unwrap_or(NaiveDate::MAX)
}

/// Flag incoming transactions that plausibly already exist in `dashboard`.
///
/// Issues one range query covering every incoming date and matches in memory.
/// Each candidate reports the lowest-id stored match.
pub fn find_duplicates<S: Store + ?Sized>(
    store: &S,
    dashboard: i64,
    transactions: &[ParsedTransaction],
    policy: &DuplicatePolicy,
) -> Result<Vec<DuplicateCandidate>> {
    let (Some(first), Some(last)) = (
        transactions.iter().map(|t| t.date).min(),
        transactions.iter().map(|t| t.date).max(),
    ) else {
        return Ok(Vec::new());
    };
    let window = policy.window();
    let stored = store.transactions_between(dashboard, days_before(first, window), days_after(last, window))?;

    let mut by_day: BTreeMap<NaiveDate, Vec<&StoredTransaction>> = BTreeMap::new();
    for s in stored.iter().filter(|s| s.dashboard_id == dashboard) {
        by_day.entry(s.date).or_default().push(s);
    }

    let mut duplicates = Vec::new();
    for (index, tx) in transactions.iter().enumerate() {
        let hit = by_day
            .range(days_before(tx.date, window)..=days_after(tx.date, window))
            .flat_map(|(_, day)| day.iter().copied())
            .filter(|s| policy.matches(tx, s))
            .min_by_key(|s| s.id);
        if let Some(existing) = hit {
            duplicates.push(DuplicateCandidate {
                index,
                transaction: tx.clone(),
                existing_id: existing.id,
                existing_description: existing.description.clone(),
                existing_date: existing.date,
                existing_amount: existing.amount,
            });
        }
    }
    debug!(
        dashboard,
        checked = transactions.len(),
        stored = stored.len(),
        found = duplicates.len(),
        "duplicate scan"
    );
    Ok(duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryType;
    use crate::store::tests::test_store;
    use rust_decimal_macros::dec;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(date: NaiveDate, amount: Decimal) -> ParsedTransaction {
        ParsedTransaction::new(date, "Mercado", amount, EntryType::Expense, "JAN", 2)
    }

    #[test]
    fn test_amount_band() {
        let p = DuplicatePolicy::default();
        assert!(p.amount_matches(dec!(100.00), dec!(99.50)));
        assert!(p.amount_matches(dec!(100.00), dec!(101.00)));
        assert!(!p.amount_matches(dec!(100.00), dec!(101.01)));
        assert!(!p.amount_matches(dec!(150.00), dec!(100.00)));
    }

    #[test]
    fn test_second_upload_flags_third_does_not() {
        let (_dir, store) = test_store();
        let casa = store.add_dashboard("Casa").unwrap();
        let day = ymd(2026, 1, 15);
        store.create_transaction(casa, &tx(day, dec!(99.50))).unwrap();

        let policy = DuplicatePolicy::default();
        let second = find_duplicates(&store, casa, &[tx(day, dec!(100.00))], &policy).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].index, 0);
        assert_eq!(second[0].existing_amount, dec!(99.50));
        assert_eq!(second[0].existing_date, day);

        let third = find_duplicates(&store, casa, &[tx(day, dec!(150.00))], &policy).unwrap();
        assert!(third.is_empty());
    }

    #[test]
    fn test_other_dashboard_never_matches() {
        let (_dir, store) = test_store();
        let casa = store.add_dashboard("Casa").unwrap();
        let outro = store.add_dashboard("Outro").unwrap();
        let day = ymd(2026, 1, 15);
        store.create_transaction(outro, &tx(day, dec!(100.00))).unwrap();
        let found = find_duplicates(&store, casa, &[tx(day, dec!(100.00))], &DuplicatePolicy::default()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_first_stored_match_wins() {
        let (_dir, store) = test_store();
        let casa = store.add_dashboard("Casa").unwrap();
        let day = ymd(2026, 1, 15);
        let first = store.create_transaction(casa, &tx(day, dec!(100.00))).unwrap();
        store.create_transaction(casa, &tx(day, dec!(100.00))).unwrap();
        let found = find_duplicates(&store, casa, &[tx(day, dec!(100.00))], &DuplicatePolicy::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].existing_id, first);
    }

    #[test]
    fn test_day_window() {
        let (_dir, store) = test_store();
        let casa = store.add_dashboard("Casa").unwrap();
        store.create_transaction(casa, &tx(ymd(2026, 1, 14), dec!(100.00))).unwrap();
        let incoming = [tx(ymd(2026, 1, 15), dec!(100.00))];

        let same_day = DuplicatePolicy::default();
        assert!(find_duplicates(&store, casa, &incoming, &same_day).unwrap().is_empty());

        let one_day = DuplicatePolicy { day_window: 1, ..Default::default() };
        assert_eq!(find_duplicates(&store, casa, &incoming, &one_day).unwrap().len(), 1);
    }

    #[test]
    fn test_huge_day_window_is_capped() {
        let (_dir, store) = test_store();
        let casa = store.add_dashboard("Casa").unwrap();
        store.create_transaction(casa, &tx(ymd(2026, 1, 14), dec!(100.00))).unwrap();
        store.create_transaction(casa, &tx(ymd(2020, 1, 14), dec!(100.00))).unwrap();
        let policy = DuplicatePolicy { day_window: u32::MAX, ..Default::default() };
        let found = find_duplicates(&store, casa, &[tx(ymd(2026, 1, 15), dec!(100.00))], &policy).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].existing_date, ymd(2026, 1, 14));

        let edge = [tx(NaiveDate::MAX, dec!(100.00)), tx(NaiveDate::MIN, dec!(100.00))];
        assert!(find_duplicates(&store, casa, &edge, &policy).is_ok());
    }

    #[test]
    fn test_no_transactions_no_query() {
        let (_dir, store) = test_store();
        assert!(find_duplicates(&store, 1, &[], &DuplicatePolicy::default()).unwrap().is_empty());
    }
}
