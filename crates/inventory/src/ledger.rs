//! Append-only ledgers and leaderboard ranking.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use milkbot_core::{Amount, BatchId, DomainError};

/// Longest accepted buyer/drinker name, in characters. Chat platforms build
/// display names from a first and last name of up to 64 characters each.
pub const MAX_NAME_CHARS: usize = 256;

/// Normalize a display name for the ledgers: trimmed, inner whitespace
/// collapsed, non-empty and bounded.
pub fn participant_name(raw: &str) -> Result<String, DomainError> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(DomainError::validation(format!(
            "name cannot be longer than {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name)
}

/// Immutable fact: someone bought a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub buyer_name: String,
    pub amount: Amount,
    pub batch_id: BatchId,
}

/// Immutable fact: someone drank from a batch.
///
/// The amount is the requested amount, even when the batch had less left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub drinker_name: String,
    pub amount: Amount,
    pub batch_id: BatchId,
}

/// Which ledger a leaderboard is computed over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerKind {
    Purchases,
    Consumption,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub total: Decimal,
}

impl LeaderboardEntry {
    pub fn new(name: impl Into<String>, total: Decimal) -> Self {
        Self {
            name: name.into(),
            total,
        }
    }
}

/// Sum amounts per name and rank: total descending, then name ascending.
pub fn rank_totals<'a>(
    records: impl IntoIterator<Item = (&'a str, Decimal)>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for (name, amount) in records {
        *totals.entry(name).or_insert(Decimal::ZERO) += amount;
    }

    let mut ranked: Vec<LeaderboardEntry> = totals
        .into_iter()
        .map(|(name, total)| LeaderboardEntry::new(name, total.normalize()))
        .collect();
    ranked.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn sums_per_name_and_ranks_descending() {
        let records = [("A", d(3)), ("B", d(1)), ("A", d(2))];
        let ranked = rank_totals(records, 5);
        assert_eq!(
            ranked,
            vec![LeaderboardEntry::new("A", d(5)), LeaderboardEntry::new("B", d(1))]
        );
    }

    #[test]
    fn ties_are_ordered_by_name() {
        let records = [("carol", d(2)), ("alice", d(2)), ("bob", d(2))];
        let names: Vec<String> = rank_totals(records, 10).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn truncates_to_limit() {
        let records = [("a", d(1)), ("b", d(2)), ("c", d(3))];
        let ranked = rank_totals(records, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "c");
        assert!(rank_totals(records, 0).is_empty());
    }

    #[test]
    fn participant_names_are_trimmed_and_collapsed() {
        assert_eq!(participant_name("  Maija   Meikäläinen ").unwrap(), "Maija Meikäläinen");
    }

    #[test]
    fn blank_or_overlong_names_are_rejected() {
        assert!(matches!(participant_name(" \t "), Err(DomainError::Validation(_))));
        let long = "x".repeat(MAX_NAME_CHARS + 1);
        assert!(participant_name(&long).is_err());
        assert!(participant_name(&"x".repeat(MAX_NAME_CHARS)).is_ok());
        let first_and_last = format!("{} {}", "a".repeat(64), "b".repeat(64));
        assert_eq!(participant_name(&first_and_last).unwrap(), first_and_last);
    }

    #[test]
    fn empty_ledger_ranks_nothing() {
        assert!(rank_totals(std::iter::empty(), 5).is_empty());
    }

    #[test]
    fn decimal_totals_are_normalized() {
        let records = [("a", Decimal::new(15, 1)), ("a", Decimal::new(5, 1))];
        assert_eq!(rank_totals(records, 1)[0].total.to_string(), "2");
    }
}
