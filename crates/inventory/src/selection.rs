//! FIFO-by-expiry selection.
//!
//! The available batch with the earliest expiration date is always the one
//! consumed or emptied next. Batches expiring on the same day are ordered by
//! id ascending (i.e. the earlier purchase goes first), which keeps the order
//! total and reproducible.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use milkbot_core::BatchId;

use crate::batch::{AvailableBatch, Batch};

/// Total ordering key for selection: `(expiration_date, id)`.
///
/// Field order matters: the derived `Ord` compares the date first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectionKey {
    pub expiration_date: NaiveDate,
    pub batch_id: BatchId,
}

impl SelectionKey {
    pub fn new(expiration_date: NaiveDate, batch_id: BatchId) -> Self {
        Self {
            expiration_date,
            batch_id,
        }
    }
}

/// Pick the batch that must be consumed or emptied next.
pub fn next_available<'a>(batches: impl IntoIterator<Item = &'a Batch>) -> Option<&'a Batch> {
    batches
        .into_iter()
        .filter(|b| b.is_available())
        .min_by_key(|b| b.selection_key())
}

/// Sort a listing into selection order.
pub fn sort_available(batches: &mut [AvailableBatch]) {
    batches.sort_by_key(AvailableBatch::selection_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use milkbot_core::{Aggregate, Amount};
    use proptest::prelude::*;

    use crate::batch::BatchCommand;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(id: i64, amount: &str, expires: NaiveDate) -> Batch {
        Batch::purchased(BatchId::new(id), amount.parse::<Amount>().unwrap(), expires)
    }

    #[test]
    fn earliest_expiration_wins_over_insertion_order() {
        let batches = vec![
            batch(1, "2", date(2025, 1, 10)),
            batch(2, "1", date(2025, 1, 5)),
        ];
        let next = next_available(&batches).unwrap();
        assert_eq!(next.id_typed(), BatchId::new(2));
    }

    #[test]
    fn same_day_ties_break_on_lowest_id() {
        let batches = vec![
            batch(9, "1", date(2025, 3, 1)),
            batch(4, "1", date(2025, 3, 1)),
            batch(6, "1", date(2025, 3, 1)),
        ];
        assert_eq!(next_available(&batches).unwrap().id_typed(), BatchId::new(4));
    }

    #[test]
    fn exhausted_batches_are_skipped() {
        let mut old = batch(1, "1", date(2025, 1, 1));
        old.execute(&BatchCommand::Empty).unwrap();
        let batches = vec![old, batch(2, "1", date(2025, 2, 1))];
        assert_eq!(next_available(&batches).unwrap().id_typed(), BatchId::new(2));
    }

    #[test]
    fn nothing_available_yields_none() {
        let batches: Vec<Batch> = vec![];
        assert!(next_available(&batches).is_none());
    }

    #[test]
    fn sort_available_orders_by_date_then_id() {
        let mut listing: Vec<AvailableBatch> = vec![
            batch(3, "1", date(2025, 1, 10)).to_available().unwrap(),
            batch(2, "1", date(2025, 1, 5)).to_available().unwrap(),
            batch(1, "1", date(2025, 1, 10)).to_available().unwrap(),
        ];
        sort_available(&mut listing);
        let ids: Vec<i64> = listing.iter().map(|b| b.batch_id.get()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    proptest! {
        /// Property: the selected batch has the minimum `(date, id)` among
        /// all available batches.
        #[test]
        fn selection_is_the_minimum_available_key(
            specs in prop::collection::vec((0u32..60, any::<bool>()), 1..30)
        ) {
            let base = date(2025, 1, 1);
            let batches: Vec<Batch> = specs
                .iter()
                .enumerate()
                .map(|(idx, (offset, exhausted))| {
                    let mut b = batch(idx as i64 + 1, "1", base + chrono::Days::new(*offset as u64));
                    if *exhausted {
                        b.execute(&BatchCommand::Empty).unwrap();
                    }
                    b
                })
                .collect();

            let expected = batches
                .iter()
                .filter(|b| b.is_available())
                .map(|b| b.selection_key())
                .min();

            prop_assert_eq!(next_available(&batches).map(|b| b.selection_key()), expected);
        }
    }
}
