//! Record sorting
//!
//! Multi-key, stable and deterministic. Values order by the scalar total
//! order (null < bool < number < string); a missing field sorts as null.

use std::cmp::Ordering;

use crate::planner::{SortDirection, SortKey};
use crate::record::Record;

/// Sorts records by a list of sort keys
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts records in place.
    ///
    /// Ties on every key keep their input order.
    pub fn sort(records: &mut [Record], keys: &[SortKey]) {
        if keys.is_empty() {
            return;
        }
        records.sort_by(|a, b| Self::compare(a, b, keys));
    }

    /// Compares two records key by key
    pub fn compare(a: &Record, b: &Record, keys: &[SortKey]) -> Ordering {
        keys.iter()
            .map(|key| {
                let ordering = a.value_or_null(&key.field).cmp(&b.value_or_null(&key.field));
                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Scalar;

    fn make(id: &str, species: &str, area: i64) -> Record {
        Record::new()
            .with("cutout_id", id)
            .with("species", species)
            .with("area", area)
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .map(|r| r.get("cutout_id").and_then(Scalar::as_str).unwrap())
            .collect()
    }

    #[test]
    fn test_sort_ascending() {
        let mut records = vec![make("c", "wheat", 30), make("a", "wheat", 20), make("b", "wheat", 25)];
        ResultSorter::sort(&mut records, &[SortKey::asc("area")]);
        assert_eq!(ids(&records), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_descending() {
        let mut records = vec![make("c", "wheat", 30), make("a", "wheat", 20), make("b", "wheat", 25)];
        ResultSorter::sort(&mut records, &[SortKey::desc("area")]);
        assert_eq!(ids(&records), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_sort_stable() {
        let mut records = vec![make("a", "wheat", 25), make("b", "wheat", 25), make("c", "wheat", 25)];
        ResultSorter::sort(&mut records, &[SortKey::asc("area")]);
        assert_eq!(ids(&records), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_multi_key() {
        let mut records = vec![
            make("1", "wheat", 10),
            make("2", "barley", 5),
            make("3", "wheat", 30),
            make("4", "barley", 50),
        ];
        ResultSorter::sort(&mut records, &[SortKey::asc("species"), SortKey::desc("area")]);
        assert_eq!(ids(&records), vec!["4", "2", "3", "1"]);
    }

    #[test]
    fn test_missing_sorts_as_null() {
        let mut records = vec![
            make("a", "wheat", 5),
            Record::new().with("cutout_id", "b").with("species", "wheat"),
        ];
        ResultSorter::sort(&mut records, &[SortKey::asc("area")]);
        assert_eq!(ids(&records), vec!["b", "a"]);
    }
}
