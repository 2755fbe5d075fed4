//! Query Property Tests
//!
//! Randomized checks of the engine's algebraic guarantees:
//! - Filter insertion order never changes the plan or its rows
//! - Seeded sampling depends only on (seed, n, candidate keys)
//! - Stratified sampling bounds every group by per_group
//! - Pagination without sampling slices the unpaged result

use std::collections::BTreeMap;

use agir_query::{
    ColumnInfo, ColumnKind, MemorySource, QueryBuilder, QueryExecutor, Record, Scalar,
    SortDirection,
};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

const SPECIES: [&str; 5] = ["barley", "wheat", "oats", "clover", "rye"];
const STATES: [&str; 3] = ["NC", "TX", "MD"];

#[derive(Clone, Debug)]
enum Filter {
    Eq(&'static str, Vec<&'static str>),
    Raw(String),
}

fn arb_row(i: usize) -> impl Strategy<Value = Record> {
    (0..SPECIES.len(), 0..STATES.len(), 0i64..500).prop_map(move |(s, st, area)| {
        Record::new()
            .with("cutout_id", format!("c{:04}", i))
            .with("species", SPECIES[s])
            .with("state", STATES[st])
            .with("area", area)
    })
}

fn arb_rows(max: usize) -> impl Strategy<Value = Vec<Record>> {
    (0..=max).prop_flat_map(|len| (0..len).map(arb_row).collect::<Vec<_>>())
}

fn arb_filter() -> impl Strategy<Value = Filter> {
    prop_oneof![
        prop::sample::subsequence(SPECIES.to_vec(), 1..=3).prop_map(|v| Filter::Eq("species", v)),
        prop::sample::subsequence(STATES.to_vec(), 1..=2).prop_map(|v| Filter::Eq("state", v)),
        (0i64..500).prop_map(|n| Filter::Raw(format!("area >= {}", n))),
        (0i64..500).prop_map(|n| Filter::Raw(format!("area < {}", n))),
    ]
}

fn apply(builder: QueryBuilder, filters: &[Filter]) -> QueryBuilder {
    filters.iter().fold(builder, |b, f| match f {
        Filter::Eq(field, values) => b.filter_eq(*field, values.iter().copied()),
        Filter::Raw(expr) => b.where_raw(expr.clone()),
    })
}

/// A SemiF table whose schema holds even with no rows
fn semif_table(rows: Vec<Record>) -> MemorySource {
    let columns = vec![
        ColumnInfo::new("cutout_id", ColumnKind::Text),
        ColumnInfo::new("species", ColumnKind::Text),
        ColumnInfo::new("state", ColumnKind::Text),
        ColumnInfo::new("area", ColumnKind::Integer),
    ];
    MemorySource::with_declared_columns("semif", columns, rows)
}

fn keys(rows: &[Record]) -> Vec<Scalar> {
    rows.iter().map(|r| r.value_or_null("cutout_id")).collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Reversing filter insertion order gives the same plan and rows.
    #[test]
    fn prop_filter_order_irrelevant(
        rows in arb_rows(40),
        filters in prop::collection::vec(arb_filter(), 0..5),
    ) {
        let source = semif_table(rows);
        let executor = QueryExecutor::new(&source);

        let forward = apply(QueryBuilder::semif(), &filters).compile().unwrap();
        let mut reversed_filters = filters.clone();
        reversed_filters.reverse();
        let reversed = apply(QueryBuilder::semif(), &reversed_filters).compile().unwrap();

        prop_assert_eq!(forward.predicate(), reversed.predicate());
        prop_assert_eq!(executor.collect(&forward).unwrap(), executor.collect(&reversed).unwrap());
    }

    /// Seeded selection does not depend on storage order.
    #[test]
    fn prop_seeded_selection_deterministic(
        rows in arb_rows(60),
        n in 0u64..20,
        seed in any::<i64>(),
    ) {
        let mut shuffled = rows.clone();
        shuffled.reverse();
        let a = semif_table(rows);
        let b = semif_table(shuffled);

        let plan = QueryBuilder::semif()
            .sample_seeded(n, seed)
            .sort_by("cutout_id", SortDirection::Asc)
            .compile()
            .unwrap();
        let first = keys(&QueryExecutor::new(&a).collect(&plan).unwrap());
        let second = keys(&QueryExecutor::new(&b).collect(&plan).unwrap());

        prop_assert_eq!(first.len() as u64, n.min(a.len() as u64));
        prop_assert_eq!(first, second);
    }

    /// Each stratum contributes min(size, per_group) rows.
    #[test]
    fn prop_stratified_bound(
        rows in arb_rows(60),
        per_group in 0u64..6,
        seed in proptest::option::of(any::<i64>()),
    ) {
        let source = semif_table(rows.clone());

        let plan = QueryBuilder::semif()
            .sample_stratified(["species"], per_group, seed)
            .compile()
            .unwrap();
        let selected = QueryExecutor::new(&source).collect(&plan).unwrap();

        let mut sizes: BTreeMap<Scalar, u64> = BTreeMap::new();
        for row in &rows {
            *sizes.entry(row.value_or_null("species")).or_default() += 1;
        }
        let mut picked: BTreeMap<Scalar, u64> = BTreeMap::new();
        for row in &selected {
            *picked.entry(row.value_or_null("species")).or_default() += 1;
        }

        for (group, size) in &sizes {
            let got = picked.get(group).copied().unwrap_or(0);
            prop_assert_eq!(got, (*size).min(per_group));
        }
        prop_assert!(picked.keys().all(|k| sizes.contains_key(k)));
    }

    /// limit/offset slice the unpaged, unsampled result.
    #[test]
    fn prop_page_law(
        rows in arb_rows(50),
        filters in prop::collection::vec(arb_filter(), 0..3),
        offset in 0u64..60,
        limit in 0u64..20,
    ) {
        let source = semif_table(rows);
        let executor = QueryExecutor::new(&source);

        let base = apply(QueryBuilder::semif(), &filters).sort_by("area", SortDirection::Asc);
        let all = executor.collect(&base.compile().unwrap()).unwrap();
        let page = executor
            .collect(&base.offset(offset).limit(limit).compile().unwrap())
            .unwrap();

        let start = (offset as usize).min(all.len());
        let end = (start + limit as usize).min(all.len());
        prop_assert_eq!(page, all[start..end].to_vec());
    }
}
