//! Row selection for sampling directives
//!
//! Selection runs over the already-filtered candidate set:
//! - None: identity
//! - Random: uniform draw without replacement, emitted in candidate order
//! - Seeded: ascending (score, primary key), first n
//! - Stratified: per-group Seeded or Random, groups in key order
//!
//! Short inputs are never padded and never an error.

use std::collections::BTreeMap;

use rand::Rng;

use crate::record::{Record, Scalar};

use super::score::seeded_score;
use super::spec::SampleSpec;

/// Applies a SampleSpec to a candidate set
#[derive(Debug, Clone, Copy)]
pub struct SamplePlanner<'a> {
    primary_key: &'a str,
}

impl<'a> SamplePlanner<'a> {
    /// Creates a planner that keys seeded scores on `primary_key`
    pub fn new(primary_key: &'a str) -> Self {
        Self { primary_key }
    }

    /// Selects rows using the thread-local RNG for unseeded draws
    pub fn select(&self, candidates: Vec<Record>, spec: &SampleSpec) -> Vec<Record> {
        self.select_with_rng(candidates, spec, &mut rand::thread_rng())
    }

    /// Selects rows, drawing unseeded randomness from `rng`
    pub fn select_with_rng<R: Rng + ?Sized>(
        &self,
        candidates: Vec<Record>,
        spec: &SampleSpec,
        rng: &mut R,
    ) -> Vec<Record> {
        match spec {
            SampleSpec::None => candidates,
            SampleSpec::Random { n } => Self::take_random(candidates, to_usize(*n), rng),
            SampleSpec::Seeded { n, seed } => self.take_seeded(candidates, to_usize(*n), *seed),
            SampleSpec::Stratified {
                by,
                per_group,
                seed,
            } => self.stratify(candidates, by, to_usize(*per_group), *seed, rng),
        }
    }

    /// Partitions candidates by the values of `by`.
    ///
    /// Missing fields group under null. Groups come back in ascending key
    /// order, which does not depend on read order.
    pub fn partition(&self, candidates: Vec<Record>, by: &[String]) -> BTreeMap<Vec<Scalar>, Vec<Record>> {
        let mut groups: BTreeMap<Vec<Scalar>, Vec<Record>> = BTreeMap::new();
        for record in candidates {
            let key = by.iter().map(|f| record.value_or_null(f)).collect();
            groups.entry(key).or_default().push(record);
        }
        groups
    }

    fn take_random<R: Rng + ?Sized>(candidates: Vec<Record>, n: usize, rng: &mut R) -> Vec<Record> {
        if candidates.len() <= n {
            return candidates;
        }
        let mut chosen = rand::seq::index::sample(rng, candidates.len(), n).into_vec();
        chosen.sort_unstable();

        let mut picked = chosen.into_iter().peekable();
        candidates
            .into_iter()
            .enumerate()
            .filter_map(|(i, record)| {
                if picked.peek() == Some(&i) {
                    picked.next();
                    Some(record)
                } else {
                    None
                }
            })
            .collect()
    }

    fn take_seeded(&self, candidates: Vec<Record>, n: usize, seed: i64) -> Vec<Record> {
        let mut scored: Vec<(u64, Scalar, Record)> = candidates
            .into_iter()
            .map(|record| {
                let key = record.value_or_null(self.primary_key);
                (seeded_score(seed, &key), key, record)
            })
            .collect();

        // Key breaks score ties so the result never depends on input order
        scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        scored.truncate(n);
        scored.into_iter().map(|(_, _, record)| record).collect()
    }

    fn stratify<R: Rng + ?Sized>(
        &self,
        candidates: Vec<Record>,
        by: &[String],
        per_group: usize,
        seed: Option<i64>,
        rng: &mut R,
    ) -> Vec<Record> {
        if per_group == 0 {
            return Vec::new();
        }

        let mut out = Vec::new();
        for (_, group) in self.partition(candidates, by) {
            let chosen = match seed {
                Some(seed) => self.take_seeded(group, per_group, seed),
                None => Self::take_random(group, per_group, rng),
            };
            out.extend(chosen);
        }
        out
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
