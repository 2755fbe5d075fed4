//! Sampling directives

use std::fmt;

use crate::errors::{QueryError, QueryResult};

/// Largest `n` or `per_group`; spec documents store counts as signed integers
pub const MAX_SAMPLE_COUNT: u64 = i64::MAX as u64;

/// How rows are chosen from the filtered candidate set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SampleSpec {
    /// Every filtered row passes through
    #[default]
    None,
    /// `n` rows uniformly at random, without replacement
    Random { n: u64 },
    /// `n` rows chosen by a hash of `(seed, primary key)`
    Seeded { n: u64, seed: i64 },
    /// Up to `per_group` rows from each group of equal `by` values
    Stratified {
        by: Vec<String>,
        per_group: u64,
        seed: Option<i64>,
    },
}

impl SampleSpec {
    pub fn random(n: u64) -> Self {
        SampleSpec::Random { n }
    }

    pub fn seeded(n: u64, seed: i64) -> Self {
        SampleSpec::Seeded { n, seed }
    }

    /// Creates a stratified directive; `by` must name at least one field
    pub fn stratified<S: Into<String>>(
        by: impl IntoIterator<Item = S>,
        per_group: u64,
        seed: Option<i64>,
    ) -> QueryResult<Self> {
        let spec = SampleSpec::Stratified {
            by: by.into_iter().map(Into::into).collect(),
            per_group,
            seed,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Builds a directive from loosely typed parts, as found in documents
    /// and tokens. Negative counts and unknown kinds are rejected.
    pub fn from_parts(
        kind: &str,
        n: Option<i64>,
        seed: Option<i64>,
        by: Option<Vec<String>>,
        per_group: Option<i64>,
    ) -> QueryResult<Self> {
        let count = |name: &str, value: Option<i64>| -> QueryResult<u64> {
            let value = value.ok_or_else(|| {
                QueryError::InvalidSampleSpec(format!("{} sampling requires '{}'", kind, name))
            })?;
            u64::try_from(value).map_err(|_| {
                QueryError::InvalidSampleSpec(format!("'{}' must be >= 0, got {}", name, value))
            })
        };

        let spec = match kind.trim().to_ascii_lowercase().as_str() {
            "none" => SampleSpec::None,
            "random" => SampleSpec::Random { n: count("n", n)? },
            "seeded" => SampleSpec::Seeded {
                n: count("n", n)?,
                seed: seed.ok_or_else(|| {
                    QueryError::InvalidSampleSpec("seeded sampling requires 'seed'".into())
                })?,
            },
            "stratified" => SampleSpec::Stratified {
                by: by.unwrap_or_default(),
                per_group: count("per_group", per_group)?,
                seed,
            },
            other => {
                return Err(QueryError::InvalidSampleSpec(format!(
                    "unknown sample kind '{}'",
                    other
                )))
            }
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Checks structural constraints
    pub fn validate(&self) -> QueryResult<()> {
        let (name, count) = match self {
            SampleSpec::None => ("n", 0),
            SampleSpec::Random { n } | SampleSpec::Seeded { n, .. } => ("n", *n),
            SampleSpec::Stratified { per_group, .. } => ("per_group", *per_group),
        };
        if count > MAX_SAMPLE_COUNT {
            return Err(QueryError::InvalidSampleSpec(format!(
                "'{}' must be <= {}, got {}",
                name, MAX_SAMPLE_COUNT, count
            )));
        }

        if let SampleSpec::Stratified { by, .. } = self {
            if by.is_empty() {
                return Err(QueryError::InvalidSampleSpec(
                    "stratified sampling requires at least one 'by' field".into(),
                ));
            }
            if let Some(blank) = by.iter().find(|f| f.trim().is_empty()) {
                return Err(QueryError::InvalidSampleSpec(format!(
                    "stratified 'by' contains a blank field name: {:?}",
                    blank
                )));
            }
        }
        Ok(())
    }

    /// Returns the kind name used in documents
    pub fn kind_name(&self) -> &'static str {
        match self {
            SampleSpec::None => "none",
            SampleSpec::Random { .. } => "random",
            SampleSpec::Seeded { .. } => "seeded",
            SampleSpec::Stratified { .. } => "stratified",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SampleSpec::None)
    }

    /// False when the selection depends on an unseeded random draw
    pub fn is_reproducible(&self) -> bool {
        match self {
            SampleSpec::None | SampleSpec::Seeded { .. } => true,
            SampleSpec::Random { .. } => false,
            SampleSpec::Stratified { seed, .. } => seed.is_some(),
        }
    }

    /// Stratification fields, if any
    pub fn stratify_fields(&self) -> &[String] {
        match self {
            SampleSpec::Stratified { by, .. } => by,
            _ => &[],
        }
    }
}

impl fmt::Display for SampleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSpec::None => write!(f, "none"),
            SampleSpec::Random { n } => write!(f, "random(n={})", n),
            SampleSpec::Seeded { n, seed } => write!(f, "seeded(n={}, seed={})", n, seed),
            SampleSpec::Stratified {
                by,
                per_group,
                seed,
            } => {
                write!(f, "stratified(by=[{}], per_group={}", by.join(", "), per_group)?;
                if let Some(seed) = seed {
                    write!(f, ", seed={}", seed)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stratified_requires_by() {
        let err = SampleSpec::stratified(Vec::<String>::new(), 3, None).unwrap_err();
        assert_eq!(err.code(), "AGIR_QUERY_INVALID_SAMPLE");
    }

    #[test]
    fn test_from_parts_rejects_negative() {
        let err = SampleSpec::from_parts("random", Some(-1), None, None, None).unwrap_err();
        assert!(matches!(err, QueryError::InvalidSampleSpec(_)));

        let err = SampleSpec::from_parts("stratified", None, None, Some(vec!["species".into()]), Some(-3))
            .unwrap_err();
        assert!(err.to_string().contains("per_group"));
    }

    #[test]
    fn test_counts_must_fit_documents() {
        assert!(SampleSpec::seeded(MAX_SAMPLE_COUNT, 1).validate().is_ok());

        let err = SampleSpec::seeded(u64::MAX, 1).validate().unwrap_err();
        assert_eq!(err.code(), "AGIR_QUERY_INVALID_SAMPLE");
        assert!(SampleSpec::random(MAX_SAMPLE_COUNT + 1).validate().is_err());

        let err = SampleSpec::stratified(["species"], u64::MAX, None).unwrap_err();
        assert!(err.to_string().contains("per_group"));
    }

    #[test]
    fn test_from_parts_unknown_kind() {
        assert!(SampleSpec::from_parts("reservoir", Some(3), None, None, None).is_err());
    }

    #[test]
    fn test_from_parts_zero_is_valid() {
        let spec = SampleSpec::from_parts("seeded", Some(0), Some(42), None, None).unwrap();
        assert_eq!(spec, SampleSpec::seeded(0, 42));
    }

    #[test]
    fn test_reproducibility_flags() {
        assert!(SampleSpec::None.is_reproducible());
        assert!(SampleSpec::seeded(5, 1).is_reproducible());
        assert!(!SampleSpec::random(5).is_reproducible());
        assert!(!SampleSpec::stratified(["species"], 2, None).unwrap().is_reproducible());
        assert!(SampleSpec::stratified(["species"], 2, Some(9)).unwrap().is_reproducible());
    }

    #[test]
    fn test_display() {
        let spec = SampleSpec::stratified(["species", "state"], 3, Some(7)).unwrap();
        assert_eq!(spec.to_string(), "stratified(by=[species, state], per_group=3, seed=7)");
    }
}
