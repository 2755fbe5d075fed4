//! Field-level differences between two QuerySpecs

use std::fmt;

use serde_json::Value;

use super::spec::QuerySpec;

/// One differing leaf
#[derive(Debug, Clone, PartialEq)]
pub struct SpecChange {
    /// Dotted path, e.g. `filters.equality.species[1]`
    pub path: String,
    /// Value on the left, `None` if absent there
    pub left: Option<Value>,
    /// Value on the right, `None` if absent there
    pub right: Option<Value>,
}

impl SpecChange {
    /// True for audit-only paths that do not affect the result set
    pub fn is_metadata(&self) -> bool {
        self.path == "metadata" || self.path.starts_with("metadata.")
    }
}

impl fmt::Display for SpecChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| match v {
            Some(v) => v.to_string(),
            None => "<absent>".to_string(),
        };
        write!(f, "{}: {} -> {}", self.path, show(&self.left), show(&self.right))
    }
}

/// Ordered list of changed leaves
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecDiff {
    pub changes: Vec<SpecChange>,
}

impl SpecDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Changes outside `metadata`
    pub fn query_changes(&self) -> impl Iterator<Item = &SpecChange> {
        self.changes.iter().filter(|c| !c.is_metadata())
    }
}

impl fmt::Display for SpecDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.changes.is_empty() {
            return writeln!(f, "no differences");
        }
        for change in &self.changes {
            writeln!(f, "{}", change)?;
        }
        Ok(())
    }
}

/// Compares the canonical documents of two specs leaf by leaf.
///
/// Paths come out in sorted order. A container that is empty on either
/// side is compared whole.
pub fn compare(left: &QuerySpec, right: &QuerySpec) -> SpecDiff {
    let mut changes = Vec::new();
    diff_values("", Some(&left.to_canonical_json()), Some(&right.to_canonical_json()), &mut changes);
    SpecDiff { changes }
}

fn diff_values(path: &str, left: Option<&Value>, right: Option<&Value>, out: &mut Vec<SpecChange>) {
    match (left, right) {
        (Some(Value::Object(l)), Some(Value::Object(r))) if !l.is_empty() && !r.is_empty() => {
            let mut keys: Vec<&String> = l.keys().chain(r.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                diff_values(&child, l.get(key), r.get(key), out);
            }
        }
        (Some(Value::Array(l)), Some(Value::Array(r))) if !l.is_empty() && !r.is_empty() => {
            for i in 0..l.len().max(r.len()) {
                diff_values(&format!("{}[{}]", path, i), l.get(i), r.get(i), out);
            }
        }
        (l, r) if l != r => out.push(SpecChange {
            path: path.to_string(),
            left: l.cloned(),
            right: r.cloned(),
        }),
        _ => {}
    }
}
