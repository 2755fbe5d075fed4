//! Explain output for compiled plans
//!
//! Produces deterministic, human-readable text. Two plans that explain
//! identically execute identically.

use std::fmt;

use crate::errors::QueryError;

use super::plan::QueryPlan;

/// Explain plan output
#[derive(Debug, Clone)]
pub struct ExplainPlan {
    /// Whether compilation succeeded
    pub accepted: bool,
    /// `kind:table` of the source
    pub source: Option<String>,
    /// Compiled filter terms, in compiled order
    pub predicates: Vec<String>,
    /// Sampling directive
    pub sample: Option<String>,
    /// Sort keys
    pub sort: Vec<String>,
    /// Projected columns (empty = all)
    pub projection: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Whether the plan is answered by a count
    pub count_only: bool,
    /// Rejection reason (if rejected)
    pub rejection_reason: Option<String>,
    /// Rejection error code (if rejected)
    pub rejection_code: Option<String>,
}

impl ExplainPlan {
    /// Creates an explain plan from a compiled plan
    pub fn from_plan(plan: &QueryPlan) -> Self {
        let predicates = plan
            .predicate()
            .terms()
            .iter()
            .filter(|t| !t.is_always())
            .map(|t| t.to_string())
            .collect();

        let sample = (!plan.sample().is_none()).then(|| plan.sample().to_string());

        Self {
            accepted: true,
            source: Some(plan.source().to_string()),
            predicates,
            sample,
            sort: plan.sort().iter().map(|k| k.to_string()).collect(),
            projection: plan.projection().to_vec(),
            limit: plan.limit(),
            offset: plan.offset(),
            count_only: plan.is_count_only(),
            rejection_reason: None,
            rejection_code: None,
        }
    }

    /// Creates an explain plan from a compilation error
    pub fn from_error(err: &QueryError) -> Self {
        Self {
            accepted: false,
            source: None,
            predicates: Vec::new(),
            sample: None,
            sort: Vec::new(),
            projection: Vec::new(),
            limit: None,
            offset: None,
            count_only: false,
            rejection_reason: Some(err.to_string()),
            rejection_code: Some(err.code().to_string()),
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if !self.accepted {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
            return Ok(());
        }

        writeln!(f, "Status: ACCEPTED")?;
        if let Some(source) = &self.source {
            writeln!(f, "Source: {}", source)?;
        }
        if self.count_only {
            writeln!(f, "Mode: COUNT")?;
        }
        if !self.predicates.is_empty() {
            writeln!(f, "Filter:")?;
            for pred in &self.predicates {
                writeln!(f, "  - {}", pred)?;
            }
        }
        if let Some(sample) = &self.sample {
            writeln!(f, "Sample: {}", sample)?;
        }
        if !self.sort.is_empty() {
            writeln!(f, "Sort: {}", self.sort.join(", "))?;
        }
        if !self.projection.is_empty() {
            writeln!(f, "Project: {}", self.projection.join(", "))?;
        }
        if let Some(offset) = self.offset {
            writeln!(f, "Offset: {}", offset)?;
        }
        if let Some(limit) = self.limit {
            writeln!(f, "Limit: {}", limit)?;
        }

        Ok(())
    }
}
