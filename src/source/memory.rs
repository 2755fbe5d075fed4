//! In-memory data source
//!
//! Holds one read-only table. Raw predicates are evaluated with the
//! predicate language in `dsl`. Equality terms match values exactly; a null
//! in the accepted set matches null and missing values.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::executor::ResultSorter;
use crate::filter::Predicate;
use crate::observability::{log_event_with_fields, Event};
use crate::planner::SortKey;
use crate::record::{Record, Scalar};

use super::dsl::Condition;
use super::errors::{SourceError, SourceResult};
use super::{ColumnInfo, ColumnKind, DataSource, RowIter};

/// A single read-only table held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    table: String,
    columns: Vec<ColumnInfo>,
    rows: Vec<Record>,
    open: bool,
}

/// One term of a compiled predicate
#[derive(Debug)]
enum Term {
    In { field: String, values: Vec<Scalar> },
    Raw(Condition),
}

/// An exported table: a bare array of rows, or rows with declared columns
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TableDocument {
    Rows(Vec<Record>),
    Declared {
        columns: Vec<ColumnInfo>,
        #[serde(default)]
        rows: Vec<Record>,
    },
}

/// Declared columns first, then any column seen only in the rows.
///
/// A declared kind wins over the data unless it is `unknown`.
fn merge_columns(declared: Vec<ColumnInfo>, rows: &[Record]) -> Vec<ColumnInfo> {
    let fixed: Vec<bool> = declared.iter().map(|c| c.kind != ColumnKind::Unknown).collect();
    let mut columns = declared;
    for row in rows {
        for (name, value) in row.iter() {
            let kind = ColumnKind::of(value);
            match columns.iter().position(|c| c.name == name) {
                Some(i) if fixed.get(i).copied().unwrap_or(false) => {}
                Some(i) => columns[i].kind = columns[i].kind.widen(kind),
                None => columns.push(ColumnInfo::new(name, kind)),
            }
        }
    }
    columns
}

impl Term {
    fn matches(&self, record: &Record) -> bool {
        match self {
            Term::In { field, values } => values.contains(&record.value_or_null(field)),
            Term::Raw(condition) => condition.matches(record),
        }
    }
}

impl MemorySource {
    /// Creates a source, inferring columns from the rows.
    ///
    /// Columns appear in first-seen order.
    pub fn new(table: impl Into<String>, rows: Vec<Record>) -> Self {
        Self::with_declared_columns(table, Vec::new(), rows)
    }

    /// Creates a source whose schema does not depend on which rows exist.
    ///
    /// Declared columns stay known when the table is empty or no row
    /// carries them; columns found only in rows are appended.
    pub fn with_declared_columns(
        table: impl Into<String>,
        declared: Vec<ColumnInfo>,
        rows: Vec<Record>,
    ) -> Self {
        let columns = merge_columns(declared, &rows);
        Self::with_columns(table, columns, rows)
    }

    /// Creates a source with explicit columns
    pub fn with_columns(table: impl Into<String>, columns: Vec<ColumnInfo>, rows: Vec<Record>) -> Self {
        let source = Self {
            table: table.into(),
            columns,
            rows,
            open: true,
        };
        let columns = source.columns.len().to_string();
        let rows = source.rows.len().to_string();
        log_event_with_fields(
            Event::SourceLoaded,
            &[
                ("columns", columns.as_str()),
                ("rows", rows.as_str()),
                ("table", source.table.as_str()),
            ],
        );
        source
    }

    /// Parses a table document.
    ///
    /// Either a JSON array of row objects, or an object with a `columns`
    /// list of `{name, kind}` and optional `rows`.
    pub fn from_json_str(table: impl Into<String>, text: &str) -> SourceResult<Self> {
        Self::from_json_with_columns(table, text, Vec::new())
    }

    fn from_json_with_columns(
        table: impl Into<String>,
        text: &str,
        mut declared: Vec<ColumnInfo>,
    ) -> SourceResult<Self> {
        let document: TableDocument = serde_json::from_str(text)
            .map_err(|e| SourceError::Unavailable(format!("invalid table data: {}", e)))?;
        let rows = match document {
            TableDocument::Rows(rows) => rows,
            TableDocument::Declared { columns, rows } => {
                for column in columns {
                    if !declared.iter().any(|c| c.name == column.name) {
                        declared.push(column);
                    }
                }
                rows
            }
        };
        Ok(Self::with_declared_columns(table, declared, rows))
    }

    /// Loads an exported table document
    pub fn load(path: impl AsRef<Path>, table: impl Into<String>) -> SourceResult<Self> {
        Self::load_with_columns(path, table, Vec::new())
    }

    /// Loads an exported table, declaring columns ahead of those in the file
    pub fn load_with_columns(
        path: impl AsRef<Path>,
        table: impl Into<String>,
        columns: Vec<ColumnInfo>,
    ) -> SourceResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SourceError::Unavailable(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_with_columns(table, &text, columns)
    }

    /// Closes the source; later operations fail as unavailable
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            log_event_with_fields(Event::SourceClosed, &[("table", self.table.as_str())]);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check(&self, table: &str) -> SourceResult<()> {
        if !self.open {
            return Err(SourceError::Unavailable(format!("source for '{}' is closed", self.table)));
        }
        if table != self.table {
            return Err(SourceError::UnknownTable(table.to_string()));
        }
        Ok(())
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Compiles a predicate into terms, validating every field it names
    fn compile(&self, predicate: &Predicate) -> SourceResult<Vec<Term>> {
        let mut terms = Vec::new();
        self.compile_into(predicate, &mut terms)?;
        Ok(terms)
    }

    fn compile_into(&self, predicate: &Predicate, terms: &mut Vec<Term>) -> SourceResult<()> {
        match predicate {
            Predicate::All(parts) => {
                for part in parts {
                    self.compile_into(part, terms)?;
                }
            }
            Predicate::In { field, values } => {
                if !self.has_column(field) {
                    return Err(SourceError::UnknownField {
                        field: field.clone(),
                        expression: None,
                    });
                }
                terms.push(Term::In {
                    field: field.clone(),
                    values: values.clone(),
                });
            }
            Predicate::Raw(raw) => {
                let condition = Condition::parse(raw.as_str())?;
                if let Some(unknown) = condition.keys().into_iter().find(|k| !self.has_column(k)) {
                    return Err(SourceError::UnknownField {
                        field: unknown.to_string(),
                        expression: Some(raw.as_str().to_string()),
                    });
                }
                terms.push(Term::Raw(condition));
            }
        }
        Ok(())
    }
}

impl DataSource for MemorySource {
    fn columns(&self, table: &str) -> SourceResult<Vec<ColumnInfo>> {
        self.check(table)?;
        Ok(self.columns.clone())
    }

    fn scan<'a>(
        &'a self,
        table: &str,
        predicate: &Predicate,
        sort: &[SortKey],
        projection: &[String],
    ) -> SourceResult<RowIter<'a>> {
        self.check(table)?;
        let terms = self.compile(predicate)?;
        let projection = projection.to_vec();
        let matching = self
            .rows
            .iter()
            .filter(move |row| terms.iter().all(|t| t.matches(row)));

        if sort.is_empty() {
            return Ok(Box::new(
                matching.map(move |row| -> SourceResult<Record> { Ok(row.project(&projection)) }),
            ));
        }

        let mut selected: Vec<&Record> = matching.collect();
        selected.sort_by(|a, b| ResultSorter::compare(a, b, sort));
        Ok(Box::new(
            selected
                .into_iter()
                .map(move |row| -> SourceResult<Record> { Ok(row.project(&projection)) }),
        ))
    }

    fn scan_count(&self, table: &str, predicate: &Predicate) -> SourceResult<u64> {
        self.check(table)?;
        let terms = self.compile(predicate)?;
        let count = self
            .rows
            .iter()
            .filter(|row| terms.iter().all(|t| t.matches(row)))
            .count();
        Ok(count as u64)
    }
}
