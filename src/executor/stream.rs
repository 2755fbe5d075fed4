//! Lazy row streams
//!
//! A stream pulls rows from its source one at a time, applies offset and
//! limit as it goes, and stops pulling as soon as the limit is reached.
//! It is single-pass: once exhausted or failed it yields nothing more.

use std::fmt;

use crate::errors::{QueryError, QueryResult};
use crate::observability::{ObservationScope, Timer};
use crate::record::Record;
use crate::source::RowIter;

/// Rows produced by executing a plan
pub struct RowStream<'a> {
    rows: RowIter<'a>,
    skip: u64,
    remaining: Option<u64>,
    scanned: u64,
    returned: u64,
    finished: bool,
    scope: Option<ObservationScope>,
    timer: Timer,
}

impl<'a> RowStream<'a> {
    pub(super) fn new(
        rows: RowIter<'a>,
        offset: Option<u64>,
        limit: Option<u64>,
        scope: ObservationScope,
        timer: Timer,
    ) -> Self {
        Self {
            rows,
            skip: offset.unwrap_or(0),
            remaining: limit,
            scanned: 0,
            returned: 0,
            finished: false,
            scope: Some(scope),
            timer,
        }
    }

    /// Rows pulled from the source so far, skipped ones included
    pub fn rows_scanned(&self) -> u64 {
        self.scanned
    }

    /// Rows handed to the caller so far
    pub fn rows_returned(&self) -> u64 {
        self.returned
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Ends the stream early as a success
    pub fn finish(mut self) {
        self.complete();
    }

    fn complete(&mut self) {
        self.finished = true;
        if let Some(scope) = self.scope.take() {
            let elapsed = self.timer.elapsed_ms();
            let returned = self.returned.to_string();
            let scanned = self.scanned.to_string();
            scope.complete_with_fields(&[
                ("elapsed_ms", elapsed.as_str()),
                ("rows_returned", returned.as_str()),
                ("rows_scanned", scanned.as_str()),
            ]);
        }
    }

    fn fail(&mut self, err: &QueryError) {
        self.finished = true;
        if let Some(scope) = self.scope.take() {
            let elapsed = self.timer.elapsed_ms();
            let returned = self.returned.to_string();
            scope.fail_with_fields(
                &err.to_string(),
                &[
                    ("code", err.code()),
                    ("elapsed_ms", elapsed.as_str()),
                    ("rows_returned", returned.as_str()),
                ],
            );
        }
    }
}

impl Iterator for RowStream<'_> {
    type Item = QueryResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.remaining == Some(0) {
                self.complete();
                return None;
            }

            match self.rows.next() {
                Some(Ok(record)) => {
                    self.scanned += 1;
                    if self.skip > 0 {
                        self.skip -= 1;
                        continue;
                    }
                    if let Some(remaining) = self.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    self.returned += 1;
                    return Some(Ok(record));
                }
                Some(Err(err)) => {
                    let err = QueryError::from(err);
                    self.fail(&err);
                    return Some(Err(err));
                }
                None => {
                    self.complete();
                    return None;
                }
            }
        }
    }
}

impl fmt::Debug for RowStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStream")
            .field("rows_scanned", &self.scanned)
            .field("rows_returned", &self.returned)
            .field("finished", &self.finished)
            .finish()
    }
}
