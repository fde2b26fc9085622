//! Result row normalisation.
//!
//! Oracle returns every column even when a join produces several columns of
//! the same name, and it returns the physical (possibly shortened) column
//! names. A [`RowNormalizer`] folds a raw row into a [`Record`] keyed by
//! logical names, with one entry per name.

use serde::{Deserialize, Serialize};

use crate::driver::{RawRow, RowCursor};
use crate::error::{OracleError, Result};
use crate::identifier::IdentifierMapper;
use crate::query::ROW_NUMBER_COLUMN;
use crate::value::Value;

/// How duplicate column names within one row are merged.
///
/// A null never overwrites a non-null value under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoalescePolicy {
    /// The first non-null occurrence wins.
    #[default]
    FirstNonNull,
    /// The last non-null occurrence wins.
    LastNonNull,
}

/// A normalised result row.
///
/// Column order follows the first occurrence of each name in the raw row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a column.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns the value of a column, or an error naming the missing column.
    pub fn try_get(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| OracleError::UnsupportedOperation(format!("no column '{name}' in row")))
    }

    /// Returns true if the record has a column of that name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the first column's value.
    #[must_use]
    pub fn first_value(&self) -> Option<&Value> {
        self.columns.first().map(|(_, v)| v)
    }

    fn merge(&mut self, name: String, value: Value, policy: CoalescePolicy) {
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            None => self.columns.push((name, value)),
            Some((_, existing)) => {
                let replace = match policy {
                    CoalescePolicy::FirstNonNull => existing.is_null(),
                    CoalescePolicy::LastNonNull => !value.is_null(),
                };
                if replace {
                    *existing = value;
                }
            }
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Folds raw rows into [`Record`]s.
#[derive(Debug, Clone, Copy)]
pub struct RowNormalizer<'m> {
    mapper: &'m IdentifierMapper,
    policy: CoalescePolicy,
}

impl<'m> RowNormalizer<'m> {
    /// Creates a normalizer recovering names through `mapper`.
    #[must_use]
    pub const fn new(mapper: &'m IdentifierMapper, policy: CoalescePolicy) -> Self {
        Self { mapper, policy }
    }

    /// Normalises one raw row.
    ///
    /// Physical column names are translated back to logical names before
    /// duplicates are merged, so a shortened and an unshortened occurrence
    /// of the same column coalesce. The pagination row number is dropped.
    #[must_use]
    pub fn normalize(&self, row: RawRow) -> Record {
        let mut record = Record {
            columns: Vec::with_capacity(row.len()),
        };
        for (name, value) in row {
            if name == ROW_NUMBER_COLUMN {
                continue;
            }
            let logical = self.mapper.recover(&name).to_string();
            record.merge(logical, value, self.policy);
        }
        record
    }
}

/// Iterator over the normalised rows of an executed query.
///
/// Rows are produced lazily; a driver error while fetching is yielded once
/// and ends the iteration.
pub struct ResultSet<'m, C> {
    sql: String,
    /// `None` once exhausted, or when nothing was executed.
    cursor: Option<C>,
    normalizer: RowNormalizer<'m>,
}

impl<'m, C: RowCursor> ResultSet<'m, C> {
    /// Wraps the cursor produced by executing `sql`.
    pub fn new(sql: impl Into<String>, cursor: C, normalizer: RowNormalizer<'m>) -> Self {
        Self {
            sql: sql.into(),
            cursor: Some(cursor),
            normalizer,
        }
    }

    /// A result set for a statement that was not executed.
    pub fn empty(sql: impl Into<String>, normalizer: RowNormalizer<'m>) -> Self {
        Self {
            sql: sql.into(),
            cursor: None,
            normalizer,
        }
    }

    /// The statement text as handed to the driver.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Fetches the next record.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        match cursor.fetch_next() {
            Ok(Some(row)) => Ok(Some(self.normalizer.normalize(row))),
            Ok(None) => {
                self.cursor = None;
                Ok(None)
            }
            Err(e) => {
                self.cursor = None;
                Err(OracleError::statement(self.sql.clone(), &e))
            }
        }
    }

    /// Collects all remaining records.
    pub fn collect_records(mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

impl<C: RowCursor> Iterator for ResultSet<'_, C> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
