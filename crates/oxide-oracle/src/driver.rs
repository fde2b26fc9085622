//! The seam to the underlying Oracle client binding.
//!
//! The dialect layer never talks to the network itself. A binding implements
//! [`Driver`] to execute raw statement text and [`RowCursor`] to hand back
//! positional rows, and everything above it works on those two primitives.

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::value::Value;

/// A raw row as fetched from the driver: positional `(column, value)` pairs.
///
/// The same column name may occur more than once (joins selecting `ID` from
/// two relations, for example).
pub type RawRow = Vec<(String, Value)>;

/// Error reported by a driver binding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{message}", ora_prefix(.code))]
pub struct DriverError {
    /// Oracle error number (`ORA-nnnnn`), when known.
    pub code: Option<i32>,
    /// Human readable message.
    pub message: String,
}

fn ora_prefix(code: &Option<i32>) -> String {
    code.map(|c| format!("ORA-{c:05}: ")).unwrap_or_default()
}

impl DriverError {
    /// Creates an error without an Oracle error number.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Creates an error carrying an Oracle error number.
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// A statement-execution primitive bound to a single connection handle.
pub trait Driver {
    /// Cursor over the rows produced by a statement.
    type Cursor: RowCursor;

    /// Opens a connection using the given parameters.
    fn connect(config: &OracleConfig) -> Result<Self, DriverError>
    where
        Self: Sized;

    /// Executes a statement and returns a cursor over its rows.
    ///
    /// Statements that produce no rows return a cursor that is immediately
    /// exhausted.
    fn execute(&mut self, sql: &str) -> Result<Self::Cursor, DriverError>;
}

/// Row-fetch primitive.
pub trait RowCursor {
    /// Fetches the next row; `Ok(None)` marks the clean end of the result set.
    fn fetch_next(&mut self) -> Result<Option<RawRow>, DriverError>;
}

impl RowCursor for std::vec::IntoIter<RawRow> {
    fn fetch_next(&mut self) -> Result<Option<RawRow>, DriverError> {
        Ok(self.next())
    }
}

/// Executes bookkeeping SQL directly on the driver and drains the cursor.
///
/// Used for statements the session issues on its own behalf; they bypass
/// identifier rewriting.
pub(crate) fn fetch_all<D: Driver>(
    driver: &mut D,
    sql: &str,
) -> crate::error::Result<Vec<RawRow>> {
    let mut cursor = driver
        .execute(sql)
        .map_err(|e| OracleError::statement(sql, &e))?;
    let mut rows = Vec::new();
    while let Some(row) = cursor
        .fetch_next()
        .map_err(|e| OracleError::statement(sql, &e))?
    {
        rows.push(row);
    }
    Ok(rows)
}

/// Checks `USER_TABLES` for a physical table name.
pub(crate) fn table_exists<D: Driver>(
    driver: &mut D,
    physical: &str,
) -> crate::error::Result<bool> {
    let sql = format!(
        "SELECT TABLE_NAME FROM USER_TABLES WHERE TABLE_NAME = '{}'",
        physical.replace('\'', "''")
    );
    Ok(!fetch_all(driver, &sql)?.is_empty())
}
