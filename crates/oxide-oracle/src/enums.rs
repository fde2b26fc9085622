//! Enum emulation.
//!
//! Oracle has no enumerated column type. Enum columns are created as plain
//! `VARCHAR2` and the permitted values of each `table.column` are kept as a
//! comma-separated list in a bookkeeping table, so the model layer can still
//! ask for them.

use std::collections::HashMap;

use tracing::debug;

use crate::driver::{self, Driver};
use crate::error::Result;
use crate::value::Value;

/// Keeps the enum bookkeeping table in sync with declared enum columns.
#[derive(Debug, Clone)]
pub struct EnumRegistry {
    table: String,
    /// `table.column` -> joined value list, as last written.
    cache: HashMap<String, String>,
    table_ready: bool,
}

impl EnumRegistry {
    /// Creates a registry backed by the given table.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            cache: HashMap::new(),
            table_ready: false,
        }
    }

    /// Name of the bookkeeping table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// SQL creating the bookkeeping table.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE \"{}\" (\"TableColumn\" VARCHAR2(200), \"EnumList\" VARCHAR2(2000))",
            self.table
        )
    }

    fn ensure_table<D: Driver>(&mut self, driver: &mut D) -> Result<()> {
        if self.table_ready {
            return Ok(());
        }
        if !driver::table_exists(driver, &self.table)? {
            debug!(table = %self.table, "Creating enum table");
            driver::fetch_all(driver, &self.create_table_sql())?;
        }
        self.table_ready = true;
        Ok(())
    }

    /// Records the permitted values of `table.column`.
    ///
    /// Writes nothing when the cached list is unchanged. Otherwise the row is
    /// updated if one exists and inserted if not.
    pub fn register<D: Driver>(
        &mut self,
        driver: &mut D,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<()> {
        let key = key(table, column);
        let list = values.join(",");
        if self.cache.get(&key) == Some(&list) {
            return Ok(());
        }
        self.ensure_table(driver)?;

        let count_sql = format!(
            "SELECT COUNT(*) AS \"N\" FROM \"{}\" WHERE \"TableColumn\" = {}",
            self.table,
            literal(&key)
        );
        let exists = driver::fetch_all(driver, &count_sql)?
            .first()
            .and_then(|row| row.first())
            .and_then(|(_, v)| v.as_i64())
            .is_some_and(|n| n > 0);

        let write_sql = if exists {
            format!(
                "UPDATE \"{}\" SET \"EnumList\" = {} WHERE \"TableColumn\" = {}",
                self.table,
                literal(&list),
                literal(&key)
            )
        } else {
            format!(
                "INSERT INTO \"{}\" (\"TableColumn\", \"EnumList\") VALUES ({}, {})",
                self.table,
                literal(&key),
                literal(&list)
            )
        };
        driver::fetch_all(driver, &write_sql)?;
        debug!(column = %key, values = %list, "Registered enum values");
        self.cache.insert(key, list);
        Ok(())
    }

    /// Returns the permitted values of `table.column`, or an empty list when
    /// none were registered.
    pub fn values_for<D: Driver>(
        &mut self,
        driver: &mut D,
        table: &str,
        column: &str,
    ) -> Result<Vec<String>> {
        let key = key(table, column);
        if let Some(list) = self.cache.get(&key) {
            return Ok(split(list));
        }
        self.ensure_table(driver)?;

        let sql = format!(
            "SELECT \"EnumList\" FROM \"{}\" WHERE \"TableColumn\" = {}",
            self.table,
            literal(&key)
        );
        let rows = driver::fetch_all(driver, &sql)?;
        let Some(list) = rows
            .first()
            .and_then(|row| row.first())
            .and_then(|(_, v)| v.as_str())
            .map(str::to_string)
        else {
            return Ok(Vec::new());
        };
        let values = split(&list);
        self.cache.insert(key, list);
        Ok(values)
    }

    /// Drops cached lists so they are re-read on next use.
    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.table_ready = false;
    }
}

fn key(table: &str, column: &str) -> String {
    format!("{table}.{column}")
}

fn literal(text: &str) -> String {
    Value::from(text).to_sql_inline()
}

fn split(list: &str) -> Vec<String> {
    if list.is_empty() {
        return Vec::new();
    }
    list.split(',').map(str::to_string).collect()
}
