//! The Oracle session.
//!
//! [`OracleDatabase`] owns a driver connection together with the identifier
//! mapper and the enum registry for that connection. Every statement goes
//! through [`OracleDatabase::query`], which rewrites over-length identifiers,
//! persists any mapping it had to create, and only then hands the statement
//! to the driver.

use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::OracleConfig;
use crate::ddl::{AlterPlan, SchemaCompiler};
use crate::dialect::{Dialect, OracleDialect};
use crate::driver::{self, Driver};
use crate::enums::EnumRegistry;
use crate::error::{OracleError, Result};
use crate::identifier::{rewrite_identifiers, IdentifierMapper, IdentifierMapping};
use crate::query::{QueryCompiler, QueryDescriptor, QueryKind};
use crate::result::{Record, ResultSet, RowNormalizer};
use crate::schema::{Field, Index, SequenceTrigger, TableAlteration, TableDescriptor};
use crate::value::Value;

static WRITE_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(INSERT|UPDATE|DELETE|REPLACE)\s").expect("valid regex")
});

/// A connection to an Oracle schema.
pub struct OracleDatabase<D: Driver> {
    driver: D,
    config: OracleConfig,
    mapper: IdentifierMapper,
    enums: EnumRegistry,
    compiler: QueryCompiler,
}

impl<D: Driver> OracleDatabase<D> {
    /// Validates the configuration, opens a driver connection and
    /// initialises the session.
    pub fn connect(config: OracleConfig) -> Result<Self> {
        config.validate()?;
        let driver = D::connect(&config).map_err(|e| OracleError::ConnectionFailure(e.to_string()))?;
        Self::with_driver(driver, config)
    }

    /// Initialises a session on an already connected driver.
    pub fn with_driver(mut driver: D, config: OracleConfig) -> Result<Self> {
        for sql in config.session_statements() {
            debug!(sql = %sql, "Initialising session");
            driver
                .execute(&sql)
                .map_err(|e| OracleError::ConnectionFailure(format!("{sql} | {e}")))?;
        }
        info!(server = %config.server, database = %config.database, "Connected");

        Ok(Self {
            driver,
            mapper: IdentifierMapper::new(config.max_probes),
            enums: EnumRegistry::new(config.enum_table.clone()),
            compiler: QueryCompiler::new(),
            config,
        })
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Returns the identifier mapper.
    #[must_use]
    pub fn mapper(&self) -> &IdentifierMapper {
        &self.mapper
    }

    /// Returns the driver.
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Returns the driver mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Transactions are not offered by this layer.
    #[must_use]
    pub const fn supports_transactions(&self) -> bool {
        false
    }

    /// Loads the mapping table into the mapper, creating the table first if
    /// needed. Does nothing once loaded.
    ///
    /// The mapping table's own name is never remapped.
    fn ensure_mappings(&mut self) -> Result<()> {
        if self.mapper.is_loaded() {
            return Ok(());
        }
        let table = self.config.mapping_table.clone();
        if !driver::table_exists(&mut self.driver, &table)? {
            info!(table = %table, "Creating identifier mapping table");
            driver::fetch_all(
                &mut self.driver,
                &format!(
                    "CREATE TABLE \"{table}\" (\"LogicalName\" VARCHAR2(4000), \"PhysicalIdentifier\" VARCHAR2(30))"
                ),
            )?;
        }

        let rows = driver::fetch_all(
            &mut self.driver,
            &format!("SELECT \"LogicalName\", \"PhysicalIdentifier\" FROM \"{table}\""),
        )?;
        let mappings = rows.into_iter().filter_map(|row| {
            let mut values = row.into_iter().map(|(_, v)| v.to_text());
            match (values.next().flatten(), values.next().flatten()) {
                (Some(logical), Some(physical)) => Some(IdentifierMapping::new(logical, physical)),
                _ => None,
            }
        });
        self.mapper.reload(mappings);
        debug!(table = %table, mappings = self.mapper.len(), "Loaded identifier mappings");
        Ok(())
    }

    /// Persists mappings created since the last flush, oldest first.
    ///
    /// When an insert fails, every mapping not yet persisted is dropped from
    /// the cache, so later statements neither use nor retry it.
    fn flush_mappings(&mut self) -> Result<()> {
        while let Some(mapping) = self.mapper.pending().first().cloned() {
            let sql = format!(
                "INSERT INTO \"{}\" (\"LogicalName\", \"PhysicalIdentifier\") VALUES ({}, {})",
                self.config.mapping_table,
                Value::from(mapping.logical.as_str()).to_sql_inline(),
                Value::from(mapping.physical.as_str()).to_sql_inline(),
            );
            if let Err(e) = driver::fetch_all(&mut self.driver, &sql) {
                let discarded = self.mapper.discard_pending();
                warn!(
                    logical = %mapping.logical,
                    discarded = discarded.len(),
                    error = %e,
                    "Could not persist identifier mapping"
                );
                return Err(e);
            }
            self.mapper.confirm_oldest();
            debug!(logical = %mapping.logical, physical = %mapping.physical, "Persisted identifier mapping");
        }
        Ok(())
    }

    /// Rewrites identifiers in `sql` and persists the mappings it needs.
    fn prepare(&mut self, sql: &str) -> Result<String> {
        self.ensure_mappings()?;
        let rewritten = rewrite_identifiers(sql, &mut self.mapper)?;
        self.flush_mappings()?;
        Ok(rewritten)
    }

    /// Runs a statement and returns its rows.
    ///
    /// With `preview_writes` enabled, data-modifying statements are logged
    /// and not executed; they yield no rows.
    pub fn query(&mut self, sql: &str) -> Result<ResultSet<'_, D::Cursor>> {
        let sql = self.prepare(sql)?;
        let normalizer = RowNormalizer::new(&self.mapper, self.config.coalesce);

        if self.config.preview_writes && WRITE_STATEMENT.is_match(&sql) {
            info!(sql = %sql, "Previewing write, not executed");
            return Ok(ResultSet::empty(sql, normalizer));
        }

        let started = Instant::now();
        let cursor = self
            .driver
            .execute(&sql)
            .map_err(|e| OracleError::statement(sql.as_str(), &e))?;
        debug!(sql = %sql, elapsed = ?started.elapsed(), "Executed statement");
        Ok(ResultSet::new(sql, cursor, normalizer))
    }

    /// Runs a statement whose failure is not an error.
    ///
    /// Failures are logged and yield `None`.
    pub fn query_best_effort(&mut self, sql: &str) -> Option<ResultSet<'_, D::Cursor>> {
        match self.query(sql) {
            Ok(results) => Some(results),
            Err(e) => {
                warn!(error = %e, "Best-effort statement failed");
                None
            }
        }
    }

    /// Runs a statement, discarding any rows.
    pub fn execute(&mut self, sql: &str) -> Result<()> {
        self.query(sql)?;
        Ok(())
    }

    /// Runs a statement and collects all rows.
    pub fn records(&mut self, sql: &str) -> Result<Vec<Record>> {
        self.query(sql)?.collect_records()
    }

    /// Runs a statement and returns its first row.
    pub fn first(&mut self, sql: &str) -> Result<Option<Record>> {
        self.query(sql)?.next_record()
    }

    /// Runs a statement and returns the first column of its first row.
    pub fn value(&mut self, sql: &str) -> Result<Option<Value>> {
        Ok(self
            .first(sql)?
            .and_then(|record| record.into_iter().next())
            .map(|(_, value)| value))
    }

    /// Compiles a SELECT descriptor into executable text.
    pub fn compile_select(&mut self, query: &QueryDescriptor) -> Result<String> {
        let sql = self.compiler.compile(query)?;
        self.prepare(&sql)
    }

    /// Compiles a descriptor as a DELETE into executable text.
    pub fn compile_delete(&mut self, query: &QueryDescriptor) -> Result<String> {
        let query = QueryDescriptor {
            kind: QueryKind::Delete,
            ..query.clone()
        };
        let sql = self.compiler.compile(&query)?;
        self.prepare(&sql)
    }

    /// Discards cached identifier mappings and enum lists and reloads the
    /// mappings from the mapping table.
    pub fn reload_identifiers(&mut self) -> Result<()> {
        self.mapper.invalidate();
        self.enums.invalidate();
        self.ensure_mappings()
    }

    /// Physical name of an existing table, without creating a mapping.
    fn physical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.mapper.lookup(name).unwrap_or(name)
    }

    fn register_enums<'f>(&mut self, table: &str, fields: impl IntoIterator<Item = &'f Field>) -> Result<()> {
        for field in fields {
            if let Some(values) = field.column_type.enum_values() {
                self.enums
                    .register(&mut self.driver, table, &field.name, values)?;
            }
        }
        Ok(())
    }

    /// Creates a table with its key sequence, trigger and indexes.
    ///
    /// Returns the physical table name.
    pub fn create_table(&mut self, table: &TableDescriptor) -> Result<String> {
        self.ensure_mappings()?;
        let plan = SchemaCompiler::new(&mut self.mapper).create_table(table)?;
        for sql in &plan.statements {
            self.execute(sql)?;
        }
        self.register_enums(&table.name, &table.fields)?;
        info!(table = %table.name, physical = %plan.table, "Created table with sequence and trigger");
        Ok(plan.table)
    }

    /// Alters a table. Changes that cannot be expressed are logged and
    /// returned in the plan.
    pub fn alter_table(&mut self, table: &str, alteration: &TableAlteration) -> Result<AlterPlan> {
        if alteration.is_empty() {
            debug!(table = %table, "Nothing to alter");
            return Ok(AlterPlan::default());
        }
        self.ensure_mappings()?;
        let plan = SchemaCompiler::new(&mut self.mapper).alter_table(table, alteration)?;
        for skipped in &plan.skipped {
            warn!(table = %table, change = %skipped, "Schema change skipped");
        }
        for sql in &plan.statements {
            self.execute(sql)?;
        }
        self.register_enums(
            table,
            alteration.new_fields.iter().chain(&alteration.altered_fields),
        )?;
        info!(table = %table, statements = plan.statements.len(), "Altered table");
        Ok(plan)
    }

    /// Drops a table with its trigger and sequence.
    ///
    /// A missing trigger or sequence is tolerated; failing to drop the table
    /// itself is an error.
    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        self.ensure_mappings()?;
        let mut statements = SchemaCompiler::new(&mut self.mapper).drop_table(table)?;
        let drop_table = statements.pop();
        for sql in &statements {
            if let Err(e) = self.execute(sql) {
                warn!(table = %table, error = %e, "Ignoring failed drop");
            }
        }
        if let Some(sql) = drop_table {
            self.execute(&sql)?;
        }
        info!(table = %table, "Dropped table with sequence and trigger");
        Ok(())
    }

    /// Deletes every row of a table. Bookkeeping tables, whose names start
    /// with `_`, are left alone.
    pub fn clear_table(&mut self, table: &str) -> Result<()> {
        if table.starts_with('_') {
            debug!(table = %table, "Not clearing bookkeeping table");
            return Ok(());
        }
        self.execute(&format!("DELETE FROM \"{table}\""))
    }

    /// Creates an index.
    pub fn create_index(&mut self, table: &str, index: &Index) -> Result<()> {
        self.ensure_mappings()?;
        let sql = SchemaCompiler::new(&mut self.mapper).create_index(table, index)?;
        self.execute(&sql)?;
        info!(table = %table, index = %index.name, "Created index");
        Ok(())
    }

    /// Requests an index change. Oracle indexes are not altered in place, so
    /// the change is logged and skipped.
    pub fn alter_index(&mut self, table: &str, index: &Index) -> Result<()> {
        self.ensure_mappings()?;
        let compiled = SchemaCompiler::new(&mut self.mapper).alter_index(table, index);
        match compiled {
            Ok(sql) => self.execute(&sql),
            Err(OracleError::UnsupportedOperation(reason)) => {
                warn!(table = %table, index = %index.name, reason = %reason, "Index change skipped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Adds a column.
    pub fn create_field(&mut self, table: &str, field: &Field) -> Result<()> {
        self.ensure_mappings()?;
        let sql = SchemaCompiler::new(&mut self.mapper).create_field(table, field)?;
        self.execute(&sql)?;
        self.register_enums(table, [field])
    }

    /// Changes a column's specification.
    pub fn alter_field(&mut self, table: &str, field: &Field) -> Result<()> {
        self.ensure_mappings()?;
        let sql = SchemaCompiler::new(&mut self.mapper).alter_field(table, field)?;
        self.execute(&sql)?;
        self.register_enums(table, [field])
    }

    /// Renames a column.
    pub fn rename_field(&mut self, table: &str, old_name: &str, new_name: &str) -> Result<()> {
        self.ensure_mappings()?;
        let sql = SchemaCompiler::new(&mut self.mapper).rename_field(table, old_name, new_name)?;
        self.execute(&sql)
    }

    /// Renames a table.
    pub fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        self.ensure_mappings()?;
        let sql = SchemaCompiler::new(&mut self.mapper).rename_table(old_name, new_name)?;
        self.execute(&sql)?;
        info!(from = %old_name, to = %new_name, "Renamed table");
        Ok(())
    }

    /// Checks whether a table exists. Any failure counts as absence.
    pub fn has_table(&mut self, table: &str) -> bool {
        if let Err(e) = self.ensure_mappings() {
            warn!(table = %table, error = %e, "Could not load identifier mappings");
            return false;
        }
        let physical = self.physical_name(table).to_string();
        match driver::table_exists(&mut self.driver, &physical) {
            Ok(exists) => exists,
            Err(e) => {
                warn!(table = %table, error = %e, "Table existence check failed");
                false
            }
        }
    }

    /// Lists all tables by logical name.
    pub fn table_list(&mut self) -> Result<Vec<String>> {
        let records = self.records("SELECT TABLE_NAME FROM USER_TABLES")?;
        Ok(records
            .iter()
            .filter_map(|r| r.first_value().and_then(Value::to_text))
            .map(|physical| self.mapper.recover(&physical).to_string())
            .collect())
    }

    /// Lists a table's columns with reconstructed specifications, in column
    /// order.
    pub fn field_list(&mut self, table: &str) -> Result<Vec<(String, String)>> {
        self.ensure_mappings()?;
        let physical = OracleDialect::new().escape_string(self.physical_name(table));
        let records = self.records(&format!(
            "SELECT * FROM USER_TAB_COLUMNS WHERE TABLE_NAME = '{physical}' ORDER BY COLUMN_ID"
        ))?;
        Ok(records
            .iter()
            .filter_map(|r| {
                let column = text(r, "COLUMN_NAME")?;
                Some((self.mapper.recover(&column).to_string(), column_spec(r)))
            })
            .collect())
    }

    /// Lists a table's indexes as `(name, definition)`, where the name joins
    /// the column names with `_` and the definition is `[unique ](cols)`.
    pub fn index_list(&mut self, table: &str) -> Result<Vec<(String, String)>> {
        self.ensure_mappings()?;
        let physical = OracleDialect::new().escape_string(self.physical_name(table));
        let indexes = self.records(&format!(
            "SELECT INDEX_NAME, UNIQUENESS FROM USER_INDEXES WHERE TABLE_NAME = '{physical}'"
        ))?;

        let mut list = Vec::with_capacity(indexes.len());
        for index in &indexes {
            let Some(index_name) = text(index, "INDEX_NAME") else {
                continue;
            };
            let columns: Vec<String> = self
                .records(&format!(
                    "SELECT COLUMN_NAME FROM USER_IND_COLUMNS WHERE INDEX_NAME = '{}' ORDER BY COLUMN_POSITION",
                    OracleDialect::new().escape_string(&index_name)
                ))?
                .iter()
                .filter_map(|r| r.first_value().and_then(Value::to_text))
                .map(|c| self.mapper.recover(&c).to_string())
                .collect();
            let unique = if text(index, "UNIQUENESS").as_deref() == Some("UNIQUE") {
                "unique "
            } else {
                ""
            };
            list.push((columns.join("_"), format!("{unique}({})", columns.join(","))));
        }
        Ok(list)
    }

    /// Returns the last key generated for `table` in this session.
    pub fn generated_id(&mut self, table: &str) -> Result<Option<i64>> {
        let SequenceTrigger { sequence, .. } = SequenceTrigger::for_table(table);
        let value = self.value(&format!("SELECT \"{sequence}\".CURRVAL AS ID FROM DUAL"))?;
        Ok(value.as_ref().and_then(Value::as_i64))
    }

    /// Returns the permitted values of an enum column.
    pub fn enum_values_for_field(&mut self, table: &str, column: &str) -> Result<Vec<String>> {
        self.enums.values_for(&mut self.driver, table, column)
    }
}

fn text(record: &Record, column: &str) -> Option<String> {
    record.get(column).and_then(Value::to_text)
}

/// Rebuilds a column specification from a `USER_TAB_COLUMNS` row.
fn column_spec(record: &Record) -> String {
    let data_type = text(record, "DATA_TYPE").unwrap_or_default();
    let upper = data_type.to_uppercase();
    let nonzero = |column: &str| text(record, column).filter(|v| !v.is_empty() && v != "0");

    let mut spec = if upper.starts_with("TIMESTAMP") {
        String::from("TIMESTAMP")
    } else if upper.starts_with("DATE") {
        String::from("DATE")
    } else if let Some(precision) = nonzero("DATA_PRECISION") {
        match nonzero("DATA_SCALE") {
            Some(scale) => format!("{data_type}({precision},{scale})"),
            None => format!("{data_type}({precision})"),
        }
    } else if let Some(length) = nonzero("DATA_LENGTH") {
        format!("{data_type}({length})")
    } else {
        data_type
    };

    if let Some(default) = text(record, "DATA_DEFAULT") {
        let default = default.trim();
        if !default.is_empty() {
            spec.push_str(" DEFAULT ");
            spec.push_str(default);
        }
    }
    if text(record, "NULLABLE").as_deref() == Some("N") {
        spec.push_str(" NOT NULL");
    }
    spec
}
