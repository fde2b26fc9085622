//! DDL generation for Oracle.
//!
//! Oracle has no auto-increment column type, so every table is created
//! together with a sequence and a `BEFORE INSERT` trigger that fills `ID`
//! from the sequence. When a caller supplies `ID` explicitly, the trigger
//! advances the sequence past both the supplied value and the current
//! maximum, so later generated keys never collide with explicit ones.
//!
//! The compiler performs no I/O. It returns statement text; names longer
//! than the identifier limit are shortened through the borrowed
//! [`IdentifierMapper`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::{Dialect, OracleDialect};
use crate::error::{OracleError, Result};
use crate::identifier::IdentifierMapper;
use crate::schema::{
    ColumnType, Field, Index, IndexKind, IndexSpec, SequenceTrigger, TableAlteration,
    TableDescriptor, ID_COLUMN,
};

static PRIMARY_KEY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+PRIMARY\s+KEY\s*$").expect("valid regex"));

/// Statements creating a table, its key sequence and trigger, and indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTablePlan {
    /// Physical table name.
    pub table: String,
    /// Statements in execution order.
    pub statements: Vec<String>,
}

/// A requested change that was not turned into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkippedChange {
    /// A `PRIMARY KEY` qualifier was stripped from an added or altered column.
    PrimaryKey {
        /// Column whose qualifier was dropped.
        column: String,
    },
    /// An index addition requested through `ALTER TABLE`.
    AddIndex {
        /// Index name.
        name: String,
        /// Normalised definition.
        definition: String,
    },
    /// An index change requested through `ALTER TABLE`.
    AlterIndex {
        /// Index name.
        name: String,
        /// Normalised definition.
        definition: String,
    },
}

impl fmt::Display for SkippedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryKey { column } => {
                write!(f, "primary key constraint on \"{column}\" not re-added")
            }
            Self::AddIndex { definition, .. } => write!(f, "skip adding index {definition}"),
            Self::AlterIndex { definition, .. } => write!(f, "skip changing index {definition}"),
        }
    }
}

/// Statements altering a table, plus the changes left out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlterPlan {
    /// Statements in execution order.
    pub statements: Vec<String>,
    /// Changes that were reported instead of executed.
    pub skipped: Vec<SkippedChange>,
}

/// Compiles schema descriptions into Oracle DDL.
pub struct SchemaCompiler<'m> {
    dialect: OracleDialect,
    mapper: &'m mut IdentifierMapper,
}

impl<'m> SchemaCompiler<'m> {
    /// Creates a compiler resolving names through `mapper`.
    pub fn new(mapper: &'m mut IdentifierMapper) -> Self {
        Self {
            dialect: OracleDialect::new(),
            mapper,
        }
    }

    /// Shortens and quotes a logical name.
    fn ident(&mut self, name: &str) -> Result<String> {
        let physical = self.mapper.shorten(name)?;
        Ok(self.dialect.quote_identifier(&physical))
    }

    /// Renders `"name" spec` for a column, stripping a trailing
    /// `PRIMARY KEY` qualifier. Returns whether one was stripped.
    fn column_definition(&mut self, field: &Field) -> Result<(String, bool)> {
        let spec = field.column_type.to_sql();
        let stripped = PRIMARY_KEY_SUFFIX.replace(&spec, "");
        let had_pk = stripped.len() != spec.len();
        Ok((format!("{} {}", self.ident(&field.name)?, stripped), had_pk))
    }

    /// Generates the statements creating a table.
    ///
    /// An `ID` column is added when the descriptor does not declare one, and
    /// the primary key is always declared as a table constraint on `ID`.
    pub fn create_table(&mut self, table: &TableDescriptor) -> Result<CreateTablePlan> {
        let physical = self.mapper.shorten(&table.name)?;
        let quoted_table = self.dialect.quote_identifier(&physical);
        let SequenceTrigger { sequence, trigger } = table.sequence_trigger();
        let quoted_sequence = self.ident(&sequence)?;
        let quoted_trigger = self.ident(&trigger)?;

        let mut columns = Vec::with_capacity(table.fields.len() + 1);
        if table.get_field(ID_COLUMN).is_none() {
            let id = Field::new(ID_COLUMN, ColumnType::Id);
            columns.push(self.column_definition(&id)?.0);
        }
        for field in &table.fields {
            columns.push(self.column_definition(field)?.0);
        }

        let temporary = if table.temporary {
            "GLOBAL TEMPORARY "
        } else {
            ""
        };
        let on_commit = if table.temporary {
            " ON COMMIT PRESERVE ROWS"
        } else {
            ""
        };

        let mut statements = vec![
            format!(
                "CREATE {temporary}TABLE {quoted_table} (\n\t{},\n\tPRIMARY KEY (\"{ID_COLUMN}\")\n){on_commit}",
                columns.join(",\n\t")
            ),
            format!("CREATE SEQUENCE {quoted_sequence} START WITH 1 INCREMENT BY 1"),
            trigger_sql(&quoted_trigger, &quoted_table, &quoted_sequence),
        ];

        for index in &table.indexes {
            statements.push(self.create_index(&table.name, index)?);
        }

        Ok(CreateTablePlan {
            table: physical,
            statements,
        })
    }

    /// Generates the statements altering a table.
    ///
    /// Added columns go into one `ADD(...)` clause and altered columns into
    /// one `MODIFY(...)` clause of a single `ALTER TABLE`. Primary keys are
    /// only ever declared at creation time, so a trailing `PRIMARY KEY` on a
    /// column spec is stripped and reported. Index changes are reported,
    /// never executed.
    pub fn alter_table(&mut self, table: &str, alteration: &TableAlteration) -> Result<AlterPlan> {
        let quoted_table = self.ident(table)?;
        let mut plan = AlterPlan::default();

        let mut added = Vec::new();
        for field in &alteration.new_fields {
            let (definition, had_pk) = self.column_definition(field)?;
            if had_pk {
                plan.skipped.push(SkippedChange::PrimaryKey {
                    column: field.name.clone(),
                });
            }
            added.push(definition);
        }

        let mut modified = Vec::new();
        for field in &alteration.altered_fields {
            let (definition, had_pk) = self.column_definition(field)?;
            if had_pk {
                plan.skipped.push(SkippedChange::PrimaryKey {
                    column: field.name.clone(),
                });
            }
            modified.push(definition);
        }

        for index in &alteration.new_indexes {
            plan.skipped.push(SkippedChange::AddIndex {
                name: index.name.clone(),
                definition: self.index_definition(&index.name, &index.spec),
            });
        }
        for index in &alteration.altered_indexes {
            plan.skipped.push(SkippedChange::AlterIndex {
                name: index.name.clone(),
                definition: self.index_definition(&index.name, &index.spec),
            });
        }

        let mut alterations = String::new();
        if !added.is_empty() {
            alterations.push_str(&format!(" ADD({})", added.join(",\n")));
        }
        if !modified.is_empty() {
            alterations.push_str(&format!(" MODIFY({})", modified.join(",\n")));
        }
        if !alterations.is_empty() {
            plan.statements
                .push(format!("ALTER TABLE {quoted_table}{alterations}"));
        }

        if let Some(ref options) = alteration.options {
            plan.statements
                .push(format!("ALTER TABLE {quoted_table} {options}"));
        }

        Ok(plan)
    }

    /// Generates the statements dropping a table with its trigger and
    /// sequence, trigger first.
    pub fn drop_table(&mut self, table: &str) -> Result<Vec<String>> {
        let SequenceTrigger { sequence, trigger } = SequenceTrigger::for_table(table);
        Ok(vec![
            format!("DROP TRIGGER {}", self.ident(&trigger)?),
            format!("DROP SEQUENCE {}", self.ident(&sequence)?),
            format!("DROP TABLE {}", self.ident(table)?),
        ])
    }

    /// Generates `CREATE [UNIQUE] INDEX` for an index on `table`.
    ///
    /// The physical index name is `<table>_<index>`, since Oracle index names
    /// share one namespace per schema.
    pub fn create_index(&mut self, table: &str, index: &Index) -> Result<String> {
        let name = self.ident(&format!("{table}_{}", index.name))?;
        let quoted_table = self.ident(table)?;
        let columns = index
            .spec
            .column_names()
            .iter()
            .map(|c| self.ident(c))
            .collect::<Result<Vec<_>>>()?;
        let unique = if index.spec.is_unique() { "UNIQUE " } else { "" };
        Ok(format!(
            "CREATE {unique}INDEX {name} ON {quoted_table} ({})",
            columns.join(", ")
        ))
    }

    /// Rejects index alteration.
    pub fn alter_index(&mut self, table: &str, index: &Index) -> Result<String> {
        Err(OracleError::UnsupportedOperation(format!(
            "altering index on \"{table}\": {}",
            self.index_definition(&index.name, &index.spec)
        )))
    }

    /// Normalises an index spec into `<type> "<name>" (<cols>)`, or
    /// `index "<name>" using <type> (<cols>)` for btree and hash indexes.
    /// Whitespace is removed from the column list.
    #[must_use]
    pub fn index_definition(&self, name: &str, spec: &IndexSpec) -> String {
        let (kind, value) = match spec {
            IndexSpec::Columns(value) => (IndexKind::Index, value),
            IndexSpec::Typed { kind, value } => (*kind, value),
        };
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        let columns = if compact.starts_with('(') {
            compact
        } else {
            format!("({compact})")
        };
        let quoted = self.dialect.quote_identifier(name);
        match kind {
            IndexKind::Btree | IndexKind::Hash => {
                format!("index {quoted} using {} {columns}", kind.as_str())
            }
            IndexKind::Fulltext | IndexKind::Unique | IndexKind::Index => {
                format!("{} {quoted} {columns}", kind.as_str())
            }
        }
    }

    /// Generates `ALTER TABLE ... ADD` for a single column.
    pub fn create_field(&mut self, table: &str, field: &Field) -> Result<String> {
        let (definition, _) = self.column_definition(field)?;
        Ok(format!("ALTER TABLE {} ADD {definition}", self.ident(table)?))
    }

    /// Generates `ALTER TABLE ... MODIFY` for a single column.
    pub fn alter_field(&mut self, table: &str, field: &Field) -> Result<String> {
        let (definition, _) = self.column_definition(field)?;
        Ok(format!(
            "ALTER TABLE {} MODIFY ({definition})",
            self.ident(table)?
        ))
    }

    /// Generates a column rename.
    pub fn rename_field(&mut self, table: &str, old_name: &str, new_name: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.ident(table)?,
            self.ident(old_name)?,
            self.ident(new_name)?
        ))
    }

    /// Generates a table rename.
    pub fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.ident(old_name)?,
            self.ident(new_name)?
        ))
    }
}

/// Renders the `BEFORE INSERT` trigger emulating auto-increment.
///
/// A null `ID` takes the next sequence value. An explicit `ID` makes the
/// trigger draw from the sequence until it reaches
/// `GREATEST(MAX(ID), :new.ID)`, so the sequence never goes backwards and
/// never hands out a value already in use.
fn trigger_sql(trigger: &str, table: &str, sequence: &str) -> String {
    [
        format!("CREATE OR REPLACE TRIGGER {trigger}"),
        format!("BEFORE INSERT ON {table}"),
        "FOR EACH ROW".to_string(),
        "DECLARE".to_string(),
        "max_id NUMBER;".to_string(),
        "cur_seq NUMBER;".to_string(),
        "BEGIN".to_string(),
        format!("IF :new.\"{ID_COLUMN}\" IS NULL THEN"),
        format!("SELECT {sequence}.nextval INTO :new.\"{ID_COLUMN}\" FROM DUAL;"),
        "ELSE".to_string(),
        format!(
            "SELECT GREATEST(NVL(MAX(\"{ID_COLUMN}\"), 0), :new.\"{ID_COLUMN}\") INTO max_id FROM {table};"
        ),
        format!("SELECT {sequence}.nextval INTO cur_seq FROM DUAL;"),
        "WHILE cur_seq < max_id".to_string(),
        "LOOP".to_string(),
        format!("SELECT {sequence}.nextval INTO cur_seq FROM DUAL;"),
        "END LOOP;".to_string(),
        "END IF;".to_string(),
        "END;".to_string(),
    ]
    .join(" ")
}
