//! Schema representation types.
//!
//! These types describe tables as the model layer knows them: logical names,
//! a closed set of column types, and index specifications. The
//! [`SchemaCompiler`](crate::ddl::SchemaCompiler) turns them into Oracle DDL.

use serde::{Deserialize, Serialize};

/// Name of the primary key column every table carries.
pub const ID_COLUMN: &str = "ID";

/// Column types supported by the dialect.
///
/// Each variant renders to exactly one Oracle column specification; see
/// [`ColumnType::to_sql`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Boolean stored as `CHAR(1)` holding `0`/`1`.
    Boolean {
        /// Default value.
        default: bool,
    },
    /// Date only.
    Date,
    /// Fixed-point number.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
        /// Default value.
        default: Option<f64>,
    },
    /// Enumerated text; the permitted values are kept in the enum table.
    Enum {
        /// Permitted values.
        values: Vec<String>,
        /// Default value.
        default: Option<String>,
    },
    /// Floating point.
    Float {
        /// Default value.
        default: f64,
    },
    /// Integer.
    Int {
        /// Default value.
        default: i64,
    },
    /// Date and time.
    DateTime,
    /// Time of day (stored as a timestamp).
    Time,
    /// Long text.
    Text,
    /// Variable-length text with a maximum length.
    Varchar(u16),
    /// Calendar year.
    Year,
    /// Primary key column.
    Id,
    /// A column specification passed through verbatim.
    Raw(String),
}

impl ColumnType {
    /// Creates a decimal type with the default precision of `NUMBER(11,1)`.
    #[must_use]
    pub const fn decimal() -> Self {
        Self::Decimal {
            precision: 11,
            scale: 1,
            default: None,
        }
    }

    /// Creates an enum type.
    #[must_use]
    pub fn enumeration<I, S>(values: I, default: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            values: values.into_iter().map(Into::into).collect(),
            default: default.map(str::to_string),
        }
    }

    /// Returns the Oracle column specification.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Boolean { default } => format!("CHAR(1) DEFAULT {}", u8::from(*default)),
            Self::Date => "DATE".to_string(),
            Self::Decimal {
                precision,
                scale,
                default,
            } => {
                let mut sql = format!("NUMBER({precision},{scale})");
                if let Some(d) = default {
                    sql.push_str(&format!(" DEFAULT {d}"));
                }
                sql.push_str(" NOT NULL");
                sql
            }
            Self::Enum { default, .. } => format!(
                "VARCHAR2(2000) DEFAULT '{}'",
                default.as_deref().unwrap_or_default().replace('\'', "''")
            ),
            Self::Float { default } => format!("FLOAT DEFAULT {default} NOT NULL"),
            Self::Int { default } => format!("NUMBER(11) DEFAULT {default} NOT NULL"),
            Self::DateTime | Self::Time => "TIMESTAMP".to_string(),
            Self::Text => "VARCHAR2(4000)".to_string(),
            Self::Varchar(len) => format!("VARCHAR2({len})"),
            Self::Year => "NUMBER".to_string(),
            Self::Id => "NUMBER(11) NOT NULL".to_string(),
            Self::Raw(spec) => spec.clone(),
        }
    }

    /// Returns the enum values if this is an enum type.
    #[must_use]
    pub fn enum_values(&self) -> Option<&[String]> {
        match self {
            Self::Enum { values, .. } => Some(values),
            _ => None,
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Logical column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
}

impl Field {
    /// Creates a new field.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Kind of a structured index specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Full-text index.
    Fulltext,
    /// Unique index.
    Unique,
    /// B-tree index (`using btree`).
    Btree,
    /// Hash index (`using hash`).
    Hash,
    /// Plain index.
    Index,
}

impl IndexKind {
    /// Returns the keyword used in index definitions.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fulltext => "fulltext",
            Self::Unique => "unique",
            Self::Btree => "btree",
            Self::Hash => "hash",
            Self::Index => "index",
        }
    }
}

/// An index specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexSpec {
    /// A plain column list, e.g. `"ParentID, Sort"` or `"(ParentID)"`.
    Columns(String),
    /// A typed column list.
    Typed {
        /// Index kind.
        kind: IndexKind,
        /// Column list.
        value: String,
    },
}

impl IndexSpec {
    /// Creates a plain index spec.
    #[must_use]
    pub fn columns(value: impl Into<String>) -> Self {
        Self::Columns(value.into())
    }

    /// Creates a typed index spec.
    #[must_use]
    pub fn typed(kind: IndexKind, value: impl Into<String>) -> Self {
        Self::Typed {
            kind,
            value: value.into(),
        }
    }

    /// Returns the column names referenced by the spec, in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        let value = match self {
            Self::Columns(v) | Self::Typed { value: v, .. } => v,
        };
        value
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Returns true for unique indexes.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        matches!(
            self,
            Self::Typed {
                kind: IndexKind::Unique,
                ..
            }
        )
    }
}

/// A named index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Logical index name.
    pub name: String,
    /// Specification.
    pub spec: IndexSpec,
}

impl Index {
    /// Creates a new index.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: IndexSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// The sequence and trigger emulating an auto-increment `ID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceTrigger {
    /// Logical sequence name.
    pub sequence: String,
    /// Logical trigger name.
    pub trigger: String,
}

impl SequenceTrigger {
    /// Derives the pair for a table.
    #[must_use]
    pub fn for_table(table: &str) -> Self {
        Self {
            sequence: format!("{table}_sequence"),
            trigger: format!("{table}_trigger"),
        }
    }
}

/// Complete description of a table to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Logical table name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// Index definitions.
    pub indexes: Vec<Index>,
    /// Whether to create a global temporary table.
    pub temporary: bool,
}

impl TableDescriptor {
    /// Creates a new empty table descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            indexes: Vec::new(),
            temporary: false,
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.fields.push(Field::new(name, column_type));
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>, spec: IndexSpec) -> Self {
        self.indexes.push(Index::new(name, spec));
        self
    }

    /// Marks the table as a global temporary table.
    #[must_use]
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// Gets a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the sequence/trigger pair backing the `ID` column.
    #[must_use]
    pub fn sequence_trigger(&self) -> SequenceTrigger {
        SequenceTrigger::for_table(&self.name)
    }
}

/// Changes to apply to an existing table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableAlteration {
    /// Columns to add.
    pub new_fields: Vec<Field>,
    /// Columns to modify.
    pub altered_fields: Vec<Field>,
    /// Indexes to add.
    pub new_indexes: Vec<Index>,
    /// Indexes to change.
    pub altered_indexes: Vec<Index>,
    /// Raw table options appended to an `ALTER TABLE`.
    pub options: Option<String>,
}

impl TableAlteration {
    /// Creates an empty alteration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column.
    #[must_use]
    pub fn add_field(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.new_fields.push(Field::new(name, column_type));
        self
    }

    /// Modifies a column.
    #[must_use]
    pub fn alter_field(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.altered_fields.push(Field::new(name, column_type));
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn add_index(mut self, name: impl Into<String>, spec: IndexSpec) -> Self {
        self.new_indexes.push(Index::new(name, spec));
        self
    }

    /// Changes an index.
    #[must_use]
    pub fn alter_index(mut self, name: impl Into<String>, spec: IndexSpec) -> Self {
        self.altered_indexes.push(Index::new(name, spec));
        self
    }

    /// Sets raw table options.
    #[must_use]
    pub fn options(mut self, options: impl Into<String>) -> Self {
        self.options = Some(options.into());
        self
    }

    /// Returns true if nothing is to be changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_fields.is_empty()
            && self.altered_fields.is_empty()
            && self.new_indexes.is_empty()
            && self.altered_indexes.is_empty()
            && self.options.is_none()
    }
}
