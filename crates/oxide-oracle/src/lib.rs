//! Oracle dialect layer.
//!
//! `oxide-oracle` sits between a model layer that speaks portable SQL and an
//! Oracle client binding. It papers over three Oracle peculiarities:
//!
//! - Identifiers are capped at 30 bytes. Longer logical names are mapped to
//!   short physical identifiers, persisted in a bookkeeping table, and
//!   recovered when results come back.
//! - There is no auto-increment column. Every table gets a sequence and a
//!   `BEFORE INSERT` trigger that assigns `ID` and never goes backwards.
//! - There is no `LIMIT`/`OFFSET`. Pagination is rewritten into nested
//!   queries filtering on `ROWNUM`.
//!
//! # Architecture
//!
//! - **Identifier** - [`IdentifierMapper`](identifier::IdentifierMapper) cache
//!   and the literal-aware rewrite pass over SQL text
//! - **Schema** - table, field and index descriptions, compiled to DDL by
//!   [`SchemaCompiler`](ddl::SchemaCompiler)
//! - **Query** - [`QueryDescriptor`](query::QueryDescriptor) compiled by
//!   [`QueryCompiler`](query::QueryCompiler)
//! - **Result** - [`RowNormalizer`](result::RowNormalizer) turning raw rows
//!   into [`Record`](result::Record)s keyed by logical names
//! - **Database** - [`OracleDatabase`](database::OracleDatabase), the session
//!   tying the above to a [`Driver`](driver::Driver)
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_oracle::prelude::*;
//!
//! let config = OracleConfig::from_file("oracle.json")?;
//! let mut db = OracleDatabase::<MyDriver>::connect(config)?;
//!
//! db.create_table(
//!     &TableDescriptor::new("SiteTree")
//!         .field("Title", ColumnType::Varchar(255))
//!         .field("Status", ColumnType::enumeration(["Draft", "Live"], Some("Draft")))
//!         .index("Title", IndexSpec::columns("Title")),
//! )?;
//!
//! let query = QueryDescriptor::select(["\"ID\"", "\"Title\""])
//!     .from("\"SiteTree\"")
//!     .order_by("Title")
//!     .limit("20, 10".parse()?);
//! let sql = db.compile_select(&query)?;
//! for record in db.records(&sql)? {
//!     println!("{:?}", record.get("Title"));
//! }
//! ```

pub mod config;
pub mod database;
pub mod ddl;
pub mod dialect;
pub mod driver;
pub mod enums;
pub mod error;
pub mod identifier;
pub mod query;
pub mod result;
pub mod schema;
pub mod value;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::OracleConfig;
    pub use crate::database::OracleDatabase;
    pub use crate::ddl::{AlterPlan, CreateTablePlan, SchemaCompiler, SkippedChange};
    pub use crate::dialect::{Dialect, OracleDialect};
    pub use crate::driver::{Driver, DriverError, RawRow, RowCursor};
    pub use crate::enums::EnumRegistry;
    pub use crate::error::{OracleError, Result};
    pub use crate::identifier::{rewrite_identifiers, IdentifierMapper, IdentifierMapping};
    pub use crate::query::{Connective, Limit, QueryCompiler, QueryDescriptor, QueryKind};
    pub use crate::result::{CoalescePolicy, Record, ResultSet, RowNormalizer};
    pub use crate::schema::{
        ColumnType, Field, Index, IndexKind, IndexSpec, SequenceTrigger, TableAlteration,
        TableDescriptor,
    };
    pub use crate::value::Value;
}
