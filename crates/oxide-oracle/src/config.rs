//! Session configuration.
//!
//! Configuration is plain data: connection parameters handed to the driver,
//! the names of the two bookkeeping tables, and a handful of behavioural
//! switches. Every field except the connection parameters has a default, so
//! a minimal JSON document only needs `server`, `username`, `password` and
//! `database`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::identifier::MAX_IDENTIFIER_LEN;
use crate::result::CoalescePolicy;

/// Default name of the identifier mapping table.
pub const DEFAULT_MAPPING_TABLE: &str = "_IDENTIFIER_MAPPING";

/// Default name of the enum emulation table.
pub const DEFAULT_ENUM_TABLE: &str = "_ORACLE_ENUMS";

/// Default bound on the identifier collision probe.
pub const DEFAULT_MAX_PROBES: u32 = 9_999;

/// Configuration for an [`OracleDatabase`](crate::database::OracleDatabase) session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Connect string of the server, e.g. `localhost/XE`.
    pub server: String,
    /// User to log on with.
    pub username: String,
    /// Password to log on with.
    pub password: String,
    /// Logical database (schema) name.
    pub database: String,
    /// Session time zone offset, e.g. `+12:00`.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Table holding long-name mappings.
    #[serde(default = "default_mapping_table")]
    pub mapping_table: String,
    /// Table holding emulated enum value lists.
    #[serde(default = "default_enum_table")]
    pub enum_table: String,
    /// Upper bound on candidates tried when shortening a name.
    #[serde(default = "default_max_probes")]
    pub max_probes: u32,
    /// Log data-modifying statements instead of executing them.
    #[serde(default)]
    pub preview_writes: bool,
    /// `NLS_DATE_FORMAT` for the session.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// `NLS_TIMESTAMP_FORMAT` for the session.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// How duplicate columns in a result row are merged.
    #[serde(default)]
    pub coalesce: CoalescePolicy,
}

fn default_mapping_table() -> String {
    DEFAULT_MAPPING_TABLE.to_string()
}

fn default_enum_table() -> String {
    DEFAULT_ENUM_TABLE.to_string()
}

const fn default_max_probes() -> u32 {
    DEFAULT_MAX_PROBES
}

fn default_date_format() -> String {
    "YYYY-MM-DD".to_string()
}

fn default_timestamp_format() -> String {
    "YYYY-MM-DD HH24:MI:SS".to_string()
}

impl OracleConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            username: username.into(),
            password: password.into(),
            database: database.into(),
            timezone: None,
            mapping_table: default_mapping_table(),
            enum_table: default_enum_table(),
            max_probes: DEFAULT_MAX_PROBES,
            preview_writes: false,
            date_format: default_date_format(),
            timestamp_format: default_timestamp_format(),
            coalesce: CoalescePolicy::default(),
        }
    }

    /// Sets the session time zone.
    #[must_use]
    pub fn timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    /// Enables or disables write preview.
    #[must_use]
    pub fn preview_writes(mut self, enabled: bool) -> Self {
        self.preview_writes = enabled;
        self
    }

    /// Sets the result coalescing policy.
    #[must_use]
    pub fn coalesce(mut self, policy: CoalescePolicy) -> Self {
        self.coalesce = policy;
        self
    }

    /// Sets the collision probe bound.
    #[must_use]
    pub fn max_probes(mut self, bound: u32) -> Self {
        self.max_probes = bound;
        self
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Checks the configuration for values the session cannot work with.
    ///
    /// The bookkeeping tables are never remapped, so their names must already
    /// fit the identifier limit.
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(OracleError::Config("database name is empty".into()));
        }
        for table in [&self.mapping_table, &self.enum_table] {
            if table.is_empty() || table.len() > MAX_IDENTIFIER_LEN {
                return Err(OracleError::Config(format!(
                    "bookkeeping table name '{table}' must be 1 to {MAX_IDENTIFIER_LEN} bytes"
                )));
            }
        }
        if self.max_probes == 0 {
            return Err(OracleError::Config("max_probes must be positive".into()));
        }
        Ok(())
    }

    /// Statements run once when a session is opened.
    #[must_use]
    pub fn session_statements(&self) -> Vec<String> {
        let mut statements = vec![
            format!(
                "ALTER SESSION SET NLS_DATE_FORMAT = '{}'",
                self.date_format.replace('\'', "''")
            ),
            format!(
                "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = '{}'",
                self.timestamp_format.replace('\'', "''")
            ),
        ];
        if let Some(ref tz) = self.timezone {
            statements.push(format!(
                "ALTER SESSION SET TIME_ZONE = '{}'",
                tz.replace('\'', "''")
            ));
        }
        statements
    }
}
