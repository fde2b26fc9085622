//! Error types for the Oracle dialect layer.

/// Errors that can occur while compiling or executing statements.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The driver could not establish or initialise a session.
    #[error("Couldn't connect to Oracle database: {0}")]
    ConnectionFailure(String),

    /// A statement was rejected by the driver.
    #[error("Couldn't run query: {sql} | {message}")]
    StatementFailure {
        /// The statement text as handed to the driver.
        sql: String,
        /// Driver error message.
        message: String,
    },

    /// The collision probe ran out of candidate identifiers.
    #[error("No free identifier for '{name}' after {attempts} attempts")]
    IdentifierExhausted {
        /// The logical name being shortened.
        name: String,
        /// Number of candidates probed.
        attempts: u32,
    },

    /// The operation has no Oracle counterpart in this layer.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A limit descriptor was not numeric.
    #[error("Malformed pagination: {0}")]
    MalformedPagination(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error (reading configuration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OracleError {
    /// Builds a statement failure from the SQL text and a driver error.
    pub fn statement(sql: impl Into<String>, err: &crate::driver::DriverError) -> Self {
        Self::StatementFailure {
            sql: sql.into(),
            message: err.to_string(),
        }
    }
}

/// Result type for Oracle dialect operations.
pub type Result<T> = std::result::Result<T, OracleError>;
