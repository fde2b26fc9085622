//! Oracle dialect implementation.

use super::Dialect;
use crate::identifier::MAX_IDENTIFIER_LEN;

/// Oracle dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDialect;

impl OracleDialect {
    /// Creates a new Oracle dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn supports_limit_offset(&self) -> bool {
        false // pagination goes through ROWNUM
    }

    fn supports_auto_increment(&self) -> bool {
        false // emulated with a sequence and a trigger
    }

    fn max_identifier_len(&self) -> Option<usize> {
        Some(MAX_IDENTIFIER_LEN)
    }

    fn now(&self) -> &'static str {
        "SYSDATE"
    }

    fn random(&self) -> &'static str {
        "DBMS_RANDOM.VALUE"
    }
}
