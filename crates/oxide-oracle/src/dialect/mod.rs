//! Engine capabilities the compilers consult.
//!
//! The defaults describe a permissive engine; [`OracleDialect`] overrides
//! the capabilities Oracle lacks.

mod oracle;

pub use oracle::OracleDialect;

/// Quoting rules and capabilities of a SQL engine.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the string escape sequence for a single quote.
    fn string_escape(&self) -> &'static str {
        "''"
    }

    /// Returns whether the dialect supports LIMIT with OFFSET.
    fn supports_limit_offset(&self) -> bool {
        true
    }

    /// Returns whether the dialect has a native auto-increment column.
    fn supports_auto_increment(&self) -> bool {
        true
    }

    /// Returns the longest identifier the engine accepts, in bytes.
    fn max_identifier_len(&self) -> Option<usize> {
        None
    }

    /// Returns the expression for the current date and time.
    fn now(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Returns the expression for a random value.
    fn random(&self) -> &'static str {
        "RANDOM()"
    }

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        format!("{quote}{name}{quote}")
    }

    /// Escapes text for use inside a single-quoted literal.
    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', self.string_escape())
    }
}
