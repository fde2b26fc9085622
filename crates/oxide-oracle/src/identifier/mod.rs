//! Identifier remapping.
//!
//! Oracle caps identifiers at 30 bytes. Logical names coming from the model
//! layer have no such limit, so every over-length name is mapped to a short,
//! collision-free physical identifier. Mappings are created lazily, persisted
//! in a bookkeeping table, and never updated or removed afterwards.
//!
//! - [`IdentifierMapper`] is the cache of known mappings and generates new ones.
//! - [`Scanner`] splits SQL text into literal, quoted-identifier, comment and
//!   plain spans so that rewriting never touches string literals.
//! - [`rewrite_identifiers`] replaces over-length quoted identifiers in a
//!   statement with their physical names.

mod lexer;
mod mapper;
mod rewrite;

pub use lexer::{Scanner, Segment, SegmentKind, Span};
pub use mapper::{IdentifierMapper, IdentifierMapping};
pub use rewrite::rewrite_identifiers;

/// Longest identifier Oracle accepts, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 30;

/// Length of the logical-name prefix kept when synthesising a short name.
pub(crate) const PREFIX_LEN: usize = 26;

/// Returns the longest prefix of `s` that is at most `max` bytes and ends on
/// a character boundary.
pub(crate) fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
