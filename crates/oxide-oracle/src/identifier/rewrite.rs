//! Identifier rewriting over raw SQL text.

use super::lexer::{Scanner, SegmentKind};
use super::mapper::IdentifierMapper;
use super::MAX_IDENTIFIER_LEN;
use crate::error::Result;

/// Replaces every over-length double-quoted identifier in `sql` with its
/// physical name.
///
/// Only identifiers made of word characters are considered. String literals
/// and comments are copied through untouched, so a literal that happens to
/// spell a long column name is never altered.
pub fn rewrite_identifiers(sql: &str, mapper: &mut IdentifierMapper) -> Result<String> {
    let mut out = String::with_capacity(sql.len());
    for segment in Scanner::new(sql) {
        let text = segment.text(sql);
        if segment.kind == SegmentKind::QuotedIdentifier {
            let name = segment.identifier(sql).unwrap_or_default();
            if is_remappable(&name) {
                let physical = mapper.shorten(&name)?;
                out.push('"');
                out.push_str(&physical);
                out.push('"');
                continue;
            }
        }
        out.push_str(text);
    }
    Ok(out)
}

fn is_remappable(name: &str) -> bool {
    name.len() > MAX_IDENTIFIER_LEN && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
