//! The long-name mapping cache.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{truncate_bytes, MAX_IDENTIFIER_LEN, PREFIX_LEN};
use crate::config::DEFAULT_MAX_PROBES;
use crate::error::{OracleError, Result};

/// A persisted `{logical name, physical identifier}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentifierMapping {
    /// Name as known to the model layer.
    pub logical: String,
    /// Name as it appears in emitted SQL.
    pub physical: String,
}

impl IdentifierMapping {
    /// Creates a new mapping.
    #[must_use]
    pub fn new(logical: impl Into<String>, physical: impl Into<String>) -> Self {
        Self {
            logical: logical.into(),
            physical: physical.into(),
        }
    }
}

/// Cache of logical-to-physical identifier mappings.
///
/// The mapper is owned by a session and handed to the compilers by
/// reference. It performs no I/O: mappings created by [`shorten`] are queued
/// in [`pending`] and the owner persists them before any statement using them
/// is executed. [`reload`] replaces the cache with the persisted state.
///
/// The collision probe and the queueing are not atomic with respect to other
/// processes. Schema changes introducing new long names must be serialised by
/// the caller.
///
/// [`shorten`]: IdentifierMapper::shorten
/// [`pending`]: IdentifierMapper::pending
/// [`reload`]: IdentifierMapper::reload
#[derive(Debug, Clone)]
pub struct IdentifierMapper {
    /// logical -> physical.
    forward: HashMap<String, String>,
    /// physical -> logical.
    reverse: HashMap<String, String>,
    /// Upper-cased logical and physical names already claimed.
    claimed: HashSet<String>,
    /// Mappings created since the last confirmation, oldest first.
    pending: Vec<IdentifierMapping>,
    max_probes: u32,
    loaded: bool,
}

impl Default for IdentifierMapper {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROBES)
    }
}

impl IdentifierMapper {
    /// Creates an empty, not yet loaded mapper.
    #[must_use]
    pub fn new(max_probes: u32) -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            claimed: HashSet::new(),
            pending: Vec::new(),
            max_probes,
            loaded: false,
        }
    }

    /// Returns whether the cache has been hydrated from persisted state.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replaces the cache with the given persisted mappings.
    ///
    /// Pending mappings that were never confirmed are discarded.
    pub fn reload(&mut self, mappings: impl IntoIterator<Item = IdentifierMapping>) {
        self.forward.clear();
        self.reverse.clear();
        self.claimed.clear();
        self.pending.clear();
        for mapping in mappings {
            self.insert(mapping);
        }
        self.loaded = true;
        debug!(mappings = self.forward.len(), "Identifier mappings loaded");
    }

    /// Forgets all cached state so the next use reloads it.
    pub fn invalidate(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.claimed.clear();
        self.pending.clear();
        self.loaded = false;
    }

    fn insert(&mut self, mapping: IdentifierMapping) {
        self.claimed.insert(mapping.logical.to_uppercase());
        self.claimed.insert(mapping.physical.to_uppercase());
        self.reverse
            .insert(mapping.physical.clone(), mapping.logical.clone());
        self.forward.insert(mapping.logical, mapping.physical);
    }

    /// Returns the physical identifier for a logical name.
    ///
    /// Names within the length limit map to themselves. Longer names reuse an
    /// existing mapping or get a new one, which is queued for persistence.
    pub fn shorten(&mut self, name: &str) -> Result<String> {
        if let Some(physical) = self.forward.get(name) {
            return Ok(physical.clone());
        }
        if name.len() <= MAX_IDENTIFIER_LEN {
            return Ok(name.to_string());
        }

        for attempt in 1..=self.max_probes {
            let Some(candidate) = candidate(name, attempt) else {
                break;
            };
            if self.claimed.contains(&candidate.to_uppercase()) {
                continue;
            }
            debug!(logical = %name, physical = %candidate, attempt, "Created identifier mapping");
            let mapping = IdentifierMapping::new(name, candidate.clone());
            self.pending.push(mapping.clone());
            self.insert(mapping);
            return Ok(candidate);
        }

        Err(OracleError::IdentifierExhausted {
            name: name.to_string(),
            attempts: self.max_probes,
        })
    }

    /// Returns the logical name for a physical identifier, or the input
    /// unchanged when it was never shortened.
    #[must_use]
    pub fn recover<'a>(&'a self, physical: &'a str) -> &'a str {
        self.reverse.get(physical).map_or(physical, String::as_str)
    }

    /// Returns the existing mapping for a logical name without creating one.
    #[must_use]
    pub fn lookup(&self, logical: &str) -> Option<&str> {
        self.forward.get(logical).map(String::as_str)
    }

    /// Mappings not yet persisted, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[IdentifierMapping] {
        &self.pending
    }

    /// Marks the oldest pending mapping as persisted.
    pub fn confirm_oldest(&mut self) -> Option<IdentifierMapping> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    /// Removes every pending mapping from the cache, as if it had never been
    /// created, and returns them. Used when persisting fails, so the names
    /// are probed afresh on next use.
    pub fn discard_pending(&mut self) -> Vec<IdentifierMapping> {
        let discarded = std::mem::take(&mut self.pending);
        for mapping in &discarded {
            self.forward.remove(&mapping.logical);
            self.reverse.remove(&mapping.physical);
        }
        self.claimed = self
            .forward
            .iter()
            .flat_map(|(logical, physical)| [logical.to_uppercase(), physical.to_uppercase()])
            .collect();
        discarded
    }

    /// Number of known mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns true if no mappings are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Builds the `attempt`-th candidate for `name`.
///
/// The first 26 bytes of the name are padded with `_000` and the tail is
/// overwritten by the attempt number, so attempt 1 yields `<prefix>_001` and
/// attempt 12345 eats into the prefix. Returns `None` once the number alone
/// would not fit.
fn candidate(name: &str, attempt: u32) -> Option<String> {
    let suffix = attempt.to_string();
    if suffix.len() >= MAX_IDENTIFIER_LEN {
        return None;
    }
    let base = format!("{}_000", truncate_bytes(name, PREFIX_LEN));
    let keep = base.len().checked_sub(suffix.len())?;
    Some(format!("{}{suffix}", truncate_bytes(&base, keep)))
}
