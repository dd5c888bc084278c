//! Identifier generation.
//!
//! ## Learning: Newtypes over Raw Integers
//!
//! Areas and sections are both addressed by plain integers in the JSON
//! interchange format, but mixing them up in code would be a silent bug.
//! `AreaId` and `SectionId` wrap the same `u64` space and are handed out by
//! one shared [`IdGenerator`], so an id is unique across the whole editor,
//! not just within its own kind.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of an [`Area`](crate::Area).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub u64);

/// Identifier of a [`Section`](crate::Section).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub u64);

impl std::fmt::Display for AreaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source owned by one editor instance.
///
/// Ids are never recycled: removing a section does not give its ids back.
/// When a value is loaded from outside, call [`IdGenerator::reserve_through`]
/// with the largest id it contains so fresh ids cannot collide with it.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Creates a generator whose first id is `1`.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a generator whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns a fresh area id.
    pub fn area(&self) -> AreaId {
        AreaId(self.next_raw())
    }

    /// Returns a fresh section id.
    pub fn section(&self) -> SectionId {
        SectionId(self.next_raw())
    }

    /// Guarantees every later id is greater than `id`.
    pub fn reserve_through(&self, id: u64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }

    /// Returns the id the next call will hand out.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_shared_between_kinds() {
        let ids = IdGenerator::new();
        let a = ids.area();
        let s = ids.section();
        let b = ids.area();
        assert_ne!(a.0, s.0);
        assert_ne!(s.0, b.0);
        assert!(b.0 > a.0);
    }

    #[test]
    fn test_reserve_skips_loaded_ids() {
        let ids = IdGenerator::new();
        ids.reserve_through(41);
        assert_eq!(ids.area(), AreaId(42));

        // Reserving below the current position never rewinds.
        ids.reserve_through(3);
        assert_eq!(ids.section(), SectionId(43));
    }

    #[test]
    fn test_no_duplicates() {
        let ids = IdGenerator::new();
        let seen: HashSet<u64> = (0..1000).map(|_| ids.area().0).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_id_serializes_as_number() {
        let json = serde_json::to_string(&AreaId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
