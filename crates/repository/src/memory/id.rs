//! Identifier generation for store-assigned ids.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Produces candidate ids for resources created without one.
///
/// Candidates need not be unique; the store retries on collision.
pub trait IdGenerator: Send + Sync {
    /// Returns the next candidate id.
    fn next_id(&self) -> String;
}

/// Random UUID v4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Sequential numeric ids starting at a given value.
///
/// Useful for fixtures that need stable ids across runs.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    /// Creates a generator whose first id is `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl IdGenerator for SequenceGenerator {
    fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_differ() {
        let generator = UuidGenerator;
        assert_ne!(generator.next_id(), generator.next_id());
    }

    #[test]
    fn test_sequence() {
        let generator = SequenceGenerator::starting_at(5);
        assert_eq!(generator.next_id(), "5");
        assert_eq!(generator.next_id(), "6");
    }
}
