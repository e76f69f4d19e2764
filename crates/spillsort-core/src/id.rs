//! Strongly-typed identifiers and injectable id sources.
//!
//! There is no process-global counter: whoever builds a sorter hands it an
//! `IdSource`, so tests and replays can pin ids down.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! new_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

new_id!(SortId, "sort");
new_id!(RunId, "run");

/// Source of unique ids for sort sessions.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> u64;
}

/// Monotonic counter owned by whoever constructed it.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Random ids from UUID v4; safe when several processes share a scratch dir.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> u64 {
        uuid::Uuid::new_v4().as_u64_pair().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::starting_at(7);
        assert_eq!(ids.next_id(), 7);
        assert_eq!(ids.next_id(), 8);
    }

    #[test]
    fn display_uses_prefix() {
        assert_eq!(SortId::new(3).to_string(), "sort3");
        assert_eq!(RunId::new(0).to_string(), "run0");
    }

    #[test]
    fn random_ids_differ() {
        let ids = RandomIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
