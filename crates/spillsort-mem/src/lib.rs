#![forbid(unsafe_code)]
//! spillsort-mem: hard byte budget for in-memory sort batches.
//!
//! Concrete implementation of the `spillsort-core::budget` interfaces. The
//! run generator charges every buffered record to a guard; dropping the guard
//! (or spilling the batch) returns the bytes.

pub mod error;
pub mod guard;

pub use error::{Error, Result};
pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
