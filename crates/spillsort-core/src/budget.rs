//! Abstract memory budget interfaces.
//!
//! The concrete implementation lives in `spillsort-mem`. Only the traits are
//! here so the sort crate can be written against the API.

/// Bytes charged against a budget. Dropping the guard gives them back.
pub trait BudgetGuard: Send {
    fn bytes(&self) -> usize;

    /// Try to account `additional` more bytes on this guard.
    /// Returns `false` and leaves the guard unchanged if the budget is full.
    fn try_grow(&mut self, additional: usize) -> bool;

    /// Return every byte held by this guard to the budget, keeping the guard.
    fn release_all(&mut self);
}

/// A handle representing a memory-cap enforcer.
///
/// The run generator charges each buffered record before keeping it. When
/// a charge is refused, it must spill the batch it holds and retry.
pub trait MemoryBudget: Send + Sync {
    type Guard: BudgetGuard;

    /// Reserve `bytes` up front. `None` if that would pass the cap; a zero
    /// reservation always succeeds and yields an empty guard to grow later.
    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard>;

    fn capacity_bytes(&self) -> usize;

    /// Bytes held by live guards right now.
    fn used_bytes(&self) -> usize;
}
