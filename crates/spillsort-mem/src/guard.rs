//! MemoryBudget + RAII guard implementations.
//!
//! A guard starts at some byte count and can grow record by record. Growth
//! either fits under the cap or is refused without side effects. Dropping
//! the guard (or calling `release_all`) returns its bytes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use spillsort_core::budget::{BudgetGuard, MemoryBudget};

use crate::error::{Error, Result};

struct BudgetInner {
    capacity: usize,
    used: AtomicUsize,
    peak: AtomicUsize,
}

impl BudgetInner {
    fn try_reserve(&self, bytes: usize) -> bool {
        let mut cur = self.used.load(Ordering::Relaxed);
        loop {
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return false;
            }
            match self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::Relaxed);
                    return true;
                }
                Err(observed) => cur = observed,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Shared byte budget. Cloning shares the same accounting.
#[derive(Clone)]
pub struct MemoryBudgetImpl {
    inner: Arc<BudgetInner>,
}

impl MemoryBudgetImpl {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(BudgetInner {
                capacity: capacity_bytes,
                used: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Highest `used_bytes` observed since creation.
    pub fn peak_bytes(&self) -> usize {
        self.inner.peak.load(Ordering::Relaxed)
    }

    /// Like `try_acquire`, with the refusal spelled out as an error.
    pub fn acquire(&self, bytes: usize, tag: &'static str) -> Result<BudgetGuardImpl> {
        self.try_acquire(bytes, tag)
            .ok_or_else(|| Error::BudgetExceeded {
                tag,
                requested: bytes,
                capacity: self.inner.capacity,
                used: self.used_bytes(),
            })
    }
}

impl MemoryBudget for MemoryBudgetImpl {
    type Guard = BudgetGuardImpl;

    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard> {
        if bytes > 0 && !self.inner.try_reserve(bytes) {
            return None;
        }
        Some(BudgetGuardImpl {
            inner: Arc::clone(&self.inner),
            bytes,
            tag,
        })
    }

    fn capacity_bytes(&self) -> usize {
        self.inner.capacity
    }

    fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }
}

/// RAII guard that accounts for a number of bytes.
pub struct BudgetGuardImpl {
    inner: Arc<BudgetInner>,
    bytes: usize,
    tag: &'static str,
}

impl BudgetGuardImpl {
    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl BudgetGuard for BudgetGuardImpl {
    fn bytes(&self) -> usize {
        self.bytes
    }

    fn try_grow(&mut self, additional: usize) -> bool {
        if additional == 0 {
            return true;
        }
        if self.inner.try_reserve(additional) {
            self.bytes += additional;
            true
        } else {
            false
        }
    }

    fn release_all(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            self.bytes = 0;
        }
    }
}

impl Drop for BudgetGuardImpl {
    fn drop(&mut self) {
        // NOTE: do not log here to keep drop path fast.
        self.release_all();
    }
}
