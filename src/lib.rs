#![forbid(unsafe_code)]
//! spillsort: external merge sort for record streams larger than memory.
//!
//! Records are buffered into batches, each batch is sorted and spilled as a
//! run file, and the runs are merged lazily as the caller pulls from the
//! returned [`SortedStream`]. Run files are deleted as soon as they are
//! exhausted, on error, or when the stream is dropped.
//!
//! The member crates are re-exported whole; the most common items are also
//! available at the top level.

pub use spillsort_core;
pub use spillsort_mem;
pub use spillsort_run;
pub use spillsort_sort;

pub use spillsort_core::prelude::*;
pub use spillsort_mem::MemoryBudgetImpl;
pub use spillsort_run::{BinaryCodec, JsonCodec, RecordCodec, RunError};
pub use spillsort_sort::{sort, ExternalSorter, MergeState, SortError, SortStats, SortedStream};
