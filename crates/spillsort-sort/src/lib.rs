#![forbid(unsafe_code)]
//! spillsort-sort: external merge sort over spilled runs.
//!
//! - `sort::run`: batch records and spill them as sorted runs
//! - `sort::merge`: k-way merge with a linear or heap frontier
//! - `sort::external`: `ExternalSorter` wires the two together
//! - `stream`: `SortedStream`, the pull-based result
//!
//! Synchronous and single-threaded. Memory is bounded by one batch plus one
//! buffered record (and IO buffer) per open run.

pub mod error;
pub mod sort;
pub mod stream;

pub use error::{Result, SortError};
pub use sort::{sort, ExternalSorter, KWayMerger, MergeState, SortStats};
pub use stream::SortedStream;
