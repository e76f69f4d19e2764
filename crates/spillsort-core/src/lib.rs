#![forbid(unsafe_code)]
//! spillsort-core: shared vocabulary for the external sort.
//!
//! Pure data and traits only. No IO lives here: the run crate owns files,
//! the mem crate owns budget accounting, the sort crate owns the merge.

pub mod budget;
pub mod compare;
pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
