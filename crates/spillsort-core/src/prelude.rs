//! Convenient re-exports for downstream crates.

pub use crate::budget::{BudgetGuard, MemoryBudget};
pub use crate::compare::{compare_scalars, Comparator, Direction, KeyComparator, NullOrder, SortKey};
pub use crate::config::{Compression, MergeStrategy, SortConfig};
pub use crate::error::{Error, Result};
pub use crate::id::{IdSource, RandomIds, RunId, SequentialIds, SortId};
pub use crate::schema::{DataType, Field, FieldId, Schema};
pub use crate::types::{Record, Scalar};
