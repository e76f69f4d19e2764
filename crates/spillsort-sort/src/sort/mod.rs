pub mod external;
pub mod merge;
pub(crate) mod run;

pub use external::{sort, ExternalSorter};
pub use merge::{KWayMerger, MergeState};
pub use run::SortStats;
