use spillsort_run::RunError;
use thiserror::Error;

/// Result type local to spillsort-sort.
pub type Result<T> = std::result::Result<T, SortError>;

#[derive(Debug, Error)]
pub enum SortError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error("invalid sort setup: {0}")]
    Core(#[from] spillsort_core::Error),

    /// The memory budget refused a batch guard, or one record is larger
    /// than the whole budget.
    #[error(transparent)]
    Budget(#[from] spillsort_mem::Error),

    /// The caller's input iterator yielded an error.
    #[error("input error: {0}")]
    Input(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("no more elements")]
    NoMoreElements,

    /// An earlier error ended the merge; the stream yields nothing further.
    #[error("sort aborted by an earlier error")]
    Aborted,
}

impl SortError {
    /// True for errors that mean a run on disk no longer matches what was written.
    pub fn is_corruption(&self) -> bool {
        matches!(self, SortError::Run(e) if e.is_corruption())
    }
}
