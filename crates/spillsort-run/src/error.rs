use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type local to spillsort-run.
pub type Result<T> = std::result::Result<T, RunError>;

#[derive(Debug, Error)]
pub enum RunError {
    /// The scratch directory or a run file in it could not be allocated.
    #[error("cannot allocate run file in {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("run io error during {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    /// End of stream reached before every written record was read back.
    #[error("run truncated: expected {expected} records, read {read}")]
    Truncated { expected: u64, read: u64 },

    #[error("compression '{0}' not compiled in; enable the `{0}` feature")]
    UnsupportedCompression(&'static str),
}

impl RunError {
    pub(crate) fn io(op: &'static str) -> impl FnOnce(io::Error) -> RunError {
        move |source| RunError::Io { op, source }
    }

    /// True for errors that mean the run's bytes are not what was written.
    pub fn is_corruption(&self) -> bool {
        matches!(self, RunError::Decode(_) | RunError::Truncated { .. })
    }
}
