use std::io;
use std::path::PathBuf;

use spillsort_sort::SortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] spillsort_core::Error),

    #[error(transparent)]
    Sort(#[from] SortError),

    #[error("line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: spillsort_core::Error,
    },

    #[error("{} does not match the first input's schema: expected {expected}, found {found}", path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("line {line} sorts before line {previous}")]
    Unsorted { line: u64, previous: u64 },

    #[error("{0}")]
    Usage(String),
}
