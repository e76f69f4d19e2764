#![forbid(unsafe_code)]
//! spillsort-run: sorted runs on disk.
//!
//! - `codec`: record <-> bytes (`RecordCodec`, `BinaryCodec`, `JsonCodec`)
//! - `compression`: whole-stream zstd/lz4 wrapping (feature-gated)
//! - `file`: scratch directory, run naming, delete-on-drop ownership
//! - `writer`: sort a batch and persist it as one run
//! - `reader`: pull cursor over one run with a single buffered record
//!
//! A run is written once, read sequentially by exactly one reader, and
//! deleted when that reader is exhausted, fails, or is dropped.

pub mod codec;
mod compression;
pub mod error;
pub mod file;
pub mod reader;
pub mod writer;

pub use codec::{BinaryCodec, JsonCodec, RecordCodec};
pub use error::{Result, RunError};
pub use file::{RunFile, RunMeta, ScratchDir};
pub use reader::RunReader;
pub use writer::{write_run, RunWriter, WriteOptions};

use std::sync::Arc;

/// Open a finished run for reading; see [`RunReader::open`].
pub fn open_run<C: RecordCodec>(
    run: RunFile,
    codec: Arc<C>,
    buffer_bytes: usize,
) -> Result<RunReader<C>> {
    RunReader::open(run, codec, buffer_bytes)
}
