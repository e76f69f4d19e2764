//! Run writer: sorts one batch and persists it as one run file.
//!
//! Writes are strictly sequential. A writer that hits an error is dropped
//! by the caller, which deletes the partial file; a half-written run is
//! never handed out as a `RunFile`.

use spillsort_core::compare::Comparator;
use spillsort_core::config::Compression;
use spillsort_core::id::RunId;
use tempfile::TempPath;

use crate::codec::RecordCodec;
use crate::compression::RunSink;
use crate::error::{Result, RunError};
use crate::file::{RunFile, RunMeta, ScratchDir};

/// How run bytes hit the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub compression: Compression,
    pub buffer_bytes: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            buffer_bytes: 64 * 1024,
        }
    }
}

pub struct RunWriter<'a, C: RecordCodec> {
    codec: &'a C,
    sink: RunSink,
    path: TempPath,
    run_id: RunId,
    compression: Compression,
    records: u64,
    failed: bool,
}

impl<'a, C: RecordCodec> RunWriter<'a, C> {
    pub fn create(
        scratch: &ScratchDir,
        run_id: RunId,
        codec: &'a C,
        opts: WriteOptions,
    ) -> Result<Self> {
        let (file, path) = scratch.create_run_file(run_id)?;
        let sink = RunSink::new(opts.compression, file, opts.buffer_bytes)?;
        Ok(Self {
            codec,
            sink,
            path,
            run_id,
            compression: opts.compression,
            records: 0,
            failed: false,
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Append one record. Callers are responsible for write order.
    pub fn write(&mut self, record: &C::Record) -> Result<()> {
        if self.failed {
            return Err(RunError::Encode(format!(
                "{} already failed; discard it",
                self.run_id
            )));
        }
        match self.codec.encode(record, &mut self.sink) {
            Ok(()) => {
                self.records += 1;
                Ok(())
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Flush, close the compression frame and hand over the finished run.
    pub fn finish(self) -> Result<RunFile> {
        if self.failed {
            return Err(RunError::Encode(format!(
                "{} failed while writing; not finishing",
                self.run_id
            )));
        }
        let file = self.sink.finish()?;
        let bytes = file
            .metadata()
            .map_err(RunError::io("stat run"))?
            .len();
        drop(file);

        let meta = RunMeta {
            run_id: self.run_id,
            records: self.records,
            bytes,
            compression: self.compression,
        };
        tracing::debug!(
            run = %meta.run_id,
            records = meta.records,
            bytes = meta.bytes,
            path = %self.path.display(),
            "wrote run"
        );
        Ok(RunFile::new(self.path, meta))
    }
}

/// Sort `batch` with `comparator` and write it as one run.
///
/// Every record is validated against the codec before the sort, so a
/// malformed record fails with `RunError::Encode` and no file is created.
/// The sort is stable: records that compare equal keep their batch order.
pub fn write_run<C, K>(
    mut batch: Vec<C::Record>,
    codec: &C,
    comparator: &K,
    scratch: &ScratchDir,
    run_id: RunId,
    opts: WriteOptions,
) -> Result<RunFile>
where
    C: RecordCodec,
    K: Comparator<C::Record> + ?Sized,
{
    for record in &batch {
        codec.validate(record)?;
    }
    batch.sort_by(|a, b| comparator.compare(a, b));

    let mut writer = RunWriter::create(scratch, run_id, codec, opts)?;
    for record in &batch {
        writer.write(record)?;
    }
    writer.finish()
}
