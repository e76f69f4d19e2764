//! Run reader: a pull cursor over one run file.
//!
//! The reader buffers exactly one decoded record (`current`). Reaching the
//! end of the run, or failing to decode, releases the file handle and deletes
//! the run; both happen at most once.

use std::sync::Arc;

use spillsort_core::id::RunId;

use crate::codec::RecordCodec;
use crate::compression::RunSource;
use crate::error::{Result, RunError};
use crate::file::RunFile;

struct OpenRun {
    source: RunSource,
    file: RunFile,
}

pub struct RunReader<C: RecordCodec> {
    codec: Arc<C>,
    run_id: RunId,
    open: Option<OpenRun>,
    current: Option<C::Record>,
    read: u64,
}

impl<C: RecordCodec> RunReader<C> {
    /// Open `run` and decode its first record. An empty run comes back
    /// already exhausted (and already deleted).
    pub fn open(run: RunFile, codec: Arc<C>, buffer_bytes: usize) -> Result<Self> {
        let meta = *run.meta();
        let file = run.open()?;
        let source = RunSource::new(meta.compression, file, buffer_bytes)?;

        let mut reader = Self {
            codec,
            run_id: meta.run_id,
            open: Some(OpenRun { source, file: run }),
            current: None,
            read: 0,
        };
        tracing::debug!(run = %meta.run_id, records = meta.records, "opened run");
        reader.fill_next()?;
        Ok(reader)
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Peek at the buffered record. `None` once exhausted.
    pub fn current(&self) -> Option<&C::Record> {
        self.current.as_ref()
    }

    /// Decode the next record, replacing `current`, and return it.
    pub fn advance(&mut self) -> Result<Option<&C::Record>> {
        self.fill_next()?;
        Ok(self.current.as_ref())
    }

    /// Move `current` out and decode its successor.
    pub fn take_and_advance(&mut self) -> Result<Option<C::Record>> {
        let Some(taken) = self.current.take() else {
            return Ok(None);
        };
        self.fill_next()?;
        Ok(Some(taken))
    }

    /// Move `current` out without decoding ahead. Follow with `advance` to
    /// refill.
    pub fn take(&mut self) -> Option<C::Record> {
        self.current.take()
    }

    pub fn is_exhausted(&self) -> bool {
        self.current.is_none() && self.open.is_none()
    }

    pub fn records_read(&self) -> u64 {
        self.read
    }

    /// Release the file handle and delete the run. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.current = None;
        match self.open.take() {
            Some(OpenRun { source, file }) => {
                drop(source);
                file.delete()
            }
            None => Ok(()),
        }
    }

    fn fill_next(&mut self) -> Result<()> {
        let Some(open) = self.open.as_mut() else {
            self.current = None;
            return Ok(());
        };
        let expected = open.file.meta().records;

        match self.codec.decode(&mut open.source) {
            Ok(Some(record)) if self.read < expected => {
                self.read += 1;
                self.current = Some(record);
                Ok(())
            }
            Ok(Some(_)) => {
                self.fail(RunError::Decode(format!(
                    "{} holds more than the {expected} records written",
                    self.run_id
                )))
            }
            Ok(None) if self.read < expected => self.fail(RunError::Truncated {
                expected,
                read: self.read,
            }),
            Ok(None) => {
                tracing::debug!(run = %self.run_id, records = self.read, "run exhausted");
                self.release();
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, err: RunError) -> Result<()> {
        tracing::debug!(run = %self.run_id, read = self.read, error = %err, "run failed");
        self.release();
        Err(err)
    }

    /// Exhaustion/failure path: deletion failures are logged, not returned.
    fn release(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(run = %self.run_id, error = %e, "failed to delete run file");
        }
    }
}
