//! External sort coordinator.
//!
//! Pulls the whole input through a [`RunGenerator`], then opens one reader
//! per run and hands a [`KWayMerger`] to the caller wrapped in a
//! [`SortedStream`]. Records are decoded lazily as the stream is pulled.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use spillsort_core::budget::MemoryBudget;
use spillsort_core::compare::Comparator;
use spillsort_core::config::{Compression, MergeStrategy, SortConfig};
use spillsort_core::id::{IdSource, RandomIds, SortId};
use spillsort_core::schema::Schema;
use spillsort_core::types::Record;
use spillsort_mem::MemoryBudgetImpl;
use spillsort_run::{BinaryCodec, RecordCodec, RunReader, ScratchDir, WriteOptions};

use crate::error::{Result, SortError};
use crate::stream::SortedStream;

use super::merge::KWayMerger;
use super::run::RunGenerator;

/// Budget tag for the guard that tracks the in-memory batch.
const BATCH_TAG: &str = "sort_batch";

/// Builder and entry point for one external sort.
///
/// ```no_run
/// use spillsort_core::prelude::*;
/// use spillsort_run::BinaryCodec;
/// use spillsort_sort::ExternalSorter;
///
/// let schema = Schema::new(vec![Field::new("v", DataType::Int64, false)])?;
/// let cmp = KeyComparator::natural(&schema);
/// let records = (0..10i64).rev().map(|v| Record::new(vec![Scalar::I64(v)]));
///
/// let sorted = ExternalSorter::new(BinaryCodec::new(schema), cmp)
///     .batch_size(4)
///     .sort(records)?;
/// for record in sorted {
///     println!("{:?}", record?);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ExternalSorter<C: RecordCodec, K> {
    codec: Arc<C>,
    comparator: K,
    config: SortConfig,
    budget: Option<MemoryBudgetImpl>,
    ids: Arc<dyn IdSource>,
}

impl<C, K> ExternalSorter<C, K>
where
    C: RecordCodec,
    K: Comparator<C::Record>,
{
    pub fn new(codec: C, comparator: K) -> Self {
        Self {
            codec: Arc::new(codec),
            comparator,
            config: SortConfig::default(),
            budget: None,
            ids: Arc::new(RandomIds),
        }
    }

    /// Replace every tunable at once.
    pub fn with_config(mut self, config: SortConfig) -> Self {
        self.config = config;
        self
    }

    pub fn batch_size(mut self, records: usize) -> Self {
        self.config.batch_size = records;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn mem_cap_bytes(mut self, bytes: usize) -> Self {
        self.config.mem_cap_bytes = Some(bytes);
        self
    }

    /// Charge batches to a shared budget instead of a private one built from
    /// `mem_cap_bytes`.
    pub fn budget(mut self, budget: MemoryBudgetImpl) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    pub fn merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.config.merge_strategy = strategy;
        self
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    pub fn sort<I>(self, input: I) -> Result<SortedStream<C, K>>
    where
        I: IntoIterator<Item = C::Record>,
    {
        self.try_sort(input.into_iter().map(Ok::<_, Infallible>))
    }

    /// Sort a fallible input. The first `Err` aborts the sort, deletes every
    /// run written so far and comes back as [`SortError::Input`].
    pub fn try_sort<I, E>(self, input: I) -> Result<SortedStream<C, K>>
    where
        I: IntoIterator<Item = std::result::Result<C::Record, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.config.validate()?;

        let sort_id = SortId::new(self.ids.next_id());
        let scratch = ScratchDir::new(&self.config.scratch_dir, sort_id)?;
        let budget = self
            .budget
            .clone()
            .or_else(|| self.config.mem_cap_bytes.map(MemoryBudgetImpl::new));
        let guard = match &budget {
            Some(b) => Some((b.acquire(0, BATCH_TAG)?, b.clone())),
            None => None,
        };

        tracing::info!(
            sort = %sort_id,
            batch_size = self.config.batch_size,
            mem_cap_bytes = ?budget.as_ref().map(|b| b.capacity_bytes()),
            compression = %self.config.compression,
            scratch = %scratch.root().display(),
            "starting external sort"
        );

        let opts = WriteOptions {
            compression: self.config.compression,
            buffer_bytes: self.config.write_buffer_bytes,
        };
        let mut gen = RunGenerator::new(
            self.codec.as_ref(),
            &self.comparator,
            &scratch,
            opts,
            self.config.batch_size,
            guard,
        );
        for item in input {
            let record = item.map_err(|e| SortError::Input(Box::new(e)))?;
            gen.push(record)?;
        }
        let (runs, stats) = gen.finish()?;

        let mut readers = Vec::with_capacity(runs.len());
        for run in runs {
            readers.push(RunReader::open(
                run,
                Arc::clone(&self.codec),
                self.config.read_buffer_bytes,
            )?);
        }

        tracing::info!(
            sort = %sort_id,
            records = stats.records,
            runs = stats.runs,
            bytes_spilled = stats.bytes_spilled,
            peak_budget_bytes = ?budget.as_ref().map(MemoryBudgetImpl::peak_bytes),
            "run generation complete"
        );

        let merger = KWayMerger::new(readers, self.comparator, self.config.merge_strategy);
        Ok(SortedStream::new(sort_id, self.codec, merger, stats))
    }
}

/// Sort `input` with the binary codec and a fresh random sort id.
///
/// With `batch_size` records per run, an input of `N` records produces
/// `ceil(N / batch_size)` runs; an empty input produces none and the
/// returned stream is exhausted from the start.
pub fn sort<I, K>(
    input: I,
    schema: Schema,
    comparator: K,
    batch_size: usize,
    scratch_dir: impl Into<PathBuf>,
) -> Result<SortedStream<BinaryCodec, K>>
where
    I: IntoIterator<Item = Record>,
    K: Comparator<Record>,
{
    ExternalSorter::new(BinaryCodec::new(schema), comparator)
        .batch_size(batch_size)
        .scratch_dir(scratch_dir)
        .sort(input)
}
