//! Run generation: buffer records, spill each full batch as one sorted run.
//!
//! A batch is full when it reaches `batch_size` records or, with a memory
//! budget, when the next record's estimated size no longer fits the guard.

use std::mem;

use spillsort_core::budget::{BudgetGuard, MemoryBudget};
use spillsort_core::compare::Comparator;
use spillsort_core::id::RunId;
use spillsort_mem::{BudgetGuardImpl, MemoryBudgetImpl};
use spillsort_run::{write_run, RecordCodec, RunFile, ScratchDir, WriteOptions};

use crate::error::{Result, SortError};

/// Counters for one sort session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Records pulled from the input.
    pub records: u64,
    /// Runs spilled to disk.
    pub runs: usize,
    /// On-disk bytes across all runs.
    pub bytes_spilled: u64,
    /// Largest batch charged to the memory budget, in bytes.
    pub peak_batch_bytes: usize,
}

pub(crate) struct RunGenerator<'a, C: RecordCodec, K: ?Sized> {
    codec: &'a C,
    comparator: &'a K,
    scratch: &'a ScratchDir,
    opts: WriteOptions,
    batch_size: usize,
    batch: Vec<C::Record>,
    guard: Option<(BudgetGuardImpl, MemoryBudgetImpl)>,
    runs: Vec<RunFile>,
    stats: SortStats,
}

impl<'a, C, K> RunGenerator<'a, C, K>
where
    C: RecordCodec,
    K: Comparator<C::Record> + ?Sized,
{
    /// `guard` travels with the budget it was drawn from, for error reports.
    pub(crate) fn new(
        codec: &'a C,
        comparator: &'a K,
        scratch: &'a ScratchDir,
        opts: WriteOptions,
        batch_size: usize,
        guard: Option<(BudgetGuardImpl, MemoryBudgetImpl)>,
    ) -> Self {
        Self {
            codec,
            comparator,
            scratch,
            opts,
            batch_size,
            batch: Vec::with_capacity(batch_size.min(4096)),
            guard,
            runs: Vec::new(),
            stats: SortStats::default(),
        }
    }

    pub(crate) fn push(&mut self, record: C::Record) -> Result<()> {
        self.codec.validate(&record)?;
        if self.guard.is_some() {
            let size = self.codec.estimated_size(&record);
            if !self.charge(size) {
                if self.batch.is_empty() {
                    return Err(self.too_big(size));
                }
                self.flush()?;
                if !self.charge(size) {
                    return Err(self.too_big(size));
                }
            }
        }

        self.batch.push(record);
        self.stats.records += 1;
        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Spill whatever is buffered. No-op on an empty batch.
    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = mem::take(&mut self.batch);
        let run_id = RunId::new(self.runs.len() as u64);
        let records = batch.len();

        let run = write_run(
            batch,
            self.codec,
            self.comparator,
            self.scratch,
            run_id,
            self.opts,
        )?;

        if let Some((guard, _)) = self.guard.as_mut() {
            self.stats.peak_batch_bytes = self.stats.peak_batch_bytes.max(guard.bytes());
            guard.release_all();
        }
        self.stats.runs += 1;
        self.stats.bytes_spilled += run.meta().bytes;
        tracing::debug!(
            sort = %self.scratch.sort_id(),
            run = %run_id,
            records,
            bytes = run.meta().bytes,
            "spilled run"
        );
        self.runs.push(run);
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<(Vec<RunFile>, SortStats)> {
        self.flush()?;
        Ok((self.runs, self.stats))
    }

    fn charge(&mut self, size: usize) -> bool {
        match self.guard.as_mut() {
            Some((guard, _)) => guard.try_grow(size),
            None => true,
        }
    }

    fn too_big(&self, requested: usize) -> SortError {
        let (tag, capacity, used) = self.guard.as_ref().map_or(("sort_batch", 0, 0), |(guard, budget)| {
            (guard.tag(), budget.capacity_bytes(), budget.used_bytes())
        });
        spillsort_mem::Error::BudgetExceeded {
            tag,
            requested,
            capacity,
            used,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use spillsort_core::budget::MemoryBudget;
    use spillsort_core::prelude::*;
    use spillsort_mem::MemoryBudgetImpl;
    use spillsort_run::BinaryCodec;

    use super::*;

    fn codec() -> BinaryCodec {
        BinaryCodec::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]).unwrap())
    }

    fn rec(v: i32) -> Record {
        Record::new(vec![Scalar::I32(v)])
    }

    #[test]
    fn spills_every_batch_size_records() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path(), SortId::new(9)).unwrap();
        let codec = codec();
        let cmp = KeyComparator::natural(codec.schema());
        let mut gen = RunGenerator::new(&codec, &cmp, &scratch, WriteOptions::default(), 3, None);
        for v in [5, 3, 8, 1, 9, 2, 7] {
            gen.push(rec(v)).unwrap();
        }
        let (runs, stats) = gen.finish().unwrap();
        let sizes: Vec<u64> = runs.iter().map(|r| r.meta().records).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(stats.records, 7);
        assert_eq!(stats.runs, 3);
        assert_eq!(stats.peak_batch_bytes, 0);
    }

    #[test]
    fn budget_forces_early_spill() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path(), SortId::new(9)).unwrap();
        let codec = codec();
        let cmp = KeyComparator::natural(codec.schema());
        let one = codec.estimated_size(&rec(0));
        let budget = MemoryBudgetImpl::new(one * 2);
        let guard = budget.try_acquire(0, "test_batch").unwrap();

        let mut gen = RunGenerator::new(
            &codec,
            &cmp,
            &scratch,
            WriteOptions::default(),
            1_000,
            Some((guard, budget.clone())),
        );
        for v in 0..5 {
            gen.push(rec(v)).unwrap();
        }
        let (runs, stats) = gen.finish().unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(stats.peak_batch_bytes, one * 2);
        assert_eq!(budget.used_bytes(), 0);
    }

    #[test]
    fn oversized_record_is_budget_error() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(tmp.path(), SortId::new(9)).unwrap();
        let codec = codec();
        let cmp = KeyComparator::natural(codec.schema());
        let budget = MemoryBudgetImpl::new(1);
        let guard = budget.try_acquire(0, "test_batch").unwrap();

        let mut gen = RunGenerator::new(
            &codec,
            &cmp,
            &scratch,
            WriteOptions::default(),
            10,
            Some((guard, budget.clone())),
        );
        let err = gen.push(rec(1)).unwrap_err();
        assert!(matches!(
            err,
            SortError::Budget(spillsort_mem::Error::BudgetExceeded {
                tag: "test_batch",
                capacity: 1,
                ..
            })
        ));
    }
}
