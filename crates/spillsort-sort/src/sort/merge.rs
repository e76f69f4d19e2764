//! K-way merge over sorted runs.
//!
//! Each open run contributes its head record. Every step emits the smallest
//! head; among equal heads the run with the lowest index wins, so records
//! that compare equal come out in run order. Runs leave the frontier as soon
//! as they are exhausted, which also deletes their files.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use spillsort_core::compare::Comparator;
use spillsort_core::config::MergeStrategy;
use spillsort_core::id::RunId;
use spillsort_run::{RecordCodec, RunError, RunReader};

use crate::error::{Result, SortError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Ready,
    Exhausted,
    Failed,
}

/// Head of one run in the heap frontier, moved out of its reader.
struct MergeEntry<R, K> {
    record: R,
    run_idx: usize,
    comparator: Arc<K>,
}

impl<R, K: Comparator<R>> MergeEntry<R, K> {
    fn order(&self, other: &Self) -> Ordering {
        self.comparator
            .compare(&self.record, &other.record)
            .then_with(|| self.run_idx.cmp(&other.run_idx))
    }
}

impl<R, K: Comparator<R>> PartialEq for MergeEntry<R, K> {
    fn eq(&self, other: &Self) -> bool {
        self.order(other) == Ordering::Equal
    }
}

impl<R, K: Comparator<R>> Eq for MergeEntry<R, K> {}

impl<R, K: Comparator<R>> PartialOrd for MergeEntry<R, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R, K: Comparator<R>> Ord for MergeEntry<R, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.order(self)
    }
}

pub struct KWayMerger<C: RecordCodec, K> {
    /// Indexed by run position; `None` once the run is drained or closed.
    runs: Vec<Option<RunReader<C>>>,
    /// Heap strategy only. Holds exactly one entry per open run.
    heap: BinaryHeap<MergeEntry<C::Record, K>>,
    comparator: Arc<K>,
    strategy: MergeStrategy,
    state: MergeState,
    open: usize,
    emitted: u64,
}

impl<C, K> KWayMerger<C, K>
where
    C: RecordCodec,
    K: Comparator<C::Record>,
{
    /// Build the frontier from readers in run order. Readers that are already
    /// exhausted (empty runs) are dropped immediately.
    pub fn new(readers: Vec<RunReader<C>>, comparator: K, strategy: MergeStrategy) -> Self {
        let comparator = Arc::new(comparator);
        let mut runs: Vec<_> = readers
            .into_iter()
            .map(|reader| (!reader.is_exhausted()).then_some(reader))
            .collect();
        let open = runs.iter().filter(|slot| slot.is_some()).count();

        let mut heap = BinaryHeap::with_capacity(open);
        if strategy == MergeStrategy::Heap {
            for (run_idx, slot) in runs.iter_mut().enumerate() {
                if let Some(record) = slot.as_mut().and_then(|reader| reader.take()) {
                    heap.push(MergeEntry {
                        record,
                        run_idx,
                        comparator: Arc::clone(&comparator),
                    });
                }
            }
        }

        let state = if open == 0 {
            MergeState::Exhausted
        } else {
            MergeState::Ready
        };
        Self {
            runs,
            heap,
            comparator,
            strategy,
            state,
            open,
            emitted: 0,
        }
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Runs that still hold unread records.
    pub fn open_runs(&self) -> usize {
        self.open
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn has_next(&self) -> bool {
        self.state == MergeState::Ready
    }

    /// Emit the smallest remaining record.
    ///
    /// Returns `NoMoreElements` once every run is drained and `Aborted` on
    /// every call after a failure. A failure closes (and deletes) all runs.
    pub fn next_record(&mut self) -> Result<C::Record> {
        match self.state {
            MergeState::Exhausted => return Err(SortError::NoMoreElements),
            MergeState::Failed => return Err(SortError::Aborted),
            MergeState::Ready => {}
        }

        let next = match self.strategy {
            MergeStrategy::Linear => self.pop_linear()?,
            MergeStrategy::Heap => self.pop_heap()?,
        };
        match next {
            Some(record) => {
                self.emitted += 1;
                if self.open == 0 {
                    self.finish();
                }
                Ok(record)
            }
            None => {
                self.finish();
                Err(SortError::NoMoreElements)
            }
        }
    }

    fn pop_linear(&mut self) -> Result<Option<C::Record>> {
        let Some(pos) = self.scan_min() else {
            return Ok(None);
        };
        let Some(reader) = self.runs[pos].as_mut() else {
            return Ok(None);
        };
        match reader.take_and_advance() {
            Ok(record) => {
                if reader.is_exhausted() {
                    self.release(pos);
                }
                Ok(record)
            }
            Err(e) => {
                let run = reader.run_id();
                Err(self.fail(run, e))
            }
        }
    }

    /// Leftmost minimum: a later run only wins when strictly smaller.
    fn scan_min(&self) -> Option<usize> {
        let mut best: Option<(usize, &C::Record)> = None;
        for (pos, slot) in self.runs.iter().enumerate() {
            let Some(head) = slot.as_ref().and_then(|reader| reader.current()) else {
                continue;
            };
            match best {
                Some((_, min)) if self.comparator.compare(min, head) != Ordering::Greater => {}
                _ => best = Some((pos, head)),
            }
        }
        best.map(|(pos, _)| pos)
    }

    fn pop_heap(&mut self) -> Result<Option<C::Record>> {
        let Some(MergeEntry {
            record, run_idx, ..
        }) = self.heap.pop()
        else {
            return Ok(None);
        };
        if let Some(reader) = self.runs[run_idx].as_mut() {
            if let Err(e) = reader.advance() {
                let run = reader.run_id();
                return Err(self.fail(run, e));
            }
            match reader.take() {
                Some(next) => self.heap.push(MergeEntry {
                    record: next,
                    run_idx,
                    comparator: Arc::clone(&self.comparator),
                }),
                None => self.release(run_idx),
            }
        }
        Ok(Some(record))
    }
}

impl<C: RecordCodec, K> KWayMerger<C, K> {
    /// Stop early: close every remaining run and delete its file. Later
    /// calls to `next_record` report `NoMoreElements`.
    pub fn close(&mut self) -> Result<()> {
        if self.open > 0 {
            tracing::debug!(
                open_runs = self.open,
                emitted = self.emitted,
                "closing merge early"
            );
        }
        let mut first_err = None;
        for mut reader in self.runs.iter_mut().filter_map(Option::take) {
            if let Err(e) = reader.close() {
                first_err.get_or_insert(e);
            }
        }
        self.heap.clear();
        self.open = 0;
        if self.state == MergeState::Ready {
            self.state = MergeState::Exhausted;
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn finish(&mut self) {
        self.state = MergeState::Exhausted;
        tracing::debug!(records = self.emitted, "merge exhausted");
    }

    /// Drop a drained run from the frontier. Its reader already deleted the file.
    fn release(&mut self, pos: usize) {
        if self.runs[pos].take().is_some() {
            self.open -= 1;
        }
    }

    fn fail(&mut self, run: RunId, err: RunError) -> SortError {
        self.state = MergeState::Failed;
        tracing::warn!(run = %run, emitted = self.emitted, error = %err, "merge failed");
        self.close_all();
        err.into()
    }

    fn close_all(&mut self) {
        for mut reader in self.runs.iter_mut().filter_map(Option::take) {
            if let Err(e) = reader.close() {
                tracing::warn!(run = %reader.run_id(), error = %e, "failed to delete run file");
            }
        }
        self.heap.clear();
        self.open = 0;
    }
}

impl<C: RecordCodec, K> Drop for KWayMerger<C, K> {
    fn drop(&mut self) {
        self.close_all();
    }
}
