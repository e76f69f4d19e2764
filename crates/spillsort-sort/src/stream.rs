//! The sorted output of one external sort.

use std::iter::FusedIterator;
use std::sync::Arc;

use spillsort_core::compare::Comparator;
use spillsort_core::id::SortId;
use spillsort_core::schema::Schema;
use spillsort_run::RecordCodec;

use crate::error::{Result, SortError};
use crate::sort::{KWayMerger, MergeState, SortStats};

/// Pull-based stream over the merged runs.
///
/// Use `has_next`/`next_record` for explicit control, or iterate: the
/// iterator yields `Result`s and stops after the first error. Dropping the
/// stream early deletes every run that has not been read to the end.
pub struct SortedStream<C: RecordCodec, K> {
    sort_id: SortId,
    codec: Arc<C>,
    merger: KWayMerger<C, K>,
    stats: SortStats,
}

impl<C: RecordCodec, K> std::fmt::Debug for SortedStream<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedStream")
            .field("sort_id", &self.sort_id)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<C, K> SortedStream<C, K>
where
    C: RecordCodec,
    K: Comparator<C::Record>,
{
    pub(crate) fn new(
        sort_id: SortId,
        codec: Arc<C>,
        merger: KWayMerger<C, K>,
        stats: SortStats,
    ) -> Self {
        Self {
            sort_id,
            codec,
            merger,
            stats,
        }
    }

    pub fn sort_id(&self) -> SortId {
        self.sort_id
    }

    /// Schema of every record in the stream.
    pub fn schema(&self) -> &Schema {
        self.codec.schema()
    }

    /// Run generation counters. Fixed once the stream exists.
    pub fn stats(&self) -> &SortStats {
        &self.stats
    }

    pub fn emitted(&self) -> u64 {
        self.merger.emitted()
    }

    pub fn open_runs(&self) -> usize {
        self.merger.open_runs()
    }

    pub fn state(&self) -> MergeState {
        self.merger.state()
    }

    pub fn has_next(&self) -> bool {
        self.merger.has_next()
    }

    pub fn next_record(&mut self) -> Result<C::Record> {
        self.merger.next_record()
    }

    /// Stop consuming and delete the remaining runs now.
    pub fn close(&mut self) -> Result<()> {
        self.merger.close()
    }
}

impl<C, K> Iterator for SortedStream<C, K>
where
    C: RecordCodec,
    K: Comparator<C::Record>,
{
    type Item = Result<C::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.merger.has_next() {
            return None;
        }
        match self.merger.next_record() {
            Ok(record) => Some(Ok(record)),
            Err(SortError::NoMoreElements) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<C, K> FusedIterator for SortedStream<C, K>
where
    C: RecordCodec,
    K: Comparator<C::Record>,
{
}
