//! Storage interface (C6): the engine depends only on these traits. The
//! label index and evaluator never reach into a concrete storage backend
//! directly, so a production deployment can swap `memory::MemoryStorage`
//! for a real time-series store without touching `parse` or `eval`.
//!
//! Grounded in `examples/ccollie-redis-promql/src/storage/mod.rs`'s
//! separation of an append path from a query path, trimmed to the subset
//! `spec.md` §5 requires.

mod memory;

pub use memory::MemoryStorage;

use crate::common::types::{LabelSet, Sample, SeriesId, Timestamp};
use crate::error::EngineResult;

/// Write path: append samples for a known series.
pub trait Appender {
    fn append(&mut self, sid: SeriesId, sample: Sample) -> EngineResult<()>;
    fn commit(&mut self) -> EngineResult<()>;
}

/// Read path: resolve a set of SIDs to their series data over a time range.
pub trait Queryable {
    type Querier<'a>: Querier
    where
        Self: 'a;

    fn querier(&self, start: Timestamp, end: Timestamp) -> EngineResult<Self::Querier<'_>>;
}

pub trait Querier {
    type SeriesSet: SeriesSet;

    fn select(&self, sids: &[SeriesId]) -> EngineResult<Self::SeriesSet>;

    /// Distinct values observed for `name` among the series visible to this
    /// querier. Delegates to the label index in practice; storage only
    /// needs to know which SIDs are live within its time range.
    fn label_values(&self, sids: &[SeriesId], name: &str, label_sets: &dyn Fn(SeriesId) -> Option<LabelSet>) -> Vec<String> {
        let mut values: Vec<String> = sids
            .iter()
            .filter_map(|&sid| label_sets(sid))
            .filter_map(|ls| ls.get(name).map(str::to_string))
            .collect();
        values.sort_unstable();
        values.dedup();
        values
    }
}

pub trait SeriesSet {
    type Series: Series;

    fn next(&mut self) -> Option<Self::Series>;
}

pub trait Series {
    type Iter: SeriesIterator;

    fn labels(&self) -> &LabelSet;
    fn iterator(&self) -> Self::Iter;
}

pub trait SeriesIterator {
    /// Advances to the first sample at or after `ts`, returning whether one
    /// exists.
    fn seek(&mut self, ts: Timestamp) -> bool;

    /// The sample at the iterator's current position.
    fn at(&self) -> Sample;

    /// Advances to the next sample, returning whether one exists.
    fn next(&mut self) -> bool;
}
