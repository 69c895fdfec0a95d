//! In-memory reference storage (C12), used by the engine's default wiring
//! and by tests. Samples are kept sorted by timestamp per series; `insert`
//! tolerates out-of-order appends by inserting at the correct position
//! rather than requiring callers to pre-sort.

use std::collections::HashMap;

use crate::common::types::{LabelSet, Sample, SeriesId, Timestamp};
use crate::error::EngineResult;
use crate::storage::{Appender, Querier, Queryable, Series, SeriesIterator, SeriesSet};

struct SeriesData {
    labels: LabelSet,
    samples: Vec<Sample>,
}

#[derive(Default)]
pub struct MemoryStorage {
    series: HashMap<SeriesId, SeriesData>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sid: SeriesId, labels: LabelSet) {
        self.series.entry(sid).or_insert_with(|| SeriesData {
            labels,
            samples: Vec::new(),
        });
    }
}

impl Appender for MemoryStorage {
    fn append(&mut self, sid: SeriesId, sample: Sample) -> EngineResult<()> {
        let data = self
            .series
            .get_mut(&sid)
            .ok_or_else(|| crate::error::EngineError::IoError(format!("unknown series {sid}")))?;
        let pos = data
            .samples
            .partition_point(|s| s.timestamp < sample.timestamp);
        data.samples.insert(pos, sample);
        Ok(())
    }

    fn commit(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

impl Queryable for MemoryStorage {
    type Querier<'a> = MemoryQuerier<'a>;

    fn querier(&self, start: Timestamp, end: Timestamp) -> EngineResult<Self::Querier<'_>> {
        Ok(MemoryQuerier {
            storage: self,
            start,
            end,
        })
    }
}

pub struct MemoryQuerier<'a> {
    storage: &'a MemoryStorage,
    start: Timestamp,
    end: Timestamp,
}

impl<'a> Querier for MemoryQuerier<'a> {
    type SeriesSet = MemorySeriesSet;

    fn select(&self, sids: &[SeriesId]) -> EngineResult<Self::SeriesSet> {
        let mut items = Vec::with_capacity(sids.len());
        for &sid in sids {
            if let Some(data) = self.storage.series.get(&sid) {
                let lo = data.samples.partition_point(|s| s.timestamp < self.start);
                let hi = data.samples.partition_point(|s| s.timestamp <= self.end);
                items.push(MemorySeries {
                    labels: data.labels.clone(),
                    samples: data.samples[lo..hi].to_vec(),
                });
            }
        }
        Ok(MemorySeriesSet { items, pos: 0 })
    }
}

pub struct MemorySeriesSet {
    items: Vec<MemorySeries>,
    pos: usize,
}

impl SeriesSet for MemorySeriesSet {
    type Series = MemorySeries;

    fn next(&mut self) -> Option<Self::Series> {
        let item = self.items.get(self.pos).cloned();
        self.pos += 1;
        item
    }
}

#[derive(Clone)]
pub struct MemorySeries {
    labels: LabelSet,
    samples: Vec<Sample>,
}

impl Series for MemorySeries {
    type Iter = MemorySeriesIterator;

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn iterator(&self) -> Self::Iter {
        MemorySeriesIterator {
            samples: self.samples.clone(),
            pos: 0,
        }
    }
}

pub struct MemorySeriesIterator {
    samples: Vec<Sample>,
    pos: usize,
}

impl SeriesIterator for MemorySeriesIterator {
    fn seek(&mut self, ts: Timestamp) -> bool {
        while self.pos < self.samples.len() && self.samples[self.pos].timestamp < ts {
            self.pos += 1;
        }
        self.pos < self.samples.len()
    }

    fn at(&self) -> Sample {
        self.samples[self.pos]
    }

    fn next(&mut self) -> bool {
        self.pos += 1;
        self.pos < self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Label;

    #[test]
    fn append_keeps_samples_sorted() {
        let mut storage = MemoryStorage::new();
        storage.register(0, LabelSet::from_labels(vec![Label::new("__name__", "up")]));
        storage.append(0, Sample::new(20, 1.0)).unwrap();
        storage.append(0, Sample::new(10, 0.0)).unwrap();
        let querier = storage.querier(0, 100).unwrap();
        let mut set = querier.select(&[0]).unwrap();
        let series = set.next().unwrap();
        let mut it = series.iterator();
        assert!(it.seek(0));
        assert_eq!(it.at().timestamp, 10);
        assert!(it.next());
        assert_eq!(it.at().timestamp, 20);
        assert!(!it.next());
    }

    #[test]
    fn querier_clips_to_range() {
        let mut storage = MemoryStorage::new();
        storage.register(0, LabelSet::from_labels(vec![Label::new("__name__", "up")]));
        for ts in [0, 10, 20, 30] {
            storage.append(0, Sample::new(ts, ts as f64)).unwrap();
        }
        let querier = storage.querier(5, 25).unwrap();
        let mut set = querier.select(&[0]).unwrap();
        let series = set.next().unwrap();
        assert_eq!(series.samples.len(), 2);
    }
}
