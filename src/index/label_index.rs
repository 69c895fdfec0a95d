//! The label index (C4): SID allocation, posting maintenance, and matcher
//! resolution, grounded in `examples/original_source/src/index/index_tree.cpp`
//! (`query_postings`) and `src/index/series_manager.cpp` (SID/labels
//! bookkeeping).

use std::collections::{BTreeMap, HashSet};

use crate::common::types::{LabelSet, SeriesId};
use crate::index::index_key::{make_key, name_lower_bound, name_upper_bound, IndexKey};
use crate::index::matcher::{LabelMatcher, MatchOp};
use crate::index::page::{PageId, PageStore};

/// Maps composite keys to the chain of pages holding their postings, and
/// SIDs back to the labels they were registered with.
pub struct LabelIndex {
    pages: PageStore,
    postings: BTreeMap<IndexKey, Vec<PageId>>,
    label_sets: Vec<LabelSet>,
}

impl LabelIndex {
    pub fn new(page_size_bytes: usize) -> Self {
        Self {
            pages: PageStore::new(page_size_bytes),
            postings: BTreeMap::new(),
            label_sets: Vec::new(),
        }
    }

    /// Registers a new series and returns its freshly allocated SID.
    ///
    /// SIDs are assigned in registration order and are never reused. Labels
    /// are published before any posting bit is set, so a concurrent reader
    /// that observes a bit set will also observe `get_labels` returning the
    /// full label set (read-after-publish ordering, per `spec.md` §4.5).
    pub fn add_series(&mut self, labels: LabelSet) -> SeriesId {
        let sid = self.label_sets.len() as SeriesId;
        self.label_sets.push(labels);
        let labels = &self.label_sets[sid as usize];
        let keys: Vec<IndexKey> = labels
            .iter()
            .map(|label| make_key(&label.name, &label.value))
            .collect();
        for key in keys {
            self.set_bit_chained(key, sid);
        }
        sid
    }

    pub fn get_labels(&self, sid: SeriesId) -> Option<&LabelSet> {
        self.label_sets.get(sid as usize)
    }

    pub fn series_count(&self) -> usize {
        self.label_sets.len()
    }

    fn set_bit_chained(&mut self, key: IndexKey, sid: SeriesId) {
        let capacity = self.pages.page_capacity_bits();
        let page_idx = (sid / capacity) as usize;
        let chain = self.postings.entry(key).or_default();
        while chain.len() <= page_idx {
            let base = chain.len() as u64 * capacity;
            chain.push(self.pages.allocate(base));
        }
        self.pages.set_bit(chain[page_idx], sid);
    }

    /// All SIDs in the posting chains covering `[lo, hi]`, without applying
    /// per-entry matcher filtering.
    fn candidates_in_range(&self, lo: IndexKey, hi: IndexKey) -> HashSet<SeriesId> {
        let mut out = HashSet::new();
        for (_, chain) in self.postings.range(lo..=hi) {
            for &page in chain {
                out.extend(self.pages.iter_page(page));
            }
        }
        out
    }

    /// Resolves one matcher to the set of SIDs whose stored labels satisfy
    /// it, narrowing the key range per operator exactly as
    /// `query_postings` in `original_source/src/index/index_tree.cpp`
    /// does: `EQL` scans a single key, `LSS`/`GTR`/`LTE`/`GTE` narrow to a
    /// half-open sub-range bounded by the matched value's key, and `NEQ`
    /// scans the whole name partition (the original narrows `NEQ` no
    /// further either, relying on the per-entry value check below to drop
    /// the excluded value). The original has no regex matcher at all; both
    /// regex operators here fall back to a full name-partition scan, since
    /// a compiled regex has no narrowable key range. Every candidate is
    /// re-checked against its materialized label set regardless, since the
    /// 4-byte value hash can collide across distinct values (`spec.md`
    /// §4.3).
    fn resolve_one(&self, matcher: &LabelMatcher) -> HashSet<SeriesId> {
        let name_lo = name_lower_bound(&matcher.name);
        let name_hi = name_upper_bound(&matcher.name);
        let match_key = make_key(&matcher.name, &matcher.value);

        let range = match matcher.op {
            MatchOp::Eql => Some((match_key, match_key)),
            MatchOp::Neq | MatchOp::EqlRegex | MatchOp::NeqRegex => Some((name_lo, name_hi)),
            MatchOp::Lss => Some((name_lo, match_key.saturating_sub(1))),
            MatchOp::Gtr => {
                let lo = match_key.saturating_add(1);
                (lo <= name_hi).then_some((lo, name_hi))
            }
            MatchOp::Lte => Some((name_lo, match_key)),
            MatchOp::Gte => Some((match_key, name_hi)),
        };

        let candidates = match range {
            Some((lo, hi)) if lo <= hi => self.candidates_in_range(lo, hi),
            _ => HashSet::new(),
        };
        candidates
            .into_iter()
            .filter(|&sid| {
                self.label_sets[sid as usize]
                    .get(&matcher.name)
                    .is_some_and(|v| matcher.matches_value(v))
            })
            .collect()
    }

    /// Resolves a conjunction of label matchers (a vector selector's
    /// matcher list) to the set of matching SIDs. An empty matcher list
    /// matches nothing: PromQL selectors always require at least one
    /// matcher that isn't an empty-value regex, so the caller is expected
    /// to have rejected that case at parse time.
    pub fn resolve_label_matchers(&self, matchers: &[LabelMatcher]) -> Vec<SeriesId> {
        let mut iter = matchers.iter();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut result = self.resolve_one(first);
        for m in iter {
            if result.is_empty() {
                break;
            }
            let next = self.resolve_one(m);
            result.retain(|sid| next.contains(sid));
        }
        let mut out: Vec<SeriesId> = result.into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Distinct values observed for `name` across all registered series.
    pub fn label_values(&self, name: &str) -> Vec<String> {
        let lo = name_lower_bound(name);
        let hi = name_upper_bound(name);
        let mut values: Vec<String> = self
            .candidates_in_range(lo, hi)
            .into_iter()
            .filter_map(|sid| self.label_sets[sid as usize].get(name).map(str::to_string))
            .collect();
        values.sort_unstable();
        values.dedup();
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Label;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        LabelSet::from_labels(
            pairs
                .iter()
                .map(|(n, v)| Label::new(*n, *v))
                .collect(),
        )
    }

    fn eql(name: &str, value: &str) -> LabelMatcher {
        LabelMatcher::new(MatchOp::Eql, name, value).unwrap()
    }

    #[test]
    fn add_series_assigns_monotonic_sids() {
        let mut idx = LabelIndex::new(64);
        let a = idx.add_series(labels(&[("__name__", "up"), ("job", "api")]));
        let b = idx.add_series(labels(&[("__name__", "up"), ("job", "worker")]));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn resolve_equality_matcher() {
        let mut idx = LabelIndex::new(64);
        let api = idx.add_series(labels(&[("__name__", "up"), ("job", "api")]));
        idx.add_series(labels(&[("__name__", "up"), ("job", "worker")]));
        let got = idx.resolve_label_matchers(&[eql("job", "api")]);
        assert_eq!(got, vec![api]);
    }

    #[test]
    fn resolve_conjunction_of_matchers() {
        let mut idx = LabelIndex::new(64);
        let target = idx.add_series(labels(&[
            ("__name__", "http_requests_total"),
            ("job", "api"),
            ("method", "GET"),
        ]));
        idx.add_series(labels(&[
            ("__name__", "http_requests_total"),
            ("job", "api"),
            ("method", "POST"),
        ]));
        let got = idx.resolve_label_matchers(&[
            eql("__name__", "http_requests_total"),
            eql("job", "api"),
            eql("method", "GET"),
        ]);
        assert_eq!(got, vec![target]);
    }

    #[test]
    fn resolve_neq_matcher_excludes_exact_value() {
        let mut idx = LabelIndex::new(64);
        idx.add_series(labels(&[("__name__", "up"), ("job", "api")]));
        let worker = idx.add_series(labels(&[("__name__", "up"), ("job", "worker")]));
        let got = idx.resolve_label_matchers(&[LabelMatcher::new(MatchOp::Neq, "job", "api").unwrap()]);
        assert_eq!(got, vec![worker]);
    }

    #[test]
    fn resolve_regex_matcher() {
        let mut idx = LabelIndex::new(64);
        let api = idx.add_series(labels(&[("__name__", "up"), ("job", "api-1")]));
        idx.add_series(labels(&[("__name__", "up"), ("job", "worker")]));
        let m = LabelMatcher::new(MatchOp::EqlRegex, "job", "api.*").unwrap();
        assert_eq!(idx.resolve_label_matchers(&[m]), vec![api]);
    }

    #[test]
    fn postings_chain_across_pages() {
        // capacity is 8 bits/page; force several series past one page.
        let mut idx = LabelIndex::new(1);
        let mut expected = Vec::new();
        for _ in 0..20 {
            expected.push(idx.add_series(labels(&[("__name__", "up"), ("job", "api")])));
        }
        let got = idx.resolve_label_matchers(&[eql("job", "api")]);
        assert_eq!(got, expected);
    }

    #[test]
    fn label_values_are_sorted_and_deduped() {
        let mut idx = LabelIndex::new(64);
        idx.add_series(labels(&[("__name__", "up"), ("job", "api")]));
        idx.add_series(labels(&[("__name__", "up"), ("job", "worker")]));
        idx.add_series(labels(&[("__name__", "up"), ("job", "api")]));
        assert_eq!(idx.label_values("job"), vec!["api".to_string(), "worker".to_string()]);
    }
}
