//! Core value types shared across the parser, index, and evaluator.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Dense, process-unique identifier assigned to a series on first registration.
pub type SeriesId = u64;

/// A single label (name, value) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The distinguished label name carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// An unordered set of labels, keyed by name (names unique per series).
///
/// Stored sorted by name so canonical rendering and equality are cheap.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelSet(Vec<Label>);

impl LabelSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_labels(mut labels: Vec<Label>) -> Self {
        labels.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.value.cmp(&b.value)));
        labels.dedup_by(|a, b| a.name == b.name);
        Self(labels)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Label] {
        &self.0
    }

    /// Project this label set through a grouping clause, dropping `__name__`
    /// whenever labels are being removed ("without") rather than kept ("by").
    pub fn project(&self, names: &[String], without: bool) -> LabelSet {
        let kept: Vec<Label> = self
            .0
            .iter()
            .filter(|l| {
                let listed = names.iter().any(|n| n == &l.name);
                if without {
                    !listed && l.name != METRIC_NAME_LABEL
                } else {
                    listed
                }
            })
            .cloned()
            .collect();
        LabelSet::from_labels(kept)
    }

    /// Project dropping only `__name__`, used for the default vector-vector
    /// matching rule ("all labels except __name__").
    pub fn without_metric_name(&self) -> LabelSet {
        let kept: Vec<Label> = self
            .0
            .iter()
            .filter(|l| l.name != METRIC_NAME_LABEL)
            .cloned()
            .collect();
        LabelSet::from_labels(kept)
    }

    /// A canonical string key for grouping/equality purposes. Length-prefixed
    /// per component so names/values containing the separator can't collide
    /// (see DESIGN.md: "Canonical label-set key").
    pub fn canonical_key(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 16);
        for l in &self.0 {
            out.push_str(&l.name.len().to_string());
            out.push(':');
            out.push_str(&l.name);
            out.push('=');
            out.push_str(&l.value.len().to_string());
            out.push(':');
            out.push_str(&l.value);
            out.push('|');
        }
        out
    }
}

impl From<Vec<Label>> for LabelSet {
    fn from(labels: Vec<Label>) -> Self {
        LabelSet::from_labels(labels)
    }
}

impl FromIterator<Label> for LabelSet {
    fn from_iter<T: IntoIterator<Item = Label>>(iter: T) -> Self {
        LabelSet::from_labels(iter.into_iter().collect())
    }
}

/// A single (timestamp, value) exec-level sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}
