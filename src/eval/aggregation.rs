//! Aggregation operators (§4.6), grounded in
//! `examples/original_source/src/parse/executor.cpp`'s `Executor::aggregation`
//! (sum/avg/min/max/count/count_values/stddev/stdvar/topk/bottomk/quantile).
//!
//! The source groups samples by joining `name:value|` pairs, which collides
//! whenever a label's own value contains that separator; grouping here uses
//! `LabelSet::canonical_key` (length-prefixed) instead -- see DESIGN.md.

use crate::common::types::{Label, LabelSet};
use crate::error::{EngineError, EngineResult};
use crate::eval::value::{VectorSample, VectorValue};
use crate::parse::token::Token;

/// The aggregation's evaluated parameter: a scalar for `topk`/`bottomk`/
/// `quantile`, the output label name for `count_values`, or nothing.
pub enum AggParam {
    None,
    Scalar(f64),
    Label(String),
}

struct Group {
    projected: LabelSet,
    members: Vec<usize>,
}

fn group_samples(input: &VectorValue, grouping: &[String], without: bool) -> Vec<Group> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: Vec<Group> = Vec::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for (i, s) in input.samples.iter().enumerate() {
        let projected = s.metric.project(grouping, without);
        let key = projected.canonical_key();
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            groups.push(Group {
                projected,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[idx].members.push(i);
    }
    groups
}

pub fn aggregate(
    op: Token,
    input: &VectorValue,
    ts: i64,
    param: AggParam,
    grouping: &[String],
    without: bool,
) -> EngineResult<VectorValue> {
    match op {
        Token::CountValues => aggregate_count_values(input, ts, param, grouping, without),
        Token::TopK | Token::BottomK => aggregate_topk(op, input, param, grouping, without),
        Token::Quantile => aggregate_quantile(input, ts, param, grouping, without),
        _ => aggregate_scalar_reduction(op, input, ts, grouping, without),
    }
}

fn aggregate_scalar_reduction(
    op: Token,
    input: &VectorValue,
    ts: i64,
    grouping: &[String],
    without: bool,
) -> EngineResult<VectorValue> {
    let mut out = VectorValue::new();
    for group in group_samples(input, grouping, without) {
        let mut n = 0u64;
        let mut sum = 0.0;
        let mut mean = 0.0;
        let mut m2 = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for &i in &group.members {
            let v = input.samples[i].sample.value;
            n += 1;
            sum += v;
            let delta = v - mean;
            mean += delta / n as f64;
            m2 += delta * (v - mean);
            min = min.min(v);
            max = max.max(v);
        }

        let value = match op {
            Token::Sum => sum,
            Token::Avg => mean,
            Token::Min => min,
            Token::Max => max,
            Token::Count => n as f64,
            Token::Stddev => (m2 / n as f64).sqrt(),
            Token::Stdvar => m2 / n as f64,
            other => {
                return Err(EngineError::EvalError(format!("unsupported aggregation operator {other:?}")));
            }
        };
        out.push(group.projected, crate::common::types::Sample::new(ts, value));
    }
    Ok(out)
}

fn aggregate_count_values(
    input: &VectorValue,
    ts: i64,
    param: AggParam,
    grouping: &[String],
    without: bool,
) -> EngineResult<VectorValue> {
    let AggParam::Label(label_name) = param else {
        return Err(EngineError::EvalError("count_values requires a label-name parameter".into()));
    };

    let mut order: Vec<String> = Vec::new();
    let mut counts: std::collections::HashMap<String, (LabelSet, u64)> = std::collections::HashMap::new();

    for s in &input.samples {
        let projected = s.metric.project(grouping, without);
        let value_str = s.sample.value.to_string();
        let mut labels: Vec<Label> = projected.as_slice().to_vec();
        labels.push(Label::new(label_name.clone(), value_str.clone()));
        let labels = LabelSet::from_labels(labels);
        let key = labels.canonical_key();
        counts
            .entry(key.clone())
            .and_modify(|(_, c)| *c += 1)
            .or_insert_with(|| {
                order.push(key.clone());
                (labels, 1)
            });
    }

    let mut out = VectorValue::new();
    for key in order {
        let (labels, count) = counts.remove(&key).unwrap();
        out.push(labels, crate::common::types::Sample::new(ts, count as f64));
    }
    Ok(out)
}

fn aggregate_topk(
    op: Token,
    input: &VectorValue,
    param: AggParam,
    grouping: &[String],
    without: bool,
) -> EngineResult<VectorValue> {
    let AggParam::Scalar(k) = param else {
        return Err(EngineError::EvalError(format!("{op:?} requires a scalar k parameter")));
    };
    if k < 1.0 {
        return Ok(VectorValue::new());
    }
    let k = k as usize;

    let mut out = VectorValue::new();
    for group in group_samples(input, grouping, without) {
        let mut members: Vec<&VectorSample> = group.members.iter().map(|&i| &input.samples[i]).collect();
        if op == Token::TopK {
            members.sort_by(|a, b| b.sample.value.partial_cmp(&a.sample.value).unwrap_or(std::cmp::Ordering::Equal));
        } else {
            members.sort_by(|a, b| a.sample.value.partial_cmp(&b.sample.value).unwrap_or(std::cmp::Ordering::Equal));
        }
        for m in members.into_iter().take(k) {
            out.push(m.metric.clone(), m.sample);
        }
    }
    Ok(out)
}

fn aggregate_quantile(
    input: &VectorValue,
    ts: i64,
    param: AggParam,
    grouping: &[String],
    without: bool,
) -> EngineResult<VectorValue> {
    let AggParam::Scalar(q) = param else {
        return Err(EngineError::EvalError("quantile requires a scalar q parameter".into()));
    };

    let mut out = VectorValue::new();
    for group in group_samples(input, grouping, without) {
        let mut values: Vec<f64> = group.members.iter().map(|&i| input.samples[i].sample.value).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let value = if values.is_empty() {
            f64::NAN
        } else if q < 0.0 {
            f64::NEG_INFINITY
        } else if q > 1.0 {
            f64::INFINITY
        } else if values.len() == 1 {
            values[0]
        } else {
            let rank = q * (values.len() - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            values[lower] + (values[upper] - values[lower]) * weight
        };
        out.push(group.projected, crate::common::types::Sample::new(ts, value));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{Label, Sample};

    fn sample(labels: &[(&str, &str)], v: f64) -> VectorSample {
        VectorSample {
            metric: LabelSet::from_labels(labels.iter().map(|(n, v)| Label::new(*n, *v)).collect()),
            sample: Sample::new(1000, v),
        }
    }

    #[test]
    fn sum_groups_by_remaining_labels() {
        let input = VectorValue {
            samples: vec![
                sample(&[("__name__", "x"), ("job", "a")], 1.0),
                sample(&[("__name__", "x"), ("job", "a")], 2.0),
                sample(&[("__name__", "x"), ("job", "b")], 10.0),
            ],
        };
        let out = aggregate(Token::Sum, &input, 1000, AggParam::None, &["job".to_string()], false).unwrap();
        assert_eq!(out.samples.len(), 2);
        let a = out.samples.iter().find(|s| s.metric.get("job") == Some("a")).unwrap();
        assert_eq!(a.sample.value, 3.0);
    }

    #[test]
    fn topk_keeps_original_labels() {
        let input = VectorValue {
            samples: vec![
                sample(&[("__name__", "x"), ("job", "a")], 1.0),
                sample(&[("__name__", "x"), ("job", "b")], 5.0),
                sample(&[("__name__", "x"), ("job", "c")], 3.0),
            ],
        };
        let out = aggregate(Token::TopK, &input, 1000, AggParam::Scalar(2.0), &[], true).unwrap();
        assert_eq!(out.samples.len(), 2);
        assert_eq!(out.samples[0].sample.value, 5.0);
        assert_eq!(out.samples[0].metric.get("job"), Some("b"));
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let input = VectorValue {
            samples: vec![
                sample(&[("__name__", "x")], 1.0),
                sample(&[("__name__", "x")], 2.0),
                sample(&[("__name__", "x")], 3.0),
                sample(&[("__name__", "x")], 4.0),
            ],
        };
        let out = aggregate(Token::Quantile, &input, 1000, AggParam::Scalar(0.5), &[], true).unwrap();
        assert_eq!(out.samples.len(), 1);
        assert!((out.samples[0].sample.value - 2.5).abs() < 1e-9);
    }

    #[test]
    fn count_values_adds_value_label_per_distinct_value() {
        let input = VectorValue {
            samples: vec![
                sample(&[("__name__", "x")], 1.0),
                sample(&[("__name__", "x")], 1.0),
                sample(&[("__name__", "x")], 2.0),
            ],
        };
        let out = aggregate(
            Token::CountValues,
            &input,
            1000,
            AggParam::Label("value".to_string()),
            &[],
            true,
        )
        .unwrap();
        assert_eq!(out.samples.len(), 2);
        let ones = out.samples.iter().find(|s| s.metric.get("value") == Some("1")).unwrap();
        assert_eq!(ones.sample.value, 2.0);
    }
}
