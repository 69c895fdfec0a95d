//! Execution value model (C8): `ScalarValue`/`VectorValue`/`MatrixValue`
//! plus the JSON result envelope from `spec.md` §6. Grounded in
//! `examples/original_source/include/value.h`'s `ExecValue` hierarchy,
//! adapted to plain structs since Rust has no need for the base-class
//! dispatch the original uses it for.

use serde::Serialize;

use crate::common::types::{LabelSet, Sample, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarValue {
    pub timestamp: Timestamp,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSample {
    pub metric: LabelSet,
    pub sample: Sample,
}

#[derive(Debug, Clone, Default)]
pub struct VectorValue {
    pub samples: Vec<VectorSample>,
}

impl VectorValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metric: LabelSet, sample: Sample) {
        self.samples.push(VectorSample { metric, sample });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSeries {
    pub metric: LabelSet,
    pub values: Vec<Sample>,
}

#[derive(Debug, Clone, Default)]
pub struct MatrixValue {
    pub series: Vec<MatrixSeries>,
}

impl MatrixValue {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The top-level value an `Engine::query` call produces, downcast from a
/// `MatrixValue` for instant queries per `spec.md` §4.1/§6.
#[derive(Debug, Clone)]
pub enum QueryValue {
    Scalar(ScalarValue),
    Vector(VectorValue),
    Matrix(MatrixValue),
}

#[derive(Serialize)]
#[serde(tag = "status")]
pub enum QueryResponse {
    #[serde(rename = "success")]
    Success { data: ResultData },
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Serialize)]
pub struct ResultData {
    #[serde(rename = "resultType")]
    pub result_type: &'static str,
    pub result: serde_json::Value,
}

fn fmt_timestamp(ts: Timestamp) -> serde_json::Value {
    serde_json::Value::from(format!("{:.3}", ts as f64 / 1000.0).parse::<f64>().unwrap_or(0.0))
}

fn fmt_value(v: f64) -> serde_json::Value {
    serde_json::Value::String(v.to_string())
}

fn encode_sample(ts: Timestamp, v: f64) -> serde_json::Value {
    serde_json::json!([fmt_timestamp(ts), fmt_value(v)])
}

fn encode_metric(labels: &LabelSet) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .map(|l| (l.name.clone(), serde_json::Value::String(l.value.clone())))
        .collect();
    serde_json::Value::Object(map)
}

impl QueryValue {
    pub fn into_response(self) -> QueryResponse {
        let (result_type, result) = match self {
            QueryValue::Scalar(s) => ("scalar", encode_sample(s.timestamp, s.value)),
            QueryValue::Vector(v) => {
                let items: Vec<serde_json::Value> = v
                    .samples
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "metric": encode_metric(&s.metric),
                            "value": encode_sample(s.sample.timestamp, s.sample.value),
                        })
                    })
                    .collect();
                ("vector", serde_json::Value::Array(items))
            }
            QueryValue::Matrix(m) => {
                let items: Vec<serde_json::Value> = m
                    .series
                    .iter()
                    .map(|s| {
                        let values: Vec<serde_json::Value> =
                            s.values.iter().map(|p| encode_sample(p.timestamp, p.value)).collect();
                        serde_json::json!({
                            "metric": encode_metric(&s.metric),
                            "values": values,
                        })
                    })
                    .collect();
                ("matrix", serde_json::Value::Array(items))
            }
        };
        QueryResponse::Success {
            data: ResultData { result_type, result },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Label;

    #[test]
    fn encodes_scalar_envelope() {
        let resp = QueryValue::Scalar(ScalarValue { timestamp: 1500, value: 2.0 }).into_response();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["resultType"], "scalar");
        assert_eq!(json["data"]["result"][0], 1.5);
        assert_eq!(json["data"]["result"][1], "2");
    }

    #[test]
    fn encodes_vector_envelope() {
        let mut v = VectorValue::new();
        v.push(
            LabelSet::from_labels(vec![Label::new("__name__", "up")]),
            Sample::new(1000, 1.0),
        );
        let resp = QueryValue::Vector(v).into_response();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["data"]["resultType"], "vector");
        assert_eq!(json["data"]["result"][0]["metric"]["__name__"], "up");
        assert_eq!(json["data"]["result"][0]["value"][1], "1");
    }
}
