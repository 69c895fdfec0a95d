//! Built-in function implementations, grounded in
//! `examples/original_source/src/parse/functions.cpp`.
//!
//! The source's `function_table` maps both `"delta"` and `"increase"` to
//! `func_rate` -- apparently a copy/paste mistake, since `func_delta` and
//! `func_increase` exist right above it and are never referenced. This
//! registry wires each name to its own implementation.

use std::collections::HashMap;

use crate::common::types::{LabelSet, Sample};
use crate::eval::value::{MatrixValue, VectorValue};

/// Per-step context passed to a function implementation: the output
/// timestamp and, for matrix-consuming functions, the window boundaries
/// the matrix argument was sliced to.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    pub ts: i64,
    pub mat_start: i64,
    pub mat_end: i64,
}

pub type ScalarFn = fn(&EvalContext) -> VectorValue;
pub type MatrixFn = fn(&MatrixValue, &EvalContext) -> VectorValue;

#[derive(Clone, Copy)]
pub enum EvalFunction {
    /// Takes no arguments, evaluated once per output timestamp (`time()`).
    Scalar(ScalarFn),
    /// Takes exactly one matrix argument (`rate`, `increase`, `delta`).
    Matrix(MatrixFn),
}

pub struct EvalFunctionRegistry {
    functions: HashMap<&'static str, EvalFunction>,
}

impl EvalFunctionRegistry {
    pub fn with_builtins() -> Self {
        let mut functions = HashMap::new();
        functions.insert("time", EvalFunction::Scalar(func_time));
        functions.insert("rate", EvalFunction::Matrix(func_rate));
        functions.insert("increase", EvalFunction::Matrix(func_increase));
        functions.insert("delta", EvalFunction::Matrix(func_delta));
        Self { functions }
    }

    pub fn get(&self, name: &str) -> Option<EvalFunction> {
        self.functions.get(name).copied()
    }
}

impl Default for EvalFunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn func_time(ctx: &EvalContext) -> VectorValue {
    let mut vec = VectorValue::new();
    vec.push(LabelSet::new(), Sample::new(ctx.ts, ctx.ts as f64 / 1000.0));
    vec
}

fn func_delta(series: &MatrixValue, ctx: &EvalContext) -> VectorValue {
    extrapolate_rate(series, ctx, false, false)
}

fn func_increase(series: &MatrixValue, ctx: &EvalContext) -> VectorValue {
    extrapolate_rate(series, ctx, true, false)
}

fn func_rate(series: &MatrixValue, ctx: &EvalContext) -> VectorValue {
    extrapolate_rate(series, ctx, true, true)
}

/// The extrapolated-rate algorithm from `spec.md` §4.6, grounded verbatim
/// in `examples/original_source/src/parse/functions.cpp`'s
/// `extrapolate_rate`. Labels are dropped for the output sample, matching
/// the source (`ctx.outvec->add_sample({{}, ...})`).
fn extrapolate_rate(matrix: &MatrixValue, ctx: &EvalContext, is_counter: bool, is_rate: bool) -> VectorValue {
    let mut out = VectorValue::new();

    for series in &matrix.series {
        if series.values.len() < 2 {
            continue;
        }

        let mut counter_correction = 0.0;
        let mut last_value = series.values[0].value;
        for sample in &series.values {
            if is_counter && sample.value < last_value {
                counter_correction += last_value;
            }
            last_value = sample.value;
        }

        let first = series.values.first().unwrap();
        let last = series.values.last().unwrap();
        let mut result_value = last.value - first.value + counter_correction;

        let mut dt_start = (first.timestamp - ctx.mat_start) as f64 / 1000.0;
        let dt_end = (ctx.mat_end - last.timestamp) as f64 / 1000.0;
        let dt_sampled = (last.timestamp - first.timestamp) as f64 / 1000.0;
        let avg_dt = dt_sampled / (series.values.len() - 1) as f64;

        if is_counter && result_value > 0.0 && first.value >= 0.0 {
            let dt_zero = dt_sampled * (first.value / result_value);
            if dt_zero < dt_start {
                dt_start = dt_zero;
            }
        }

        let extrapolation_threshold = avg_dt * 1.1;
        let mut extrapolation_dt = avg_dt;
        extrapolation_dt += if dt_start < extrapolation_threshold { dt_start } else { avg_dt / 2.0 };
        extrapolation_dt += if dt_end < extrapolation_threshold { dt_end } else { avg_dt / 2.0 };

        result_value *= extrapolation_dt / avg_dt;
        if is_rate {
            result_value /= (ctx.mat_end - ctx.mat_start) as f64 / 1000.0;
        }

        out.push(LabelSet::new(), Sample::new(ctx.ts, result_value));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::value::MatrixSeries;

    fn series(points: &[(i64, f64)]) -> MatrixValue {
        MatrixValue {
            series: vec![MatrixSeries {
                metric: LabelSet::new(),
                values: points.iter().map(|&(t, v)| Sample::new(t, v)).collect(),
            }],
        }
    }

    #[test]
    fn rate_of_steady_counter_matches_slope() {
        let m = series(&[(1000, 0.0), (2000, 5.0), (3000, 10.0), (4000, 20.0)]);
        let ctx = EvalContext { ts: 4000, mat_start: 0, mat_end: 4000 };
        let out = func_rate(&m, &ctx);
        assert_eq!(out.samples.len(), 1);
        assert!((out.samples[0].sample.value - 5.0).abs() < 1.0);
    }

    #[test]
    fn increase_applies_counter_correction_on_reset() {
        let m = series(&[(1000, 0.0), (2000, 5.0), (3000, 3.0), (4000, 8.0)]);
        let ctx = EvalContext { ts: 4000, mat_start: 0, mat_end: 4000 };
        let out = func_increase(&m, &ctx);
        assert_eq!(out.samples.len(), 1);
        assert!(out.samples[0].sample.value > 8.0);
    }

    #[test]
    fn delta_does_not_correct_for_resets() {
        let m = series(&[(1000, 10.0), (2000, 4.0)]);
        let ctx = EvalContext { ts: 2000, mat_start: 1000, mat_end: 2000 };
        let out = func_delta(&m, &ctx);
        assert!(out.samples[0].sample.value < 0.0);
    }

    #[test]
    fn single_sample_series_is_skipped() {
        let m = series(&[(1000, 1.0)]);
        let ctx = EvalContext { ts: 1000, mat_start: 0, mat_end: 1000 };
        assert!(func_rate(&m, &ctx).samples.is_empty());
    }
}
