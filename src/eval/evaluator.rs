//! The range evaluator (C7), grounded in
//! `examples/original_source/src/parse/executor.cpp`'s `Executor`.
//!
//! `examples/original_source/src/parse/executor.cpp`'s inner step loop
//! checks only the first unconsumed sample of each series against the
//! current `ts` and `break`s out regardless of whether it matched, which
//! silently drops every later sample in a sparse series (see DESIGN.md,
//! "range_eval cursor"). `MatrixCursor` below advances each series'
//! position monotonically across the whole timestamp grid instead and
//! never breaks out early, so sparse series are sampled correctly while
//! the scan remains O(total samples) across all steps.

use std::collections::{HashMap, HashSet};

use crate::common::types::{Label, LabelSet, Sample, Timestamp};
use crate::error::{EngineError, EngineResult};
use crate::eval::aggregation::{self, AggParam};
use crate::eval::functions::{EvalContext, EvalFunction, EvalFunctionRegistry};
use crate::eval::value::{MatrixSeries, MatrixValue, QueryValue, ScalarValue, VectorSample, VectorValue};
use crate::index::{LabelIndex, LabelMatcher};
use crate::parse::ast::{AstNode, ValueType, VectorMatching};
use crate::parse::token::Token;
use crate::storage::{Querier, Queryable, Series, SeriesIterator, SeriesSet};

pub struct Evaluator<'a, S: Queryable> {
    index: &'a LabelIndex,
    storage: &'a S,
    functions: &'a EvalFunctionRegistry,
    /// How far back a bare vector selector (no explicit range) may look
    /// for its most recent sample when none lands exactly on the query
    /// grid, mirroring Prometheus's staleness lookback (`spec.md` §3,
    /// `config::Settings::lookback_delta_ms`).
    lookback_delta_ms: Timestamp,
}

/// Accumulates per-step samples into series, keyed by the canonical string
/// of their label set, preserving first-seen order (`spec.md` §5:
/// "output series in an aggregation are in insertion order of the
/// canonical key").
struct MatrixBuilder {
    order: Vec<String>,
    series: HashMap<String, MatrixSeries>,
}

impl MatrixBuilder {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            series: HashMap::new(),
        }
    }

    fn push(&mut self, metric: LabelSet, sample: Sample) {
        let key = metric.canonical_key();
        if let Some(s) = self.series.get_mut(&key) {
            s.values.push(sample);
        } else {
            self.order.push(key.clone());
            self.series.insert(key, MatrixSeries { metric, values: vec![sample] });
        }
    }

    fn build(mut self) -> MatrixValue {
        let series = self.order.drain(..).map(|k| self.series.remove(&k).unwrap()).collect();
        MatrixValue { series }
    }
}

/// Walks a `MatrixValue`'s series in lockstep with an increasing sequence
/// of output timestamps, picking out the sample at each series whose
/// timestamp exactly matches the current `ts` (`spec.md` §4.6, range_eval
/// driver step 2a).
struct MatrixCursor<'m> {
    series: &'m [MatrixSeries],
    pos: Vec<usize>,
}

impl<'m> MatrixCursor<'m> {
    fn new(m: &'m MatrixValue) -> Self {
        Self {
            series: &m.series,
            pos: vec![0; m.series.len()],
        }
    }

    fn vector_at(&mut self, ts: Timestamp) -> VectorValue {
        let mut out = VectorValue::new();
        for (i, s) in self.series.iter().enumerate() {
            while self.pos[i] < s.values.len() && s.values[self.pos[i]].timestamp < ts {
                self.pos[i] += 1;
            }
            if self.pos[i] < s.values.len() && s.values[self.pos[i]].timestamp == ts {
                out.push(s.metric.clone(), s.values[self.pos[i]]);
                self.pos[i] += 1;
            }
        }
        out
    }
}

fn matching_key(labels: &LabelSet, matching: &VectorMatching) -> String {
    if matching.on {
        labels.project(&matching.labels, false).canonical_key()
    } else {
        labels.project(&matching.labels, true).canonical_key()
    }
}

/// Elementwise application of one operator, per `spec.md` §4.6. Comparison
/// operators without the `bool` modifier act as a filter: `None` means
/// "drop this sample", `Some(a)` keeps it unchanged.
fn apply_binop_value(op: Token, a: f64, b: f64, bool_modifier: bool) -> Option<f64> {
    match op {
        Token::Add => Some(a + b),
        Token::Sub => Some(a - b),
        Token::Mul => Some(a * b),
        Token::Div => Some(a / b),
        Token::Mod => Some(a % b),
        Token::Pow => Some(a.powf(b)),
        Token::Eql | Token::Neq | Token::Lss | Token::Gtr | Token::Lte | Token::Gte => {
            let pred = match op {
                Token::Eql => a == b,
                Token::Neq => a != b,
                Token::Lss => a < b,
                Token::Gtr => a > b,
                Token::Lte => a <= b,
                Token::Gte => a >= b,
                _ => unreachable!(),
            };
            if bool_modifier {
                Some(if pred { 1.0 } else { 0.0 })
            } else if pred {
                Some(a)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn matrix_arg_range_offset(node: &AstNode) -> EngineResult<(i64, i64)> {
    match node {
        AstNode::MatrixSelector { range_ms, offset_ms, .. } => Ok((*range_ms, *offset_ms)),
        AstNode::Subquery { range_ms, offset_ms, .. } => Ok((*range_ms, *offset_ms)),
        _ => Err(EngineError::EvalError(
            "matrix-consuming function argument must be a matrix selector or subquery".into(),
        )),
    }
}

fn slice_window(super_mat: &MatrixValue, mint: Timestamp, maxt: Timestamp) -> MatrixValue {
    let mut series = Vec::new();
    for s in &super_mat.series {
        let lo = s.values.partition_point(|v| v.timestamp < mint);
        let hi = s.values.partition_point(|v| v.timestamp <= maxt);
        if hi > lo {
            series.push(MatrixSeries {
                metric: s.metric.clone(),
                values: s.values[lo..hi].to_vec(),
            });
        }
    }
    MatrixValue { series }
}

impl<'a, S: Queryable> Evaluator<'a, S> {
    pub fn new(index: &'a LabelIndex, storage: &'a S, functions: &'a EvalFunctionRegistry, lookback_delta_ms: Timestamp) -> Self {
        Self { index, storage, functions, lookback_delta_ms }
    }

    /// Entry point (`spec.md` §4.6): evaluates `node` over `[start, end]`
    /// stepping by `step`, downcasting to `Scalar`/`Vector` when
    /// `start == end` exactly as an instant query.
    pub fn eval_range(&self, node: &AstNode, start: Timestamp, end: Timestamp, step: Timestamp) -> EngineResult<QueryValue> {
        let step = step.max(1);
        match node.value_type() {
            ValueType::Str => Err(EngineError::EvalError("query must not evaluate to a string".into())),
            ValueType::Matrix => {
                let mat = self.eval_matrix_window(node, end)?;
                Ok(QueryValue::Matrix(mat))
            }
            ValueType::Scalar => {
                let mat = self.eval_node(node, start, end, step)?;
                if start == end {
                    let v = mat.series.first().and_then(|s| s.values.first()).map(|s| s.value).unwrap_or(f64::NAN);
                    Ok(QueryValue::Scalar(ScalarValue { timestamp: start, value: v }))
                } else {
                    Ok(QueryValue::Matrix(mat))
                }
            }
            ValueType::Vector => {
                let mat = self.eval_node(node, start, end, step)?;
                if start == end {
                    let mut vec = VectorValue::new();
                    for s in &mat.series {
                        if let Some(v) = s.values.first() {
                            vec.push(s.metric.clone(), *v);
                        }
                    }
                    Ok(QueryValue::Vector(vec))
                } else {
                    Ok(QueryValue::Matrix(mat))
                }
            }
        }
    }

    fn eval_node(&self, node: &AstNode, start: Timestamp, end: Timestamp, step: Timestamp) -> EngineResult<MatrixValue> {
        match node {
            AstNode::NumberLiteral(v) => {
                let mut mb = MatrixBuilder::new();
                let mut ts = start;
                while ts <= end {
                    mb.push(LabelSet::new(), Sample::new(ts, *v));
                    ts += step;
                }
                Ok(mb.build())
            }
            AstNode::StringLiteral(_) => Err(EngineError::EvalError(
                "string literal cannot be used where a numeric value is required".into(),
            )),
            AstNode::Unary { op, operand } => {
                let inner = self.eval_node(operand, start, end, step)?;
                let mut mb = MatrixBuilder::new();
                for s in inner.series {
                    for v in s.values {
                        let value = if *op == Token::Sub { -v.value } else { v.value };
                        mb.push(s.metric.clone(), Sample::new(v.timestamp, value));
                    }
                }
                Ok(mb.build())
            }
            AstNode::Binary { op, lhs, rhs, bool_modifier, matching } => {
                self.eval_binary(*op, lhs, rhs, *bool_modifier, matching, start, end, step)
            }
            AstNode::VectorSelector { matchers, offset_ms, .. } => {
                self.eval_vector_selector(matchers, *offset_ms, start, end, step)
            }
            AstNode::MatrixSelector { .. } | AstNode::Subquery { .. } => Err(EngineError::EvalError(
                "matrix-typed expression used where a scalar or vector value is required".into(),
            )),
            AstNode::FuncCall { name, args, .. } => self.eval_func_call(name, args, start, end, step),
            AstNode::Aggregation { op, expr, param, grouping, without } => {
                self.eval_aggregation(*op, expr, param.as_deref(), grouping, *without, start, end, step)
            }
        }
    }

    /// Picks, for each grid timestamp, the most recent sample at or before
    /// that point within `lookback_delta_ms` -- the Prometheus staleness
    /// rule for a bare vector selector with no explicit range. The
    /// per-series iterator still only ever advances, so a sparse series is
    /// sampled in one forward pass regardless of how large the lookback
    /// window is.
    fn eval_vector_selector(
        &self,
        matchers: &[LabelMatcher],
        offset_ms: i64,
        start: Timestamp,
        end: Timestamp,
        step: Timestamp,
    ) -> EngineResult<MatrixValue> {
        let start_eff = start - offset_ms - self.lookback_delta_ms;
        let end_eff = end - offset_ms;
        let sids = self.index.resolve_label_matchers(matchers);
        let querier = self.storage.querier(start_eff, end_eff)?;
        let mut set = querier.select(&sids)?;

        let mut out = Vec::new();
        while let Some(series) = set.next() {
            let mut it = series.iterator();
            let mut has_pos = it.seek(start_eff);
            let mut last: Option<Sample> = None;
            let mut values = Vec::new();
            let mut ts = start;
            while ts <= end {
                let target = ts - offset_ms;
                while has_pos && it.at().timestamp <= target {
                    last = Some(it.at());
                    has_pos = it.next();
                }
                if let Some(sample) = last {
                    if target - sample.timestamp <= self.lookback_delta_ms {
                        values.push(Sample::new(ts, sample.value));
                    }
                }
                ts += step;
            }
            if !values.is_empty() {
                out.push(MatrixSeries { metric: series.labels().clone(), values });
            }
        }
        Ok(MatrixValue { series: out })
    }

    fn fetch_range(&self, matchers: &[LabelMatcher], mint: Timestamp, maxt: Timestamp) -> EngineResult<MatrixValue> {
        let sids = self.index.resolve_label_matchers(matchers);
        let querier = self.storage.querier(mint, maxt)?;
        let mut set = querier.select(&sids)?;
        let mut out = Vec::new();
        while let Some(series) = set.next() {
            let mut it = series.iterator();
            let mut values = Vec::new();
            if it.seek(mint) {
                loop {
                    let sample = it.at();
                    if sample.timestamp > maxt {
                        break;
                    }
                    values.push(sample);
                    if !it.next() {
                        break;
                    }
                }
            }
            if !values.is_empty() {
                out.push(MatrixSeries { metric: series.labels().clone(), values });
            }
        }
        Ok(MatrixValue { series: out })
    }

    /// Resolves a bare top-level matrix-typed query (`metric[5m]`) to the
    /// raw range-vector result ending at `end`. There is no stepped range
    /// form for a matrix-typed query per `spec.md` §6; only scalar/vector
    /// queries step across `[start, end]`.
    fn eval_matrix_window(&self, node: &AstNode, end: Timestamp) -> EngineResult<MatrixValue> {
        match node {
            AstNode::MatrixSelector { matchers, range_ms, offset_ms, .. } => {
                let maxt = end - offset_ms;
                let mint = maxt - range_ms;
                self.fetch_range(matchers, mint, maxt)
            }
            AstNode::Subquery { expr, range_ms, step_ms, offset_ms } => {
                let maxt = end - offset_ms;
                let mint = maxt - range_ms;
                self.eval_node(expr, mint, maxt, *step_ms)
            }
            _ => Err(EngineError::EvalError("expected a matrix-typed expression".into())),
        }
    }

    fn eval_binary(
        &self,
        op: Token,
        lhs: &AstNode,
        rhs: &AstNode,
        bool_modifier: bool,
        matching: &VectorMatching,
        start: Timestamp,
        end: Timestamp,
        step: Timestamp,
    ) -> EngineResult<MatrixValue> {
        let lhs_ty = lhs.value_type();
        let rhs_ty = rhs.value_type();
        if matches!(lhs_ty, ValueType::Matrix | ValueType::Str) || matches!(rhs_ty, ValueType::Matrix | ValueType::Str) {
            return Err(EngineError::EvalError("binary operator operands must be scalar or vector".into()));
        }

        let lmat = self.eval_node(lhs, start, end, step)?;
        let rmat = self.eval_node(rhs, start, end, step)?;
        let mut lc = MatrixCursor::new(&lmat);
        let mut rc = MatrixCursor::new(&rmat);
        let mut mb = MatrixBuilder::new();
        let mut ts = start;
        while ts <= end {
            let lv = lc.vector_at(ts);
            let rv = rc.vector_at(ts);
            let step_out = self.binop_step(op, lhs_ty, rhs_ty, &lv, &rv, bool_modifier, matching, ts)?;
            for s in step_out.samples {
                mb.push(s.metric, s.sample);
            }
            ts += step;
        }
        Ok(mb.build())
    }

    fn binop_step(
        &self,
        op: Token,
        lhs_ty: ValueType,
        rhs_ty: ValueType,
        lv: &VectorValue,
        rv: &VectorValue,
        bool_modifier: bool,
        matching: &VectorMatching,
        ts: Timestamp,
    ) -> EngineResult<VectorValue> {
        let mut out = VectorValue::new();
        match (lhs_ty, rhs_ty) {
            (ValueType::Scalar, ValueType::Scalar) => {
                if let (Some(a), Some(b)) = (lv.samples.first(), rv.samples.first()) {
                    // A scalar comparison has no label set to filter, so it
                    // always reports its boolean outcome regardless of `bool`.
                    if let Some(v) = apply_binop_value(op, a.sample.value, b.sample.value, true) {
                        out.push(LabelSet::new(), Sample::new(ts, v));
                    }
                }
                Ok(out)
            }
            (ValueType::Vector, ValueType::Scalar) => {
                let b = rv.samples.first().map(|s| s.sample.value).unwrap_or(f64::NAN);
                for s in &lv.samples {
                    if let Some(v) = apply_binop_value(op, s.sample.value, b, bool_modifier) {
                        out.push(s.metric.clone(), Sample::new(ts, v));
                    }
                }
                Ok(out)
            }
            (ValueType::Scalar, ValueType::Vector) => {
                let a = lv.samples.first().map(|s| s.sample.value).unwrap_or(f64::NAN);
                for s in &rv.samples {
                    if let Some(v) = apply_binop_value(op, a, s.sample.value, bool_modifier) {
                        out.push(s.metric.clone(), Sample::new(ts, v));
                    }
                }
                Ok(out)
            }
            (ValueType::Vector, ValueType::Vector) => self.eval_vector_vector(op, bool_modifier, matching, lv, rv, ts),
            _ => Err(EngineError::EvalError("unsupported operand types for binary operator".into())),
        }
    }

    fn eval_vector_vector(
        &self,
        op: Token,
        bool_modifier: bool,
        matching: &VectorMatching,
        lv: &VectorValue,
        rv: &VectorValue,
        ts: Timestamp,
    ) -> EngineResult<VectorValue> {
        if matches!(op, Token::Land | Token::Lor | Token::Lunless) {
            return Ok(eval_set_op(op, matching, lv, rv));
        }

        let many_is_right = matching.group_right;
        let (one, many): (&VectorValue, &VectorValue) = if many_is_right { (lv, rv) } else { (rv, lv) };

        let mut one_map: HashMap<String, &VectorSample> = HashMap::new();
        let mut dup: HashSet<String> = HashSet::new();
        for s in &one.samples {
            let k = matching_key(&s.metric, matching);
            if one_map.insert(k.clone(), s).is_some() {
                dup.insert(k);
            }
        }

        let mut out = VectorValue::new();
        for m in &many.samples {
            let k = matching_key(&m.metric, matching);
            if dup.contains(&k) {
                return Err(EngineError::EvalError(
                    "many-to-many vector matching requires group_left or group_right".into(),
                ));
            }
            let Some(&o) = one_map.get(&k) else { continue };
            let (a, b) = if many_is_right { (o.sample.value, m.sample.value) } else { (m.sample.value, o.sample.value) };
            let Some(value) = apply_binop_value(op, a, b, bool_modifier) else { continue };

            let mut labels: Vec<Label> = m.metric.as_slice().to_vec();
            for inc in &matching.include {
                if let Some(v) = o.metric.get(inc) {
                    labels.push(Label::new(inc.clone(), v.to_string()));
                }
            }
            out.push(LabelSet::from_labels(labels), Sample::new(ts, value));
        }
        Ok(out)
    }

    fn eval_func_call(&self, name: &str, args: &[AstNode], start: Timestamp, end: Timestamp, step: Timestamp) -> EngineResult<MatrixValue> {
        let func = self
            .functions
            .get(name)
            .ok_or_else(|| EngineError::EvalError(format!("undefined function \"{name}\"")))?;

        match func {
            EvalFunction::Scalar(f) => {
                let mut mb = MatrixBuilder::new();
                let mut ts = start;
                while ts <= end {
                    let ctx = EvalContext { ts, mat_start: ts, mat_end: ts };
                    for s in f(&ctx).samples {
                        mb.push(s.metric, s.sample);
                    }
                    ts += step;
                }
                Ok(mb.build())
            }
            EvalFunction::Matrix(f) => {
                let arg = args
                    .first()
                    .ok_or_else(|| EngineError::EvalError(format!("\"{name}\" requires a matrix argument")))?;
                let (range_ms, offset_ms) = matrix_arg_range_offset(arg)?;
                let global_mint = start - offset_ms - range_ms;
                let global_maxt = end - offset_ms;

                let super_mat = match arg {
                    AstNode::MatrixSelector { matchers, .. } => self.fetch_range(matchers, global_mint, global_maxt)?,
                    AstNode::Subquery { expr, step_ms, .. } => self.eval_node(expr, global_mint, global_maxt, *step_ms)?,
                    _ => {
                        return Err(EngineError::EvalError(format!(
                            "\"{name}\" argument must be a matrix selector or subquery"
                        )))
                    }
                };

                let mut mb = MatrixBuilder::new();
                let mut ts = start;
                while ts <= end {
                    let maxt = ts - offset_ms;
                    let mint = maxt - range_ms;
                    let window = slice_window(&super_mat, mint, maxt);
                    let ctx = EvalContext { ts, mat_start: mint, mat_end: maxt };
                    for s in f(&window, &ctx).samples {
                        mb.push(s.metric, s.sample);
                    }
                    ts += step;
                }
                Ok(mb.build())
            }
        }
    }

    fn eval_aggregation(
        &self,
        op: Token,
        expr: &AstNode,
        param: Option<&AstNode>,
        grouping: &[String],
        without: bool,
        start: Timestamp,
        end: Timestamp,
        step: Timestamp,
    ) -> EngineResult<MatrixValue> {
        let inner = self.eval_node(expr, start, end, step)?;
        let mut cursor = MatrixCursor::new(&inner);

        let count_values_label = if op == Token::CountValues {
            match param {
                Some(AstNode::StringLiteral(s)) => Some(s.clone()),
                _ => return Err(EngineError::EvalError("count_values requires a string label-name parameter".into())),
            }
        } else {
            None
        };
        let param_mat = match param {
            Some(p) if op != Token::CountValues => Some(self.eval_node(p, start, end, step)?),
            _ => None,
        };
        let mut param_cursor = param_mat.as_ref().map(MatrixCursor::new);

        let mut mb = MatrixBuilder::new();
        let mut ts = start;
        while ts <= end {
            let step_vec = cursor.vector_at(ts);
            let agg_param = if let Some(label) = &count_values_label {
                AggParam::Label(label.clone())
            } else if let Some(pc) = param_cursor.as_mut() {
                let v = pc.vector_at(ts).samples.first().map(|s| s.sample.value).unwrap_or(f64::NAN);
                AggParam::Scalar(v)
            } else {
                AggParam::None
            };
            let result = aggregation::aggregate(op, &step_vec, ts, agg_param, grouping, without)?;
            for s in result.samples {
                mb.push(s.metric, s.sample);
            }
            ts += step;
        }
        Ok(mb.build())
    }
}

fn eval_set_op(op: Token, matching: &VectorMatching, lv: &VectorValue, rv: &VectorValue) -> VectorValue {
    let mut out = VectorValue::new();
    match op {
        Token::Land => {
            let rhs_keys: HashSet<String> = rv.samples.iter().map(|s| matching_key(&s.metric, matching)).collect();
            for s in &lv.samples {
                if rhs_keys.contains(&matching_key(&s.metric, matching)) {
                    out.push(s.metric.clone(), s.sample);
                }
            }
        }
        Token::Lunless => {
            let rhs_keys: HashSet<String> = rv.samples.iter().map(|s| matching_key(&s.metric, matching)).collect();
            for s in &lv.samples {
                if !rhs_keys.contains(&matching_key(&s.metric, matching)) {
                    out.push(s.metric.clone(), s.sample);
                }
            }
        }
        Token::Lor => {
            let lhs_keys: HashSet<String> = lv.samples.iter().map(|s| matching_key(&s.metric, matching)).collect();
            for s in &lv.samples {
                out.push(s.metric.clone(), s.sample);
            }
            for s in &rv.samples {
                if !lhs_keys.contains(&matching_key(&s.metric, matching)) {
                    out.push(s.metric.clone(), s.sample);
                }
            }
        }
        _ => unreachable!("eval_set_op called with a non-set operator"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Label;
    use crate::parse::functions::FunctionRegistry;
    use crate::parse::parser::Parser;
    use crate::storage::{Appender, MemoryStorage};

    struct Fixture {
        index: LabelIndex,
        storage: MemoryStorage,
        parse_fns: FunctionRegistry,
        eval_fns: EvalFunctionRegistry,
        lookback_delta_ms: i64,
    }

    impl Fixture {
        /// Zero lookback, so tests exercise exact grid-timestamp matching
        /// unless they opt into staleness lookback via `with_lookback`.
        fn new() -> Self {
            Self {
                index: LabelIndex::new(4096),
                storage: MemoryStorage::new(),
                parse_fns: FunctionRegistry::with_builtins(),
                eval_fns: EvalFunctionRegistry::with_builtins(),
                lookback_delta_ms: 0,
            }
        }

        fn with_lookback(lookback_delta_ms: i64) -> Self {
            Self { lookback_delta_ms, ..Self::new() }
        }

        fn add_series(&mut self, labels: &[(&str, &str)], samples: &[(i64, f64)]) {
            let ls = LabelSet::from_labels(labels.iter().map(|(n, v)| Label::new(*n, *v)).collect());
            let sid = self.index.add_series(ls.clone());
            self.storage.register(sid, ls);
            for &(t, v) in samples {
                self.storage.append(sid, Sample::new(t, v)).unwrap();
            }
        }

        fn eval(&self, query: &str, start: i64, end: i64, step: i64) -> QueryValue {
            let ast = Parser::parse(query, &self.parse_fns).unwrap();
            let evaluator = Evaluator::new(&self.index, &self.storage, &self.eval_fns, self.lookback_delta_ms);
            evaluator.eval_range(&ast, start, end, step).unwrap()
        }
    }

    #[test]
    fn range_query_keeps_sparse_sample_without_cursor_loss() {
        let mut fx = Fixture::new();
        fx.add_series(&[("__name__", "up"), ("job", "api")], &[(5000, 1.0)]);

        let result = fx.eval("up", 0, 10_000, 1_000);
        let QueryValue::Matrix(m) = result else { panic!("expected matrix") };
        assert_eq!(m.series.len(), 1);
        assert_eq!(m.series[0].values, vec![Sample::new(5000, 1.0)]);
    }

    #[test]
    fn instant_vector_query_returns_vector() {
        let mut fx = Fixture::new();
        fx.add_series(&[("__name__", "up")], &[(1000, 1.0)]);
        let result = fx.eval("up", 1000, 1000, 1);
        let QueryValue::Vector(v) = result else { panic!("expected vector") };
        assert_eq!(v.samples.len(), 1);
        assert_eq!(v.samples[0].sample.value, 1.0);
    }

    #[test]
    fn increase_corrects_for_counter_reset() {
        let mut fx = Fixture::new();
        fx.add_series(
            &[("__name__", "requests_total")],
            &[(1000, 0.0), (2000, 5.0), (3000, 3.0), (4000, 8.0)],
        );
        let result = fx.eval("increase(requests_total[4s])", 4000, 4000, 1);
        let QueryValue::Vector(v) = result else { panic!("expected vector") };
        assert_eq!(v.samples.len(), 1);
        assert!(v.samples[0].sample.value > 8.0);
    }

    #[test]
    fn sum_by_aggregates_across_matching_series() {
        let mut fx = Fixture::new();
        fx.add_series(&[("__name__", "x"), ("job", "a"), ("inst", "1")], &[(1000, 1.0)]);
        fx.add_series(&[("__name__", "x"), ("job", "a"), ("inst", "2")], &[(1000, 2.0)]);
        fx.add_series(&[("__name__", "x"), ("job", "b"), ("inst", "1")], &[(1000, 10.0)]);

        let result = fx.eval("sum by (job) (x)", 1000, 1000, 1);
        let QueryValue::Vector(v) = result else { panic!("expected vector") };
        assert_eq!(v.samples.len(), 2);
        let a = v.samples.iter().find(|s| s.metric.get("job") == Some("a")).unwrap();
        assert_eq!(a.sample.value, 3.0);
    }

    #[test]
    fn vector_scalar_comparison_filters_without_bool() {
        let mut fx = Fixture::new();
        fx.add_series(&[("__name__", "x"), ("job", "a")], &[(1000, 5.0)]);
        fx.add_series(&[("__name__", "x"), ("job", "b")], &[(1000, 1.0)]);

        let result = fx.eval("x > 2", 1000, 1000, 1);
        let QueryValue::Vector(v) = result else { panic!("expected vector") };
        assert_eq!(v.samples.len(), 1);
        assert_eq!(v.samples[0].metric.get("job"), Some("a"));
        assert_eq!(v.samples[0].sample.value, 5.0);
    }

    #[test]
    fn vector_vector_binop_matches_by_default_label_set() {
        let mut fx = Fixture::new();
        fx.add_series(&[("__name__", "a"), ("job", "x")], &[(1000, 10.0)]);
        fx.add_series(&[("__name__", "b"), ("job", "x")], &[(1000, 4.0)]);

        let result = fx.eval(r#"a{job="x"} / ignoring(__name__) b{job="x"}"#, 1000, 1000, 1);
        let QueryValue::Vector(v) = result else { panic!("expected vector") };
        assert_eq!(v.samples.len(), 1);
        assert_eq!(v.samples[0].sample.value, 2.5);
    }

    #[test]
    fn empty_matcher_resolution_produces_empty_matrix_not_error() {
        let fx = Fixture::new();
        let result = fx.eval("nonexistent_metric", 0, 1000, 100);
        let QueryValue::Matrix(m) = result else { panic!("expected matrix") };
        assert!(m.series.is_empty());
    }

    #[test]
    fn lookback_delta_extends_a_stale_sample_within_the_window() {
        let mut fx = Fixture::with_lookback(5_000);
        fx.add_series(&[("__name__", "up")], &[(1000, 1.0)]);

        // 4s after the sample: still within the 5s lookback window.
        let result = fx.eval("up", 5000, 5000, 1);
        let QueryValue::Vector(v) = result else { panic!("expected vector") };
        assert_eq!(v.samples.len(), 1);
        assert_eq!(v.samples[0].sample.value, 1.0);

        // 6s after the sample: past the lookback window, so it has gone stale.
        let result = fx.eval("up", 7000, 7000, 1);
        let QueryValue::Vector(v) = result else { panic!("expected vector") };
        assert!(v.samples.is_empty());
    }

    #[test]
    fn many_to_many_without_group_modifier_is_an_eval_error() {
        let mut fx = Fixture::new();
        fx.add_series(&[("__name__", "a"), ("job", "x"), ("inst", "1")], &[(1000, 1.0)]);
        fx.add_series(&[("__name__", "a"), ("job", "x"), ("inst", "2")], &[(1000, 2.0)]);
        fx.add_series(&[("__name__", "b"), ("job", "x"), ("inst", "1")], &[(1000, 10.0)]);
        fx.add_series(&[("__name__", "b"), ("job", "x"), ("inst", "2")], &[(1000, 20.0)]);

        let ast = Parser::parse(r#"a / ignoring(__name__, inst) b"#, &fx.parse_fns).unwrap();
        let evaluator = Evaluator::new(&fx.index, &fx.storage, &fx.eval_fns, fx.lookback_delta_ms);
        let result = evaluator.eval_range(&ast, 1000, 1000, 1);
        assert!(matches!(result, Err(EngineError::EvalError(_))));
    }
}
