//! Top-level engine (C1-C8 wired together), grounded in
//! `examples/ccollie-redis-promql/src/module/commands` for the
//! insert/query entry-point split and `spec.md` §6's external interface.

use tracing::debug;

use crate::common::types::{Label, LabelSet, Sample, SeriesId, Timestamp};
use crate::config::{settings, Settings};
use crate::error::{EngineError, EngineResult};
use crate::eval::{EvalFunctionRegistry, Evaluator, QueryValue};
use crate::index::{LabelIndex, LabelMatcher, MatchOp};
use crate::parse::printer::print_ast;
use crate::parse::{FunctionRegistry, Parser};
use crate::storage::{Appender, MemoryStorage};

/// Wires the parser, label index, evaluator, and storage into the single
/// entry point described in `spec.md` §6.
pub struct Engine {
    index: LabelIndex,
    storage: MemoryStorage,
    parse_functions: FunctionRegistry,
    eval_functions: EvalFunctionRegistry,
    lookback_delta_ms: Timestamp,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_settings(settings().clone())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            index: LabelIndex::new(settings.page_size_bytes),
            storage: MemoryStorage::new(),
            parse_functions: FunctionRegistry::with_builtins(),
            eval_functions: EvalFunctionRegistry::with_builtins(),
            lookback_delta_ms: settings.lookback_delta_ms,
        }
    }

    /// `query(query_text, start_ms, end_ms, step_ms) -> Result`, per
    /// `spec.md` §6. `start_ms == end_ms` is an instant query.
    pub fn query(&self, query_text: &str, start_ms: Timestamp, end_ms: Timestamp, step_ms: Timestamp) -> EngineResult<QueryValue> {
        let ast = Parser::parse(query_text, &self.parse_functions)?;
        debug!(ast = %print_ast(&ast), "parsed query");
        let evaluator = Evaluator::new(&self.index, &self.storage, &self.eval_functions, self.lookback_delta_ms);
        evaluator.eval_range(&ast, start_ms, end_ms, step_ms)
    }

    /// `insert(labels_text, t_ms, v)`, per `spec.md` §6: `labels_text` is
    /// parsed as a bare vector selector; its matchers (which must all be
    /// equality matchers) become the series' labels.
    pub fn insert(&mut self, labels_text: &str, t_ms: Timestamp, v: f64) -> EngineResult<SeriesId> {
        let ast = Parser::parse(labels_text, &self.parse_functions)?;
        let matchers = match &ast {
            crate::parse::AstNode::VectorSelector { matchers, .. } => matchers,
            _ => return Err(EngineError::ParseError("insert target must be a vector selector".into())),
        };

        let labels = matchers_to_labels(matchers)?;
        let sid = match self.find_series(&labels) {
            Some(sid) => sid,
            None => {
                let sid = self.index.add_series(labels.clone());
                self.storage.register(sid, labels);
                sid
            }
        };
        self.storage.append(sid, Sample::new(t_ms, v))?;
        Ok(sid)
    }

    /// `label_values(name) -> set<string>`, per `spec.md` §6.
    pub fn label_values(&self, name: &str) -> Vec<String> {
        self.index.label_values(name)
    }

    fn find_series(&self, labels: &LabelSet) -> Option<SeriesId> {
        if labels.is_empty() {
            return None;
        }
        let matchers: Vec<LabelMatcher> = labels
            .iter()
            .map(|l| LabelMatcher::new(MatchOp::Eql, l.name.clone(), l.value.clone()).expect("equality matcher never fails to compile"))
            .collect();
        self.index.resolve_label_matchers(&matchers).into_iter().find(|&sid| {
            self.index.get_labels(sid).is_some_and(|found| found == labels)
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn matchers_to_labels(matchers: &[LabelMatcher]) -> EngineResult<LabelSet> {
    let mut labels = Vec::with_capacity(matchers.len());
    for m in matchers {
        if m.op != MatchOp::Eql {
            return Err(EngineError::ParseError(
                "insert target's label selector must use only equality matchers".into(),
            ));
        }
        labels.push(Label::new(m.name.clone(), m.value.clone()));
    }
    Ok(LabelSet::from_labels(labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_instant_query_round_trips() {
        let mut engine = Engine::new();
        engine.insert(r#"up{job="api"}"#, 1000, 1.0).unwrap();

        let result = engine.query("up", 1000, 1000, 1).unwrap();
        let QueryValue::Vector(v) = result else { panic!("expected vector") };
        assert_eq!(v.samples.len(), 1);
        assert_eq!(v.samples[0].sample.value, 1.0);
    }

    #[test]
    fn repeated_insert_for_same_labels_appends_to_one_series() {
        let mut engine = Engine::new();
        engine.insert(r#"up{job="api"}"#, 1000, 1.0).unwrap();
        engine.insert(r#"up{job="api"}"#, 2000, 0.0).unwrap();
        assert_eq!(engine.index.series_count(), 1);

        let result = engine.query("up", 1000, 2000, 1000).unwrap();
        let QueryValue::Matrix(m) = result else { panic!("expected matrix") };
        assert_eq!(m.series.len(), 1);
        assert_eq!(m.series[0].values.len(), 2);
    }

    #[test]
    fn label_values_enumerates_distinct_values() {
        let mut engine = Engine::new();
        engine.insert(r#"up{job="api"}"#, 1000, 1.0).unwrap();
        engine.insert(r#"up{job="worker"}"#, 1000, 1.0).unwrap();
        assert_eq!(engine.label_values("job"), vec!["api".to_string(), "worker".to_string()]);
    }

    #[test]
    fn insert_rejects_non_equality_selector() {
        let mut engine = Engine::new();
        let err = engine.insert(r#"up{job=~"api.*"}"#, 1000, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::ParseError(_)));
    }
}
