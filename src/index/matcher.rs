//! Label matchers, per `spec.md` §3.

use regex::Regex;

use crate::common::types::Label;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    Eql,
    Neq,
    Lss,
    Gtr,
    Lte,
    Gte,
    EqlRegex,
    NeqRegex,
}

impl MatchOp {
    pub fn is_regex(self) -> bool {
        matches!(self, MatchOp::EqlRegex | MatchOp::NeqRegex)
    }

    pub fn is_negative(self) -> bool {
        matches!(self, MatchOp::Neq | MatchOp::NeqRegex)
    }
}

/// A single (op, name, value) predicate over one label, per `spec.md` §3.
/// Regex variants compile `value` as an anchored regular expression.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    pub op: MatchOp,
    pub name: String,
    pub value: String,
    regex: Option<Regex>,
}

impl LabelMatcher {
    pub fn new(op: MatchOp, name: impl Into<String>, value: impl Into<String>) -> EngineResult<Self> {
        let name = name.into();
        let value = value.into();
        let regex = if op.is_regex() {
            let anchored = format!("^(?:{value})$");
            Some(Regex::new(&anchored).map_err(|e| {
                EngineError::ParseError(format!("invalid regex in matcher: {e}"))
            })?)
        } else {
            None
        };
        Ok(Self {
            op,
            name,
            value,
            regex,
        })
    }

    pub fn matches_value(&self, candidate: &str) -> bool {
        match self.op {
            MatchOp::Eql => candidate == self.value,
            MatchOp::Neq => candidate != self.value,
            MatchOp::Lss => candidate < self.value.as_str(),
            MatchOp::Gtr => candidate > self.value.as_str(),
            MatchOp::Lte => candidate <= self.value.as_str(),
            MatchOp::Gte => candidate >= self.value.as_str(),
            MatchOp::EqlRegex => self.regex.as_ref().is_some_and(|r| r.is_match(candidate)),
            MatchOp::NeqRegex => !self.regex.as_ref().is_some_and(|r| r.is_match(candidate)),
        }
    }

    pub fn matches_label(&self, label: &Label) -> bool {
        label.name == self.name && self.matches_value(&label.value)
    }
}
