//! Token kinds produced by the lexer, grounded in
//! `examples/original_source/include/parse/token.h`.

use std::fmt;

use crate::index::MatchOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Error,
    Eos,

    Ident,
    MetricIdent,

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Assign,
    Colon,

    String,
    Number,
    Duration,

    // arithmetic/comparison/set operators
    Sub,
    Add,
    Mul,
    Mod,
    Div,
    Pow,
    Land,
    Lor,
    Lunless,
    Eql,
    Neq,
    Lte,
    Lss,
    Gte,
    Gtr,
    EqlRegex,
    NeqRegex,

    // aggregators
    Avg,
    Count,
    Sum,
    Min,
    Max,
    Stddev,
    Stdvar,
    TopK,
    BottomK,
    CountValues,
    Quantile,

    // keywords
    Offset,
    By,
    Without,
    On,
    Ignoring,
    GroupLeft,
    GroupRight,
    Bool,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Token {
    pub fn is_comparison_op(self) -> bool {
        matches!(
            self,
            Token::Eql
                | Token::Neq
                | Token::Lte
                | Token::Lss
                | Token::Gte
                | Token::Gtr
                | Token::EqlRegex
                | Token::NeqRegex
        )
    }

    pub fn is_arithmetic_op(self) -> bool {
        matches!(
            self,
            Token::Add | Token::Sub | Token::Mul | Token::Div | Token::Mod | Token::Pow
        )
    }

    pub fn is_set_op(self) -> bool {
        matches!(self, Token::Land | Token::Lor | Token::Lunless)
    }

    pub fn is_aggregator(self) -> bool {
        matches!(
            self,
            Token::Avg
                | Token::Count
                | Token::Sum
                | Token::Min
                | Token::Max
                | Token::Stddev
                | Token::Stdvar
                | Token::TopK
                | Token::BottomK
                | Token::CountValues
                | Token::Quantile
        )
    }

    /// The label-matcher operator this token represents, if any.
    pub fn to_match_op(self) -> Option<MatchOp> {
        match self {
            Token::Eql => Some(MatchOp::Eql),
            Token::Neq => Some(MatchOp::Neq),
            Token::Lss => Some(MatchOp::Lss),
            Token::Gtr => Some(MatchOp::Gtr),
            Token::Lte => Some(MatchOp::Lte),
            Token::Gte => Some(MatchOp::Gte),
            Token::EqlRegex => Some(MatchOp::EqlRegex),
            Token::NeqRegex => Some(MatchOp::NeqRegex),
            _ => None,
        }
    }
}

pub fn lookup_keyword(word: &str) -> Option<Token> {
    Some(match word {
        "and" => Token::Land,
        "or" => Token::Lor,
        "unless" => Token::Lunless,
        "sum" => Token::Sum,
        "avg" => Token::Avg,
        "count" => Token::Count,
        "min" => Token::Min,
        "max" => Token::Max,
        "stddev" => Token::Stddev,
        "stdvar" => Token::Stdvar,
        "topk" => Token::TopK,
        "bottomk" => Token::BottomK,
        "count_values" => Token::CountValues,
        "quantile" => Token::Quantile,
        "offset" => Token::Offset,
        "by" => Token::By,
        "without" => Token::Without,
        "on" => Token::On,
        "ignoring" => Token::Ignoring,
        "group_left" => Token::GroupLeft,
        "group_right" => Token::GroupRight,
        "bool" => Token::Bool,
        _ => return None,
    })
}
