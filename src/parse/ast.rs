//! The AST (C3). The original implementation this crate is grounded on
//! (`examples/original_source/include/parse/ast.h`) uses a virtual-dispatch
//! node hierarchy with a separate `ASTVisitor`; we use one tagged enum
//! instead; matching on `AstNode` replaces double-dispatch visits, and a
//! tree walk is just a recursive function.

use crate::index::LabelMatcher;
use crate::parse::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Scalar,
    Vector,
    Matrix,
    Str,
}

#[derive(Debug, Clone)]
pub struct VectorMatching {
    pub on: bool,
    pub labels: Vec<String>,
    pub group_left: bool,
    pub group_right: bool,
    pub include: Vec<String>,
}

impl VectorMatching {
    pub fn default_many_to_many() -> Self {
        Self {
            on: false,
            labels: Vec::new(),
            group_left: false,
            group_right: false,
            include: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AstNode {
    NumberLiteral(f64),
    StringLiteral(String),

    Unary {
        op: Token,
        operand: Box<AstNode>,
    },

    Binary {
        op: Token,
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
        bool_modifier: bool,
        matching: VectorMatching,
    },

    VectorSelector {
        name: Option<String>,
        matchers: Vec<LabelMatcher>,
        offset_ms: i64,
    },

    MatrixSelector {
        name: Option<String>,
        matchers: Vec<LabelMatcher>,
        range_ms: i64,
        offset_ms: i64,
    },

    Subquery {
        expr: Box<AstNode>,
        range_ms: i64,
        step_ms: i64,
        offset_ms: i64,
    },

    FuncCall {
        name: String,
        args: Vec<AstNode>,
        return_type: ValueType,
    },

    Aggregation {
        op: Token,
        expr: Box<AstNode>,
        param: Option<Box<AstNode>>,
        grouping: Vec<String>,
        without: bool,
    },
}

impl AstNode {
    pub fn value_type(&self) -> ValueType {
        match self {
            AstNode::NumberLiteral(_) => ValueType::Scalar,
            AstNode::StringLiteral(_) => ValueType::Str,
            AstNode::Unary { operand, .. } => operand.value_type(),
            AstNode::Binary { lhs, rhs, .. } => {
                if lhs.value_type() == ValueType::Scalar && rhs.value_type() == ValueType::Scalar {
                    ValueType::Scalar
                } else {
                    ValueType::Vector
                }
            }
            AstNode::VectorSelector { .. } => ValueType::Vector,
            AstNode::MatrixSelector { .. } => ValueType::Matrix,
            AstNode::Subquery { .. } => ValueType::Matrix,
            AstNode::FuncCall { return_type, .. } => *return_type,
            AstNode::Aggregation { .. } => ValueType::Vector,
        }
    }
}
