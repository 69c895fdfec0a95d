//! AST debug printer (C11), grounded in
//! `examples/original_source/src/parse/printer.cpp`. Used to log the parsed
//! query at debug level before evaluation (`Engine::query`).

use std::fmt::Write as _;

use crate::parse::ast::AstNode;
use crate::parse::token::Token;

pub fn print_ast(node: &AstNode) -> String {
    let mut out = String::new();
    write_node(&mut out, node, "");
    out
}

fn write_node(out: &mut String, node: &AstNode, pad: &str) {
    let inner = format!("{pad}    ");
    match node {
        AstNode::Unary { op, operand } => {
            let _ = writeln!(out, "{pad}UnaryNode {{");
            let _ = writeln!(out, "{pad}  op = {}", tok2str(*op));
            let _ = writeln!(out, "{pad}  operand =");
            write_node(out, operand, &inner);
            let _ = writeln!(out, "{pad}}}");
        }
        AstNode::Binary {
            op,
            lhs,
            rhs,
            bool_modifier,
            ..
        } => {
            let _ = writeln!(out, "{pad}BinaryNode {{");
            let _ = writeln!(
                out,
                "{pad}  op = {}{}",
                tok2str(*op),
                if *bool_modifier { "(bool)" } else { "" }
            );
            let _ = writeln!(out, "{pad}  left =");
            write_node(out, lhs, &inner);
            let _ = writeln!(out, "{pad}  right =");
            write_node(out, rhs, &inner);
            let _ = writeln!(out, "{pad}}}");
        }
        AstNode::StringLiteral(value) => {
            let _ = writeln!(out, "{pad}StringLiteralNode {{ value = \"{value}\" }}");
        }
        AstNode::NumberLiteral(value) => {
            let _ = writeln!(out, "{pad}NumberLiteralNode {{ value = {value} }}");
        }
        AstNode::FuncCall { name, args, .. } => {
            let _ = writeln!(out, "{pad}FuncCallNode {{");
            let _ = writeln!(out, "{pad}  func = \"{name}\"");
            if !args.is_empty() {
                let _ = writeln!(out, "{pad}  args = [");
                for a in args {
                    write_node(out, a, &inner);
                }
                let _ = writeln!(out, "{pad}  ]");
            }
            let _ = writeln!(out, "{pad}}}");
        }
        AstNode::Aggregation {
            op,
            expr,
            param,
            grouping,
            without,
        } => {
            let _ = writeln!(out, "{pad}AggregationNode {{");
            let _ = writeln!(out, "{pad}  op = {}", tok2str(*op));
            let _ = writeln!(out, "{pad}  expr =");
            write_node(out, expr, &inner);
            if let Some(p) = param {
                let _ = writeln!(out, "{pad}  param =");
                write_node(out, p, &inner);
            }
            if !grouping.is_empty() {
                let _ = writeln!(out, "{pad}  grouping = [");
                for g in grouping {
                    let _ = writeln!(out, "{pad}    {g},");
                }
                let _ = writeln!(out, "{pad}  ]");
            }
            let _ = writeln!(out, "{pad}  without = {without}");
            let _ = writeln!(out, "{pad}}}");
        }
        AstNode::VectorSelector { name, matchers, offset_ms } => {
            let _ = writeln!(out, "{pad}VectorSelectorNode {{");
            let _ = writeln!(out, "{pad}  name = \"{}\"", name.as_deref().unwrap_or(""));
            if *offset_ms != 0 {
                let _ = writeln!(out, "{pad}  offset = {offset_ms}");
            }
            write_matchers(out, matchers, pad);
            let _ = writeln!(out, "{pad}}}");
        }
        AstNode::MatrixSelector {
            name,
            matchers,
            range_ms,
            offset_ms,
        } => {
            let _ = writeln!(out, "{pad}MatrixSelectorNode {{");
            let _ = writeln!(out, "{pad}  name = \"{}\"", name.as_deref().unwrap_or(""));
            let _ = writeln!(out, "{pad}  range = {range_ms}");
            if *offset_ms != 0 {
                let _ = writeln!(out, "{pad}  offset = {offset_ms}");
            }
            write_matchers(out, matchers, pad);
            let _ = writeln!(out, "{pad}}}");
        }
        AstNode::Subquery {
            expr,
            range_ms,
            step_ms,
            offset_ms,
        } => {
            let _ = writeln!(out, "{pad}SubqueryNode {{");
            let _ = writeln!(out, "{pad}  range = {range_ms}");
            let _ = writeln!(out, "{pad}  step = {step_ms}");
            if *offset_ms != 0 {
                let _ = writeln!(out, "{pad}  offset = {offset_ms}");
            }
            let _ = writeln!(out, "{pad}  expr =");
            write_node(out, expr, &inner);
            let _ = writeln!(out, "{pad}}}");
        }
    }
}

fn write_matchers(out: &mut String, matchers: &[crate::index::LabelMatcher], pad: &str) {
    let _ = writeln!(out, "{pad}  matchers = [");
    for m in matchers {
        let _ = writeln!(out, "{pad}    LabelMatcher {{ name = \"{}\", value = \"{}\" }},", m.name, m.value);
    }
    let _ = writeln!(out, "{pad}  ]");
}

fn tok2str(tok: Token) -> &'static str {
    match tok {
        Token::Add => "+",
        Token::Sub => "-",
        Token::Mul => "*",
        Token::Div => "/",
        Token::Mod => "%",
        Token::Pow => "^",
        Token::Eql => "==",
        Token::Neq => "!=",
        Token::Lss => "<",
        Token::Gtr => ">",
        Token::Lte => "<=",
        Token::Gte => ">=",
        Token::Land => "and",
        Token::Lor => "or",
        Token::Lunless => "unless",
        Token::Sum => "sum",
        Token::Avg => "avg",
        Token::Count => "count",
        Token::Min => "min",
        Token::Max => "max",
        Token::Stddev => "stddev",
        Token::Stdvar => "stdvar",
        Token::TopK => "topk",
        Token::BottomK => "bottomk",
        Token::CountValues => "count_values",
        Token::Quantile => "quantile",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::functions::FunctionRegistry;
    use crate::parse::parser::Parser;

    #[test]
    fn prints_a_binary_expression() {
        let registry = FunctionRegistry::with_builtins();
        let ast = Parser::parse("1 + 2", &registry).unwrap();
        let printed = print_ast(&ast);
        assert!(printed.contains("BinaryNode"));
        assert!(printed.contains("op = +"));
    }
}
