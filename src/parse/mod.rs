//! Lexer, parser, and AST (C1/C2/C3), grounded in
//! `examples/original_source/src/parse/` and `include/parse/`.

pub mod ast;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod token;

pub use ast::{AstNode, ValueType};
pub use functions::FunctionRegistry;
pub use parser::Parser;
