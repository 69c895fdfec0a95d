//! Function signature registry consulted by the parser, grounded in
//! `examples/original_source/src/parse/functions.cpp`'s `ExecFunction`
//! table and `include/parse/functions.h`.
//!
//! The original keeps one process-wide static table. Per `spec.md` §9
//! ("Global function table"), this crate instead builds one `FunctionRegistry`
//! value and threads it through the parser and evaluator explicitly, so
//! tests can construct a registry with stub functions instead of reaching
//! into global state.

use std::collections::HashMap;

use crate::parse::ast::ValueType;

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub arg_types: Vec<ValueType>,
    pub return_type: ValueType,
}

#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionSignature>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register(&mut self, sig: FunctionSignature) {
        self.functions.insert(sig.name, sig);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    /// The built-in function set this crate implements: `time`, `rate`,
    /// `increase`, `delta`.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(FunctionSignature {
            name: "time",
            arg_types: vec![],
            return_type: ValueType::Scalar,
        });
        reg.register(FunctionSignature {
            name: "rate",
            arg_types: vec![ValueType::Matrix],
            return_type: ValueType::Vector,
        });
        reg.register(FunctionSignature {
            name: "increase",
            arg_types: vec![ValueType::Matrix],
            return_type: ValueType::Vector,
        });
        reg.register(FunctionSignature {
            name: "delta",
            arg_types: vec![ValueType::Matrix],
            return_type: ValueType::Vector,
        });
        reg
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
