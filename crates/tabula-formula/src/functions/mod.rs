//! Whitelisted functions
//!
//! `IF` is evaluated lazily by the evaluator itself; everything else callable
//! from an expression is registered here.

pub mod math;

use crate::error::FormulaResult;
use crate::evaluator::Value;
use ahash::AHashMap;

/// Function implementation signature
pub type FunctionImpl = fn(&[Value]) -> FormulaResult<Value>;

/// A callable function and its accepted argument count
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    const fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
        }
    }
}

/// Numeric helpers available to every formula
const MATH_FUNCTIONS: [FunctionDef; 4] = [
    FunctionDef::new("MAX", 1, None, math::fn_max),
    FunctionDef::new("MIN", 1, None, math::fn_min),
    FunctionDef::new("ROUND", 1, Some(2), math::fn_round),
    FunctionDef::new("ABS", 1, Some(1), math::fn_abs),
];

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a registry holding the whitelisted functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::with_capacity(MATH_FUNCTIONS.len()),
        };
        for def in MATH_FUNCTIONS {
            registry.register(def);
        }
        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Check if a function is callable from an expression
    pub fn contains(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("IF") || self.get(name).is_some()
    }

    /// Register a function, replacing any previous definition
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
