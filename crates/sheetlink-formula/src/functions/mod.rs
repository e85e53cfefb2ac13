//! Built-in functions

pub mod logical;
pub mod math;
pub mod text;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::ast::FormulaExpr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{ArgumentEvaluator, FormulaValue};

/// Signature of a function that receives its arguments already evaluated.
///
/// Range arguments arrive as [`FormulaValue::List`]. The evaluator has already
/// propagated the first error among the arguments, so implementations never
/// see an error value.
pub type EagerFn = fn(&[FormulaValue]) -> FormulaResult<FormulaValue>;

/// Signature of a function that decides which of its arguments to evaluate
pub type LazyFn = fn(&[FormulaExpr], &mut dyn ArgumentEvaluator) -> FormulaResult<FormulaValue>;

/// Function implementation
#[derive(Clone, Copy)]
pub enum FunctionImpl {
    Eager(EagerFn),
    Lazy(LazyFn),
}

/// Function definition
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
    /// Check a call's argument count against this definition
    pub fn check_arity(&self, actual: usize) -> FormulaResult<()> {
        let expected = match self.max_args {
            Some(max) if max == self.min_args && actual != max => format!("{}", max),
            Some(max) if actual > max => format!("at most {}", max),
            _ if actual < self.min_args => format!("at least {}", self.min_args),
            _ => return Ok(()),
        };
        Err(FormulaError::ArgumentCount {
            function: self.name.to_string(),
            expected,
            actual,
        })
    }
}

/// Global registry of built-in functions (lazily initialized)
static BUILTIN_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();

        registry
    }

    /// Create a registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// The shared registry of built-in functions
    pub fn builtin() -> &'static FunctionRegistry {
        BUILTIN_REGISTRY.get_or_init(FunctionRegistry::new)
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function, replacing any existing one with the same name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.values().map(|def| def.name).collect();
        names.sort_unstable();
        names
    }

    fn eager(&mut self, name: &'static str, min_args: usize, max_args: Option<usize>, f: EagerFn) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation: FunctionImpl::Eager(f),
        });
    }

    fn lazy(&mut self, name: &'static str, min_args: usize, max_args: Option<usize>, f: LazyFn) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation: FunctionImpl::Lazy(f),
        });
    }

    fn register_math_functions(&mut self) {
        self.eager("SUM", 1, None, math::fn_sum);
        self.eager("AVERAGE", 1, None, math::fn_average);
        self.eager("COUNT", 1, None, math::fn_count);
        self.eager("COUNTA", 1, None, math::fn_counta);
        self.eager("MIN", 1, None, math::fn_min);
        self.eager("MAX", 1, None, math::fn_max);
        self.eager("ABS", 1, Some(1), math::fn_abs);
        self.eager("ROUND", 1, Some(2), math::fn_round);
    }

    fn register_logical_functions(&mut self) {
        self.lazy("IF", 2, Some(3), logical::fn_if);
        self.lazy("IFERROR", 2, Some(2), logical::fn_iferror);
        self.eager("AND", 1, None, logical::fn_and);
        self.eager("OR", 1, None, logical::fn_or);
        self.eager("NOT", 1, Some(1), logical::fn_not);
    }

    fn register_text_functions(&mut self) {
        self.eager("CONCAT", 1, None, text::fn_concat);
        self.eager("LEN", 1, Some(1), text::fn_len);
        self.eager("UPPER", 1, Some(1), text::fn_upper);
        self.eager("LOWER", 1, Some(1), text::fn_lower);
        self.eager("TRIM", 1, Some(1), text::fn_trim);
    }
}

/// The argument at `index` as a single value; missing arguments are blank
pub(crate) fn scalar_arg(args: &[FormulaValue], index: usize) -> FormulaValue {
    args.get(index)
        .cloned()
        .unwrap_or(FormulaValue::Empty)
        .into_scalar()
}

/// Numeric argument; a range holding anything but one value is an error
pub(crate) fn number_arg(args: &[FormulaValue], index: usize) -> FormulaResult<f64> {
    scalar_arg(args, index).to_number()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::builtin();
        assert!(registry.contains("sum"));
        assert!(registry.contains("IfError"));
        assert!(!registry.contains("VLOOKUP"));
    }

    #[test]
    fn test_arity_messages() {
        let registry = FunctionRegistry::new();

        let err = registry.get("ABS").unwrap().check_arity(2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Wrong number of arguments for ABS: expected 1, got 2"
        );

        let err = registry.get("IF").unwrap().check_arity(1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Wrong number of arguments for IF: expected at least 2, got 1"
        );

        let err = registry.get("ROUND").unwrap().check_arity(3).unwrap_err();
        assert!(err.to_string().contains("at most 2"));

        assert!(registry.get("SUM").unwrap().check_arity(12).is_ok());
    }

    #[test]
    fn test_register_custom_function() {
        fn fn_double(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
            Ok(FormulaValue::Number(number_arg(args, 0)? * 2.0))
        }

        let mut registry = FunctionRegistry::empty();
        registry.register(FunctionDef {
            name: "Double",
            min_args: 1,
            max_args: Some(1),
            implementation: FunctionImpl::Eager(fn_double),
        });
        assert_eq!(registry.names(), vec!["Double"]);
        assert!(registry.contains("DOUBLE"));
    }
}
