//! # sheetlink-formula
//!
//! Formula engine for sheetlink.
//!
//! This crate provides:
//! - Tokenizing and parsing formulas (text → AST), including cross-page
//!   references written `@[Label](page-id):A1`
//! - Dependency tracking and cycle detection within a sheet
//! - Evaluation of a whole sheet, pulling other pages through a [`PageResolver`]
//! - A small library of built-in functions
//!
//! ## Example
//!
//! ```rust
//! use sheetlink_core::Sheet;
//! use sheetlink_formula::{evaluate_sheet, EvaluationContext, NullResolver};
//!
//! let mut sheet = Sheet::new();
//! sheet.set("A1", "1000").unwrap();
//! sheet.set("A2", "=A1*2").unwrap();
//!
//! let ctx = EvaluationContext::new(&sheet, "budget", &NullResolver);
//! let result = evaluate_sheet(&ctx);
//! assert_eq!(result.get("A2").unwrap().display, "2000");
//! ```

pub mod ast;
pub mod cycle;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod resolver;
pub mod tokenizer;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, PageRef, PageTarget, UnaryOperator};
pub use cycle::{find_cycles, CycleReport};
pub use dependency::{DependencyGraph, ExternalDependency};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{
    evaluate_formula, evaluate_sheet, evaluate_sheet_with_cache, ArgumentEvaluator, CellResult,
    EvaluationContext, EvaluationOptions, EvaluationResult, FormulaValue, WholeSheetPolicy,
};
pub use functions::{FunctionDef, FunctionImpl, FunctionRegistry};
pub use parser::{parse_formula, ParseCache, MAX_NESTING};
pub use resolver::{NullResolver, PageResolver, ResolveError, ResolvedSheet};
pub use tokenizer::{tokenize, Token};
