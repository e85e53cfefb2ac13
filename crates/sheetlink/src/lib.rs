//! # sheetlink
//!
//! A spreadsheet formula engine whose formulas can read cells from other
//! pages.
//!
//! A cross-page reference names a page by an opaque identifier and carries a
//! display label: `@[Pricing](pricing-id):B2`. The engine never knows where
//! pages live; it asks a [`PageResolver`] supplied by the host.
//!
//! ## Features
//!
//! - Formula parsing with arithmetic, comparison, concatenation and functions
//! - Single-pass, memoized evaluation with cycle detection
//! - Cross-page references through a pluggable resolver
//! - Error values that propagate through dependent cells
//! - Stable text forms for persistence and read-only snapshots
//!
//! ## Example
//!
//! ```rust
//! use sheetlink::prelude::*;
//!
//! let mut pricing = Sheet::new();
//! pricing.set("B2", "200").unwrap();
//! let resolver = MapResolver::new().with_page("pricing-id", "Pricing", pricing);
//!
//! let mut sheet = Sheet::new();
//! sheet.set("A1", "Units").unwrap();
//! sheet.set("B1", "3").unwrap();
//! sheet.set("B2", "=B1*@[Pricing](pricing-id):B2").unwrap();
//!
//! let result = sheet.evaluate("quote-id", &resolver);
//! assert_eq!(result.get("B2").unwrap().display, "600");
//!
//! let snapshot = to_display_string(&sheet, &result, &SnapshotOptions::default());
//! assert!(snapshot.contains("B2=600\n"));
//! ```

pub mod evaluation;
pub mod prelude;
pub mod resolver;
pub mod serialize;

pub use evaluation::{EvaluationStats, SheetEvaluationExt};
pub use resolver::MapResolver;
pub use serialize::{
    parse_raw, read_sheet_file, serialize, to_display_string, to_raw_string, write_sheet_file,
    SerializeError, SerializeResult, SerializedSheet, SnapshotOptions,
};

// Re-export core types
pub use sheetlink_core::{
    format_number, CellAddress, CellError, CellInput, CellRange, CellValue, Error, ErrorKind,
    Result, Sheet, MAX_COLS, MAX_ROWS,
};

// Re-export formula types
pub use sheetlink_formula::{
    evaluate_formula, evaluate_sheet, evaluate_sheet_with_cache, parse_formula, CellReference,
    CellResult, CycleReport, DependencyGraph, EvaluationContext, EvaluationOptions,
    EvaluationResult, ExternalDependency, FormulaError, FormulaExpr, FormulaResult, FormulaValue,
    FunctionRegistry, NullResolver, PageRef, PageResolver, PageTarget, ParseCache, ResolveError,
    ResolvedSheet, WholeSheetPolicy,
};
