//! Prelude module - common imports for sheetlink users
//!
//! ```rust
//! use sheetlink::prelude::*;
//! ```

pub use crate::{
    // Cell types
    CellAddress,
    CellError,
    CellRange,
    CellResult,
    CellValue,
    // Error types
    Error,
    ErrorKind,
    // Evaluation
    EvaluationContext,
    EvaluationOptions,
    EvaluationResult,
    // Resolvers
    MapResolver,
    NullResolver,
    PageRef,
    PageResolver,
    ResolveError,
    ResolvedSheet,
    Result,
    // Extension traits
    SheetEvaluationExt,
    // Main types
    Sheet,
    // Serialization
    SnapshotOptions,
    WholeSheetPolicy,
    parse_raw,
    to_display_string,
    to_raw_string,
};
