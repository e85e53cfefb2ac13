//! Formula error types

use sheetlink_core::CellError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while parsing a formula or applying a function.
///
/// These never escape sheet evaluation: the evaluator turns each one into a
/// [`CellError`] on the offending cell.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Reference to invalid cell
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

impl FormulaError {
    /// The cell-level error this failure becomes
    pub fn to_cell_error(&self) -> CellError {
        match self {
            FormulaError::Parse(msg) | FormulaError::InvalidReference(msg) => {
                CellError::parse(msg.clone())
            }
            FormulaError::Argument(msg) => CellError::value(msg.clone()),
            FormulaError::UnknownFunction(_) | FormulaError::ArgumentCount { .. } => {
                CellError::name(self.to_string())
            }
        }
    }
}

impl From<sheetlink_core::Error> for FormulaError {
    fn from(e: sheetlink_core::Error) -> Self {
        FormulaError::InvalidReference(e.to_string())
    }
}
