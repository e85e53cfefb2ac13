//! Cell value types

use std::fmt;

/// An evaluated cell value.
///
/// Sheets never store these; they only hold raw input text. A `CellValue` is
/// what evaluation produces for a cell.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Numeric value
    Number(f64),

    /// Text value
    Text(String),

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Error value
    Error(CellError),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Get the error if this is one
    pub fn as_error(&self) -> Option<&CellError> {
        match self {
            CellValue::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Get the number if this is one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Canonical display text for this value
    pub fn display(&self) -> String {
        match self {
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(true) => "TRUE".to_string(),
            CellValue::Boolean(false) => "FALSE".to_string(),
            CellValue::Error(e) => e.token().to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

/// Format a number the canonical way.
///
/// Integral values below 1e15 print without a fractional part; everything else
/// uses the shortest representation that round-trips.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Avoid "-0"
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// The category of a cell error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// Malformed formula syntax
    Parse,
    /// The cell is a member of a reference cycle
    Circular,
    /// A cross-page reference could not be resolved
    Ref,
    /// Division by zero
    Div0,
    /// Operand cannot be coerced for the requested operation
    Value,
    /// Unknown function or wrong argument count
    Name,
    /// A dependency of the cell evaluated to an error
    Propagated,
}

impl ErrorKind {
    /// Uppercase code name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "PARSE",
            ErrorKind::Circular => "CIRCULAR",
            ErrorKind::Ref => "REF",
            ErrorKind::Div0 => "DIV0",
            ErrorKind::Value => "VALUE",
            ErrorKind::Name => "NAME",
            ErrorKind::Propagated => "PROPAGATED",
        }
    }

    /// Display token rendered in place of a value.
    ///
    /// `Propagated` never appears as an origin, so its token is only a fallback.
    pub fn token(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "#PARSE!",
            ErrorKind::Circular => "#CIRCULAR!",
            ErrorKind::Ref => "#ERROR",
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Propagated => "#ERROR",
        }
    }

    /// Parse a display token back to its kind
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "#PARSE!" => Some(ErrorKind::Parse),
            "#CIRCULAR!" => Some(ErrorKind::Circular),
            "#ERROR" => Some(ErrorKind::Ref),
            "#DIV/0!" => Some(ErrorKind::Div0),
            "#VALUE!" => Some(ErrorKind::Value),
            "#NAME?" => Some(ErrorKind::Name),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error carried by a cell.
///
/// `origin` is the kind of the error where it first occurred. It equals `kind`
/// except when `kind` is [`ErrorKind::Propagated`], in which case it names the
/// failing dependency's error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellError {
    pub kind: ErrorKind,
    pub origin: ErrorKind,
    pub message: String,
}

impl CellError {
    /// Create an error that originates in the current cell
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            origin: kind,
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn circular() -> Self {
        Self::new(ErrorKind::Circular, "Circular reference detected")
    }

    pub fn reference<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Ref, message)
    }

    pub fn div0() -> Self {
        Self::new(ErrorKind::Div0, "Division by zero")
    }

    pub fn value<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn name<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Name, message)
    }

    /// The same error as seen from a cell that depends on this one
    pub fn propagated(&self) -> Self {
        Self {
            kind: ErrorKind::Propagated,
            origin: self.origin,
            message: self.message.clone(),
        }
    }

    /// Display token for this error
    pub fn token(&self) -> &'static str {
        self.origin.token()
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.token(), self.message)
    }
}
