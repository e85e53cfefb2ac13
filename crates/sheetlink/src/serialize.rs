//! Sheet serialization
//!
//! A sheet has two text forms that share one layout:
//!
//! ```text
//! # sheetlink rows=3 cols=2
//! A1=Revenue
//! B1=1000
//! B3==B1-B2
//! ```
//!
//! The *raw* form lists what each non-blank cell holds and is what gets
//! persisted; [`parse_raw`] reads it back into an identical [`Sheet`]. The
//! *display* form lists evaluated values instead and is the read-only snapshot
//! handed to an AI assistant. Lines end in `\n`, cells appear row-major, and
//! inside cell text a backslash is written `\\`, a newline `\n` and a carriage
//! return `\r`.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use sheetlink_core::{CellAddress, Sheet};
use sheetlink_formula::{CellResult, EvaluationResult};
use thiserror::Error;

const HEADER_PREFIX: &str = "# sheetlink";

/// Result type for serialization
pub type SerializeResult<T> = std::result::Result<T, SerializeError>;

/// Errors that can occur while reading a serialized sheet
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The text does not start with a `# sheetlink` header
    #[error("Missing '# sheetlink rows=<R> cols=<C>' header")]
    MissingHeader,

    /// A line that cannot be read (1-based line number)
    #[error("Line {line}: {message}")]
    MalformedLine { line: usize, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] sheetlink_core::Error),
}

impl SerializeError {
    fn malformed<S: Into<String>>(line: usize, message: S) -> Self {
        SerializeError::MalformedLine {
            line,
            message: message.into(),
        }
    }
}

/// Options for the display form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Append ` (message)` after each error token
    pub include_error_messages: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            include_error_messages: true,
        }
    }
}

/// Both text forms of a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedSheet {
    /// Raw inputs, for persistence
    pub raw: String,
    /// Evaluated values, present when an evaluation result was supplied
    pub display: Option<String>,
}

/// Serialize a sheet, and its evaluated values when `result` is given
pub fn serialize(
    sheet: &Sheet,
    result: Option<&EvaluationResult>,
    options: &SnapshotOptions,
) -> SerializedSheet {
    SerializedSheet {
        raw: to_raw_string(sheet),
        display: result.map(|result| to_display_string(sheet, result, options)),
    }
}

/// The raw form of a sheet
pub fn to_raw_string(sheet: &Sheet) -> String {
    let mut out = header(sheet);
    for (addr, raw) in sheet.non_blank() {
        push_line(&mut out, addr, raw);
    }
    out
}

/// The display form of an evaluated sheet.
///
/// A cell missing from `result` falls back to its raw input.
pub fn to_display_string(
    sheet: &Sheet,
    result: &EvaluationResult,
    options: &SnapshotOptions,
) -> String {
    let mut out = header(sheet);
    for (addr, raw) in sheet.non_blank() {
        match result.get_at(addr) {
            Some(cell) => push_line(&mut out, addr, &display_text(cell, options)),
            None => push_line(&mut out, addr, raw),
        }
    }
    out
}

/// Read a sheet back from its raw form
pub fn parse_raw(text: &str) -> SerializeResult<Sheet> {
    let mut lines = text
        .split('\n')
        .enumerate()
        .map(|(index, line)| (index + 1, line.strip_suffix('\r').unwrap_or(line)))
        .filter(|(_, line)| !line.is_empty());

    let (line_no, first) = lines.next().ok_or(SerializeError::MissingHeader)?;
    let (rows, cols) = parse_header(line_no, first)?;
    let mut sheet = Sheet::with_size(rows, cols);

    for (line_no, line) in lines {
        let (address, value) = line
            .split_once('=')
            .ok_or_else(|| SerializeError::malformed(line_no, "expected '<address>=<value>'"))?;
        let addr = CellAddress::parse(address)
            .map_err(|e| SerializeError::malformed(line_no, e.to_string()))?;
        let value = unescape(value).map_err(|message| SerializeError::malformed(line_no, message))?;
        sheet
            .set_at(addr, value)
            .map_err(|e| SerializeError::malformed(line_no, e.to_string()))?;
    }

    Ok(sheet)
}

/// Read a sheet from a raw-form file
pub fn read_sheet_file<P: AsRef<Path>>(path: P) -> SerializeResult<Sheet> {
    let text = fs::read_to_string(path)?;
    parse_raw(&text)
}

/// Write a sheet's raw form to a file
pub fn write_sheet_file<P: AsRef<Path>>(sheet: &Sheet, path: P) -> SerializeResult<()> {
    fs::write(path, to_raw_string(sheet))?;
    Ok(())
}

fn header(sheet: &Sheet) -> String {
    format!("{} rows={} cols={}\n", HEADER_PREFIX, sheet.rows(), sheet.cols())
}

fn parse_header(line_no: usize, line: &str) -> SerializeResult<(u32, u16)> {
    let rest = line
        .strip_prefix(HEADER_PREFIX)
        .ok_or(SerializeError::MissingHeader)?;

    let mut rows = None;
    let mut cols = None;
    for field in rest.split_whitespace() {
        let bad = || SerializeError::malformed(line_no, format!("bad header field '{}'", field));
        match field.split_once('=') {
            Some(("rows", n)) => rows = Some(n.parse::<u32>().map_err(|_| bad())?),
            Some(("cols", n)) => cols = Some(n.parse::<u16>().map_err(|_| bad())?),
            _ => return Err(bad()),
        }
    }

    match (rows, cols) {
        (Some(rows), Some(cols)) => Ok((rows, cols)),
        _ => Err(SerializeError::malformed(
            line_no,
            "header needs both rows= and cols=",
        )),
    }
}

fn display_text(cell: &CellResult, options: &SnapshotOptions) -> String {
    match cell.error() {
        Some(e) if options.include_error_messages && !e.message.is_empty() => e.to_string(),
        _ => cell.display.clone(),
    }
}

fn push_line(out: &mut String, addr: CellAddress, text: &str) {
    // Writing to a String cannot fail
    let _ = write!(out, "{}=", addr);
    escape_into(out, text);
    out.push('\n');
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(format!("unknown escape '\\{}'", other)),
            None => return Err("dangling '\\' at end of line".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn revenue_sheet() -> Sheet {
        let mut sheet = Sheet::new();
        sheet.set("A1", "Revenue").unwrap();
        sheet.set("B1", "1000").unwrap();
        sheet.set("A2", "Costs").unwrap();
        sheet.set("B2", "400").unwrap();
        sheet.set("A3", "Profit").unwrap();
        sheet.set("B3", "=B1-B2").unwrap();
        sheet
    }

    #[test]
    fn test_raw_form_layout() {
        let raw = to_raw_string(&revenue_sheet());
        assert_eq!(
            raw,
            "# sheetlink rows=3 cols=2\n\
             A1=Revenue\n\
             B1=1000\n\
             A2=Costs\n\
             B2=400\n\
             A3=Profit\n\
             B3==B1-B2\n"
        );
    }

    #[test]
    fn test_raw_round_trip_keeps_extents_and_escapes() {
        let mut sheet = Sheet::with_size(10, 5);
        sheet.set("C2", "line one\nline two").unwrap();
        sheet.set("A1", "back\\slash\r").unwrap();
        sheet.set("B4", "a=b").unwrap();

        let raw = to_raw_string(&sheet);
        assert!(raw.contains("C2=line one\\nline two\n"));
        assert!(raw.contains("A1=back\\\\slash\\r\n"));

        let parsed = parse_raw(&raw).unwrap();
        assert_eq!(parsed, sheet);
        assert_eq!(parsed.rows(), 10);
        assert_eq!(parsed.cols(), 5);
    }

    #[test]
    fn test_parse_raw_accepts_crlf_and_blank_lines() {
        let text = "# sheetlink rows=2 cols=2\r\n\r\nA1=x\r\nB2==A1\r\n";
        let sheet = parse_raw(text).unwrap();
        assert_eq!(sheet.get("A1").unwrap(), "x");
        assert_eq!(sheet.get("B2").unwrap(), "=A1");
    }

    #[test]
    fn test_parse_raw_errors() {
        assert!(matches!(parse_raw(""), Err(SerializeError::MissingHeader)));
        assert!(matches!(
            parse_raw("A1=1\n"),
            Err(SerializeError::MissingHeader)
        ));
        assert!(matches!(
            parse_raw("# sheetlink rows=2\n"),
            Err(SerializeError::MalformedLine { line: 1, .. })
        ));
        assert!(matches!(
            parse_raw("# sheetlink rows=2 cols=2\nA1 no equals\n"),
            Err(SerializeError::MalformedLine { line: 2, .. })
        ));
        assert!(matches!(
            parse_raw("# sheetlink rows=2 cols=2\n\nZZ=1\n"),
            Err(SerializeError::MalformedLine { line: 3, .. })
        ));
        assert!(matches!(
            parse_raw("# sheetlink rows=2 cols=2\nA1=bad\\q\n"),
            Err(SerializeError::MalformedLine { line: 2, .. })
        ));
    }

    #[test]
    fn test_serialize_without_result_has_no_display() {
        let serialized = serialize(&revenue_sheet(), None, &SnapshotOptions::default());
        assert_eq!(serialized.display, None);
        assert!(serialized.raw.starts_with("# sheetlink rows=3 cols=2\n"));
    }
}
