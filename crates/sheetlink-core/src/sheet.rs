//! Sheet type: a grid of raw cell inputs

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellRange};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A grid of raw cell inputs with explicit extents.
///
/// A sheet only ever stores what the user typed. Evaluated values are produced
/// on demand and never written back, so the same sheet always evaluates to the
/// same result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sheet {
    /// Number of rows in the grid
    rows: u32,
    /// Number of columns in the grid
    cols: u16,
    /// Non-blank cells, keyed row-major
    cells: BTreeMap<CellAddress, String>,
}

/// How a raw input is interpreted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellInput<'a> {
    /// Empty input
    Blank,
    /// Input that reads as a finite decimal number
    Number(f64),
    /// Any other input not starting with `=`
    Text(&'a str),
    /// Formula source with the leading `=` still attached
    Formula(&'a str),
}

impl<'a> CellInput<'a> {
    /// Classify a raw cell input
    pub fn classify(raw: &'a str) -> Self {
        if raw.is_empty() {
            return CellInput::Blank;
        }
        if raw.starts_with('=') {
            return CellInput::Formula(raw);
        }
        match parse_numeric_literal(raw) {
            Some(n) => CellInput::Number(n),
            None => CellInput::Text(raw),
        }
    }

    /// Whether the input is a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, CellInput::Formula(_))
    }
}

/// Parse a numeric literal cell input.
///
/// Only plain decimal syntax counts: `inf`, `NaN` and friends stay text.
pub fn parse_numeric_literal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if !trimmed.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if trimmed.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl Sheet {
    /// Create an empty sheet with no rows or columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sheet with the given extents
    pub fn with_size(rows: u32, cols: u16) -> Self {
        Self {
            rows: rows.min(MAX_ROWS),
            cols: cols.min(MAX_COLS),
            cells: BTreeMap::new(),
        }
    }

    /// Number of rows
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Grow the extents so that they are at least `rows` x `cols`
    pub fn ensure_size(&mut self, rows: u32, cols: u16) {
        self.rows = self.rows.max(rows.min(MAX_ROWS));
        self.cols = self.cols.max(cols.min(MAX_COLS));
    }

    /// The whole grid as a range, or `None` for a sheet with no extents
    pub fn extent(&self) -> Option<CellRange> {
        if self.rows == 0 || self.cols == 0 {
            return None;
        }
        Some(CellRange::from_indices(0, 0, self.rows - 1, self.cols - 1))
    }

    // === Cell Access ===

    /// Get the raw input at an address string (e.g., "A1")
    pub fn get(&self, address: &str) -> Result<&str> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_at(addr))
    }

    /// Get the raw input at an address; blank cells read as `""`
    pub fn get_at(&self, addr: CellAddress) -> &str {
        self.cells.get(&addr).map(String::as_str).unwrap_or("")
    }

    /// Interpret the raw input at an address
    pub fn input_at(&self, addr: CellAddress) -> CellInput<'_> {
        CellInput::classify(self.get_at(addr))
    }

    /// Set a cell by address string. An empty string clears the cell.
    pub fn set<S: Into<String>>(&mut self, address: &str, raw: S) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_at(addr, raw)
    }

    /// Set a cell by address, growing the extents to include it.
    /// An empty string clears the cell.
    pub fn set_at<S: Into<String>>(&mut self, addr: CellAddress, raw: S) -> Result<()> {
        validate_cell_position(addr)?;
        let raw = raw.into();
        if raw.is_empty() {
            self.cells.remove(&addr);
            return Ok(());
        }
        self.ensure_size(addr.row + 1, addr.col + 1);
        self.cells.insert(addr, raw);
        Ok(())
    }

    /// Clear a cell by address string
    pub fn clear(&mut self, address: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.clear_at(addr);
        Ok(())
    }

    /// Clear a cell. Extents are left unchanged.
    pub fn clear_at(&mut self, addr: CellAddress) {
        self.cells.remove(&addr);
    }

    /// Whether the cell at `addr` holds a formula
    pub fn is_formula(&self, addr: CellAddress) -> bool {
        self.input_at(addr).is_formula()
    }

    /// Number of non-blank cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether every cell is blank
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over non-blank cells in row-major order
    pub fn non_blank(&self) -> impl Iterator<Item = (CellAddress, &str)> + '_ {
        self.cells.iter().map(|(addr, raw)| (*addr, raw.as_str()))
    }

    /// Iterate over formula cells in row-major order
    pub fn formula_cells(&self) -> impl Iterator<Item = (CellAddress, &str)> + '_ {
        self.non_blank().filter(|(_, raw)| raw.starts_with('='))
    }

    /// Check that the sheet's extents contain every stored cell.
    pub fn validate(&self) -> Result<()> {
        match self.cells.keys().next_back() {
            Some(last) if last.row >= self.rows => Err(Error::RowOutOfBounds(last.row, self.rows)),
            _ => match self.cells.keys().map(|a| a.col).max() {
                Some(col) if col >= self.cols => Err(Error::other(format!(
                    "column {} outside sheet extents ({} columns)",
                    CellAddress::column_to_letters(col),
                    self.cols
                ))),
                _ => Ok(()),
            },
        }
    }
}

fn validate_cell_position(addr: CellAddress) -> Result<()> {
    if addr.row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(addr.row, MAX_ROWS - 1));
    }
    if addr.col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(CellAddress::column_to_letters(
            addr.col,
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sheet_is_blank() {
        let sheet = Sheet::with_size(10, 5);
        assert_eq!(sheet.rows(), 10);
        assert_eq!(sheet.cols(), 5);
        assert!(sheet.is_empty());
        assert_eq!(sheet.get("C3").unwrap(), "");
    }

    #[test]
    fn test_set_grows_extents() {
        let mut sheet = Sheet::new();
        sheet.set("C4", "hello").unwrap();
        assert_eq!(sheet.rows(), 4);
        assert_eq!(sheet.cols(), 3);
        assert_eq!(sheet.get("C4").unwrap(), "hello");
        assert!(sheet.validate().is_ok());
    }

    #[test]
    fn test_set_at_rejects_out_of_bounds() {
        let mut sheet = Sheet::new();
        assert!(matches!(
            sheet.set_at(CellAddress::new(u32::MAX, 0), "1"),
            Err(Error::RowOutOfBounds(_, _))
        ));
        assert!(matches!(
            sheet.set_at(CellAddress::new(0, MAX_COLS), "1"),
            Err(Error::ColumnOutOfBounds(_))
        ));
        assert!(sheet.is_empty());
        assert_eq!(sheet.rows(), 0);

        sheet
            .set_at(CellAddress::new(MAX_ROWS - 1, MAX_COLS - 1), "last")
            .unwrap();
        assert_eq!(sheet.rows(), MAX_ROWS);
        assert_eq!(sheet.cols(), MAX_COLS);
        assert!(sheet.validate().is_ok());
    }

    #[test]
    fn test_set_empty_clears() {
        let mut sheet = Sheet::new();
        sheet.set("A1", "1").unwrap();
        sheet.set("A1", "").unwrap();
        assert!(sheet.is_empty());
        assert_eq!(sheet.rows(), 1);
    }

    #[test]
    fn test_non_blank_is_row_major() {
        let mut sheet = Sheet::new();
        sheet.set("B2", "d").unwrap();
        sheet.set("A2", "c").unwrap();
        sheet.set("B1", "b").unwrap();
        sheet.set("A1", "a").unwrap();
        let order: Vec<&str> = sheet.non_blank().map(|(_, raw)| raw).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_classify_inputs() {
        assert_eq!(CellInput::classify(""), CellInput::Blank);
        assert_eq!(CellInput::classify("1000"), CellInput::Number(1000.0));
        assert_eq!(CellInput::classify(" 2.5 "), CellInput::Number(2.5));
        assert_eq!(CellInput::classify("-3e2"), CellInput::Number(-300.0));
        assert_eq!(CellInput::classify("Revenue"), CellInput::Text("Revenue"));
        assert_eq!(CellInput::classify("inf"), CellInput::Text("inf"));
        assert_eq!(CellInput::classify("NaN"), CellInput::Text("NaN"));
        assert_eq!(CellInput::classify("TRUE"), CellInput::Text("TRUE"));
        assert_eq!(CellInput::classify("=B1-B2"), CellInput::Formula("=B1-B2"));
        assert_eq!(CellInput::classify(" =A1"), CellInput::Text(" =A1"));
    }

    #[test]
    fn test_formula_cells() {
        let mut sheet = Sheet::new();
        sheet.set("A1", "10").unwrap();
        sheet.set("A2", "=A1*2").unwrap();
        let formulas: Vec<String> = sheet
            .formula_cells()
            .map(|(addr, _)| addr.to_string())
            .collect();
        assert_eq!(formulas, vec!["A2"]);
        assert!(sheet.is_formula(CellAddress::new(1, 0)));
    }
}
