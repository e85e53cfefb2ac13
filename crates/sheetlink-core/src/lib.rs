//! # sheetlink-core
//!
//! Core data structures for the sheetlink formula engine.
//!
//! This crate provides the value types shared by the parser, the evaluator and
//! the serializer:
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and ranges
//! - [`Sheet`] - A grid of raw cell inputs
//! - [`CellValue`], [`CellError`], [`ErrorKind`] - Evaluated values and errors
//!
//! ## Example
//!
//! ```rust
//! use sheetlink_core::{CellAddress, Sheet};
//!
//! let mut sheet = Sheet::new();
//! sheet.set("A1", "Revenue").unwrap();
//! sheet.set("B1", "1000").unwrap();
//! sheet.set_at(CellAddress::new(1, 1), "=B1*2").unwrap();
//!
//! assert_eq!(sheet.get("B2").unwrap(), "=B1*2");
//! ```

pub mod cell;
pub mod error;
pub mod sheet;

pub use cell::{format_number, CellAddress, CellError, CellRange, CellValue, ErrorKind};
pub use error::{Error, Result};
pub use sheet::{parse_numeric_literal, CellInput, Sheet};

/// Maximum number of rows in a sheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a sheet
pub const MAX_COLS: u16 = 16_384;
