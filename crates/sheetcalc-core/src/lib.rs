//! # sheetcalc-core
//!
//! Core data structures for the sheetcalc formula engine.
//!
//! This crate provides the types the evaluator reads from:
//! - [`CellValue`] and [`ErrorCode`] - raw cell contents and error values
//! - [`CellAddress`] and [`CellRange`] - A1 addressing and ranges
//! - [`CellGrid`] - read-only cell access used during evaluation
//! - [`Workbook`], [`Worksheet`] - an in-memory grid implementing it
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellGrid, CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", "Hello").unwrap();
//! sheet.set_cell_value_at(1, 1, 3.14).unwrap();
//!
//! assert_eq!(workbook.cell_value(0, 1, 1), Some(&CellValue::Number(3.14)));
//! ```

pub mod cell;
pub mod error;
pub mod grid;
pub mod named_range;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellRange, CellValue, ErrorCode};
pub use error::{Error, Result};
pub use grid::CellGrid;
pub use named_range::{NameScope, NamedRange, NamedRangeCollection};
pub use workbook::{Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
