//! # sheetcalc
//!
//! Spreadsheet formula evaluation with Excel's coercion, broadcasting and
//! aggregation rules.
//!
//! ## Features
//!
//! - In-memory workbook grid with defined names and array formula groups
//! - Formula parsing and evaluation with lazy references and 3-D areas
//! - Implicit intersection and element-wise array evaluation
//! - Aggregates driven by configurable collection policies
//! - Locale-aware reading of text as numbers
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 2.0).unwrap();
//! sheet.set_cell_value("A2", 3.0).unwrap();
//! sheet.set_cell_formula("B1", "=GEOMEAN(A1:A2)").unwrap();
//!
//! let value = workbook.evaluate_cell(0, "B1").unwrap();
//! assert!(matches!(value, ValueEval::Number(n) if (n - 2.449489742783178).abs() < 1e-15));
//! ```

pub mod calculation;
pub mod error;
pub mod prelude;

pub use calculation::{CalculationOptions, CalculationStats, WorkbookCalculationExt};
pub use error::{Error, Result};

// Re-export core types
pub use sheetcalc_core::{
    CellAddress, CellGrid, CellRange, CellValue, ErrorCode, NameScope, NamedRange, Workbook,
    WorkbookSettings, Worksheet, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use sheetcalc_formula::{
    call_function, collect_values, evaluate, evaluate_formula, parse_formula, registry,
    AreaEval, AreaLike, CachedArea, CollectionPolicy, EvaluationContext, FormulaError,
    FormulaExpr, FormulaResult, FunctionDef, FunctionKind, FunctionRegistry, Policy, RefEval,
    ThreeDAreaEval, ValueEval, ValueLocale, MAX_FORMULA_LENGTH, MAX_NESTING_DEPTH,
};
