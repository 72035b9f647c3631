//! Error type for workbook-level evaluation

use sheetcalc_formula::FormulaError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised before a formula produces a value
///
/// Spreadsheet errors such as `#DIV/0!` are results, not failures, and
/// never show up here.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid address, sheet or grid operation
    #[error(transparent)]
    Grid(#[from] sheetcalc_core::Error),

    /// Formula text that does not parse
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Sheet index past the last sheet
    #[error("Sheet index {0} not found")]
    SheetNotFound(usize),
}
