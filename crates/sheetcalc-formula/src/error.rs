//! Formula error types
//!
//! These cover failures to turn text into something evaluable. Evaluation
//! itself never fails: spreadsheet errors such as `#DIV/0!` are values
//! (see [`crate::ValueEval::Error`]).

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors raised while parsing formula text
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Reference that is syntactically a cell but out of the grid
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Defined name whose refers-to text does not parse
    #[error("Defined name '{name}' is invalid: {reason}")]
    InvalidName { name: String, reason: String },
}
