//! Cell value types

use std::fmt;
use std::str::FromStr;

/// Represents the raw value stored in a cell
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Numeric value (all numbers stored as f64, including dates)
    Number(f64),

    /// String value
    String(String),

    /// Error value (#VALUE!, #REF!, etc.)
    Error(ErrorCode),

    /// Formula with cached result
    Formula {
        /// Original formula text (e.g., "=SUM(A1:A10)")
        text: String,
        /// Last calculated value (if any)
        cached_value: Option<Box<CellValue>>,
    },
}

impl CellValue {
    /// Create a new string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        CellValue::String(s.into())
    }

    /// Create a new formula value without a cached result
    pub fn formula<S: Into<String>>(text: S) -> Self {
        CellValue::Formula {
            text: text.into(),
            cached_value: None,
        }
    }

    /// Create a formula value carrying a previously calculated result
    pub fn formula_with_result<S: Into<String>>(text: S, cached: CellValue) -> Self {
        CellValue::Formula {
            text: text.into(),
            cached_value: Some(Box::new(cached)),
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell contains a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula { .. })
    }

    /// Check if the cell contains an error
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Get the formula text if this is a formula cell
    pub fn formula_text(&self) -> Option<&str> {
        match self {
            CellValue::Formula { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Check whether this is a formula cell calling SUBTOTAL
    ///
    /// Aggregates evaluated through SUBTOTAL skip such cells so nested
    /// subtotals are not counted twice.
    pub fn is_subtotal_formula(&self) -> bool {
        self.formula_text().map_or(false, calls_subtotal)
    }

    /// Get the effective value (cached value for formulas, value otherwise)
    ///
    /// A formula that has never been calculated reads as empty.
    pub fn effective_value(&self) -> &CellValue {
        match self {
            CellValue::Formula {
                cached_value: Some(v),
                ..
            } => v.effective_value(),
            CellValue::Formula {
                cached_value: None, ..
            } => &CellValue::Empty,
            _ => self,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Boolean(_) => "boolean",
            CellValue::Number(_) => "number",
            CellValue::String(_) => "string",
            CellValue::Error(_) => "error",
            CellValue::Formula { .. } => "formula",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => write!(f, ""),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Error(e) => write!(f, "{}", e),
            CellValue::Formula {
                cached_value: Some(v),
                ..
            } => write!(f, "{}", v),
            CellValue::Formula { text, .. } => write!(f, "{}", text),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::string(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<ErrorCode> for CellValue {
    fn from(e: ErrorCode) -> Self {
        CellValue::Error(e)
    }
}

/// Spreadsheet error values
///
/// Variants are declared in BIFF code order, so the derived ordering matches
/// the numeric codes used by the binary file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    /// #NULL! - Empty intersection of two ranges
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
}

impl ErrorCode {
    /// All error codes in BIFF order
    pub const ALL: [ErrorCode; 7] = [
        ErrorCode::Null,
        ErrorCode::Div0,
        ErrorCode::Value,
        ErrorCode::Ref,
        ErrorCode::Name,
        ErrorCode::Num,
        ErrorCode::Na,
    ];

    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::Na => "#N/A",
        }
    }

    /// Get the numeric error code (for BIFF format)
    pub fn code(&self) -> u8 {
        match self {
            ErrorCode::Null => 0x00,
            ErrorCode::Div0 => 0x07,
            ErrorCode::Value => 0x0F,
            ErrorCode::Ref => 0x17,
            ErrorCode::Name => 0x1D,
            ErrorCode::Num => 0x24,
            ErrorCode::Na => 0x2A,
        }
    }

    /// Look up an error by its BIFF code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when text is not one of the error display strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownErrorCode(pub String);

impl fmt::Display for UnknownErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error literal '{}'", self.0)
    }
}

impl std::error::Error for UnknownErrorCode {}

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    /// Parse an error display string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == upper)
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Whether formula text calls SUBTOTAL
///
/// String literals and quoted sheet names are skipped, and the name must
/// stand alone and be followed by `(`.
fn calls_subtotal(text: &str) -> bool {
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c == '"' || c == '\'' {
            // A doubled quote closes the literal and reopens it at once
            for (_, d) in chars.by_ref() {
                if d == c {
                    break;
                }
            }
        } else if is_name_char(c) {
            let end = text[start..]
                .find(|c: char| !is_name_char(c))
                .map_or(text.len(), |len| start + len);
            if text[start..end].eq_ignore_ascii_case("SUBTOTAL")
                && text[end..].trim_start().starts_with('(')
            {
                return true;
            }
            while chars.next_if(|&(i, _)| i < end).is_some() {}
        }
    }
    false
}
