//! Formula Abstract Syntax Tree types

use sheetcalc_core::{CellAddress, CellRange, ErrorCode};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(ErrorCode),
    /// Empty argument slot, as in `F(1,,2)`
    Missing,

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Defined name
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    Array(Vec<Vec<FormulaExpr>>),
}

/// Sheet qualifier of a reference: `Sheet1!` or `Sheet1:Sheet3!`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSpan {
    pub first: String,
    /// Last sheet of a 3-D span
    pub last: Option<String>,
}

impl SheetSpan {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            first: name.into(),
            last: None,
        }
    }

    pub fn is_3d(&self) -> bool {
        self.last.is_some()
    }
}

/// Cell reference with optional sheet qualifier
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<SheetSpan>,
    pub address: CellAddress,
}

/// Range reference with optional sheet qualifier
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<SheetSpan>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    // Reference
    Range,
    Union,
}

impl BinaryOperator {
    /// Operator text as written in a formula
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
            BinaryOperator::Range => ":",
            BinaryOperator::Union => ",",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Percent,
}
