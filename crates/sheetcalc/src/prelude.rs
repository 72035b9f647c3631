//! Prelude module - common imports for sheetcalc users
//!
//! ```rust
//! use sheetcalc::prelude::*;
//! ```

pub use crate::{
    // Cell and grid types
    CellAddress,
    CellGrid,
    CellRange,
    CellValue,
    ErrorCode,
    Workbook,
    WorkbookSettings,
    Worksheet,

    // Evaluation
    evaluate_formula,
    parse_formula,
    AreaLike,
    EvaluationContext,
    ValueEval,
    ValueLocale,

    // Calculation types
    CalculationOptions,
    CalculationStats,
    WorkbookCalculationExt,

    // Error types
    Error,
    Result,
};
