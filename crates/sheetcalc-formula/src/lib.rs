//! # sheetcalc-formula
//!
//! Formula parser and evaluator for sheetcalc.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - The operand model ([`ValueEval`]) that references, areas and arrays
//!   flow through during evaluation
//! - Resolution and coercion of operands to scalars
//! - Array broadcasting for operators and element-wise functions
//! - Aggregate collection (SUM, COUNT and friends) under configurable
//!   policies
//! - A registry of built-in functions
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::Workbook;
//! use sheetcalc_formula::{evaluate_formula, EvaluationContext, ValueEval};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 2.0).unwrap();
//! sheet.set_cell_value("A2", 3.0).unwrap();
//!
//! let ctx = EvaluationContext::new(&workbook, 0, 0, 1);
//! let value = evaluate_formula("=SUM(A1:A2)*2", &ctx).unwrap();
//! assert_eq!(value, ValueEval::Number(10.0));
//! ```

pub mod ast;
pub mod broadcast;
pub mod collect;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod locale;
pub mod operators;
pub mod parser;
pub mod resolver;
pub mod value;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, SheetSpan, UnaryOperator};
pub use broadcast::{
    broadcast, broadcast_shape, evaluate_n_array_args, evaluate_one_array_arg,
    evaluate_ternary_array_args, evaluate_two_array_args, Shape,
};
pub use collect::{collect_values, CollectionPolicy, Policy, MAX_OPERANDS};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, evaluate_formula, EvaluationContext};
pub use functions::{call_function, registry, FunctionDef, FunctionKind, FunctionRegistry};
pub use locale::ValueLocale;
pub use parser::{parse_defined_name, parse_formula, MAX_FORMULA_LENGTH, MAX_NESTING_DEPTH};
pub use resolver::{coerce_to_boolean, coerce_to_double, coerce_to_string, resolve_single_value};
pub use value::{AreaEval, AreaLike, CachedArea, RefEval, ThreeDAreaEval, ValueEval};
