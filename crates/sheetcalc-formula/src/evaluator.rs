//! Formula evaluator

use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use sheetcalc_core::{CellGrid, ErrorCode, Workbook};

use crate::ast::{FormulaExpr, SheetSpan};
use crate::error::FormulaResult;
use crate::functions;
use crate::locale::ValueLocale;
use crate::operators;
use crate::parser::{parse_defined_name, parse_formula};
use crate::resolver::resolve_single_value;
use crate::value::{AreaEval, CachedArea, RefEval, ThreeDAreaEval, ValueEval};

/// Defined names referring to other names nest at most this deep
const MAX_NAME_DEPTH: usize = 32;

static EMPTY_GRID: Lazy<Workbook> = Lazy::new(Workbook::empty);

/// Where and how a formula is evaluated
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Cells that references read from
    pub grid: &'a dyn CellGrid,
    /// Sheet holding the formula
    pub sheet: usize,
    /// Row of the formula cell
    pub row: u32,
    /// Column of the formula cell
    pub col: u16,
    /// Evaluate element-wise over arrays even outside an array formula group
    pub array_mode: bool,
    /// Separators for reading text as numbers
    pub locale: ValueLocale,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context for the formula at `(row, col)` on `sheet`
    pub fn new(grid: &'a dyn CellGrid, sheet: usize, row: u32, col: u16) -> Self {
        Self {
            grid,
            sheet,
            row,
            col,
            array_mode: false,
            locale: ValueLocale::default(),
        }
    }

    /// Context over an empty grid (for testing and constant formulas)
    pub fn simple() -> EvaluationContext<'static> {
        EvaluationContext::new(&*EMPTY_GRID, 0, 0, 0)
    }

    #[must_use]
    pub fn with_array_mode(mut self, array_mode: bool) -> Self {
        self.array_mode = array_mode;
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: ValueLocale) -> Self {
        self.locale = locale;
        self
    }

    /// Whether operators and functions broadcast over arrays
    ///
    /// True in array mode and for cells inside an array formula group.
    pub fn is_array_context(&self) -> bool {
        self.array_mode || self.array_group_start().is_some()
    }

    /// Top-left cell that array results are anchored at
    ///
    /// The first cell of the array formula group, or the formula cell.
    pub fn array_anchor(&self) -> (u32, u16) {
        self.array_group_start().unwrap_or((self.row, self.col))
    }

    fn array_group_start(&self) -> Option<(u32, u16)> {
        self.grid
            .array_formula_range(self.sheet, self.row, self.col)
            .map(|range| (range.start.row, range.start.col))
    }

    /// Resolve a sheet qualifier to a first/last sheet index pair
    fn sheet_span(&self, span: Option<&SheetSpan>) -> Result<(usize, usize), ErrorCode> {
        let Some(span) = span else {
            return Ok((self.sheet, self.sheet));
        };
        let first = self.grid.sheet_index(&span.first).ok_or(ErrorCode::Ref)?;
        let last = match &span.last {
            Some(last) => self.grid.sheet_index(last).ok_or(ErrorCode::Ref)?,
            None => first,
        };
        Ok((first.min(last), first.max(last)))
    }
}

impl std::fmt::Debug for EvaluationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("sheet", &self.sheet)
            .field("row", &self.row)
            .field("col", &self.col)
            .field("array_mode", &self.array_mode)
            .field("locale", &self.locale)
            .finish()
    }
}

/// Parse and evaluate formula text such as `=SUM(A1:A3)`
pub fn evaluate_formula<'a>(
    formula: &str,
    ctx: &EvaluationContext<'a>,
) -> FormulaResult<ValueEval<'a>> {
    let expr = parse_formula(formula)?;
    Ok(evaluate(&expr, ctx))
}

/// Evaluate a parsed formula
///
/// Outside an array context a reference or area result is reduced to the
/// value that lines up with the formula cell. In an array context areas
/// are returned as they are.
pub fn evaluate<'a>(expr: &FormulaExpr, ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    let value = evaluate_expr(expr, ctx, &[]);
    match value {
        ValueEval::Reference(r) => r.value(),
        ValueEval::Area(_) | ValueEval::ThreeDArea(_) | ValueEval::Cached(_)
            if ctx.is_array_context() =>
        {
            value
        }
        ValueEval::Cached(cached) => match cached.values().first() {
            Some(first) => first.clone(),
            None => ValueEval::Error(ErrorCode::Value),
        },
        ValueEval::Area(_) | ValueEval::ThreeDArea(_) | ValueEval::RefList(_) => {
            resolve_single_value(&value, ctx.row, ctx.col).unwrap_or_else(ValueEval::Error)
        }
        ValueEval::MissingArgument => ValueEval::Blank,
        scalar => scalar,
    }
}

/// `names` holds the defined names being resolved, outermost first
fn evaluate_expr<'a>(
    expr: &FormulaExpr,
    ctx: &EvaluationContext<'a>,
    names: &[&str],
) -> ValueEval<'a> {
    match expr {
        FormulaExpr::Number(n) => ValueEval::Number(*n),
        FormulaExpr::String(s) => ValueEval::Text(s.clone()),
        FormulaExpr::Boolean(b) => ValueEval::Boolean(*b),
        FormulaExpr::Error(e) => ValueEval::Error(*e),
        FormulaExpr::Missing => ValueEval::MissingArgument,

        FormulaExpr::CellRef(cell_ref) => match ctx.sheet_span(cell_ref.sheet.as_ref()) {
            Ok((first, last)) => ValueEval::Reference(RefEval::new_3d(
                ctx.grid,
                first,
                last,
                cell_ref.address.row,
                cell_ref.address.col,
            )),
            Err(e) => ValueEval::Error(e),
        },

        FormulaExpr::RangeRef(range_ref) => match ctx.sheet_span(range_ref.sheet.as_ref()) {
            Ok((first, last)) if first == last => {
                ValueEval::Area(AreaEval::new(ctx.grid, first, range_ref.range))
            }
            Ok((first, last)) => {
                ValueEval::ThreeDArea(ThreeDAreaEval::new(ctx.grid, first, last, range_ref.range))
            }
            Err(e) => ValueEval::Error(e),
        },

        FormulaExpr::NameRef(name) => evaluate_name(name, ctx, names),

        FormulaExpr::BinaryOp { .. } => evaluate_binary_chain(expr, ctx, names),
        FormulaExpr::UnaryOp { .. } => evaluate_unary_chain(expr, ctx, names),

        FormulaExpr::Function { name, args } => {
            let Some(def) = functions::registry().get(name) else {
                debug!("unknown function {}", name);
                return ValueEval::Error(ErrorCode::Name);
            };
            let arg_ctx = if def.array_operands {
                ctx.with_array_mode(true)
            } else {
                *ctx
            };
            let args: Vec<ValueEval<'a>> = args
                .iter()
                .map(|arg| evaluate_expr(arg, &arg_ctx, names))
                .collect();
            def.invoke(&args, ctx)
        }

        FormulaExpr::Array(rows) => {
            let (row, col) = ctx.array_anchor();
            let values: Vec<Vec<ValueEval<'a>>> = rows
                .iter()
                .map(|r| r.iter().map(|e| evaluate_expr(e, ctx, names)).collect())
                .collect();
            ValueEval::Cached(Arc::new(CachedArea::from_rows(row, col, values)))
        }
    }
}

/// `A1+A2+A3` nests down its left operands, so the spine is walked with
/// a loop and only right operands recurse
fn evaluate_binary_chain<'a>(
    expr: &FormulaExpr,
    ctx: &EvaluationContext<'a>,
    names: &[&str],
) -> ValueEval<'a> {
    let mut spine = Vec::new();
    let mut node = expr;
    while let FormulaExpr::BinaryOp { op, left, right } = node {
        spine.push((*op, right.as_ref()));
        node = left;
    }

    let mut value = evaluate_expr(node, ctx, names);
    for (op, right) in spine.into_iter().rev() {
        let right = evaluate_expr(right, ctx, names);
        value = operators::evaluate_binary(op, &value, &right, ctx);
    }
    value
}

fn evaluate_unary_chain<'a>(
    expr: &FormulaExpr,
    ctx: &EvaluationContext<'a>,
    names: &[&str],
) -> ValueEval<'a> {
    let mut ops = Vec::new();
    let mut node = expr;
    while let FormulaExpr::UnaryOp { op, operand } = node {
        ops.push(*op);
        node = operand;
    }

    let mut value = evaluate_expr(node, ctx, names);
    for op in ops.into_iter().rev() {
        value = operators::evaluate_unary(op, &value, ctx);
    }
    value
}

fn evaluate_name<'a>(name: &str, ctx: &EvaluationContext<'a>, names: &[&str]) -> ValueEval<'a> {
    if names.iter().any(|outer| outer.eq_ignore_ascii_case(name)) {
        debug!("defined name {} refers to itself", name);
        return ValueEval::Error(ErrorCode::Name);
    }
    if names.len() >= MAX_NAME_DEPTH {
        debug!("defined name {} nests deeper than {}", name, MAX_NAME_DEPTH);
        return ValueEval::Error(ErrorCode::Name);
    }
    let Some(refers_to) = ctx.grid.defined_name(name, ctx.sheet) else {
        debug!("unknown defined name {}", name);
        return ValueEval::Error(ErrorCode::Name);
    };
    match parse_defined_name(name, refers_to) {
        Ok(expr) => {
            let mut nested = names.to_vec();
            nested.push(name);
            evaluate_expr(&expr, ctx, &nested)
        }
        Err(e) => {
            debug!("{}", e);
            ValueEval::Error(ErrorCode::Name)
        }
    }
}
