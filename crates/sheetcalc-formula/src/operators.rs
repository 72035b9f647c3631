//! Operator evaluation
//!
//! Arithmetic, comparison, concatenation and the unary operators work on
//! scalars. In an array context they broadcast element-wise; otherwise each
//! operand is first reduced to the value at the formula cell. The range
//! and union operators combine references.

use std::cmp::Ordering;

use sheetcalc_core::ErrorCode;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::broadcast::{evaluate_one_array_arg, evaluate_two_array_args};
use crate::evaluator::EvaluationContext;
use crate::locale::ValueLocale;
use crate::resolver::{coerce_to_double, coerce_to_string, resolve_single_value};
use crate::value::{AreaEval, ValueEval};

/// Apply a binary operator to two evaluated operands
pub fn evaluate_binary<'a>(
    op: BinaryOperator,
    left: &ValueEval<'a>,
    right: &ValueEval<'a>,
    ctx: &EvaluationContext<'a>,
) -> ValueEval<'a> {
    match op {
        BinaryOperator::Range => return range_operator(left, right),
        BinaryOperator::Union => return union_operator(left, right),
        _ => {}
    }

    let locale = ctx.locale;
    let apply = |a: &ValueEval<'a>, b: &ValueEval<'a>| scalar_binary(op, a, b, &locale);
    if ctx.is_array_context() {
        let (row, col) = ctx.array_anchor();
        return evaluate_two_array_args(left, right, row, col, apply);
    }

    let a = match resolve_single_value(left, ctx.row, ctx.col) {
        Ok(v) => v,
        Err(e) => return ValueEval::Error(e),
    };
    let b = match resolve_single_value(right, ctx.row, ctx.col) {
        Ok(v) => v,
        Err(e) => return ValueEval::Error(e),
    };
    apply(&a, &b)
}

/// Apply a unary operator to an evaluated operand
pub fn evaluate_unary<'a>(
    op: UnaryOperator,
    operand: &ValueEval<'a>,
    ctx: &EvaluationContext<'a>,
) -> ValueEval<'a> {
    let locale = ctx.locale;
    let apply = |v: &ValueEval<'a>| scalar_unary(op, v, &locale);
    if ctx.is_array_context() {
        let (row, col) = ctx.array_anchor();
        return evaluate_one_array_arg(operand, row, col, apply);
    }
    match resolve_single_value(operand, ctx.row, ctx.col) {
        Ok(v) => apply(&v),
        Err(e) => ValueEval::Error(e),
    }
}

fn scalar_binary<'a>(
    op: BinaryOperator,
    a: &ValueEval<'_>,
    b: &ValueEval<'_>,
    locale: &ValueLocale,
) -> ValueEval<'a> {
    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Power => arithmetic(op, a, b, locale).into(),
        BinaryOperator::Concat => match (coerce_to_string(a), coerce_to_string(b)) {
            (Ok(x), Ok(y)) => ValueEval::Text(x + &y),
            (Err(e), _) | (_, Err(e)) => ValueEval::Error(e),
        },
        BinaryOperator::Equal => ValueEval::Boolean(compare_values(a, b) == Ordering::Equal),
        BinaryOperator::NotEqual => ValueEval::Boolean(compare_values(a, b) != Ordering::Equal),
        BinaryOperator::LessThan => ValueEval::Boolean(compare_values(a, b) == Ordering::Less),
        BinaryOperator::LessEqual => ValueEval::Boolean(compare_values(a, b) != Ordering::Greater),
        BinaryOperator::GreaterThan => {
            ValueEval::Boolean(compare_values(a, b) == Ordering::Greater)
        }
        BinaryOperator::GreaterEqual => ValueEval::Boolean(compare_values(a, b) != Ordering::Less),
        BinaryOperator::Range | BinaryOperator::Union => ValueEval::Error(ErrorCode::Value),
    }
}

fn arithmetic(
    op: BinaryOperator,
    a: &ValueEval<'_>,
    b: &ValueEval<'_>,
    locale: &ValueLocale,
) -> Result<f64, ErrorCode> {
    let x = coerce_to_double(a, locale)?;
    let y = coerce_to_double(b, locale)?;
    let result = match op {
        BinaryOperator::Add => x + y,
        BinaryOperator::Subtract => x - y,
        BinaryOperator::Multiply => x * y,
        BinaryOperator::Divide => {
            if y == 0.0 {
                return Err(ErrorCode::Div0);
            }
            x / y
        }
        BinaryOperator::Power => return power(x, y),
        _ => return Err(ErrorCode::Value),
    };
    finite(result)
}

/// `x ^ y` with spreadsheet domain rules
///
/// `0^0` is `#NUM!` and `0` to a negative power is `#DIV/0!`.
pub fn power(x: f64, y: f64) -> Result<f64, ErrorCode> {
    if x == 0.0 {
        if y == 0.0 {
            return Err(ErrorCode::Num);
        }
        if y < 0.0 {
            return Err(ErrorCode::Div0);
        }
    }
    finite(x.powf(y))
}

fn finite(n: f64) -> Result<f64, ErrorCode> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(ErrorCode::Num)
    }
}

fn scalar_unary<'a>(op: UnaryOperator, v: &ValueEval<'_>, locale: &ValueLocale) -> ValueEval<'a> {
    match op {
        // Unary plus leaves text alone
        UnaryOperator::Plus => match v {
            ValueEval::Text(s) => ValueEval::Text(s.clone()),
            _ => coerce_to_double(v, locale).into(),
        },
        UnaryOperator::Negate => coerce_to_double(v, locale).map(|n| -n).into(),
        UnaryOperator::Percent => coerce_to_double(v, locale).map(|n| n / 100.0).into(),
    }
}

/// Type rank for mixed comparisons: numbers < text < booleans
fn type_rank(v: &ValueEval<'_>) -> u8 {
    match v {
        ValueEval::Number(_) => 0,
        ValueEval::Text(_) => 1,
        ValueEval::Boolean(_) => 2,
        _ => 3,
    }
}

fn is_blank(v: &ValueEval<'_>) -> bool {
    matches!(v, ValueEval::Blank | ValueEval::MissingArgument)
}

/// The empty value of the same type as `v`
fn blank_like(v: &ValueEval<'_>) -> ValueEval<'static> {
    match v {
        ValueEval::Text(_) => ValueEval::Text(String::new()),
        ValueEval::Boolean(_) => ValueEval::Boolean(false),
        _ => ValueEval::Number(0.0),
    }
}

/// Order two resolved scalars the way comparison operators do
///
/// A blank compares as zero, empty text or FALSE depending on the other
/// side. Text compares case-insensitively and numbers at 15 significant
/// digits.
pub fn compare_values(a: &ValueEval<'_>, b: &ValueEval<'_>) -> Ordering {
    match (is_blank(a), is_blank(b)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return compare_values(&blank_like(b), b),
        (false, true) => return compare_values(a, &blank_like(a)),
        (false, false) => {}
    }

    match (a, b) {
        (ValueEval::Number(x), ValueEval::Number(y)) => round_significant(*x)
            .partial_cmp(&round_significant(*y))
            .unwrap_or(Ordering::Equal),
        (ValueEval::Text(x), ValueEval::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (ValueEval::Boolean(x), ValueEval::Boolean(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// `n` rounded to 15 significant digits
pub(crate) fn round_significant(n: f64) -> f64 {
    format!("{:.14e}", n).parse().unwrap_or(n)
}

/// Area view of a single-sheet reference operand
fn as_single_sheet_area<'a>(v: &ValueEval<'a>) -> Option<AreaEval<'a>> {
    match v {
        ValueEval::Reference(r) if r.sheet_count() == 1 => Some(r.as_area()),
        ValueEval::Area(area) => Some(*area),
        _ => None,
    }
}

/// `A1:B2` between two evaluated references: their bounding area
fn range_operator<'a>(left: &ValueEval<'a>, right: &ValueEval<'a>) -> ValueEval<'a> {
    if let Some(e) = left.error().or_else(|| right.error()) {
        return ValueEval::Error(e);
    }
    match (as_single_sheet_area(left), as_single_sheet_area(right)) {
        (Some(a), Some(b)) if a.sheet() == b.sheet() => {
            ValueEval::Area(AreaEval::new(a.grid(), a.sheet(), a.range().bounding(&b.range())))
        }
        _ => ValueEval::Error(ErrorCode::Value),
    }
}

/// `(A1:B2,C3)`: a flat list of the references on both sides
fn union_operator<'a>(left: &ValueEval<'a>, right: &ValueEval<'a>) -> ValueEval<'a> {
    let mut members = Vec::new();
    for side in [left, right] {
        match side {
            ValueEval::Error(e) => return ValueEval::Error(*e),
            ValueEval::RefList(list) => members.extend(list.iter().cloned()),
            ValueEval::Reference(_) | ValueEval::Area(_) | ValueEval::ThreeDArea(_) => {
                members.push(side.clone())
            }
            _ => return ValueEval::Error(ErrorCode::Value),
        }
    }
    ValueEval::RefList(members)
}
