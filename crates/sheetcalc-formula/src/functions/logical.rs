//! Logical functions

use sheetcalc_core::ErrorCode;

use crate::broadcast::{broadcast, evaluate_ternary_array_args};
use crate::evaluator::EvaluationContext;
use crate::resolver::{coerce_to_boolean, resolve_single_value};
use crate::value::{AreaLike, ValueEval};

/// A branch chosen by IF and friends; an empty slot reads as zero
fn branch<'a>(value: &ValueEval<'a>) -> ValueEval<'a> {
    match value {
        ValueEval::MissingArgument => ValueEval::Number(0.0),
        other => other.clone(),
    }
}

/// IF(condition, value_if_true, [value_if_false])
///
/// Only the condition is resolved; the chosen branch is returned as is so
/// that `IF(x, A1:A3)` still yields a reference.
pub fn fn_if<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    let condition = resolve_single_value(&args[0], ctx.row, ctx.col)
        .and_then(|v| coerce_to_boolean(&v, true));
    match condition {
        Ok(Some(true)) => branch(&args[1]),
        Ok(Some(false)) => args.get(2).map_or(ValueEval::Boolean(false), branch),
        Ok(None) => ValueEval::Error(ErrorCode::Value),
        Err(e) => ValueEval::Error(e),
    }
}

/// IF over arrays: condition and both branches are broadcast together
pub fn fn_if_array<'a>(
    args: &[ValueEval<'a>],
    row: u32,
    col: u16,
    _ctx: &EvaluationContext<'a>,
) -> ValueEval<'a> {
    let otherwise = ValueEval::Boolean(false);
    let else_value = args.get(2).unwrap_or(&otherwise);
    evaluate_ternary_array_args(&args[0], &args[1], else_value, row, col)
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    match resolve_single_value(&args[0], ctx.row, ctx.col) {
        Ok(v) => branch(&v),
        Err(_) => branch(&args[1]),
    }
}

pub fn fn_iferror_array<'a>(
    args: &[ValueEval<'a>],
    row: u32,
    col: u16,
    _ctx: &EvaluationContext<'a>,
) -> ValueEval<'a> {
    broadcast(&[&args[0], &args[1]], row, col, |cell| match cell {
        [Ok(v), _] => branch(v),
        [Err(_), Ok(fallback)] => branch(fallback),
        [Err(_), Err(e)] => ValueEval::Error(*e),
        _ => ValueEval::Error(ErrorCode::Value),
    })
}

/// IFNA(value, value_if_na)
pub fn fn_ifna<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    match resolve_single_value(&args[0], ctx.row, ctx.col) {
        Ok(v) => branch(&v),
        Err(ErrorCode::Na) => branch(&args[1]),
        Err(e) => ValueEval::Error(e),
    }
}

pub fn fn_ifna_array<'a>(
    args: &[ValueEval<'a>],
    row: u32,
    col: u16,
    _ctx: &EvaluationContext<'a>,
) -> ValueEval<'a> {
    broadcast(&[&args[0], &args[1]], row, col, |cell| match cell {
        [Ok(v), _] => branch(v),
        [Err(ErrorCode::Na), Ok(fallback)] => branch(fallback),
        [Err(ErrorCode::Na), Err(e)] | [Err(e), _] => ValueEval::Error(*e),
        _ => ValueEval::Error(ErrorCode::Value),
    })
}

type Visitor<'v, 'a> = dyn FnMut(&ValueEval<'a>, bool) -> Result<(), ErrorCode> + 'v;

/// Fold the logical values in the operands
///
/// Numbers and booleans take part wherever they come from. Text typed as
/// an argument must read TRUE or FALSE; text and blanks in cells are
/// skipped. No logical values at all is `#VALUE!`.
fn fold_logical<'a>(
    args: &[ValueEval<'a>],
    init: bool,
    step: fn(bool, bool) -> bool,
) -> ValueEval<'a> {
    let mut acc: Option<bool> = None;
    let mut fold = |value: &ValueEval<'a>, via_ref: bool| -> Result<(), ErrorCode> {
        let b = match value {
            ValueEval::Boolean(b) => Some(*b),
            ValueEval::Number(n) => Some(*n != 0.0),
            ValueEval::Text(_) if via_ref => None,
            ValueEval::Text(_) => Some(coerce_to_boolean(value, false)?.ok_or(ErrorCode::Value)?),
            ValueEval::Error(e) => return Err(*e),
            _ => None,
        };
        if let Some(b) = b {
            acc = Some(step(acc.unwrap_or(init), b));
        }
        Ok(())
    };
    let visited = visit_logical(args, &mut fold);
    match (visited, acc) {
        (Err(e), _) => ValueEval::Error(e),
        (Ok(()), Some(b)) => ValueEval::Boolean(b),
        (Ok(()), None) => ValueEval::Error(ErrorCode::Value),
    }
}

fn visit_logical<'a>(args: &[ValueEval<'a>], visit: &mut Visitor<'_, 'a>) -> Result<(), ErrorCode> {
    for arg in args {
        match arg {
            ValueEval::Reference(r) => {
                for sheet in r.first_sheet()..=r.last_sheet() {
                    visit(&r.inner_value(sheet), true)?;
                }
            }
            ValueEval::ThreeDArea(area) => {
                for sheet in area.first_sheet()..=area.last_sheet() {
                    visit_area(&area.sheet_area(sheet), visit)?;
                }
            }
            ValueEval::RefList(members) => visit_logical(members, visit)?,
            other => match other.as_area() {
                Some(area) => visit_area(area, visit)?,
                None => visit(other, false)?,
            },
        }
    }
    Ok(())
}

fn visit_area<'a>(area: &dyn AreaLike<'a>, visit: &mut Visitor<'_, 'a>) -> Result<(), ErrorCode> {
    for r in 0..area.height() {
        for c in 0..area.width() {
            visit(&area.get_value(r, c)?, true)?;
        }
    }
    Ok(())
}

/// AND(logical1, ...)
pub fn fn_and<'a>(args: &[ValueEval<'a>], _ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    fold_logical(args, true, |acc, b| acc && b)
}

/// OR(logical1, ...)
pub fn fn_or<'a>(args: &[ValueEval<'a>], _ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    fold_logical(args, false, |acc, b| acc || b)
}

/// NOT(logical)
pub fn fn_not<'a>(
    args: &[ValueEval<'a>],
    _ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    let b = coerce_to_boolean(&args[0], true)?.ok_or(ErrorCode::Value)?;
    Ok(ValueEval::Boolean(!b))
}

/// TRUE()
pub fn fn_true<'a>(
    _args: &[ValueEval<'a>],
    _ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    Ok(ValueEval::Boolean(true))
}

/// FALSE()
pub fn fn_false<'a>(
    _args: &[ValueEval<'a>],
    _ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    Ok(ValueEval::Boolean(false))
}
