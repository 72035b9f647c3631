//! Information functions

use sheetcalc_core::ErrorCode;

use crate::broadcast::broadcast;
use crate::evaluator::EvaluationContext;
use crate::resolver::resolve_single_value;
use crate::value::ValueEval;

/// AREAS(reference)
pub fn fn_areas<'a>(args: &[ValueEval<'a>], _ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    match &args[0] {
        ValueEval::Reference(_) | ValueEval::Area(_) | ValueEval::ThreeDArea(_) => {
            ValueEval::Number(1.0)
        }
        ValueEval::RefList(members) => ValueEval::Number(members.len() as f64),
        ValueEval::Error(e) => ValueEval::Error(*e),
        _ => ValueEval::Error(ErrorCode::Value),
    }
}

fn dimension<'a>(arg: &ValueEval<'a>, measure: fn(usize, usize) -> usize) -> ValueEval<'a> {
    match arg {
        ValueEval::Error(e) => ValueEval::Error(*e),
        ValueEval::RefList(_) => ValueEval::Error(ErrorCode::Ref),
        other => match other.as_area() {
            Some(area) => ValueEval::Number(measure(area.height(), area.width()) as f64),
            None => ValueEval::Number(1.0),
        },
    }
}

/// ROWS(array)
pub fn fn_rows<'a>(args: &[ValueEval<'a>], _ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    dimension(&args[0], |height, _| height)
}

/// COLUMNS(array)
pub fn fn_columns<'a>(args: &[ValueEval<'a>], _ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    dimension(&args[0], |_, width| width)
}

// ==================== IS* predicates ====================
//
// Each predicate sees the value before error propagation, so an error
// operand answers the question instead of short-circuiting.

type Predicate = for<'r, 'v> fn(&'r Result<ValueEval<'v>, ErrorCode>) -> bool;

fn test_value<'a>(
    arg: &ValueEval<'a>,
    ctx: &EvaluationContext<'a>,
    predicate: Predicate,
) -> ValueEval<'a> {
    ValueEval::Boolean(predicate(&resolve_single_value(arg, ctx.row, ctx.col)))
}

fn test_array<'a>(arg: &ValueEval<'a>, row: u32, col: u16, predicate: Predicate) -> ValueEval<'a> {
    broadcast(&[arg], row, col, |cell| ValueEval::Boolean(predicate(&cell[0])))
}

fn is_error(value: &Result<ValueEval<'_>, ErrorCode>) -> bool {
    value.is_err()
}

fn is_err(value: &Result<ValueEval<'_>, ErrorCode>) -> bool {
    matches!(value, Err(e) if *e != ErrorCode::Na)
}

fn is_na(value: &Result<ValueEval<'_>, ErrorCode>) -> bool {
    matches!(value, Err(ErrorCode::Na))
}

fn is_blank(value: &Result<ValueEval<'_>, ErrorCode>) -> bool {
    matches!(value, Ok(ValueEval::Blank))
}

fn is_number(value: &Result<ValueEval<'_>, ErrorCode>) -> bool {
    matches!(value, Ok(ValueEval::Number(_)))
}

fn is_text(value: &Result<ValueEval<'_>, ErrorCode>) -> bool {
    matches!(value, Ok(ValueEval::Text(_)))
}

fn is_logical(value: &Result<ValueEval<'_>, ErrorCode>) -> bool {
    matches!(value, Ok(ValueEval::Boolean(_)))
}

macro_rules! predicate_functions {
    ($($name:ident, $array_name:ident => $predicate:ident;)*) => {
        $(
            pub fn $name<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
                test_value(&args[0], ctx, $predicate)
            }

            pub fn $array_name<'a>(
                args: &[ValueEval<'a>],
                row: u32,
                col: u16,
                _ctx: &EvaluationContext<'a>,
            ) -> ValueEval<'a> {
                test_array(&args[0], row, col, $predicate)
            }
        )*
    };
}

predicate_functions! {
    fn_iserror, fn_iserror_array => is_error;
    fn_iserr, fn_iserr_array => is_err;
    fn_isna, fn_isna_array => is_na;
    fn_isblank, fn_isblank_array => is_blank;
    fn_isnumber, fn_isnumber_array => is_number;
    fn_istext, fn_istext_array => is_text;
    fn_islogical, fn_islogical_array => is_logical;
}

/// NA()
pub fn fn_na<'a>(
    _args: &[ValueEval<'a>],
    _ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    Err(ErrorCode::Na)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate_formula;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_value("A2", "x").unwrap();
        ws.set_cell_value("A3", true).unwrap();
        ws.set_cell_value("A5", ErrorCode::Na).unwrap();
        ws.set_cell_value("A6", ErrorCode::Div0).unwrap();
        wb
    }

    fn eval<'a>(wb: &'a Workbook, formula: &str) -> ValueEval<'a> {
        evaluate_formula(formula, &EvaluationContext::new(wb, 0, 0, 9)).unwrap()
    }

    #[test]
    fn test_areas() {
        let wb = sample();
        assert_eq!(eval(&wb, "=AREAS(A1:B2)"), ValueEval::Number(1.0));
        assert_eq!(eval(&wb, "=AREAS(A1)"), ValueEval::Number(1.0));
        assert_eq!(eval(&wb, "=AREAS((A1:B2,C3,D4:E5))"), ValueEval::Number(3.0));
        assert_eq!(eval(&wb, "=AREAS(1)"), ValueEval::Error(ErrorCode::Value));
        assert_eq!(eval(&wb, "=AREAS(1/0)"), ValueEval::Error(ErrorCode::Div0));
    }

    #[test]
    fn test_rows_columns() {
        let wb = sample();
        assert_eq!(eval(&wb, "=ROWS(A1:C4)"), ValueEval::Number(4.0));
        assert_eq!(eval(&wb, "=COLUMNS(A1:C4)"), ValueEval::Number(3.0));
        assert_eq!(eval(&wb, "=ROWS(A1)"), ValueEval::Number(1.0));
        assert_eq!(eval(&wb, "=COLUMNS({1,2,3;4,5,6})"), ValueEval::Number(3.0));
        assert_eq!(eval(&wb, "=ROWS(7)"), ValueEval::Number(1.0));
        assert_eq!(eval(&wb, "=ROWS((A1,B2))"), ValueEval::Error(ErrorCode::Ref));
    }

    #[test]
    fn test_predicates() {
        let wb = sample();
        assert_eq!(eval(&wb, "=ISNUMBER(A1)"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=ISTEXT(A2)"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=ISLOGICAL(A3)"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=ISBLANK(A4)"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=ISBLANK(A1)"), ValueEval::Boolean(false));
        assert_eq!(eval(&wb, "=ISERROR(A5)"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=ISNA(A5)"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=ISERR(A5)"), ValueEval::Boolean(false));
        assert_eq!(eval(&wb, "=ISERR(A6)"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=ISERROR(1/0)"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=ISNA(NA())"), ValueEval::Boolean(true));
        assert_eq!(eval(&wb, "=NA()"), ValueEval::Error(ErrorCode::Na));
    }

    #[test]
    fn test_predicate_over_area() {
        let wb = sample();
        // Outside array mode the column is intersected with the formula row
        let ctx = EvaluationContext::new(&wb, 0, 4, 9);
        assert_eq!(
            evaluate_formula("=ISNA(A1:A6)", &ctx).unwrap(),
            ValueEval::Boolean(true)
        );

        let ctx = EvaluationContext::new(&wb, 0, 0, 9).with_array_mode(true);
        let result = evaluate_formula("=ISERROR(A1:A6)", &ctx).unwrap();
        let ValueEval::Cached(cells) = &result else {
            panic!("expected array, got {result:?}");
        };
        assert_eq!(
            cells.values(),
            &[
                ValueEval::Boolean(false),
                ValueEval::Boolean(false),
                ValueEval::Boolean(false),
                ValueEval::Boolean(false),
                ValueEval::Boolean(true),
                ValueEval::Boolean(true),
            ]
        );
    }
}
