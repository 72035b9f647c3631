//! Math functions
//!
//! All of these take scalars, so in an array context the registry lifts
//! them element-wise.

use sheetcalc_core::ErrorCode;

use crate::evaluator::EvaluationContext;
use crate::operators::{power, round_significant};
use crate::resolver::coerce_to_double;
use crate::value::ValueEval;

fn number(
    args: &[ValueEval<'_>],
    index: usize,
    ctx: &EvaluationContext<'_>,
) -> Result<f64, ErrorCode> {
    coerce_to_double(&args[index], &ctx.locale)
}

/// ABS(number)
pub fn fn_abs<'a>(
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    Ok(ValueEval::Number(number(args, 0, ctx)?.abs()))
}

/// SIGN(number)
pub fn fn_sign<'a>(
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    let n = number(args, 0, ctx)?;
    let sign = if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(ValueEval::Number(sign))
}

/// SQRT(number)
pub fn fn_sqrt<'a>(
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    let n = number(args, 0, ctx)?;
    if n < 0.0 {
        return Err(ErrorCode::Num);
    }
    Ok(ValueEval::Number(n.sqrt()))
}

/// INT(number), rounding toward negative infinity
pub fn fn_int<'a>(
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    Ok(ValueEval::Number(number(args, 0, ctx)?.floor()))
}

/// Round half away from zero at `digits` decimal places
///
/// Negative `digits` round to the left of the decimal point. The scaled
/// value is first cut to 15 significant digits, so `1.005` rounds to
/// `1.01` even though its binary value is slightly below it.
pub fn round_half_away(n: f64, digits: i32) -> f64 {
    let multiplier = 10_f64.powi(digits);
    let scaled = n * multiplier;
    if !scaled.is_finite() || multiplier == 0.0 {
        return n;
    }
    (round_significant(scaled).abs() + 0.5).floor().copysign(n) / multiplier
}

/// ROUND(number, num_digits)
pub fn fn_round<'a>(
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    let n = number(args, 0, ctx)?;
    let digits = number(args, 1, ctx)?.trunc().clamp(-308.0, 308.0) as i32;
    Ok(ValueEval::Number(round_half_away(n, digits)))
}

/// MOD(number, divisor); the result takes the sign of the divisor
pub fn fn_mod<'a>(
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    let n = number(args, 0, ctx)?;
    let d = number(args, 1, ctx)?;
    if d == 0.0 {
        return Err(ErrorCode::Div0);
    }
    Ok(ValueEval::Number(n - d * (n / d).floor()))
}

/// POWER(number, power)
pub fn fn_power<'a>(
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
) -> Result<ValueEval<'a>, ErrorCode> {
    power(number(args, 0, ctx)?, number(args, 1, ctx)?).map(ValueEval::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate_formula;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    fn eval(formula: &str) -> ValueEval<'static> {
        evaluate_formula(formula, &EvaluationContext::simple()).unwrap()
    }

    #[test]
    fn test_abs_sign_int() {
        assert_eq!(eval("=ABS(-3.5)"), ValueEval::Number(3.5));
        assert_eq!(eval("=SIGN(-0.1)"), ValueEval::Number(-1.0));
        assert_eq!(eval("=SIGN(0)"), ValueEval::Number(0.0));
        assert_eq!(eval("=SIGN(\"4\")"), ValueEval::Number(1.0));
        assert_eq!(eval("=INT(-2.5)"), ValueEval::Number(-3.0));
        assert_eq!(eval("=INT(2.9)"), ValueEval::Number(2.0));
        assert_eq!(eval("=ABS(\"x\")"), ValueEval::Error(ErrorCode::Value));
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(eval("=SQRT(16)"), ValueEval::Number(4.0));
        assert_eq!(eval("=SQRT(-1)"), ValueEval::Error(ErrorCode::Num));
    }

    #[test]
    fn test_round() {
        assert_eq!(eval("=ROUND(2.5,0)"), ValueEval::Number(3.0));
        assert_eq!(eval("=ROUND(-2.5,0)"), ValueEval::Number(-3.0));
        assert_eq!(eval("=ROUND(1234.5678,2)"), ValueEval::Number(1234.57));
        assert_eq!(eval("=ROUND(1234.5678,-2)"), ValueEval::Number(1200.0));
        assert_eq!(eval("=ROUND(2.45,1.9)"), ValueEval::Number(2.5));
        assert_eq!(round_half_away(-0.4, 0), 0.0);
    }

    #[test]
    fn test_round_decimal_halves() {
        assert_eq!(eval("=ROUND(1.005,2)"), ValueEval::Number(1.01));
        assert_eq!(eval("=ROUND(-1.005,2)"), ValueEval::Number(-1.01));
        assert_eq!(eval("=ROUND(2.675,2)"), ValueEval::Number(2.68));
        assert_eq!(eval("=ROUND(1.0049,2)"), ValueEval::Number(1.0));
        assert_eq!(round_half_away(0.285, 2), 0.29);
    }

    #[test]
    fn test_mod() {
        assert_eq!(eval("=MOD(10,3)"), ValueEval::Number(1.0));
        assert_eq!(eval("=MOD(-10,3)"), ValueEval::Number(2.0));
        assert_eq!(eval("=MOD(10,-3)"), ValueEval::Number(-2.0));
        assert_eq!(eval("=MOD(1,0)"), ValueEval::Error(ErrorCode::Div0));
    }

    #[test]
    fn test_power() {
        assert_eq!(eval("=POWER(2,10)"), ValueEval::Number(1024.0));
        assert_eq!(eval("=POWER(0,0)"), ValueEval::Error(ErrorCode::Num));
        assert_eq!(eval("=POWER(0,-1)"), ValueEval::Error(ErrorCode::Div0));
    }

    #[test]
    fn test_lifted_over_areas() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", -1.0).unwrap();
        ws.set_cell_value("A2", 4.0).unwrap();
        ws.set_cell_value("A3", "x").unwrap();

        let ctx = EvaluationContext::new(&wb, 0, 0, 5).with_array_mode(true);
        let result = evaluate_formula("=SQRT(A1:A3)", &ctx).unwrap();
        let ValueEval::Cached(cells) = &result else {
            panic!("expected array, got {result:?}");
        };
        assert_eq!(
            cells.values(),
            &[
                ValueEval::Error(ErrorCode::Num),
                ValueEval::Number(2.0),
                ValueEval::Error(ErrorCode::Value),
            ]
        );

        // Outside array mode the scalar path intersects with the formula row
        let ctx = EvaluationContext::new(&wb, 0, 1, 5);
        assert_eq!(
            evaluate_formula("=ABS(A1:A3)", &ctx).unwrap(),
            ValueEval::Number(4.0)
        );
    }
}
