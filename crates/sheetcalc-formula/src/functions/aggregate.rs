//! Aggregate functions
//!
//! These take raw operands and flatten them with the collection engine.
//! The numeric kernels work on plain slices and decide what an empty
//! input means.

use sheetcalc_core::ErrorCode;

use crate::collect::{collect_values, CollectionPolicy, Policy};
use crate::evaluator::EvaluationContext;
use crate::resolver::{coerce_to_double, resolve_single_value};
use crate::value::{AreaLike, ValueEval};

/// PRODUCT leaves empty argument slots out instead of multiplying by 0
const PRODUCT_POLICY: CollectionPolicy = CollectionPolicy::DEFAULT.with_missing(Policy::Skip);

/// MINA and MAXA also count booleans read from cells
const LOGICAL_VALUES_POLICY: CollectionPolicy =
    CollectionPolicy::DEFAULT.with_bool_by_ref(Policy::Coerce);

const SUBTOTAL_POLICY: CollectionPolicy = CollectionPolicy::DEFAULT.ignoring_subtotals();

type Kernel = fn(&[f64]) -> Result<f64, ErrorCode>;

fn aggregate<'a>(
    args: &[ValueEval<'a>],
    ctx: &EvaluationContext<'a>,
    policy: &CollectionPolicy,
    kernel: Kernel,
) -> ValueEval<'a> {
    collect_values(args, policy, &ctx.locale)
        .and_then(|values| kernel(&values))
        .into()
}

// ==================== Kernels ====================

pub fn sum(values: &[f64]) -> Result<f64, ErrorCode> {
    Ok(values.iter().sum())
}

/// Empty input is 0
pub fn product(values: &[f64]) -> Result<f64, ErrorCode> {
    if values.is_empty() {
        return Ok(0.0);
    }
    Ok(values.iter().product())
}

pub fn average(values: &[f64]) -> Result<f64, ErrorCode> {
    if values.is_empty() {
        return Err(ErrorCode::Div0);
    }
    Ok(sum(values)? / values.len() as f64)
}

/// exp of the mean logarithm; every value must be positive
pub fn geomean(values: &[f64]) -> Result<f64, ErrorCode> {
    if values.is_empty() || values.iter().any(|&v| v <= 0.0) {
        return Err(ErrorCode::Num);
    }
    let mean_ln = values.iter().map(|v| v.ln()).sum::<f64>() / values.len() as f64;
    Ok(mean_ln.exp())
}

/// Empty input is 0
pub fn min(values: &[f64]) -> Result<f64, ErrorCode> {
    Ok(values.iter().copied().reduce(f64::min).unwrap_or(0.0))
}

/// Empty input is 0
pub fn max(values: &[f64]) -> Result<f64, ErrorCode> {
    Ok(values.iter().copied().reduce(f64::max).unwrap_or(0.0))
}

pub fn sumsq(values: &[f64]) -> Result<f64, ErrorCode> {
    Ok(values.iter().map(|v| v * v).sum())
}

/// Sum of squared deviations from the mean
pub fn devsq(values: &[f64]) -> Result<f64, ErrorCode> {
    let mean = average(values).map_err(|_| ErrorCode::Num)?;
    Ok(values.iter().map(|v| (v - mean).powi(2)).sum())
}

/// Mean absolute deviation from the mean
pub fn avedev(values: &[f64]) -> Result<f64, ErrorCode> {
    let mean = average(values).map_err(|_| ErrorCode::Num)?;
    Ok(values.iter().map(|v| (v - mean).abs()).sum::<f64>() / values.len() as f64)
}

/// Sample variance; needs two values
pub fn var(values: &[f64]) -> Result<f64, ErrorCode> {
    if values.len() < 2 {
        return Err(ErrorCode::Div0);
    }
    Ok(devsq(values)? / (values.len() - 1) as f64)
}

/// Population variance
pub fn varp(values: &[f64]) -> Result<f64, ErrorCode> {
    if values.is_empty() {
        return Err(ErrorCode::Div0);
    }
    Ok(devsq(values)? / values.len() as f64)
}

pub fn stdev(values: &[f64]) -> Result<f64, ErrorCode> {
    var(values).map(f64::sqrt)
}

pub fn stdevp(values: &[f64]) -> Result<f64, ErrorCode> {
    varp(values).map(f64::sqrt)
}

pub fn median(values: &[f64]) -> Result<f64, ErrorCode> {
    if values.is_empty() {
        return Err(ErrorCode::Num);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Ok(sorted[mid])
    }
}

// ==================== Functions ====================

/// SUM(number1, ...)
pub fn fn_sum<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, sum)
}

/// PRODUCT(number1, ...)
pub fn fn_product<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &PRODUCT_POLICY, product)
}

/// AVERAGE(number1, ...)
pub fn fn_average<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, average)
}

/// GEOMEAN(number1, ...)
pub fn fn_geomean<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, geomean)
}

/// MIN(number1, ...)
pub fn fn_min<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, min)
}

/// MAX(number1, ...)
pub fn fn_max<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, max)
}

/// MINA(value1, ...)
pub fn fn_mina<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &LOGICAL_VALUES_POLICY, min)
}

/// MAXA(value1, ...)
pub fn fn_maxa<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &LOGICAL_VALUES_POLICY, max)
}

pub fn fn_sumsq<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, sumsq)
}

pub fn fn_devsq<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, devsq)
}

pub fn fn_avedev<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, avedev)
}

pub fn fn_var<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, var)
}

pub fn fn_varp<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, varp)
}

pub fn fn_stdev<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, stdev)
}

pub fn fn_stdevp<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, stdevp)
}

pub fn fn_median<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    aggregate(args, ctx, &CollectionPolicy::DEFAULT, median)
}

/// Call `f` with every value in the operands and whether it came from a cell
fn for_each_value<'a>(
    operands: &[ValueEval<'a>],
    ignore_subtotals: bool,
    f: &mut dyn FnMut(&ValueEval<'a>, bool),
) {
    for operand in operands {
        match operand {
            ValueEval::ThreeDArea(area) => {
                for sheet in area.first_sheet()..=area.last_sheet() {
                    let sheet_area = area.sheet_area(sheet);
                    visit_area(&sheet_area, ignore_subtotals, f);
                }
            }
            ValueEval::Reference(r) => {
                for sheet in r.first_sheet()..=r.last_sheet() {
                    f(&r.inner_value(sheet), true);
                }
            }
            ValueEval::RefList(members) => for_each_value(members, ignore_subtotals, f),
            other => match other.as_area() {
                Some(area) => visit_area(area, ignore_subtotals, f),
                None => f(other, false),
            },
        }
    }
}

fn visit_area<'a>(
    area: &dyn AreaLike<'a>,
    ignore_subtotals: bool,
    f: &mut dyn FnMut(&ValueEval<'a>, bool),
) {
    for r in 0..area.height() {
        for c in 0..area.width() {
            if ignore_subtotals && area.is_subtotal(r, c) {
                continue;
            }
            if let Ok(value) = area.get_value(r, c) {
                f(&value, true);
            }
        }
    }
}

fn count_numbers(args: &[ValueEval<'_>], ignore_subtotals: bool, ctx: &EvaluationContext<'_>) -> usize {
    let mut count = 0;
    for_each_value(args, ignore_subtotals, &mut |value, via_ref| {
        let counted = match value {
            ValueEval::Number(_) => true,
            ValueEval::Boolean(_) => !via_ref,
            ValueEval::Text(_) if !via_ref => coerce_to_double(value, &ctx.locale).is_ok(),
            _ => false,
        };
        if counted {
            count += 1;
        }
    });
    count
}

fn count_non_empty(args: &[ValueEval<'_>], ignore_subtotals: bool) -> usize {
    let mut count = 0;
    for_each_value(args, ignore_subtotals, &mut |value, via_ref| {
        let counted = match value {
            ValueEval::Blank => false,
            ValueEval::MissingArgument => !via_ref,
            _ => true,
        };
        if counted {
            count += 1;
        }
    });
    count
}

/// COUNT(value1, ...)
///
/// Counts numbers. Booleans and numeric text count only when typed as
/// arguments; errors are not counted and do not propagate.
pub fn fn_count<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    ValueEval::Number(count_numbers(args, false, ctx) as f64)
}

/// COUNTA(value1, ...)
pub fn fn_counta<'a>(args: &[ValueEval<'a>], _ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    ValueEval::Number(count_non_empty(args, false) as f64)
}

/// COUNTBLANK(range)
///
/// Empty cells and cells holding empty text.
pub fn fn_countblank<'a>(args: &[ValueEval<'a>], _ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    let Some(range) = args.first() else {
        return ValueEval::Error(ErrorCode::Value);
    };
    if range.is_scalar() || matches!(range, ValueEval::RefList(_)) {
        return range
            .error()
            .map_or(ValueEval::Error(ErrorCode::Value), ValueEval::Error);
    }
    let mut count = 0;
    for_each_value(std::slice::from_ref(range), false, &mut |value, _| {
        if matches!(value, ValueEval::Blank) || matches!(value, ValueEval::Text(s) if s.is_empty()) {
            count += 1;
        }
    });
    ValueEval::Number(count as f64)
}

/// SUBTOTAL(function_num, ref1, ...)
///
/// `function_num` 1-11 picks AVERAGE, COUNT, COUNTA, MAX, MIN, PRODUCT,
/// STDEV, STDEVP, SUM, VAR or VARP; 101-111 are accepted as the same.
/// Cells that are themselves SUBTOTAL formulas are left out.
pub fn fn_subtotal<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    let Some((selector, refs)) = args.split_first() else {
        return ValueEval::Error(ErrorCode::Value);
    };
    let code = match resolve_single_value(selector, ctx.row, ctx.col)
        .and_then(|v| coerce_to_double(&v, &ctx.locale))
    {
        Ok(n) => n.trunc() as i64,
        Err(e) => return ValueEval::Error(e),
    };
    let kernel: Kernel = match code % 100 {
        _ if !(1..=11).contains(&code) && !(101..=111).contains(&code) => {
            return ValueEval::Error(ErrorCode::Value)
        }
        1 => average,
        2 => return ValueEval::Number(count_numbers(refs, true, ctx) as f64),
        3 => return ValueEval::Number(count_non_empty(refs, true) as f64),
        4 => max,
        5 => min,
        6 => product,
        7 => stdev,
        8 => stdevp,
        9 => sum,
        10 => var,
        _ => varp,
    };
    aggregate(refs, ctx, &SUBTOTAL_POLICY, kernel)
}

/// SUMPRODUCT(array1, ...)
///
/// All arrays must have the same shape. Non-numeric cells count as 0;
/// an error anywhere is the result.
pub fn fn_sumproduct<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> ValueEval<'a> {
    match sumproduct(args, ctx) {
        Ok(n) => ValueEval::Number(n),
        Err(e) => ValueEval::Error(e),
    }
}

fn sumproduct<'a>(args: &[ValueEval<'a>], ctx: &EvaluationContext<'a>) -> Result<f64, ErrorCode> {
    let mut shape: Option<(usize, usize)> = None;
    let mut products: Vec<f64> = Vec::new();

    for arg in args {
        let (dims, values) = array_operand(arg, ctx)?;
        match shape {
            None => {
                shape = Some(dims);
                products = values;
            }
            Some(expected) if expected == dims => {
                for (p, v) in products.iter_mut().zip(values) {
                    *p *= v;
                }
            }
            Some(_) => return Err(ErrorCode::Value),
        }
    }
    Ok(products.iter().sum())
}

/// Shape and row-major numbers of one SUMPRODUCT argument
fn array_operand<'a>(
    arg: &ValueEval<'a>,
    ctx: &EvaluationContext<'a>,
) -> Result<((usize, usize), Vec<f64>), ErrorCode> {
    if let ValueEval::ThreeDArea(area) = arg {
        if area.sheet_count() > 1 {
            return Err(ErrorCode::Value);
        }
    }
    if let Some(area) = arg.as_area() {
        let mut values = Vec::with_capacity(area.height() * area.width());
        for r in 0..area.height() {
            for c in 0..area.width() {
                values.push(match area.get_value(r, c)? {
                    ValueEval::Number(n) => n,
                    ValueEval::Error(e) => return Err(e),
                    _ => 0.0,
                });
            }
        }
        return Ok(((area.height(), area.width()), values));
    }
    let value = match arg {
        ValueEval::Reference(r) => match r.value() {
            ValueEval::Number(n) => n,
            ValueEval::Error(e) => return Err(e),
            _ => 0.0,
        },
        ValueEval::RefList(_) => return Err(ErrorCode::Value),
        scalar => coerce_to_double(scalar, &ctx.locale)?,
    };
    Ok(((1, 1), vec![value]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate_formula;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::{CellValue, Workbook};

    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, v) in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter().enumerate() {
            ws.set_cell_value_at(row as u32, 0, *v).unwrap();
        }
        ws.set_cell_value("B1", true).unwrap();
        ws.set_cell_value("B2", "12").unwrap();
        ws.set_cell_value("B3", -3.0).unwrap();
        ws.set_cell_value("B4", "").unwrap();
        ws.set_cell_value("C1", ErrorCode::Div0).unwrap();
        ws.set_cell_value("D1", 1.0).unwrap();
        ws.set_cell_value("D2", 2.0).unwrap();
        ws.set_cell_value("E1", 3.0).unwrap();
        ws.set_cell_value("E2", 4.0).unwrap();
        ws.set_cell_formula_with_result("D3", "=SUBTOTAL(9,D1:D2)", CellValue::Number(3.0))
            .unwrap();
        wb
    }

    fn eval<'a>(wb: &'a Workbook, formula: &str) -> ValueEval<'a> {
        evaluate_formula(formula, &EvaluationContext::new(wb, 0, 20, 20)).unwrap()
    }

    fn num(v: ValueEval<'_>) -> f64 {
        match v {
            ValueEval::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_sum_and_product() {
        let wb = sample();
        assert_eq!(eval(&wb, "=SUM(A1:A8)"), ValueEval::Number(40.0));
        assert_eq!(eval(&wb, "=SUM(A1:B3,TRUE,\"2\")"), ValueEval::Number(10.0));
        assert_eq!(eval(&wb, "=SUM(A1:C1)"), ValueEval::Error(ErrorCode::Div0));
        assert_eq!(eval(&wb, "=SUM(\"x\")"), ValueEval::Error(ErrorCode::Value));
        assert_eq!(eval(&wb, "=PRODUCT(2,)"), ValueEval::Number(2.0));
        assert_eq!(eval(&wb, "=PRODUCT(F1:F5)"), ValueEval::Number(0.0));
        assert_eq!(eval(&wb, "=PRODUCT(D1:E2)"), ValueEval::Number(24.0));
    }

    #[test]
    fn test_average_family() {
        let wb = sample();
        assert_eq!(eval(&wb, "=AVERAGE(A1:A8)"), ValueEval::Number(5.0));
        assert_eq!(eval(&wb, "=AVERAGE(F1:F5)"), ValueEval::Error(ErrorCode::Div0));
        assert!((num(eval(&wb, "=GEOMEAN(2,3)")) - 2.449489742783178).abs() < 1e-15);
        assert_eq!(eval(&wb, "=GEOMEAN(1,0)"), ValueEval::Error(ErrorCode::Num));
        assert_eq!(eval(&wb, "=GEOMEAN(F1)"), ValueEval::Error(ErrorCode::Num));
        assert_eq!(eval(&wb, "=MEDIAN(A1:A8)"), ValueEval::Number(4.5));
        assert_eq!(eval(&wb, "=MEDIAN(3,1,2)"), ValueEval::Number(2.0));
    }

    #[test]
    fn test_min_max() {
        let wb = sample();
        assert_eq!(eval(&wb, "=MIN(A1:B8)"), ValueEval::Number(-3.0));
        assert_eq!(eval(&wb, "=MAX(A1:B8)"), ValueEval::Number(9.0));
        assert_eq!(eval(&wb, "=MAX(F1:F3)"), ValueEval::Number(0.0));
        // TRUE in B1 counts as 1 for MAXA/MINA
        assert_eq!(eval(&wb, "=MAXA(B1:B3)"), ValueEval::Number(1.0));
        assert_eq!(eval(&wb, "=MAX(B1:B3)"), ValueEval::Number(-3.0));
        assert_eq!(eval(&wb, "=MINA(B1,D2)"), ValueEval::Number(1.0));
    }

    #[test]
    fn test_dispersion() {
        let wb = sample();
        assert_eq!(eval(&wb, "=DEVSQ(A1:A8)"), ValueEval::Number(32.0));
        assert_eq!(eval(&wb, "=VARP(A1:A8)"), ValueEval::Number(4.0));
        assert_eq!(eval(&wb, "=STDEVP(A1:A8)"), ValueEval::Number(2.0));
        assert!((num(eval(&wb, "=VAR(A1:A8)")) - 32.0 / 7.0).abs() < 1e-12);
        assert!((num(eval(&wb, "=STDEV(A1:A8)")) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(eval(&wb, "=AVEDEV(A1:A8)"), ValueEval::Number(1.5));
        assert_eq!(eval(&wb, "=SUMSQ(3,4)"), ValueEval::Number(25.0));
        assert_eq!(eval(&wb, "=VAR(1)"), ValueEval::Error(ErrorCode::Div0));
        assert_eq!(eval(&wb, "=DEVSQ(F1)"), ValueEval::Error(ErrorCode::Num));
    }

    #[test]
    fn test_counting() {
        let wb = sample();
        assert_eq!(eval(&wb, "=COUNT(A1:B8)"), ValueEval::Number(9.0));
        assert_eq!(eval(&wb, "=COUNT(1,\"2\",\"x\",TRUE,#N/A)"), ValueEval::Number(3.0));
        assert_eq!(eval(&wb, "=COUNTA(B1:C4)"), ValueEval::Number(5.0));
        assert_eq!(eval(&wb, "=COUNTA(1,)"), ValueEval::Number(2.0));
        assert_eq!(eval(&wb, "=COUNTBLANK(B1:B6)"), ValueEval::Number(3.0));
        assert_eq!(eval(&wb, "=COUNTBLANK(5)"), ValueEval::Error(ErrorCode::Value));
    }

    #[test]
    fn test_subtotal_skips_subtotal_cells() {
        let wb = sample();
        assert_eq!(eval(&wb, "=SUM(D1:D3)"), ValueEval::Number(6.0));
        assert_eq!(eval(&wb, "=SUBTOTAL(9,D1:D3)"), ValueEval::Number(3.0));
        assert_eq!(eval(&wb, "=SUBTOTAL(109,D1:D3)"), ValueEval::Number(3.0));
        assert_eq!(eval(&wb, "=SUBTOTAL(2,D1:D3)"), ValueEval::Number(2.0));
        assert_eq!(eval(&wb, "=SUBTOTAL(1,D1:E2)"), ValueEval::Number(2.5));
        assert_eq!(eval(&wb, "=SUBTOTAL(12,D1:D3)"), ValueEval::Error(ErrorCode::Value));
    }

    #[test]
    fn test_sumproduct() {
        let wb = sample();
        assert_eq!(eval(&wb, "=SUMPRODUCT(D1:D2,E1:E2)"), ValueEval::Number(11.0));
        assert_eq!(eval(&wb, "=SUMPRODUCT(D1:E2)"), ValueEval::Number(10.0));
        assert_eq!(
            eval(&wb, "=SUMPRODUCT(D1:D2,E1:E3)"),
            ValueEval::Error(ErrorCode::Value)
        );
        assert_eq!(eval(&wb, "=SUMPRODUCT((A1:A8>4)*1)"), ValueEval::Number(4.0));
        assert_eq!(eval(&wb, "=SUMPRODUCT(B1:B4,B1:B4)"), ValueEval::Number(9.0));
        assert_eq!(eval(&wb, "=SUMPRODUCT(C1)"), ValueEval::Error(ErrorCode::Div0));
    }

    #[test]
    fn test_operand_ceiling() {
        let args = vec![ValueEval::Number(1.0); 256];
        let ctx = EvaluationContext::simple();
        assert_eq!(fn_sum(&args, &ctx), ValueEval::Error(ErrorCode::Value));
        assert_eq!(fn_sum(&args[..255], &ctx), ValueEval::Number(255.0));
    }

    #[test]
    fn test_kernels_on_empty_input() {
        assert_eq!(sum(&[]), Ok(0.0));
        assert_eq!(product(&[]), Ok(0.0));
        assert_eq!(average(&[]), Err(ErrorCode::Div0));
        assert_eq!(geomean(&[]), Err(ErrorCode::Num));
        assert_eq!(median(&[]), Err(ErrorCode::Num));
        assert_eq!(varp(&[]), Err(ErrorCode::Div0));
    }
}
