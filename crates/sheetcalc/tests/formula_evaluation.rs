//! Tests for formula evaluation against a workbook

use pretty_assertions::assert_eq;
use sheetcalc::prelude::*;
use sheetcalc::{CollectionPolicy, Policy, MAX_NESTING_DEPTH};

fn ones_and_row() -> Workbook {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    for addr in ["A1", "A2", "B1", "B2"] {
        sheet.set_cell_value(addr, 1.0).unwrap();
    }
    sheet.set_cell_value("D1", 1.0).unwrap();
    sheet.set_cell_value("E1", 2.0).unwrap();
    sheet.set_cell_value("F1", 1.0).unwrap();
    wb
}

fn array_values(value: &ValueEval<'_>) -> Vec<Vec<ValueEval<'static>>> {
    match value {
        ValueEval::Cached(cells) => cells.rows().map(<[_]>::to_vec).collect(),
        other => panic!("expected an array, got {other:?}"),
    }
}

/// Test basic formula evaluation without cell references
#[test]
fn test_evaluate_simple_formulas() {
    let ctx = EvaluationContext::simple();

    assert_eq!(evaluate_formula("=1+2*3", &ctx).unwrap(), ValueEval::Number(7.0));
    assert_eq!(
        evaluate_formula("=\"Hello \"&\"World\"", &ctx).unwrap(),
        ValueEval::text("Hello World")
    );
    assert_eq!(evaluate_formula("=5>3", &ctx).unwrap(), ValueEval::Boolean(true));
    assert_eq!(evaluate_formula("=SUM(1,2,3,4,5)", &ctx).unwrap(), ValueEval::Number(15.0));
    assert_eq!(
        evaluate_formula("=IF(1<0,\"Yes\",\"No\")", &ctx).unwrap(),
        ValueEval::text("No")
    );
    assert!(evaluate_formula("=1+", &ctx).is_err());
}

#[test]
fn test_areas_counts_reference_members() {
    let wb = Workbook::new();
    assert_eq!(
        wb.evaluate_formula_at(0, "H1", "=AREAS(A1:B2)").unwrap(),
        ValueEval::Number(1.0)
    );
    assert_eq!(
        wb.evaluate_formula_at(0, "H1", "=AREAS((A1:B2,C3,D4:E5))").unwrap(),
        ValueEval::Number(3.0)
    );
}

#[test]
fn test_geomean() {
    let wb = Workbook::new();
    let ValueEval::Number(n) = wb.evaluate_formula_at(0, "A1", "=GEOMEAN(2,3)").unwrap() else {
        panic!("GEOMEAN(2,3) is not a number");
    };
    assert!((n - 2.449489742783178).abs() <= 1e-15, "{n}");

    assert_eq!(
        wb.evaluate_formula_at(0, "A1", "=GEOMEAN(1,0)").unwrap(),
        ValueEval::Error(ErrorCode::Num)
    );
}

#[test]
fn test_area_compared_with_scalar_in_array_mode() {
    let wb = ones_and_row();
    let ctx = EvaluationContext::new(&wb, 0, 9, 9).with_array_mode(true);
    let result = evaluate_formula("=A1:B2=1", &ctx).unwrap();
    assert_eq!(
        array_values(&result),
        vec![
            vec![ValueEval::Boolean(true), ValueEval::Boolean(true)],
            vec![ValueEval::Boolean(true), ValueEval::Boolean(true)],
        ]
    );
}

#[test]
fn test_block_against_wider_row_in_array_mode() {
    let wb = ones_and_row();
    let ctx = EvaluationContext::new(&wb, 0, 9, 9).with_array_mode(true);
    let result = evaluate_formula("=A1:B2=D1:F1", &ctx).unwrap();
    assert_eq!(
        array_values(&result),
        vec![
            vec![
                ValueEval::Boolean(true),
                ValueEval::Boolean(false),
                ValueEval::Error(ErrorCode::Value),
            ],
            vec![
                ValueEval::Boolean(true),
                ValueEval::Boolean(false),
                ValueEval::Error(ErrorCode::Value),
            ],
        ]
    );
}

#[test]
fn test_product_skips_missing_argument() {
    let wb = Workbook::new();
    assert_eq!(
        wb.evaluate_formula_at(0, "A1", "=PRODUCT(2,)").unwrap(),
        ValueEval::Number(2.0)
    );
    // SUM coerces the same empty slot to 0
    assert_eq!(
        wb.evaluate_formula_at(0, "A1", "=SUM(2,)").unwrap(),
        ValueEval::Number(2.0)
    );
}

#[test]
fn test_array_formula_group_cells() {
    let mut wb = ones_and_row();
    wb.worksheet_mut(0)
        .unwrap()
        .set_array_formula("H1:J3", "=A1:B2=D1:F1")
        .unwrap();

    assert_eq!(wb.evaluate_cell(0, "H1").unwrap(), ValueEval::Boolean(true));
    assert_eq!(wb.evaluate_cell(0, "I2").unwrap(), ValueEval::Boolean(false));
    assert_eq!(wb.evaluate_cell(0, "J1").unwrap(), ValueEval::Error(ErrorCode::Value));
    // Rows past the result are #N/A
    assert_eq!(wb.evaluate_cell(0, "H3").unwrap(), ValueEval::Error(ErrorCode::Na));
}

#[test]
fn test_implicit_intersection_at_formula_cell() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    for row in 0..5 {
        sheet.set_cell_value_at(row, 0, f64::from(row + 1)).unwrap();
    }
    sheet.set_cell_formula("C3", "=A1:A5*10").unwrap();
    sheet.set_cell_formula("C9", "=A1:A5*10").unwrap();

    assert_eq!(wb.evaluate_cell(0, "C3").unwrap(), ValueEval::Number(30.0));
    assert_eq!(wb.evaluate_cell(0, "C9").unwrap(), ValueEval::Error(ErrorCode::Value));
}

#[test]
fn test_three_d_references() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0).unwrap().set_cell_value("A1", 1.0).unwrap();
    let second = wb.add_worksheet_with_name("Data").unwrap();
    wb.worksheet_mut(second).unwrap().set_cell_value("A1", 2.0).unwrap();
    let third = wb.add_worksheet_with_name("Extra").unwrap();
    wb.worksheet_mut(third).unwrap().set_cell_value("A1", "text").unwrap();

    assert_eq!(
        wb.evaluate_formula_at(0, "B1", "=SUM(Sheet1:Extra!A1)").unwrap(),
        ValueEval::Number(3.0)
    );
    assert_eq!(
        wb.evaluate_formula_at(0, "B1", "=COUNTA(Sheet1:Extra!A1:A2)").unwrap(),
        ValueEval::Number(3.0)
    );
    assert_eq!(
        wb.evaluate_formula_at(0, "B1", "=Missing!A1").unwrap(),
        ValueEval::Error(ErrorCode::Ref)
    );
}

#[test]
fn test_defined_names() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("B1", 0.25).unwrap();
    sheet.set_cell_value("C1", 100.0).unwrap();
    sheet.set_cell_value("C2", 200.0).unwrap();
    wb.define_name("Rate", "Sheet1!$B$1").unwrap();
    wb.define_name("Amounts", "Sheet1!$C$1:$C$2").unwrap();

    assert_eq!(
        wb.evaluate_formula_at(0, "A1", "=SUM(Amounts)*Rate").unwrap(),
        ValueEval::Number(75.0)
    );
    assert_eq!(
        wb.evaluate_formula_at(0, "A1", "=Unknown+1").unwrap(),
        ValueEval::Error(ErrorCode::Name)
    );
}

#[test]
fn test_workbook_locale_applies_to_text() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0).unwrap().set_cell_value("A1", "2,5").unwrap();

    // Under the default separators "2,5" is not a number
    assert_eq!(
        wb.evaluate_formula_at(0, "B1", "=A1*2").unwrap(),
        ValueEval::Error(ErrorCode::Value)
    );

    wb.settings_mut().decimal_separator = ',';
    wb.settings_mut().group_separator = '.';
    assert_eq!(
        wb.evaluate_formula_at(0, "B1", "=A1*2").unwrap(),
        ValueEval::Number(5.0)
    );
    // Text in cells is still skipped by aggregates
    assert_eq!(
        wb.evaluate_formula_at(0, "B1", "=SUM(A1)").unwrap(),
        ValueEval::Number(0.0)
    );
}

#[test]
fn test_subtotal_ignores_nested_subtotals() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_value("A2", 20.0).unwrap();
    sheet.set_cell_formula("A3", "=SUBTOTAL(9,A1:A2)").unwrap();
    sheet.set_cell_formula("A4", "=SUBTOTAL(9,A1:A3)").unwrap();
    sheet.set_cell_formula("A5", "=SUM(A1:A3)").unwrap();

    let stats = wb.calculate().unwrap();
    assert!(stats.converged);
    assert_eq!(stats.formula_count, 3);

    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value_at(2, 0).effective_value(), &CellValue::Number(30.0));
    assert_eq!(sheet.get_value_at(3, 0).effective_value(), &CellValue::Number(30.0));
    assert_eq!(sheet.get_value_at(4, 0).effective_value(), &CellValue::Number(60.0));
}

#[test]
fn test_error_propagation_order() {
    let wb = Workbook::new();
    assert_eq!(
        wb.evaluate_formula_at(0, "A1", "=(1/0)+NA()").unwrap(),
        ValueEval::Error(ErrorCode::Div0)
    );
    assert_eq!(
        wb.evaluate_formula_at(0, "A1", "=SUM(NA(),1/0)").unwrap(),
        ValueEval::Error(ErrorCode::Na)
    );
    assert_eq!(
        wb.evaluate_formula_at(0, "A1", "=IFERROR(SQRT(-4),\"neg\")").unwrap(),
        ValueEval::text("neg")
    );
}

#[test]
fn test_collection_policy_from_facade() {
    let wb = ones_and_row();
    let range = CellRange::parse("A1:F1").unwrap();
    let area = ValueEval::Area(sheetcalc::AreaEval::new(&wb, 0, range));
    let values = sheetcalc::collect_values(
        &[area, ValueEval::Boolean(true), ValueEval::MissingArgument],
        &CollectionPolicy::DEFAULT.with_missing(Policy::Skip),
        &ValueLocale::default(),
    )
    .unwrap();
    assert_eq!(values, vec![1.0, 1.0, 1.0, 2.0, 1.0, 1.0]);
}

#[test]
fn test_subtotal_text_in_string_is_not_a_subtotal() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 5.0).unwrap();
    sheet.set_cell_formula("A2", "=\"SUBTOTAL(\"&\"x\"").unwrap();
    sheet.set_cell_formula("A3", "=SUBTOTAL(3,A1:A2)").unwrap();

    assert!(!wb.is_subtotal(0, 1, 0));
    assert!(wb.is_subtotal(0, 2, 0));
    let stats = wb.calculate().unwrap();
    assert!(stats.converged);
    let a3 = wb.worksheet(0).unwrap().get_value_at(2, 0);
    assert_eq!(a3.effective_value(), &CellValue::Number(2.0));
}

#[test]
fn test_deeply_nested_formula_is_rejected() {
    let wb = Workbook::new();
    let nested = |depth: usize| format!("={}1{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(
        wb.evaluate_formula_at(0, "A1", &nested(MAX_NESTING_DEPTH)).unwrap(),
        ValueEval::Number(1.0)
    );
    for depth in [MAX_NESTING_DEPTH + 1, 200, 3000] {
        assert!(matches!(
            wb.evaluate_formula_at(0, "A1", &nested(depth)),
            Err(Error::Formula(_))
        ));
    }
}

#[test]
fn test_self_referencing_name_is_name_error() {
    let mut wb = Workbook::new();
    wb.define_name("Loop", "Loop+Loop").unwrap();
    wb.worksheet_mut(0).unwrap().set_cell_formula("A1", "=Loop").unwrap();

    assert_eq!(
        wb.evaluate_formula_at(0, "B1", "=Loop").unwrap(),
        ValueEval::Error(ErrorCode::Name)
    );
    let stats = wb.calculate().unwrap();
    assert_eq!(stats.errors, 1);
}
