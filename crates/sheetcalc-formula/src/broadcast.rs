//! Element-wise application of scalar operations over arrays
//!
//! Operands of different shapes are combined cell by cell. The result shape
//! is the maximum height and width over all operands. Each operand is
//! resolved at `(its first row + i, its first column + j)` with implicit
//! intersection, so row and column vectors replicate across the other axis
//! and a 2-D block yields `#VALUE!` outside its bounds. A 1x1 result is
//! returned as a bare scalar; anything larger is a cached area anchored at
//! the formula cell.

use std::sync::Arc;

use sheetcalc_core::ErrorCode;

use crate::resolver::{coerce_to_boolean, resolve_single_value};
use crate::value::{CachedArea, ValueEval};

/// Height and width of an operand or result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    pub const SCALAR: Shape = Shape { rows: 1, cols: 1 };

    pub fn is_scalar(self) -> bool {
        self == Shape::SCALAR
    }

    /// Broadcast shape of two shapes
    pub fn max(self, other: Shape) -> Shape {
        Shape {
            rows: self.rows.max(other.rows),
            cols: self.cols.max(other.cols),
        }
    }
}

/// Top-left coordinates and shape an operand is read from
#[derive(Debug, Clone, Copy)]
struct Anchor {
    row: u32,
    col: u16,
    shape: Shape,
}

fn anchor(operand: &ValueEval<'_>) -> Anchor {
    if let Some(area) = operand.as_area() {
        return Anchor {
            row: area.first_row(),
            col: area.first_col(),
            shape: Shape {
                rows: area.height(),
                cols: area.width(),
            },
        };
    }
    match operand {
        ValueEval::Reference(r) => Anchor {
            row: r.row(),
            col: r.col(),
            shape: Shape::SCALAR,
        },
        _ => Anchor {
            row: 0,
            col: 0,
            shape: Shape::SCALAR,
        },
    }
}

/// Shape the operands broadcast to
pub fn broadcast_shape(operands: &[&ValueEval<'_>]) -> Shape {
    operands
        .iter()
        .map(|op| anchor(op).shape)
        .fold(Shape::SCALAR, Shape::max)
}

/// Resolve every operand per result cell and combine with `cell`
///
/// `cell` sees the raw resolution results, so functions that inspect
/// errors rather than propagate them (ISERROR, IFERROR) can use it directly.
pub fn broadcast<'a, F>(
    operands: &[&ValueEval<'a>],
    src_row: u32,
    src_col: u16,
    mut cell: F,
) -> ValueEval<'a>
where
    F: FnMut(&[Result<ValueEval<'a>, ErrorCode>]) -> ValueEval<'a>,
{
    let anchors: Vec<Anchor> = operands.iter().map(|op| anchor(op)).collect();
    let shape = anchors
        .iter()
        .map(|a| a.shape)
        .fold(Shape::SCALAR, Shape::max);

    let mut resolved = Vec::with_capacity(operands.len());
    let mut at = |i: usize, j: usize| {
        resolved.clear();
        for (operand, a) in operands.iter().zip(&anchors) {
            let row = a.row.saturating_add(i as u32);
            let col = a.col.saturating_add(j as u16);
            resolved.push(resolve_single_value(operand, row, col));
        }
        cell(&resolved)
    };

    if shape.is_scalar() {
        return at(0, 0);
    }
    ValueEval::Cached(Arc::new(CachedArea::from_fn(
        src_row, src_col, shape.rows, shape.cols, at,
    )))
}

/// Apply a unary scalar operation element-wise
pub fn evaluate_one_array_arg<'a, F>(
    arg: &ValueEval<'a>,
    src_row: u32,
    src_col: u16,
    op: F,
) -> ValueEval<'a>
where
    F: Fn(&ValueEval<'a>) -> ValueEval<'a>,
{
    broadcast(&[arg], src_row, src_col, |cell| match &cell[0] {
        Ok(v) => op(v),
        Err(e) => ValueEval::Error(*e),
    })
}

/// Apply a binary scalar operation element-wise
///
/// An error in the left operand wins over one in the right.
pub fn evaluate_two_array_args<'a, F>(
    a: &ValueEval<'a>,
    b: &ValueEval<'a>,
    src_row: u32,
    src_col: u16,
    op: F,
) -> ValueEval<'a>
where
    F: Fn(&ValueEval<'a>, &ValueEval<'a>) -> ValueEval<'a>,
{
    broadcast(&[a, b], src_row, src_col, |cell| match (&cell[0], &cell[1]) {
        (Err(e), _) | (Ok(_), Err(e)) => ValueEval::Error(*e),
        (Ok(x), Ok(y)) => op(x, y),
    })
}

/// Element-wise selection for IF
///
/// All three operands are resolved for every cell before the condition is
/// looked at, so an error in the branch not taken still wins. The first
/// error among condition, then and else is the cell's result. A selected
/// missing argument reads as zero.
pub fn evaluate_ternary_array_args<'a>(
    condition: &ValueEval<'a>,
    then_value: &ValueEval<'a>,
    else_value: &ValueEval<'a>,
    src_row: u32,
    src_col: u16,
) -> ValueEval<'a> {
    broadcast(
        &[condition, then_value, else_value],
        src_row,
        src_col,
        |cell| {
            if let Some(e) = first_error(cell) {
                return ValueEval::Error(e);
            }
            let [Ok(cond), Ok(then_v), Ok(else_v)] = cell else {
                return ValueEval::Error(ErrorCode::Value);
            };
            let selected = match coerce_to_boolean(cond, true) {
                Ok(Some(true)) => then_v,
                Ok(Some(false)) => else_v,
                Ok(None) => return ValueEval::Error(ErrorCode::Value),
                Err(e) => return ValueEval::Error(e),
            };
            match selected {
                ValueEval::MissingArgument => ValueEval::Number(0.0),
                other => other.clone(),
            }
        },
    )
}

/// Apply an N-ary scalar operation element-wise
///
/// Used to lift scalar functions that have no array path of their own.
/// The first error in argument order is the cell's result.
pub fn evaluate_n_array_args<'a, F>(
    args: &[ValueEval<'a>],
    src_row: u32,
    src_col: u16,
    op: F,
) -> ValueEval<'a>
where
    F: Fn(&[ValueEval<'a>]) -> ValueEval<'a>,
{
    let operands: Vec<&ValueEval<'a>> = args.iter().collect();
    let mut scalars = Vec::with_capacity(args.len());
    broadcast(&operands, src_row, src_col, |cell| {
        if let Some(e) = first_error(cell) {
            return ValueEval::Error(e);
        }
        scalars.clear();
        scalars.extend(cell.iter().filter_map(|v| v.as_ref().ok().cloned()));
        op(&scalars)
    })
}

fn first_error(cell: &[Result<ValueEval<'_>, ErrorCode>]) -> Option<ErrorCode> {
    cell.iter().find_map(|v| v.as_ref().err().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{AreaEval, AreaLike, RefEval};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use sheetcalc_core::{CellRange, Workbook};

    fn add<'a>(a: &ValueEval<'a>, b: &ValueEval<'a>) -> ValueEval<'a> {
        match (a, b) {
            (ValueEval::Number(x), ValueEval::Number(y)) => ValueEval::Number(x + y),
            _ => ValueEval::Error(ErrorCode::Value),
        }
    }

    fn grid() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (a1, n) in [("A1", 1.0), ("B1", 2.0), ("A2", 3.0), ("B2", 4.0)] {
            ws.set_cell_value(a1, n).unwrap();
        }
        for (a1, n) in [("D1", 10.0), ("E1", 20.0), ("F1", 30.0)] {
            ws.set_cell_value(a1, n).unwrap();
        }
        ws.set_cell_value("H1", ErrorCode::Div0).unwrap();
        wb
    }

    fn area<'a>(wb: &'a Workbook, range: &str) -> ValueEval<'a> {
        ValueEval::Area(AreaEval::new(wb, 0, CellRange::parse(range).unwrap()))
    }

    fn cached_rows(v: &ValueEval<'_>) -> Vec<Vec<ValueEval<'static>>> {
        match v {
            ValueEval::Cached(c) => c.rows().map(<[_]>::to_vec).collect(),
            other => panic!("expected cached area, got {other:?}"),
        }
    }

    #[test]
    fn test_scalars_stay_scalar() {
        let r = evaluate_two_array_args(&ValueEval::Number(1.0), &ValueEval::Number(2.0), 0, 0, add);
        assert_eq!(r, ValueEval::Number(3.0));
    }

    #[test]
    fn test_area_plus_scalar() {
        let wb = grid();
        let r = evaluate_two_array_args(&area(&wb, "A1:B2"), &ValueEval::Number(1.0), 5, 5, add);
        assert_eq!(
            cached_rows(&r),
            vec![
                vec![ValueEval::Number(2.0), ValueEval::Number(3.0)],
                vec![ValueEval::Number(4.0), ValueEval::Number(5.0)],
            ]
        );
        let ValueEval::Cached(c) = &r else { unreachable!() };
        assert_eq!((c.first_row(), c.first_col()), (5, 5));
    }

    #[test]
    fn test_block_against_row_vector() {
        let wb = grid();
        let r = evaluate_two_array_args(&area(&wb, "A1:B2"), &area(&wb, "D1:F1"), 0, 0, add);
        let value = ValueEval::Error(ErrorCode::Value);
        assert_eq!(
            cached_rows(&r),
            vec![
                vec![ValueEval::Number(11.0), ValueEval::Number(22.0), value.clone()],
                vec![ValueEval::Number(13.0), ValueEval::Number(24.0), value],
            ]
        );
    }

    #[test]
    fn test_left_error_wins() {
        let wb = grid();
        let div0 = ValueEval::Reference(RefEval::new(&wb, 0, 0, 7));
        let na = ValueEval::Error(ErrorCode::Na);
        assert_eq!(
            evaluate_two_array_args(&div0, &na, 0, 0, add),
            ValueEval::Error(ErrorCode::Div0)
        );
        assert_eq!(
            evaluate_two_array_args(&na, &div0, 0, 0, add),
            ValueEval::Error(ErrorCode::Na)
        );
    }

    #[test]
    fn test_one_arg() {
        let wb = grid();
        let r = evaluate_one_array_arg(&area(&wb, "A1:A2"), 0, 0, |v| match v {
            ValueEval::Number(n) => ValueEval::Number(-n),
            _ => ValueEval::Error(ErrorCode::Value),
        });
        assert_eq!(
            cached_rows(&r),
            vec![vec![ValueEval::Number(-1.0)], vec![ValueEval::Number(-3.0)]]
        );
    }

    #[test]
    fn test_ternary_selects_per_cell() {
        let cond = ValueEval::Cached(Arc::new(CachedArea::from_rows(
            0,
            0,
            vec![vec![ValueEval::Boolean(true), ValueEval::Number(0.0)]],
        )));
        let r = evaluate_ternary_array_args(
            &cond,
            &ValueEval::text("yes"),
            &ValueEval::MissingArgument,
            0,
            0,
        );
        assert_eq!(
            cached_rows(&r),
            vec![vec![ValueEval::text("yes"), ValueEval::Number(0.0)]]
        );

        let r = evaluate_ternary_array_args(
            &ValueEval::text("maybe"),
            &ValueEval::Number(1.0),
            &ValueEval::Number(2.0),
            0,
            0,
        );
        assert_eq!(r, ValueEval::Error(ErrorCode::Value));
    }

    #[test]
    fn test_ternary_resolves_both_branches() {
        // The untaken else branch holds an error and still decides the cell
        let r = evaluate_ternary_array_args(
            &ValueEval::Boolean(true),
            &ValueEval::Number(1.0),
            &ValueEval::Error(ErrorCode::Div0),
            0,
            0,
        );
        assert_eq!(r, ValueEval::Error(ErrorCode::Div0));

        // Condition errors come first
        let r = evaluate_ternary_array_args(
            &ValueEval::Error(ErrorCode::Na),
            &ValueEval::Error(ErrorCode::Ref),
            &ValueEval::Number(2.0),
            0,
            0,
        );
        assert_eq!(r, ValueEval::Error(ErrorCode::Na));
    }

    #[test]
    fn test_n_args() {
        let wb = grid();
        let args = vec![
            area(&wb, "A1:A2"),
            ValueEval::Number(100.0),
            area(&wb, "D1:E1"),
        ];
        let r = evaluate_n_array_args(&args, 0, 0, |v| {
            let total = v
                .iter()
                .map(|x| match x {
                    ValueEval::Number(n) => *n,
                    _ => 0.0,
                })
                .sum::<f64>();
            ValueEval::Number(total)
        });
        assert_eq!(
            cached_rows(&r),
            vec![
                vec![ValueEval::Number(111.0), ValueEval::Number(121.0)],
                vec![ValueEval::Number(113.0), ValueEval::Number(123.0)],
            ]
        );
    }

    proptest! {
        #[test]
        fn shape_law(h1 in 1usize..5, w1 in 1usize..5, h2 in 1usize..5, w2 in 1usize..5) {
            let a = ValueEval::Cached(Arc::new(CachedArea::from_fn(0, 0, h1, w1, |_, _| ValueEval::Number(1.0))));
            let b = ValueEval::Cached(Arc::new(CachedArea::from_fn(0, 0, h2, w2, |_, _| ValueEval::Number(2.0))));
            let expected = Shape { rows: h1.max(h2), cols: w1.max(w2) };
            prop_assert_eq!(broadcast_shape(&[&a, &b]), expected);

            let result = evaluate_two_array_args(&a, &b, 0, 0, add);
            if expected.is_scalar() {
                prop_assert_eq!(result, ValueEval::Number(3.0));
            } else {
                let area = result.as_area().expect("array result");
                prop_assert_eq!((area.height(), area.width()), (expected.rows, expected.cols));
            }
        }
    }
}
