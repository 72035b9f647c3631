//! Workbook-level evaluation
//!
//! Evaluates formula cells against the workbook they live in, with the
//! workbook's number-entry separators and array formula groups taken into
//! account.
//!
//! # Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 20.0).unwrap();
//! sheet.set_cell_formula("A3", "=A1+A2").unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! let a3 = workbook.worksheet(0).unwrap().get_value_at(2, 0);
//! assert_eq!(a3.effective_value(), &CellValue::Number(30.0));
//! ```

use sheetcalc_core::{CellAddress, CellValue, ErrorCode, Workbook};
use sheetcalc_formula::{evaluate_formula, EvaluationContext, ValueEval, ValueLocale};

use crate::error::{Error, Result};

/// Options for workbook calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Maximum passes over the formula cells (default: 100)
    pub max_iterations: u32,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of cells calculated in the last pass
    pub cells_calculated: usize,
    /// Number of passes performed
    pub iterations: u32,
    /// Number of formulas whose result is an error value
    pub errors: usize,
    /// Whether the last pass left every result unchanged
    pub converged: bool,
}

/// Extension trait for Workbook to add evaluation methods
pub trait WorkbookCalculationExt {
    /// Separators the evaluator uses when reading text as a number
    fn value_locale(&self) -> ValueLocale;

    /// Evaluate `formula` as if it were entered at `address` on `sheet`
    fn evaluate_formula_at(&self, sheet: usize, address: &str, formula: &str)
        -> Result<ValueEval<'_>>;

    /// Value of a cell, evaluating it if it holds a formula
    ///
    /// Cells of an array formula group see their own element of the
    /// group's result.
    fn evaluate_cell(&self, sheet: usize, address: &str) -> Result<ValueEval<'_>>;

    /// Evaluate a formula cell and store the result as its cached value
    fn calculate_cell(&mut self, sheet: usize, address: &str) -> Result<CellValue>;

    /// Calculate all formulas in the workbook with default options
    fn calculate(&mut self) -> Result<CalculationStats>;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats>;
}

impl WorkbookCalculationExt for Workbook {
    fn value_locale(&self) -> ValueLocale {
        let settings = self.settings();
        ValueLocale::new(settings.decimal_separator, settings.group_separator)
    }

    fn evaluate_formula_at(
        &self,
        sheet: usize,
        address: &str,
        formula: &str,
    ) -> Result<ValueEval<'_>> {
        check_sheet(self, sheet)?;
        let addr = CellAddress::parse(address)?;
        let ctx = EvaluationContext::new(self, sheet, addr.row, addr.col)
            .with_locale(self.value_locale());
        Ok(evaluate_formula(formula, &ctx)?)
    }

    fn evaluate_cell(&self, sheet: usize, address: &str) -> Result<ValueEval<'_>> {
        check_sheet(self, sheet)?;
        let addr = CellAddress::parse(address)?;
        evaluate_at(self, sheet, addr.row, addr.col)
    }

    fn calculate_cell(&mut self, sheet: usize, address: &str) -> Result<CellValue> {
        let result = self
            .evaluate_cell(sheet, address)?
            .to_cell_value()
            .unwrap_or(CellValue::Error(ErrorCode::Value));
        let addr = CellAddress::parse(address)?;
        let worksheet = self
            .worksheet_mut(sheet)
            .ok_or_else(|| Error::SheetNotFound(sheet))?;
        worksheet.set_formula_result(addr.row, addr.col, result.clone())?;
        Ok(result)
    }

    fn calculate(&mut self) -> Result<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats> {
        let cells = formula_cells(self);
        let mut stats = CalculationStats {
            formula_count: cells.len(),
            ..CalculationStats::default()
        };
        if cells.is_empty() {
            stats.converged = true;
            return Ok(stats);
        }

        // Each pass sees the results of the previous one, so a chain of
        // dependent formulas settles after at most its length in passes.
        while stats.iterations < options.max_iterations.max(1) {
            stats.iterations += 1;
            let mut results = Vec::with_capacity(cells.len());
            for &(sheet, row, col) in &cells {
                let value = evaluate_at(self, sheet, row, col)?;
                results.push(
                    value
                        .to_cell_value()
                        .unwrap_or(CellValue::Error(ErrorCode::Value)),
                );
            }

            let mut changed = false;
            for (&(sheet, row, col), result) in cells.iter().zip(results) {
                let worksheet = self
                    .worksheet_mut(sheet)
                    .ok_or_else(|| Error::SheetNotFound(sheet))?;
                if worksheet.cell_at(row, col).map(CellValue::effective_value) != Some(&result) {
                    changed = true;
                }
                worksheet.set_formula_result(row, col, result)?;
            }

            stats.cells_calculated = cells.len();
            if !changed {
                stats.converged = true;
                break;
            }
        }

        stats.errors = cells
            .iter()
            .filter(|&&(sheet, row, col)| {
                self.worksheet(sheet)
                    .and_then(|ws| ws.cell_at(row, col))
                    .map_or(false, |v| v.effective_value().is_error())
            })
            .count();
        Ok(stats)
    }
}

fn check_sheet(workbook: &Workbook, sheet: usize) -> Result<()> {
    if sheet < workbook.sheet_count() {
        Ok(())
    } else {
        Err(Error::SheetNotFound(sheet))
    }
}

/// Formula cells of every sheet in sheet, row, column order
fn formula_cells(workbook: &Workbook) -> Vec<(usize, u32, u16)> {
    let mut cells: Vec<_> = workbook
        .worksheets()
        .enumerate()
        .flat_map(|(sheet, ws)| ws.formula_cells().map(move |(row, col, _)| (sheet, row, col)))
        .collect();
    cells.sort_unstable();
    cells
}

fn evaluate_at(workbook: &Workbook, sheet: usize, row: u32, col: u16) -> Result<ValueEval<'_>> {
    let cell = workbook.worksheet(sheet).and_then(|ws| ws.cell_at(row, col));
    let Some(formula) = cell.and_then(CellValue::formula_text) else {
        return Ok(ValueEval::from_cell(cell));
    };

    let ctx = EvaluationContext::new(workbook, sheet, row, col)
        .with_locale(workbook.value_locale());
    let value = evaluate_formula(formula, &ctx)?;
    if !ctx.is_array_context() {
        return Ok(value);
    }

    let (anchor_row, anchor_col) = ctx.array_anchor();
    let offset = ((row - anchor_row) as usize, (col - anchor_col) as usize);
    Ok(element_at(&value, offset))
}

/// The element of an array result that lands on a group cell
///
/// Scalars fill the whole group and single rows or columns repeat across
/// it. Cells beyond the result are `#N/A`.
fn element_at<'a>(value: &ValueEval<'a>, (r, c): (usize, usize)) -> ValueEval<'a> {
    let Some(area) = value.as_area() else {
        return match value {
            ValueEval::Reference(reference) => reference.value(),
            ValueEval::RefList(_) => ValueEval::Error(ErrorCode::Value),
            scalar => scalar.clone(),
        };
    };
    let r = if area.height() == 1 { 0 } else { r };
    let c = if area.width() == 1 { 0 } else { c };
    if r >= area.height() || c >= area.width() {
        return ValueEval::Error(ErrorCode::Na);
    }
    area.get_value(r, c).unwrap_or_else(ValueEval::Error)
}
