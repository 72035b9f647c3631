//! Read-only cell access used by the formula evaluator

use crate::cell::{CellRange, CellValue};

/// Read access to the cells of a multi-sheet grid
///
/// The evaluator only ever borrows a grid; area and reference values are
/// lazy views that read through this trait.
pub trait CellGrid: Send + Sync {
    /// Number of sheets
    fn sheet_count(&self) -> usize;

    /// Index of the sheet called `name` (case-insensitive)
    fn sheet_index(&self, name: &str) -> Option<usize>;

    /// Raw value stored at a cell, `None` for cells never written
    fn cell_value(&self, sheet: usize, row: u32, col: u16) -> Option<&CellValue>;

    /// Whether the cell holds a formula that calls SUBTOTAL
    fn is_subtotal(&self, sheet: usize, row: u32, col: u16) -> bool {
        self.cell_value(sheet, row, col)
            .map(CellValue::is_subtotal_formula)
            .unwrap_or(false)
    }

    /// Range of the array formula group the cell belongs to, if any
    fn array_formula_range(&self, sheet: usize, row: u32, col: u16) -> Option<CellRange>;

    /// Refers-to text of a defined name visible from `sheet`
    ///
    /// Sheet-scoped names shadow workbook-scoped ones.
    fn defined_name(&self, name: &str, sheet: usize) -> Option<&str>;
}
