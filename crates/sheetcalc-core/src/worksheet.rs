//! Worksheet type

use ahash::AHashMap;

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A single sheet of cells
///
/// Cells are stored sparsely; a cell that was never written reads as empty.
#[derive(Debug, Clone)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Sparse cell storage keyed by (row, col)
    cells: AHashMap<(u32, u16), CellValue>,
    /// Array formula groups (Ctrl+Shift+Enter ranges)
    array_formulas: Vec<CellRange>,
}

impl Worksheet {
    /// Create an empty worksheet
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: AHashMap::new(),
            array_formulas: Vec::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell Access ===

    /// Get a cell value by address string (e.g., "A1")
    pub fn cell(&self, address: &str) -> Result<Option<&CellValue>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell_at(addr.row, addr.col))
    }

    /// Get a cell value by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Get cell value, empty for unwritten cells
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        Ok(self.cell(address)?.cloned().unwrap_or_default())
    }

    /// Get cell value by indices, empty for unwritten cells
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cell_at(row, col).cloned().unwrap_or_default()
    }

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by indices; writing `Empty` clears the cell
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        validate_cell_position(row, col)?;
        match value.into() {
            CellValue::Empty => {
                self.cells.remove(&(row, col));
            }
            value => {
                self.cells.insert((row, col), value);
            }
        }
        Ok(())
    }

    /// Set a formula with no cached result
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a formula by indices; a missing leading `=` is added
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        self.set_cell_value_at(row, col, CellValue::formula(normalize_formula(formula)))
    }

    /// Set a formula together with its last calculated value
    pub fn set_cell_formula_with_result(
        &mut self,
        address: &str,
        formula: &str,
        result: CellValue,
    ) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(
            addr.row,
            addr.col,
            CellValue::formula_with_result(normalize_formula(formula), result),
        )
    }

    /// Store the calculated result of an existing formula cell
    pub fn set_formula_result(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        match self.cells.get_mut(&(row, col)) {
            Some(CellValue::Formula { cached_value, .. }) => {
                *cached_value = Some(Box::new(value));
                Ok(())
            }
            _ => Err(Error::InvalidAddress(format!(
                "{} does not hold a formula",
                CellAddress::new(row, col)
            ))),
        }
    }

    /// Remove a cell's content
    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        self.cells.remove(&(row, col));
    }

    /// Get the formula text at a cell position (if it's a formula)
    pub fn get_formula_at(&self, row: u32, col: u16) -> Option<&str> {
        self.cell_at(row, col).and_then(CellValue::formula_text)
    }

    /// Iterate over all formula cells: (row, col, formula_text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells
            .iter()
            .filter_map(|(&(row, col), value)| value.formula_text().map(|t| (row, col, t)))
    }

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if the worksheet is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Smallest range covering every written cell
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells
            .keys()
            .map(|&(row, col)| CellRange::from_indices(row, col, row, col))
            .reduce(|acc, cell| acc.bounding(&cell))
    }

    // === Array formulas ===

    /// Enter `formula` as an array formula over `range`
    ///
    /// Every cell of the range receives the formula text; the group's
    /// first cell is the anchor results are laid out from.
    pub fn set_array_formula(&mut self, range: &str, formula: &str) -> Result<CellRange> {
        let range = CellRange::parse(range)?;
        validate_cell_position(range.end.row, range.end.col)?;
        if self.array_formulas.iter().any(|group| group.overlaps(&range)) {
            return Err(Error::ArrayFormulaConflict(range.to_a1_string()));
        }
        let text = normalize_formula(formula);
        for addr in range.cells() {
            self.cells
                .insert((addr.row, addr.col), CellValue::formula(text.clone()));
        }
        self.array_formulas.push(range);
        Ok(range)
    }

    /// Array formula group containing the cell, if any
    pub fn array_formula_range(&self, row: u32, col: u16) -> Option<CellRange> {
        self.array_formulas
            .iter()
            .find(|group| group.contains_cell(row, col))
            .copied()
    }

    /// All array formula groups on this sheet
    pub fn array_formulas(&self) -> &[CellRange] {
        &self.array_formulas
    }
}

fn validate_cell_position(row: u32, col: u16) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
    }
    Ok(())
}

fn normalize_formula(formula: &str) -> String {
    let formula = formula.trim();
    if formula.starts_with('=') {
        formula.to_string()
    } else {
        format!("={}", formula)
    }
}
