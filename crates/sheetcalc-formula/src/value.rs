//! Evaluation values
//!
//! Every evaluation step produces exactly one [`ValueEval`]. Spreadsheet
//! errors are ordinary values. References and areas are lazy views that
//! borrow the grid for the lifetime `'a` of an evaluation; broadcast results
//! and array constants are owned [`CachedArea`] buffers.

use std::fmt;
use std::sync::Arc;

use sheetcalc_core::{CellAddress, CellGrid, CellRange, CellValue, ErrorCode, MAX_COLS, MAX_ROWS};

/// The result of evaluating an expression or operand
#[derive(Debug, Clone, PartialEq)]
pub enum ValueEval<'a> {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Empty cell
    Blank,
    /// Empty argument slot such as the second argument of `F(1,)`
    MissingArgument,
    Error(ErrorCode),
    /// Single cell, possibly across a sheet span
    Reference(RefEval<'a>),
    /// Rectangle on one sheet
    Area(AreaEval<'a>),
    /// Rectangle replicated over a sheet span
    ThreeDArea(ThreeDAreaEval<'a>),
    /// Owned rectangular result buffer
    Cached(Arc<CachedArea>),
    /// Result of the union operator, e.g. `(A1:B2,C3)`
    RefList(Vec<ValueEval<'a>>),
}

impl<'a> ValueEval<'a> {
    /// Convert a stored cell into a scalar value
    ///
    /// Formula cells present their cached result; a cell that was never
    /// written is blank.
    pub fn from_cell(cell: Option<&CellValue>) -> ValueEval<'static> {
        match cell.map(CellValue::effective_value) {
            None | Some(CellValue::Empty) | Some(CellValue::Formula { .. }) => ValueEval::Blank,
            Some(CellValue::Boolean(b)) => ValueEval::Boolean(*b),
            Some(CellValue::Number(n)) => ValueEval::Number(*n),
            Some(CellValue::String(s)) => ValueEval::Text(s.clone()),
            Some(CellValue::Error(e)) => ValueEval::Error(*e),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        ValueEval::Text(s.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValueEval::Error(_))
    }

    /// The error code if this is an error value
    pub fn error(&self) -> Option<ErrorCode> {
        match self {
            ValueEval::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Number, text, boolean, blank, missing or error
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            ValueEval::Reference(_)
                | ValueEval::Area(_)
                | ValueEval::ThreeDArea(_)
                | ValueEval::Cached(_)
                | ValueEval::RefList(_)
        )
    }

    /// Uniform 2-D access to areas, 3-D areas (first sheet) and cached areas
    pub fn as_area(&self) -> Option<&dyn AreaLike<'a>> {
        match self {
            ValueEval::Area(area) => Some(area),
            ValueEval::ThreeDArea(area) => Some(area),
            ValueEval::Cached(area) => Some(area.as_ref()),
            _ => None,
        }
    }

    /// Type name used in log messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueEval::Number(_) => "number",
            ValueEval::Text(_) => "text",
            ValueEval::Boolean(_) => "boolean",
            ValueEval::Blank => "blank",
            ValueEval::MissingArgument => "missing",
            ValueEval::Error(_) => "error",
            ValueEval::Reference(_) => "reference",
            ValueEval::Area(_) => "area",
            ValueEval::ThreeDArea(_) => "3d-area",
            ValueEval::Cached(_) => "array",
            ValueEval::RefList(_) => "reference list",
        }
    }

    /// Convert a scalar back into a storable cell value
    ///
    /// Returns `None` for references and arrays.
    pub fn to_cell_value(&self) -> Option<CellValue> {
        Some(match self {
            ValueEval::Number(n) => CellValue::Number(*n),
            ValueEval::Text(s) => CellValue::String(s.clone()),
            ValueEval::Boolean(b) => CellValue::Boolean(*b),
            ValueEval::Blank | ValueEval::MissingArgument => CellValue::Empty,
            ValueEval::Error(e) => CellValue::Error(*e),
            _ => return None,
        })
    }

    /// Detach a scalar from the grid lifetime
    ///
    /// Non-scalars become `#VALUE!`; cached areas only ever hold scalars.
    pub fn into_owned_scalar(self) -> ValueEval<'static> {
        match self {
            ValueEval::Number(n) => ValueEval::Number(n),
            ValueEval::Text(s) => ValueEval::Text(s),
            ValueEval::Boolean(b) => ValueEval::Boolean(b),
            ValueEval::Blank => ValueEval::Blank,
            ValueEval::MissingArgument => ValueEval::MissingArgument,
            ValueEval::Error(e) => ValueEval::Error(e),
            _ => ValueEval::Error(ErrorCode::Value),
        }
    }
}

impl From<f64> for ValueEval<'_> {
    fn from(n: f64) -> Self {
        ValueEval::Number(n)
    }
}

impl From<bool> for ValueEval<'_> {
    fn from(b: bool) -> Self {
        ValueEval::Boolean(b)
    }
}

impl From<&str> for ValueEval<'_> {
    fn from(s: &str) -> Self {
        ValueEval::Text(s.to_string())
    }
}

impl From<String> for ValueEval<'_> {
    fn from(s: String) -> Self {
        ValueEval::Text(s)
    }
}

impl From<ErrorCode> for ValueEval<'_> {
    fn from(e: ErrorCode) -> Self {
        ValueEval::Error(e)
    }
}

impl From<Result<f64, ErrorCode>> for ValueEval<'_> {
    fn from(result: Result<f64, ErrorCode>) -> Self {
        match result {
            Ok(n) => ValueEval::Number(n),
            Err(e) => ValueEval::Error(e),
        }
    }
}

/// Read access shared by every rectangular value
///
/// Offsets are relative to the top-left cell; coordinates are absolute.
pub trait AreaLike<'a> {
    fn first_row(&self) -> u32;
    fn first_col(&self) -> u16;
    fn height(&self) -> usize;
    fn width(&self) -> usize;

    /// Value at a relative offset; outside the rectangle is `#REF!`
    fn get_value(&self, row_offset: usize, col_offset: usize) -> Result<ValueEval<'a>, ErrorCode>;

    /// Whether the cell at the offset is a SUBTOTAL formula
    fn is_subtotal(&self, _row_offset: usize, _col_offset: usize) -> bool {
        false
    }

    fn last_row(&self) -> u32 {
        self.first_row() + self.height() as u32 - 1
    }

    fn last_col(&self) -> u16 {
        self.first_col() + self.width() as u16 - 1
    }

    fn is_row(&self) -> bool {
        self.height() == 1
    }

    fn is_column(&self) -> bool {
        self.width() == 1
    }

    fn contains_row(&self, row: u32) -> bool {
        (self.first_row()..=self.last_row()).contains(&row)
    }

    fn contains_column(&self, col: u16) -> bool {
        (self.first_col()..=self.last_col()).contains(&col)
    }

    /// Value at absolute coordinates; outside the rectangle is `#REF!`
    fn get_absolute_value(&self, row: u32, col: u16) -> Result<ValueEval<'a>, ErrorCode> {
        if !self.contains_row(row) || !self.contains_column(col) {
            return Err(ErrorCode::Ref);
        }
        self.get_value(
            (row - self.first_row()) as usize,
            (col - self.first_col()) as usize,
        )
    }
}

/// A single cell reference, spanning one or more sheets
#[derive(Clone, Copy)]
pub struct RefEval<'a> {
    grid: &'a dyn CellGrid,
    first_sheet: usize,
    last_sheet: usize,
    row: u32,
    col: u16,
}

impl<'a> RefEval<'a> {
    pub fn new(grid: &'a dyn CellGrid, sheet: usize, row: u32, col: u16) -> Self {
        Self::new_3d(grid, sheet, sheet, row, col)
    }

    pub fn new_3d(
        grid: &'a dyn CellGrid,
        first_sheet: usize,
        last_sheet: usize,
        row: u32,
        col: u16,
    ) -> Self {
        Self {
            grid,
            first_sheet: first_sheet.min(last_sheet),
            last_sheet: first_sheet.max(last_sheet),
            row,
            col,
        }
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn col(&self) -> u16 {
        self.col
    }

    pub fn first_sheet(&self) -> usize {
        self.first_sheet
    }

    pub fn last_sheet(&self) -> usize {
        self.last_sheet
    }

    pub fn sheet_count(&self) -> usize {
        self.last_sheet - self.first_sheet + 1
    }

    /// Value of the cell on `sheet`
    pub fn inner_value(&self, sheet: usize) -> ValueEval<'a> {
        ValueEval::from_cell(self.grid.cell_value(sheet, self.row, self.col))
    }

    /// Value of the cell on the first sheet of the span
    pub fn value(&self) -> ValueEval<'a> {
        self.inner_value(self.first_sheet)
    }

    pub fn is_subtotal(&self, sheet: usize) -> bool {
        self.grid.is_subtotal(sheet, self.row, self.col)
    }

    /// The same cell as a 1x1 area on the first sheet
    pub fn as_area(&self) -> AreaEval<'a> {
        AreaEval::from_bounds(
            self.grid,
            self.first_sheet,
            self.row,
            self.col,
            self.row,
            self.col,
        )
    }

    pub fn grid(&self) -> &'a dyn CellGrid {
        self.grid
    }
}

impl fmt::Debug for RefEval<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefEval")
            .field("sheets", &(self.first_sheet..=self.last_sheet))
            .field("cell", &CellAddress::new(self.row, self.col).to_string())
            .finish()
    }
}

/// Coordinates only; two views of the same cell compare equal
impl PartialEq for RefEval<'_> {
    fn eq(&self, other: &Self) -> bool {
        (self.first_sheet, self.last_sheet, self.row, self.col)
            == (other.first_sheet, other.last_sheet, other.row, other.col)
    }
}

/// A rectangular view onto one sheet
#[derive(Clone, Copy)]
pub struct AreaEval<'a> {
    grid: &'a dyn CellGrid,
    sheet: usize,
    first_row: u32,
    first_col: u16,
    last_row: u32,
    last_col: u16,
}

impl<'a> AreaEval<'a> {
    pub fn new(grid: &'a dyn CellGrid, sheet: usize, range: CellRange) -> Self {
        Self::from_bounds(
            grid,
            sheet,
            range.start.row,
            range.start.col,
            range.end.row,
            range.end.col,
        )
    }

    fn from_bounds(
        grid: &'a dyn CellGrid,
        sheet: usize,
        first_row: u32,
        first_col: u16,
        last_row: u32,
        last_col: u16,
    ) -> Self {
        Self {
            grid,
            sheet,
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        }
    }

    pub fn sheet(&self) -> usize {
        self.sheet
    }

    pub fn range(&self) -> CellRange {
        CellRange::from_indices(self.first_row, self.first_col, self.last_row, self.last_col)
    }

    pub fn grid(&self) -> &'a dyn CellGrid {
        self.grid
    }

    /// Sub-view with bounds relative to this area's top-left cell
    ///
    /// The result may extend beyond this area but not beyond the sheet.
    pub fn offset(
        &self,
        rel_first_row: i64,
        rel_last_row: i64,
        rel_first_col: i64,
        rel_last_col: i64,
    ) -> Result<AreaEval<'a>, ErrorCode> {
        let row = |rel: i64| {
            let abs = self.first_row as i64 + rel;
            if (0..MAX_ROWS as i64).contains(&abs) {
                Ok(abs as u32)
            } else {
                Err(ErrorCode::Ref)
            }
        };
        let col = |rel: i64| {
            let abs = self.first_col as i64 + rel;
            if (0..MAX_COLS as i64).contains(&abs) {
                Ok(abs as u16)
            } else {
                Err(ErrorCode::Ref)
            }
        };
        Ok(Self::from_bounds(
            self.grid,
            self.sheet,
            row(rel_first_row)?,
            col(rel_first_col)?,
            row(rel_last_row)?,
            col(rel_last_col)?,
        ))
    }

    /// Single row of this area as a row vector
    pub fn row(&self, row_offset: usize) -> Result<AreaEval<'a>, ErrorCode> {
        if row_offset >= self.height() {
            return Err(ErrorCode::Ref);
        }
        let r = row_offset as i64;
        self.offset(r, r, 0, self.width() as i64 - 1)
    }

    /// Single column of this area as a column vector
    pub fn column(&self, col_offset: usize) -> Result<AreaEval<'a>, ErrorCode> {
        if col_offset >= self.width() {
            return Err(ErrorCode::Ref);
        }
        let c = col_offset as i64;
        self.offset(0, self.height() as i64 - 1, c, c)
    }
}

impl<'a> AreaLike<'a> for AreaEval<'a> {
    fn first_row(&self) -> u32 {
        self.first_row
    }

    fn first_col(&self) -> u16 {
        self.first_col
    }

    fn height(&self) -> usize {
        (self.last_row - self.first_row) as usize + 1
    }

    fn width(&self) -> usize {
        (self.last_col - self.first_col) as usize + 1
    }

    fn get_value(&self, row_offset: usize, col_offset: usize) -> Result<ValueEval<'a>, ErrorCode> {
        if row_offset >= self.height() || col_offset >= self.width() {
            return Err(ErrorCode::Ref);
        }
        Ok(ValueEval::from_cell(self.grid.cell_value(
            self.sheet,
            self.first_row + row_offset as u32,
            self.first_col + col_offset as u16,
        )))
    }

    fn is_subtotal(&self, row_offset: usize, col_offset: usize) -> bool {
        row_offset < self.height()
            && col_offset < self.width()
            && self.grid.is_subtotal(
                self.sheet,
                self.first_row + row_offset as u32,
                self.first_col + col_offset as u16,
            )
    }
}

impl fmt::Debug for AreaEval<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaEval")
            .field("sheet", &self.sheet)
            .field("range", &self.range().to_string())
            .finish()
    }
}

impl PartialEq for AreaEval<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.sheet == other.sheet && self.range() == other.range()
    }
}

/// The same rectangle on every sheet of a span (`Sheet1:Sheet3!A1:B2`)
#[derive(Clone, Copy)]
pub struct ThreeDAreaEval<'a> {
    first_sheet: usize,
    last_sheet: usize,
    area: AreaEval<'a>,
}

impl<'a> ThreeDAreaEval<'a> {
    pub fn new(
        grid: &'a dyn CellGrid,
        first_sheet: usize,
        last_sheet: usize,
        range: CellRange,
    ) -> Self {
        let first = first_sheet.min(last_sheet);
        Self {
            first_sheet: first,
            last_sheet: first_sheet.max(last_sheet),
            area: AreaEval::new(grid, first, range),
        }
    }

    pub fn first_sheet(&self) -> usize {
        self.first_sheet
    }

    pub fn last_sheet(&self) -> usize {
        self.last_sheet
    }

    pub fn sheet_count(&self) -> usize {
        self.last_sheet - self.first_sheet + 1
    }

    /// The rectangle on one sheet of the span
    pub fn sheet_area(&self, sheet: usize) -> AreaEval<'a> {
        AreaEval {
            sheet,
            ..self.area
        }
    }

    /// Value at a relative offset on `sheet`
    pub fn get_sheet_value(
        &self,
        sheet: usize,
        row_offset: usize,
        col_offset: usize,
    ) -> Result<ValueEval<'a>, ErrorCode> {
        if !(self.first_sheet..=self.last_sheet).contains(&sheet) {
            return Err(ErrorCode::Ref);
        }
        self.sheet_area(sheet).get_value(row_offset, col_offset)
    }

    pub fn is_subtotal_on(&self, sheet: usize, row_offset: usize, col_offset: usize) -> bool {
        self.sheet_area(sheet).is_subtotal(row_offset, col_offset)
    }

    pub fn range(&self) -> CellRange {
        self.area.range()
    }
}

/// 2-D access reads the first sheet of the span
impl<'a> AreaLike<'a> for ThreeDAreaEval<'a> {
    fn first_row(&self) -> u32 {
        self.area.first_row
    }

    fn first_col(&self) -> u16 {
        self.area.first_col
    }

    fn height(&self) -> usize {
        self.area.height()
    }

    fn width(&self) -> usize {
        self.area.width()
    }

    fn get_value(&self, row_offset: usize, col_offset: usize) -> Result<ValueEval<'a>, ErrorCode> {
        self.area.get_value(row_offset, col_offset)
    }

    fn is_subtotal(&self, row_offset: usize, col_offset: usize) -> bool {
        self.area.is_subtotal(row_offset, col_offset)
    }
}

impl fmt::Debug for ThreeDAreaEval<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreeDAreaEval")
            .field("sheets", &(self.first_sheet..=self.last_sheet))
            .field("range", &self.range().to_string())
            .finish()
    }
}

impl PartialEq for ThreeDAreaEval<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.first_sheet == other.first_sheet
            && self.last_sheet == other.last_sheet
            && self.range() == other.range()
    }
}

/// Owned, immutable rectangle of scalar values anchored at absolute coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArea {
    first_row: u32,
    first_col: u16,
    height: usize,
    width: usize,
    /// Row-major
    values: Vec<ValueEval<'static>>,
}

impl CachedArea {
    /// Build a `height` x `width` buffer by calling `f(row_offset, col_offset)`
    ///
    /// Non-scalar results are stored as `#VALUE!`.
    pub fn from_fn<'v, F>(
        first_row: u32,
        first_col: u16,
        height: usize,
        width: usize,
        mut f: F,
    ) -> Self
    where
        F: FnMut(usize, usize) -> ValueEval<'v>,
    {
        let height = height.max(1);
        let width = width.max(1);
        let mut values = Vec::with_capacity(height * width);
        for r in 0..height {
            for c in 0..width {
                values.push(f(r, c).into_owned_scalar());
            }
        }
        Self {
            first_row,
            first_col,
            height,
            width,
            values,
        }
    }

    /// Build from rows; short rows are padded with `#N/A`
    pub fn from_rows<'v>(first_row: u32, first_col: u16, rows: Vec<Vec<ValueEval<'v>>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let height = rows.len();
        Self::from_fn(first_row, first_col, height, width, |r, c| {
            rows.get(r)
                .and_then(|row| row.get(c))
                .cloned()
                .unwrap_or(ValueEval::Error(ErrorCode::Na))
        })
    }

    /// All values in row-major order
    pub fn values(&self) -> &[ValueEval<'static>] {
        &self.values
    }

    /// Values as rows
    pub fn rows(&self) -> impl Iterator<Item = &[ValueEval<'static>]> {
        self.values.chunks(self.width)
    }
}

impl<'a> AreaLike<'a> for CachedArea {
    fn first_row(&self) -> u32 {
        self.first_row
    }

    fn first_col(&self) -> u16 {
        self.first_col
    }

    fn height(&self) -> usize {
        self.height
    }

    fn width(&self) -> usize {
        self.width
    }

    fn get_value(&self, row_offset: usize, col_offset: usize) -> Result<ValueEval<'a>, ErrorCode> {
        if row_offset >= self.height || col_offset >= self.width {
            return Err(ErrorCode::Ref);
        }
        Ok(self.values[row_offset * self.width + col_offset].clone())
    }
}
