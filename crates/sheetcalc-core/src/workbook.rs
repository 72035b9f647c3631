//! Workbook type - the in-memory grid the evaluator reads from

use crate::cell::{CellRange, CellValue};
use crate::error::{Error, Result};
use crate::grid::CellGrid;
use crate::named_range::{NameScope, NamedRange, NamedRangeCollection};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook: ordered worksheets plus defined names
#[derive(Debug, Clone)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    settings: WorkbookSettings,
    named_ranges: NamedRangeCollection,
}

impl Workbook {
    /// Create a workbook with a single sheet called `Sheet1`
    pub fn new() -> Self {
        let mut wb = Self::empty();
        wb.worksheets.push(Worksheet::new("Sheet1"));
        wb
    }

    /// Create a workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            settings: WorkbookSettings::default(),
            named_ranges: NamedRangeCollection::new(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name (case-insensitive)
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get(i))
    }

    /// Get a mutable worksheet by name (case-insensitive)
    pub fn worksheet_by_name_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get_mut(i))
    }

    /// Get the index of a worksheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a worksheet named `SheetN` with the first free N
    pub fn add_worksheet(&mut self) -> Result<usize> {
        let name = (self.worksheets.len() + 1..)
            .map(|n| format!("Sheet{}", n))
            .find(|name| self.sheet_index(name).is_none())
            .ok_or_else(|| Error::InvalidSheetName("no free sheet name".into()))?;
        self.add_worksheet_with_name(&name)
    }

    /// Add a worksheet with the given name and return its index
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name, None)?;
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    /// Rename a worksheet
    pub fn rename_worksheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.validate_sheet_name(new_name, Some(index))?;
        self.worksheets[index].set_name(new_name);
        Ok(())
    }

    /// Get workbook settings
    pub fn settings(&self) -> &WorkbookSettings {
        &self.settings
    }

    /// Get mutable workbook settings
    pub fn settings_mut(&mut self) -> &mut WorkbookSettings {
        &mut self.settings
    }

    // ==================== Defined Names ====================

    /// Define a workbook-scoped name
    ///
    /// ```
    /// use sheetcalc_core::Workbook;
    ///
    /// let mut wb = Workbook::new();
    /// wb.define_name("TaxRate", "Sheet1!$B$1").unwrap();
    /// assert!(wb.get_named_range("taxrate", 0).is_some());
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.named_ranges
            .define(NamedRange::new(name, refers_to, NameScope::Workbook))
    }

    /// Define a name visible only from one sheet
    pub fn define_name_for_sheet(
        &mut self,
        name: &str,
        refers_to: &str,
        sheet_index: usize,
    ) -> Result<()> {
        if sheet_index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(sheet_index, self.worksheets.len()));
        }
        self.named_ranges
            .define(NamedRange::new(name, refers_to, NameScope::Sheet(sheet_index)))
    }

    /// Look a name up as seen from `current_sheet`
    pub fn get_named_range(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.named_ranges.get(name, current_sheet)
    }

    /// Get the defined-name collection
    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    fn validate_sheet_name(&self, name: &str, exclude_index: Option<usize>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(Error::InvalidSheetName(
                "Sheet name cannot begin or end with an apostrophe".into(),
            ));
        }

        match self.sheet_index(name) {
            Some(i) if Some(i) != exclude_index => Err(Error::DuplicateSheetName(name.into())),
            _ => Ok(()),
        }
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl CellGrid for Workbook {
    fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        Workbook::sheet_index(self, name)
    }

    fn cell_value(&self, sheet: usize, row: u32, col: u16) -> Option<&CellValue> {
        self.worksheets.get(sheet)?.cell_at(row, col)
    }

    fn array_formula_range(&self, sheet: usize, row: u32, col: u16) -> Option<CellRange> {
        self.worksheets.get(sheet)?.array_formula_range(row, col)
    }

    fn defined_name(&self, name: &str, sheet: usize) -> Option<&str> {
        self.named_ranges
            .get(name, sheet)
            .map(|nr| nr.refers_to.as_str())
    }
}

/// Workbook-level settings
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookSettings {
    /// Decimal separator used when text is read as a number
    pub decimal_separator: char,
    /// Digit group separator used when text is read as a number
    pub group_separator: char,
}

impl Default for WorkbookSettings {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            group_separator: ',',
        }
    }
}
