//! A1-style cell addresses and rectangular ranges

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A single cell position such as `B7` or `$C$3`
///
/// Rows and columns are 0-based; the A1 rendering adds one to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based, A=0)
    pub col: u16,
    /// `$` before the row number
    pub row_absolute: bool,
    /// `$` before the column letters
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a relative address
    pub fn new(row: u32, col: u16) -> Self {
        Self::with_absolute(row, col, false, false)
    }

    /// Create an address with explicit `$` markers
    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Parse `A1`, `$A1`, `A$1` or `$A$1`
    ///
    /// ```
    /// use sheetcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$C$10").unwrap();
    /// assert_eq!((addr.row, addr.col), (9, 2));
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let invalid = |why: &str| Error::InvalidAddress(format!("{} in '{}'", why, text));

        let (col_absolute, rest) = match text.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let letters_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if letters_end == 0 {
            return Err(invalid("missing column letters"));
        }
        let col = Self::letters_to_column(&rest[..letters_end])?;

        let rest = &rest[letters_end..];
        let (row_absolute, digits) = match rest.strip_prefix('$') {
            Some(digits) => (true, digits),
            None => (false, rest),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("missing or malformed row number"));
        }
        let row_number: u64 = digits.parse().map_err(|_| invalid("row number overflow"))?;
        if row_number == 0 {
            return Err(invalid("row numbers start at 1"));
        }
        if row_number > MAX_ROWS as u64 {
            return Err(Error::RowOutOfBounds(
                (row_number - 1).min(u32::MAX as u64) as u32,
                MAX_ROWS - 1,
            ));
        }

        Ok(Self::with_absolute(
            (row_number - 1) as u32,
            col,
            row_absolute,
            col_absolute,
        ))
    }

    /// Column index to letters (0 → `A`, 26 → `AA`)
    pub fn column_to_letters(col: u16) -> String {
        let mut letters = Vec::with_capacity(3);
        let mut n = col as u32 + 1;
        while n > 0 {
            n -= 1;
            letters.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        letters.iter().rev().map(|&b| b as char).collect()
    }

    /// Column letters to index, case-insensitive (`A` → 0, `xfd` → 16383)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }
        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > MAX_COLS as u32 {
                return Err(Error::ColumnOutOfBounds(
                    col.min(u16::MAX as u32) as u16,
                    MAX_COLS - 1,
                ));
            }
        }
        Ok((col - 1) as u16)
    }

    /// A1 rendering including `$` markers
    pub fn to_a1_string(&self) -> String {
        format!(
            "{}{}{}{}",
            if self.col_absolute { "$" } else { "" },
            Self::column_to_letters(self.col),
            if self.row_absolute { "$" } else { "" },
            self.row + 1
        )
    }

    /// Range spanning this address and `other`
    pub fn to(&self, other: CellAddress) -> CellRange {
        CellRange::new(*self, other)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A normalized rectangle of cells (`start` is top-left, `end` bottom-right)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Create a range from two corners in any order
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        let (top, bottom) = if a.row <= b.row { (a, b) } else { (b, a) };
        let (left, right) = if a.col <= b.col { (a, b) } else { (b, a) };
        Self {
            start: CellAddress::with_absolute(
                top.row,
                left.col,
                top.row_absolute,
                left.col_absolute,
            ),
            end: CellAddress::with_absolute(
                bottom.row,
                right.col,
                bottom.row_absolute,
                right.col_absolute,
            ),
        }
    }

    /// Create a range from 0-based corner indices
    pub fn from_indices(first_row: u32, first_col: u16, last_row: u32, last_col: u16) -> Self {
        Self::new(
            CellAddress::new(first_row, first_col),
            CellAddress::new(last_row, last_col),
        )
    }

    /// Single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse `A1:B10` or a lone `C3`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((a, b)) => Ok(Self::new(CellAddress::parse(a)?, CellAddress::parse(b)?)),
            None => CellAddress::parse(s)
                .map(Self::single)
                .map_err(|_| Error::InvalidRange(s.to_string())),
        }
    }

    /// Whether (row, col) lies inside the rectangle
    pub fn contains_cell(&self, row: u32, col: u16) -> bool {
        (self.start.row..=self.end.row).contains(&row)
            && (self.start.col..=self.end.col).contains(&col)
    }

    /// Whether `addr` lies inside the rectangle
    pub fn contains(&self, addr: &CellAddress) -> bool {
        self.contains_cell(addr.row, addr.col)
    }

    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Whether the two rectangles share at least one cell
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && other.start.row <= self.end.row
            && self.start.col <= other.end.col
            && other.start.col <= self.end.col
    }

    /// Smallest range covering both rectangles
    pub fn bounding(&self, other: &CellRange) -> CellRange {
        CellRange::from_indices(
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        )
    }

    /// Row-major iterator over the addresses in the range
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| CellAddress::new(row, col))
        })
    }

    /// `A1:B2`, or `A1` for a single cell
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start, self.end)
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
