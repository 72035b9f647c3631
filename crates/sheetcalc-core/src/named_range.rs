//! Defined names
//!
//! A defined name maps an identifier to a formula fragment, usually a
//! reference such as `Sheet1!$B$1` or a constant such as `0.0725`. Formulas
//! that mention the name evaluate the fragment in their place.

use ahash::AHashMap;

use crate::error::{Error, Result};

/// Visibility of a defined name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Visible from every sheet
    Workbook,
    /// Visible only from the sheet with this index
    Sheet(usize),
}

/// A defined name
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    /// Name as written by the user (lookups ignore case)
    pub name: String,
    pub scope: NameScope,
    /// Formula fragment the name stands for, with or without a leading `=`
    pub refers_to: String,
}

impl NamedRange {
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        Self {
            name: name.into(),
            scope,
            refers_to: refers_to.into(),
        }
    }

    /// The fragment without a leading `=`
    pub fn expression(&self) -> &str {
        self.refers_to.strip_prefix('=').unwrap_or(&self.refers_to)
    }
}

/// Defined names with case-insensitive, scope-aware lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    names: AHashMap<(String, NameScope), NamedRange>,
}

impl NamedRangeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_ascii_lowercase(), scope)
    }

    /// Add a name; fails if the name already exists in that scope
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        validate_name(&range.name)?;
        let key = Self::key(&range.name, range.scope);
        if self.names.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "'{}' is already defined in this scope",
                range.name
            )));
        }
        self.names.insert(key, range);
        Ok(())
    }

    /// Resolve `name` as seen from `current_sheet`
    ///
    /// A sheet-scoped definition shadows a workbook-scoped one.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.names
            .get(&Self::key(name, NameScope::Sheet(current_sheet)))
            .or_else(|| self.names.get(&Self::key(name, NameScope::Workbook)))
    }

    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<NamedRange> {
        self.names.remove(&Self::key(name, scope))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.names.values()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Names start with a letter, `_` or `\` and continue with letters, digits,
/// `_` or `.`; they must not read as a cell address or a boolean.
fn validate_name(name: &str) -> Result<()> {
    let invalid = || Error::InvalidName(name.to_string());
    let mut chars = name.chars();
    let first = chars.next().ok_or_else(invalid)?;
    if !(first.is_alphabetic() || first == '_' || first == '\\') {
        return Err(invalid());
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return Err(invalid());
    }
    if crate::CellAddress::parse(name).is_ok()
        || name.eq_ignore_ascii_case("TRUE")
        || name.eq_ignore_ascii_case("FALSE")
    {
        return Err(invalid());
    }
    Ok(())
}
