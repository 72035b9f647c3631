//! Flattening of aggregate function operands into numbers
//!
//! Aggregates such as SUM or AVERAGE accept any mix of scalars, references,
//! areas, 3-D areas and reference lists. [`collect_values`] walks them in
//! argument order and returns the numbers that take part in the
//! calculation, as decided by a [`CollectionPolicy`].

use log::debug;
use sheetcalc_core::ErrorCode;

use crate::locale::ValueLocale;
use crate::resolver::parse_double;
use crate::value::{AreaLike, ValueEval};

/// Spreadsheet limit on the number of function arguments
pub const MAX_OPERANDS: usize = 255;

/// What to do with one kind of value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Include it as a number
    Coerce,
    /// Leave it out
    Skip,
    /// Abort with `#VALUE!`
    Error,
}

impl Policy {
    fn apply(self, n: f64) -> Result<Option<f64>, ErrorCode> {
        match self {
            Policy::Coerce => Ok(Some(n)),
            Policy::Skip => Ok(None),
            Policy::Error => Err(ErrorCode::Value),
        }
    }
}

/// Inclusion rules for an aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionPolicy {
    /// Booleans read from cells
    pub bool_by_ref: Policy,
    /// Booleans passed directly as arguments
    pub bool_by_value: Policy,
    pub blank: Policy,
    /// Empty argument slots, coerced to 0
    pub missing: Policy,
    /// Skip cells whose formula is a SUBTOTAL call
    pub ignore_subtotals: bool,
    pub max_operands: usize,
}

impl Default for CollectionPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CollectionPolicy {
    /// Numbers anywhere, booleans and numeric text only when typed as
    /// arguments, empty slots as 0
    pub const DEFAULT: CollectionPolicy = CollectionPolicy {
        bool_by_ref: Policy::Skip,
        bool_by_value: Policy::Coerce,
        blank: Policy::Skip,
        missing: Policy::Coerce,
        ignore_subtotals: false,
        max_operands: MAX_OPERANDS,
    };

    pub const fn with_bool_by_ref(mut self, policy: Policy) -> Self {
        self.bool_by_ref = policy;
        self
    }

    pub const fn with_bool_by_value(mut self, policy: Policy) -> Self {
        self.bool_by_value = policy;
        self
    }

    pub const fn with_blank(mut self, policy: Policy) -> Self {
        self.blank = policy;
        self
    }

    pub const fn with_missing(mut self, policy: Policy) -> Self {
        self.missing = policy;
        self
    }

    pub const fn ignoring_subtotals(mut self) -> Self {
        self.ignore_subtotals = true;
        self
    }

    pub const fn with_max_operands(mut self, max_operands: usize) -> Self {
        self.max_operands = max_operands;
        self
    }
}

/// Collect the numbers contributed by `operands`
///
/// The first error value met aborts the walk and is returned. An empty
/// result is valid; the caller decides what it means.
pub fn collect_values(
    operands: &[ValueEval<'_>],
    policy: &CollectionPolicy,
    locale: &ValueLocale,
) -> Result<Vec<f64>, ErrorCode> {
    if operands.len() > policy.max_operands {
        debug!(
            "rejecting {} operands, limit is {}",
            operands.len(),
            policy.max_operands
        );
        return Err(ErrorCode::Value);
    }

    let mut collector = Collector {
        policy,
        locale,
        out: Vec::new(),
    };
    for operand in operands {
        collector.operand(operand)?;
    }
    Ok(collector.out)
}

struct Collector<'p> {
    policy: &'p CollectionPolicy,
    locale: &'p ValueLocale,
    out: Vec<f64>,
}

impl Collector<'_> {
    fn operand(&mut self, operand: &ValueEval<'_>) -> Result<(), ErrorCode> {
        match operand {
            ValueEval::ThreeDArea(area) => {
                for sheet in area.first_sheet()..=area.last_sheet() {
                    for r in 0..area.height() {
                        for c in 0..area.width() {
                            if self.policy.ignore_subtotals && area.is_subtotal_on(sheet, r, c) {
                                continue;
                            }
                            let value = area.get_sheet_value(sheet, r, c)?;
                            self.value(&value, true)?;
                        }
                    }
                }
                Ok(())
            }
            ValueEval::Area(_) | ValueEval::Cached(_) => match operand.as_area() {
                Some(area) => self.area(area),
                None => Ok(()),
            },
            ValueEval::Reference(r) => {
                for sheet in r.first_sheet()..=r.last_sheet() {
                    self.value(&r.inner_value(sheet), true)?;
                }
                Ok(())
            }
            ValueEval::RefList(members) => {
                for member in members {
                    self.operand(member)?;
                }
                Ok(())
            }
            value => self.value(value, false),
        }
    }

    fn area<'a>(&mut self, area: &dyn AreaLike<'a>) -> Result<(), ErrorCode> {
        for r in 0..area.height() {
            for c in 0..area.width() {
                if self.policy.ignore_subtotals && area.is_subtotal(r, c) {
                    continue;
                }
                let value = area.get_value(r, c)?;
                self.value(&value, true)?;
            }
        }
        Ok(())
    }

    fn value(&mut self, value: &ValueEval<'_>, via_ref: bool) -> Result<(), ErrorCode> {
        let included = match value {
            ValueEval::Number(n) => Some(*n),
            ValueEval::Boolean(b) => {
                let policy = if via_ref {
                    self.policy.bool_by_ref
                } else {
                    self.policy.bool_by_value
                };
                policy.apply(if *b { 1.0 } else { 0.0 })?
            }
            ValueEval::Text(_) if via_ref => None,
            ValueEval::Text(s) => Some(parse_double(s, self.locale).ok_or(ErrorCode::Value)?),
            ValueEval::Error(e) => return Err(*e),
            ValueEval::Blank => self.policy.blank.apply(0.0)?,
            ValueEval::MissingArgument => self.policy.missing.apply(0.0)?,
            other => return self.operand(other),
        };
        if let Some(n) = included {
            self.out.push(n);
        }
        Ok(())
    }
}
