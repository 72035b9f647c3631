//! Operand resolution and coercion
//!
//! Functions and operators never inspect raw operands directly. They resolve
//! a possibly-reference operand to one scalar at the formula cell, then
//! coerce it with the rules below. Errors surface as `Err(ErrorCode)` so
//! callers can short-circuit with `?`.

use lazy_regex::regex_is_match;
use sheetcalc_core::ErrorCode;

use crate::locale::ValueLocale;
use crate::value::{AreaLike, ValueEval};

/// Reduce an operand to a single scalar as seen from cell `(row, col)`
///
/// References read their first sheet. Areas use implicit intersection:
/// a single cell is returned as is, a column picks `row`, a row picks
/// `col`, and a block needs both to fall inside it. A miss is `#VALUE!`.
/// A resolved error value is returned as `Err`.
pub fn resolve_single_value<'a>(
    operand: &ValueEval<'a>,
    row: u32,
    col: u16,
) -> Result<ValueEval<'a>, ErrorCode> {
    let value = match operand {
        ValueEval::Reference(r) => r.value(),
        ValueEval::RefList(_) => return Err(ErrorCode::Value),
        other => match other.as_area() {
            Some(area) => implicit_intersection(area, row, col)?,
            None => other.clone(),
        },
    };
    match value {
        ValueEval::Error(e) => Err(e),
        value => Ok(value),
    }
}

fn implicit_intersection<'a>(
    area: &dyn AreaLike<'a>,
    row: u32,
    col: u16,
) -> Result<ValueEval<'a>, ErrorCode> {
    if area.is_row() && area.is_column() {
        return area.get_value(0, 0);
    }
    if area.is_column() {
        if !area.contains_row(row) {
            return Err(ErrorCode::Value);
        }
        return area.get_absolute_value(row, area.first_col());
    }
    if area.is_row() {
        if !area.contains_column(col) {
            return Err(ErrorCode::Value);
        }
        return area.get_absolute_value(area.first_row(), col);
    }
    if area.contains_row(row) && area.contains_column(col) {
        return area.get_absolute_value(row, col);
    }
    Err(ErrorCode::Value)
}

/// Coerce a resolved scalar to a number
///
/// Blank and missing arguments are 0, booleans 1/0, text must parse as a
/// number under `locale`. Unresolved references are `#VALUE!`.
pub fn coerce_to_double(value: &ValueEval<'_>, locale: &ValueLocale) -> Result<f64, ErrorCode> {
    match value {
        ValueEval::Number(n) if n.is_finite() => Ok(*n),
        ValueEval::Number(_) => Err(ErrorCode::Num),
        ValueEval::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        ValueEval::Blank | ValueEval::MissingArgument => Ok(0.0),
        ValueEval::Text(s) => parse_double(s, locale).ok_or(ErrorCode::Value),
        ValueEval::Error(e) => Err(*e),
        _ => Err(ErrorCode::Value),
    }
}

/// Coerce a resolved scalar to a boolean
///
/// Text other than `TRUE`/`FALSE` (any case) yields `Ok(None)`, as do
/// blank and missing values unless `blank_means_false` is set. Numbers are
/// true when non-zero.
pub fn coerce_to_boolean(
    value: &ValueEval<'_>,
    blank_means_false: bool,
) -> Result<Option<bool>, ErrorCode> {
    match value {
        ValueEval::Boolean(b) => Ok(Some(*b)),
        ValueEval::Number(n) if n.is_nan() => Err(ErrorCode::Value),
        ValueEval::Number(n) => Ok(Some(*n != 0.0)),
        ValueEval::Text(s) => {
            if s.eq_ignore_ascii_case("TRUE") {
                Ok(Some(true))
            } else if s.eq_ignore_ascii_case("FALSE") {
                Ok(Some(false))
            } else {
                Ok(None)
            }
        }
        ValueEval::Blank | ValueEval::MissingArgument => {
            Ok(if blank_means_false { Some(false) } else { None })
        }
        ValueEval::Error(e) => Err(*e),
        _ => Err(ErrorCode::Value),
    }
}

/// Coerce a resolved scalar to text
pub fn coerce_to_string(value: &ValueEval<'_>) -> Result<String, ErrorCode> {
    match value {
        ValueEval::Text(s) => Ok(s.clone()),
        ValueEval::Number(n) => Ok(format_number(*n)),
        ValueEval::Boolean(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        ValueEval::Blank | ValueEval::MissingArgument => Ok(String::new()),
        ValueEval::Error(e) => Err(*e),
        _ => Err(ErrorCode::Value),
    }
}

/// Parse text as a number the way cell entry does
///
/// Accepts surrounding whitespace, a sign, the locale's group and decimal
/// separators, an exponent and a trailing `%`. `inf`, `nan` and empty text
/// are rejected.
pub fn parse_double(text: &str, locale: &ValueLocale) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut normalized = String::with_capacity(trimmed.len());
    let mut seen_decimal = false;
    for (i, &c) in chars.iter().enumerate() {
        if c == locale.decimal_separator {
            if seen_decimal {
                return None;
            }
            seen_decimal = true;
            normalized.push('.');
        } else if c == locale.group_separator {
            // A group separator sits between digits of the integer part and
            // is followed by exactly three digits
            let after = &chars[i + 1..];
            let group_len = after.iter().take_while(|c| c.is_ascii_digit()).count();
            let preceded_by_digit = i > 0 && chars[i - 1].is_ascii_digit();
            if seen_decimal || !preceded_by_digit || group_len != 3 {
                return None;
            }
        } else {
            normalized.push(c);
        }
    }

    if !regex_is_match!(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?%?$", &normalized) {
        return None;
    }

    let (digits, percent) = match normalized.strip_suffix('%') {
        Some(digits) => (digits, true),
        None => (normalized.as_str(), false),
    };
    let n: f64 = digits.parse().ok()?;
    let n = if percent { n / 100.0 } else { n };
    n.is_finite().then_some(n)
}

/// Render a number the way the General format does
///
/// Integers print without decimals and values are rounded to 15
/// significant digits. Very large or very small magnitudes use `1E+20`
/// notation.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if !n.is_finite() {
        return ErrorCode::Num.as_str().to_string();
    }

    let rounded: f64 = format!("{:.14e}", n).parse().unwrap_or(n);
    let magnitude = rounded.abs();

    if (1e-9..1e15).contains(&magnitude) {
        if rounded.fract() == 0.0 {
            return format!("{}", rounded as i64);
        }
        return format!("{}", rounded);
    }

    // Scientific: mantissa without trailing zeros, signed two-digit exponent
    let sci = format!("{:E}", rounded);
    match sci.split_once('E') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}E{}{:02}", mantissa, sign, exp.abs())
        }
        None => sci,
    }
}
