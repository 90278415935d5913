//! Tolerant numeric parsing and formatting
//!
//! Cell values arrive either as native numbers or as text typed by people using
//! different locales. This module turns both into `f64` without ever failing
//! loudly: anything that cannot be understood becomes `None`, and callers decide
//! what that means (aggregation treats it as 0).
//!
//! # Accepted text forms
//!
//! - `"1234.56"`, `"1,234.56"` (comma as thousands separator)
//! - `"1 234,56"`, `"1 234,56"` (space / non-breaking space grouping, comma decimal)
//! - `"-500 Kč"` (currency and other decoration is stripped)
//!
//! # Example
//!
//! ```
//! use auditsample::util::number::{parse_number, format_integer_with_spaces};
//! use auditsample::source::Cell;
//!
//! assert_eq!(parse_number(&Cell::from("1 234,56")), Some(1234.56));
//! assert_eq!(parse_number(&Cell::from("1,234.56")), Some(1234.56));
//! assert_eq!(parse_number(&Cell::from("abc")), None);
//! assert_eq!(format_integer_with_spaces(1234567.0), "1 234 567");
//! ```

use crate::source::Cell;

/// Parse a cell into a finite number
///
/// Native numbers pass through after a finiteness check. Text is cleaned with
/// [`parse_number_text`]. Empty and boolean cells yield `None`.
pub fn parse_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Number(_) => None,
        Cell::Text(s) => parse_number_text(s),
        Cell::Bool(_) | Cell::Empty => None,
    }
}

/// Parse free-form numeric text
///
/// Steps, in order:
/// 1. trim; empty input is `None`
/// 2. drop all whitespace (including non-breaking spaces)
/// 3. a comma without any dot becomes the decimal separator (first comma only);
///    otherwise every comma is a thousands separator and is removed
/// 4. keep only digits, dots and minus signs
/// 5. parse; a minus anywhere but the front, several dots, or nothing left is `None`
pub fn parse_number_text(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut s: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();

    if s.contains(',') && !s.contains('.') {
        s = s.replacen(',', ".", 1);
    } else {
        s.retain(|c| c != ',');
    }

    s.retain(|c| c.is_ascii_digit() || c == '.' || c == '-');
    if s.is_empty() {
        return None;
    }

    // Only a leading minus is meaningful.
    if s[1..].contains('-') {
        return None;
    }

    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Format a number as a rounded integer with space-separated thousands
///
/// `1234567.4` → `"1 234 567"`, `-1500.0` → `"-1 500"`. The output parses back
/// to the same value with [`parse_number_text`].
pub fn format_integer_with_spaces(n: f64) -> String {
    let rounded = n.round();
    let digits = format!("{}", rounded.abs() as u128);

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locale_variants() {
        assert_eq!(parse_number_text("1 234,56"), Some(1234.56));
        assert_eq!(parse_number_text("1,234.56"), Some(1234.56));
        assert_eq!(parse_number_text("1234.56"), Some(1234.56));
        assert_eq!(parse_number_text("12,5"), Some(12.5));
        assert_eq!(parse_number_text("1\u{a0}234\u{a0}567"), Some(1234567.0));
        assert_eq!(parse_number_text("  42  "), Some(42.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_number_text(""), None);
        assert_eq!(parse_number_text("   "), None);
        assert_eq!(parse_number_text("abc"), None);
        assert_eq!(parse_number_text("-"), None);
        assert_eq!(parse_number_text("."), None);
        assert_eq!(parse_number_text("1.2.3"), None);
        assert_eq!(parse_number_text("12-3"), None);
    }

    #[test]
    fn test_parse_strips_decoration() {
        assert_eq!(parse_number_text("-500 Kč"), Some(-500.0));
        assert_eq!(parse_number_text("$1,000.00"), Some(1000.0));
        // A lone comma is read as the decimal separator.
        assert_eq!(parse_number_text("$1,000"), Some(1.0));
        assert_eq!(parse_number_text("15 %"), Some(15.0));
    }

    #[test]
    fn test_parse_cells() {
        assert_eq!(parse_number(&Cell::Number(3.5)), Some(3.5));
        assert_eq!(parse_number(&Cell::Number(f64::NAN)), None);
        assert_eq!(parse_number(&Cell::Number(f64::INFINITY)), None);
        assert_eq!(parse_number(&Cell::Empty), None);
        assert_eq!(parse_number(&Cell::Bool(true)), None);
        assert_eq!(parse_number(&Cell::from("7,25")), Some(7.25));
    }

    #[test]
    fn test_format_integer_with_spaces() {
        assert_eq!(format_integer_with_spaces(0.0), "0");
        assert_eq!(format_integer_with_spaces(999.0), "999");
        assert_eq!(format_integer_with_spaces(1000.0), "1 000");
        assert_eq!(format_integer_with_spaces(1234567.4), "1 234 567");
        assert_eq!(format_integer_with_spaces(-1500.0), "-1 500");
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        for value in [0.0, 12.0, 1000.0, 98765432.0, -4321.0] {
            let once = parse_number_text(&format_integer_with_spaces(value));
            assert_eq!(once, Some(value));
            let twice = parse_number_text(&format_integer_with_spaces(once.unwrap()));
            assert_eq!(twice, once);
        }
    }
}
