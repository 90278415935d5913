//! CLI to Config conversion utilities

use anyhow::{Context, Result};

/// Parse a column reference to a 0-based index
///
/// Accepts spreadsheet letters (`A`, `c`, `AB`) or a 1-based number (`3`).
pub fn parse_column(s: &str) -> Result<usize> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty column reference");
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        let number: usize = s.parse().with_context(|| format!("Invalid column number: {}", s))?;
        if number == 0 {
            anyhow::bail!("Column numbers start at 1, got 0");
        }
        return Ok(number - 1);
    }

    if !s.chars().all(|c| c.is_ascii_alphabetic()) {
        anyhow::bail!("Invalid column reference: {}. Use letters (A, AB) or a number (1, 28)", s);
    }

    let mut index: usize = 0;
    for c in s.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .with_context(|| format!("Column reference too large: {}", s))?;
    }
    Ok(index - 1)
}

/// Spreadsheet letters for a 0-based column index
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Parse a delimiter name or character to a byte
pub fn parse_delimiter(s: &str) -> Result<u8> {
    match s {
        "tab" | "\\t" | "\t" => return Ok(b'\t'),
        "comma" => return Ok(b','),
        "semicolon" => return Ok(b';'),
        _ => {}
    }
    let bytes = s.as_bytes();
    if bytes.len() != 1 {
        anyhow::bail!("Delimiter must be a single ASCII character, got '{}'", s);
    }
    Ok(bytes[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_letters() {
        assert_eq!(parse_column("A").unwrap(), 0);
        assert_eq!(parse_column("c").unwrap(), 2);
        assert_eq!(parse_column("Z").unwrap(), 25);
        assert_eq!(parse_column("AA").unwrap(), 26);
        assert_eq!(parse_column("AB").unwrap(), 27);
        assert_eq!(parse_column(" XFD ").unwrap(), 16383);
    }

    #[test]
    fn test_parse_column_numbers() {
        assert_eq!(parse_column("1").unwrap(), 0);
        assert_eq!(parse_column("28").unwrap(), 27);
        assert!(parse_column("0").is_err());
    }

    #[test]
    fn test_parse_column_invalid() {
        assert!(parse_column("").is_err());
        assert!(parse_column("A1").is_err());
        assert!(parse_column("-3").is_err());
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(16383), "XFD");
        for i in [0, 5, 25, 26, 51, 52, 701, 702, 9999] {
            assert_eq!(parse_column(&column_letter(i)).unwrap(), i);
        }
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter("semicolon").unwrap(), b';');
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }
}
