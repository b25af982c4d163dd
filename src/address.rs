//! A1-style cell addressing

use std::cmp::Ordering;
use std::fmt;

use crate::error::{ExcelError, Result};

/// Convert a 1-based column number to its letters (1 -> A, 26 -> Z, 27 -> AA)
pub fn column_letters(col: u32) -> String {
    let mut letters = String::new();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters
}

/// Convert column letters back to a 1-based column number ("AA" -> 27)
///
/// Letters are matched case-insensitively. Returns `None` for an empty string,
/// non-letter input, or a value that does not fit in `u32`.
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col)
}

/// A single cell position: column letters plus 1-based row index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    col: u32,
    row: u32,
}

impl CellAddress {
    /// Create an address from 1-based column and row numbers
    pub fn new(col: u32, row: u32) -> Self {
        CellAddress { col, row }
    }

    /// Parse `D5`, `$D$5`, `d5` or `D$5`
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = || ExcelError::InvalidCellReference(reference.to_string());

        let stripped: String = reference.trim().chars().filter(|c| *c != '$').collect();
        let split = stripped
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = stripped.split_at(split);

        let col = column_number(letters).ok_or_else(invalid)?;
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }

        Ok(CellAddress { col, row })
    }

    /// 1-based column number
    pub fn col(&self) -> u32 {
        self.col
    }

    /// 1-based row index
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Column letters of this address
    pub fn column_letters(&self) -> String {
        column_letters(self.col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

// Column first, then row: the order cells take inside a row.
impl Ord for CellAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.col
            .cmp(&other.col)
            .then_with(|| self.row.cmp(&other.row))
    }
}

impl PartialOrd for CellAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(702), "ZZ");
        assert_eq!(column_letters(703), "AAA");
        assert_eq!(column_letters(16384), "XFD");
    }

    #[test]
    fn test_column_number_inverse() {
        for col in 1..=16384 {
            assert_eq!(column_number(&column_letters(col)), Some(col));
        }
        assert_eq!(column_number("xfd"), Some(16384));
        assert_eq!(column_number(""), None);
        assert_eq!(column_number("A1"), None);
    }

    #[test]
    fn test_parse_reference() {
        let addr = CellAddress::parse("$D$5").unwrap();
        assert_eq!(addr.col(), 4);
        assert_eq!(addr.row(), 5);
        assert_eq!(addr.to_string(), "D5");

        assert_eq!(CellAddress::parse("aa10").unwrap().to_string(), "AA10");
        assert!(CellAddress::parse("D0").is_err());
        assert!(CellAddress::parse("5").is_err());
        assert!(CellAddress::parse("D").is_err());
        assert!(CellAddress::parse("A1:B2").is_err());
    }

    #[test]
    fn test_ordering_is_column_then_row() {
        let b5 = CellAddress::parse("B5").unwrap();
        let aa5 = CellAddress::parse("AA5").unwrap();
        let c5 = CellAddress::parse("C5").unwrap();
        assert!(b5 < c5);
        // Plain string comparison would put "AA5" before "B5".
        assert!(b5 < aa5);
        assert!(c5 < aa5);
    }
}
