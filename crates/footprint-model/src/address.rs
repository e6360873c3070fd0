use core::fmt;

use serde::{Deserialize, Serialize};

/// Largest addressable 1-based row. Kept Excel-compatible so FWB documents
/// exported from legacy workbooks never need coordinate remapping.
pub const MAX_ROWS: u32 = 1_048_576;
/// Largest addressable column count (`XFD`).
pub const MAX_COLS: u32 = 16_384;

/// A reference to a single cell within a sheet.
///
/// Rows and columns are **0-indexed**: `row = 0` is spreadsheet row `1`,
/// `col = 0` is column `A`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Render in A1 notation (e.g. `A1`, `BC32`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_name(self.col), self.row + 1)
    }

    /// Parse an A1-style reference. `$` anchors are accepted and ignored;
    /// anchoring carries no meaning for stored cell coordinates.
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let bytes = s.as_bytes();
        let mut idx = 0usize;
        if bytes[0] == b'$' {
            idx = 1;
        }
        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(A1ParseError::MissingColumn);
        }
        let col = name_to_col(&s[col_start..idx])?;
        if col >= MAX_COLS {
            return Err(A1ParseError::ColumnOutOfBounds);
        }

        if idx < bytes.len() && bytes[idx] == b'$' {
            idx += 1;
        }
        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if row_start == idx {
            return Err(A1ParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let row_1_based: u32 = s[row_start..]
            .parse()
            .map_err(|_| A1ParseError::RowOutOfBounds)?;
        if row_1_based == 0 || row_1_based > MAX_ROWS {
            return Err(A1ParseError::RowOutOfBounds);
        }

        Ok(Self {
            row: row_1_based - 1,
            col,
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// An inclusive rectangular window within a sheet, normalized so that
/// `start.row <= end.row` and `start.col <= end.col`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    /// Construct a range from two corners, normalizing if needed.
    pub const fn new(a: CellRef, b: CellRef) -> Self {
        let (top, bottom) = if a.row <= b.row {
            (a.row, b.row)
        } else {
            (b.row, a.row)
        };
        let (left, right) = if a.col <= b.col {
            (a.col, b.col)
        } else {
            (b.col, a.col)
        };
        Self {
            start: CellRef::new(top, left),
            end: CellRef::new(bottom, right),
        }
    }

    #[inline]
    pub const fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    #[inline]
    pub const fn contains_row(&self, row: u32) -> bool {
        row >= self.start.row && row <= self.end.row
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    #[inline]
    pub const fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Iterate the absolute row indices covered by the window, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = u32> {
        self.start.row..=self.end.row
    }

    /// Parse `A1:B2` style text; a bare cell reference is a 1x1 range.
    pub fn from_a1(a1: &str) -> Result<Self, RangeParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(RangeParseError::Empty);
        }
        match s.split_once(':') {
            None => {
                let cell = CellRef::from_a1(s).map_err(RangeParseError::Cell)?;
                Ok(Range::new(cell, cell))
            }
            Some((a, b)) => {
                let start = CellRef::from_a1(a).map_err(RangeParseError::Cell)?;
                let end = CellRef::from_a1(b).map_err(RangeParseError::Cell)?;
                Ok(Range::new(start, end))
            }
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// Split a sheet-qualified window like `Params!A2:F40` (or `'My Params'!A2:F40`)
/// into its sheet name and range parts.
pub fn parse_sheet_range(input: &str) -> Result<(String, Range), RangeParseError> {
    let s = input.trim();
    let Some(bang) = s.rfind('!') else {
        return Err(RangeParseError::MissingSheet);
    };
    let (sheet_part, range_part) = (&s[..bang], &s[bang + 1..]);
    let sheet = if let Some(inner) = sheet_part
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        inner.replace("''", "'")
    } else {
        sheet_part.to_string()
    };
    if sheet.is_empty() {
        return Err(RangeParseError::MissingSheet);
    }
    let range = Range::from_a1(range_part)?;
    Ok((sheet, range))
}

/// Errors parsing an A1 cell reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum A1ParseError {
    Empty,
    MissingColumn,
    MissingRow,
    ColumnOutOfBounds,
    RowOutOfBounds,
    TrailingCharacters,
}

impl fmt::Display for A1ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            A1ParseError::Empty => "empty A1 reference",
            A1ParseError::MissingColumn => "missing column letters in A1 reference",
            A1ParseError::MissingRow => "missing row digits in A1 reference",
            A1ParseError::ColumnOutOfBounds => "column out of bounds in A1 reference",
            A1ParseError::RowOutOfBounds => "row out of bounds in A1 reference",
            A1ParseError::TrailingCharacters => "trailing characters in A1 reference",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for A1ParseError {}

/// Errors parsing an A1 range or sheet-qualified window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RangeParseError {
    Empty,
    MissingSheet,
    Cell(A1ParseError),
}

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeParseError::Empty => f.write_str("empty A1 range"),
            RangeParseError::MissingSheet => f.write_str("missing sheet name in range"),
            RangeParseError::Cell(e) => write!(f, "invalid cell reference in range: {e}"),
        }
    }
}

impl std::error::Error for RangeParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RangeParseError::Cell(e) => Some(e),
            _ => None,
        }
    }
}

fn col_to_name(col: u32) -> String {
    // A1 columns are bijective base-26 over 1-based indices.
    let mut n = col + 1;
    let mut letters = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).expect("column letters are always ASCII")
}

fn name_to_col(s: &str) -> Result<u32, A1ParseError> {
    let mut col: u32 = 0;
    for b in s.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(A1ParseError::ColumnOutOfBounds);
        }
        let v = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or(A1ParseError::ColumnOutOfBounds)?;
    }
    if col == 0 {
        return Err(A1ParseError::ColumnOutOfBounds);
    }
    Ok(col - 1)
}
