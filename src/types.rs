//! Type definitions for cell values and cell/range coordinates

use crate::error::{ExcelError, Result};
use crate::xml_writer::number_text;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

/// Last row supported by the format (1-based)
pub const MAX_ROWS: u32 = 1_048_576;
/// Last column supported by the format (1-based, `XFD`)
pub const MAX_COLS: u32 = 16_384;

/// Represents a single cell value in a worksheet
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell
    #[default]
    Empty,
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Date/time value, stored in the file as a serial number
    Date(NaiveDateTime),
    /// Error value such as `#DIV/0!`
    Error(String),
}

impl CellValue {
    /// Convert cell value to string
    pub fn as_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => number_text(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::Error(e) => e.clone(),
        }
    }

    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Borrow the text of a `Text` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            CellValue::Text(s) => s.trim().parse().ok(),
            CellValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Try to convert to float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse().ok(),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Date(d) => Some(datetime_to_serial(d, false)),
            _ => None,
        }
    }

    /// Try to convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            CellValue::Number(n) => Some(*n != 0.0),
            CellValue::Text(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Try to read the value as a date/time
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Number(n) => serial_to_datetime(*n, false),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<&String> for CellValue {
    fn from(s: &String) -> Self {
        CellValue::Text(s.clone())
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Number(f)
    }
}

impl From<f32> for CellValue {
    fn from(f: f32) -> Self {
        CellValue::Number(f as f64)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Number(i as f64)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Number(i as f64)
    }
}

impl From<u32> for CellValue {
    fn from(i: u32) -> Self {
        CellValue::Number(i as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(d: NaiveDateTime) -> Self {
        CellValue::Date(d)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

const SECONDS_PER_DAY: f64 = 86_400.0;

fn epoch_1900() -> NaiveDateTime {
    // Serial 1 is 1900-01-01 once the phantom 1900-02-29 is accounted for.
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::MIN)
}

fn epoch_1904() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1904, 1, 1)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::MIN)
}

fn leap_bug_cutoff() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 3, 1)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::MIN)
}

/// Convert a date/time to a serial number in the given date system.
///
/// The 1900 system counts the nonexistent 1900-02-29, so dates before March 1900
/// are shifted by one day.
pub fn datetime_to_serial(dt: &NaiveDateTime, date1904: bool) -> f64 {
    let (epoch, shift) = if date1904 {
        (epoch_1904(), 0.0)
    } else if *dt < leap_bug_cutoff() {
        (epoch_1900(), -1.0)
    } else {
        (epoch_1900(), 0.0)
    };
    let delta = *dt - epoch;
    let millis = delta.num_milliseconds() as f64;
    millis / 1000.0 / SECONDS_PER_DAY + shift
}

/// Convert a serial number back to a date/time.
///
/// Serial 60 (the phantom 1900-02-29) maps to 1900-02-28. Returns `None` for
/// negative or out-of-range serials.
pub fn serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_466.0 {
        return None;
    }
    let (epoch, serial) = if date1904 {
        (epoch_1904(), serial)
    } else if serial < 60.0 {
        (epoch_1900(), serial + 1.0)
    } else if serial < 61.0 {
        (epoch_1900(), 60.0 + serial.fract())
    } else {
        (epoch_1900(), serial)
    };
    let millis = (serial * SECONDS_PER_DAY * 1000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Convert a 1-based column number to letters (1 -> A, 26 -> Z, 27 -> AA)
pub fn col_to_letter(col: u32) -> String {
    let mut result = String::new();
    let mut col = col;

    while col > 0 {
        col -= 1;
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }

    result
}

/// Convert column letters to a 1-based column number (`A` -> 1, `xfd` -> 16384)
pub fn letter_to_col(letters: &str) -> Result<u32> {
    let letters = letters.trim().trim_start_matches('$');
    if letters.is_empty() || letters.len() > 3 {
        return Err(ExcelError::InvalidCell(format!(
            "invalid column letters '{letters}'"
        )));
    }
    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(ExcelError::InvalidCell(format!(
                "invalid column letters '{letters}'"
            )));
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    if col > MAX_COLS {
        return Err(ExcelError::RangeBounds(format!(
            "column {letters} is beyond {}",
            col_to_letter(MAX_COLS)
        )));
    }
    Ok(col)
}

fn check_bounds(row: u32, col: u32) -> Result<()> {
    if row == 0 || row > MAX_ROWS {
        return Err(ExcelError::RangeBounds(format!(
            "row {row} outside 1..={MAX_ROWS}"
        )));
    }
    if col == 0 || col > MAX_COLS {
        return Err(ExcelError::RangeBounds(format!(
            "column {col} outside 1..={MAX_COLS}"
        )));
    }
    Ok(())
}

/// A single cell coordinate (1-based). Orders row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    /// Create a reference, validating it against the sheet limits
    pub fn new(row: u32, col: u32) -> Result<Self> {
        check_bounds(row, col)?;
        Ok(CellRef { row, col })
    }

    /// Parse an `A1`-style reference. `$` markers are accepted and dropped.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let bytes = trimmed.as_bytes();
        let mut i = 0;
        if bytes.first() == Some(&b'$') {
            i += 1;
        }
        let letters_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let letters = &trimmed[letters_start..i];
        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }
        let digits = &trimmed[i..];
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ExcelError::InvalidCell(s.to_string()));
        }
        let col = letter_to_col(letters)?;
        let row: u32 = digits
            .parse()
            .map_err(|_| ExcelError::RangeBounds(format!("row {digits} outside 1..={MAX_ROWS}")))?;
        CellRef::new(row, col)
    }

    /// Column letters of this reference
    pub fn col_letter(&self) -> String {
        col_to_letter(self.col)
    }

    /// `A1`-style text
    pub fn to_a1(&self) -> String {
        let mut s = col_to_letter(self.col);
        let mut buf = itoa::Buffer::new();
        s.push_str(buf.format(self.row));
        s
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

impl FromStr for CellRef {
    type Err = ExcelError;

    fn from_str(s: &str) -> Result<Self> {
        CellRef::parse(s)
    }
}

/// A rectangular span of cells. `start` is always the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeRef {
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRef {
    /// Build a range from any two corners
    pub fn new(a: CellRef, b: CellRef) -> Self {
        RangeRef {
            start: CellRef {
                row: a.row.min(b.row),
                col: a.col.min(b.col),
            },
            end: CellRef {
                row: a.row.max(b.row),
                col: a.col.max(b.col),
            },
        }
    }

    /// Parse `A1:D4` (or a single `A1`)
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((a, b)) => Ok(RangeRef::new(CellRef::parse(a)?, CellRef::parse(b)?)),
            None => {
                let cell = CellRef::parse(s)?;
                Ok(RangeRef::new(cell, cell))
            }
        }
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    /// Number of cells covered
    pub fn cell_count(&self) -> u64 {
        self.height() as u64 * self.width() as u64
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    pub fn intersects(&self, other: &RangeRef) -> bool {
        self.start.row <= other.end.row
            && other.start.row <= self.end.row
            && self.start.col <= other.end.col
            && other.start.col <= self.end.col
    }

    /// Smallest range covering both
    pub fn union(&self, other: &RangeRef) -> RangeRef {
        RangeRef {
            start: CellRef {
                row: self.start.row.min(other.start.row),
                col: self.start.col.min(other.start.col),
            },
            end: CellRef {
                row: self.end.row.max(other.end.row),
                col: self.end.col.max(other.end.col),
            },
        }
    }

    /// Cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        let (start, end) = (self.start, self.end);
        (start.row..=end.row)
            .flat_map(move |row| (start.col..=end.col).map(move |col| CellRef { row, col }))
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for RangeRef {
    type Err = ExcelError;

    fn from_str(s: &str) -> Result<Self> {
        RangeRef::parse(s)
    }
}

/// Anything that names a single cell: `"B2"`, `(2, 2)` as (row, column), or a [`CellRef`].
pub trait IntoCellRef {
    fn into_cell_ref(self) -> Result<CellRef>;
}

impl IntoCellRef for CellRef {
    fn into_cell_ref(self) -> Result<CellRef> {
        check_bounds(self.row, self.col)?;
        Ok(self)
    }
}

impl IntoCellRef for &str {
    fn into_cell_ref(self) -> Result<CellRef> {
        CellRef::parse(self)
    }
}

impl IntoCellRef for &String {
    fn into_cell_ref(self) -> Result<CellRef> {
        CellRef::parse(self)
    }
}

impl IntoCellRef for String {
    fn into_cell_ref(self) -> Result<CellRef> {
        CellRef::parse(&self)
    }
}

impl IntoCellRef for (u32, u32) {
    fn into_cell_ref(self) -> Result<CellRef> {
        CellRef::new(self.0, self.1)
    }
}

/// Anything that names a range: `"A1:D4"`, a [`RangeRef`], or a pair of cell addresses.
pub trait IntoRangeRef {
    fn into_range_ref(self) -> Result<RangeRef>;
}

impl IntoRangeRef for RangeRef {
    fn into_range_ref(self) -> Result<RangeRef> {
        check_bounds(self.start.row, self.start.col)?;
        check_bounds(self.end.row, self.end.col)?;
        Ok(self)
    }
}

impl IntoRangeRef for &str {
    fn into_range_ref(self) -> Result<RangeRef> {
        RangeRef::parse(self)
    }
}

impl IntoRangeRef for &String {
    fn into_range_ref(self) -> Result<RangeRef> {
        RangeRef::parse(self)
    }
}

impl IntoRangeRef for String {
    fn into_range_ref(self) -> Result<RangeRef> {
        RangeRef::parse(&self)
    }
}

impl<A: IntoCellRef, B: IntoCellRef> IntoRangeRef for (A, B) {
    fn into_range_ref(self) -> Result<RangeRef> {
        Ok(RangeRef::new(self.0.into_cell_ref()?, self.1.into_cell_ref()?))
    }
}
