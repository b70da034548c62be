//! Formula text storage and syntax checks.
//!
//! Formulas are kept verbatim and never evaluated. The checks here only catch
//! text that no spreadsheet application could parse: empty formulas,
//! unbalanced brackets and unterminated quoted literals.

use crate::error::{ExcelError, Result};
use crate::types::{col_to_letter, MAX_COLS, MAX_ROWS};
use std::fmt;

/// Formula text attached to a cell, stored without the leading `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Formula {
    text: String,
    /// Attributes of the `<f>` element as read from the file (`t`, `ref`, `si`, ...)
    attrs: Vec<(String, String)>,
}

impl Formula {
    /// Validate and store formula text. One leading `=` is optional and dropped.
    ///
    /// ```
    /// use xlsxedit::Formula;
    /// let f = Formula::parse("=B2*C2").unwrap();
    /// assert_eq!(f.text(), "B2*C2");
    /// assert!(Formula::parse("=SUM(A1:A3").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let text = input.strip_prefix('=').unwrap_or(input);
        validate(text).map_err(|reason| ExcelError::InvalidFormula {
            formula: input.to_string(),
            reason,
        })?;
        Ok(Formula {
            text: text.to_string(),
            attrs: Vec::new(),
        })
    }

    /// Formula exactly as found in a worksheet part. No validation: shared-formula
    /// followers legitimately carry empty text.
    pub(crate) fn from_part(text: String, attrs: Vec<(String, String)>) -> Self {
        Formula { text, attrs }
    }

    /// Formula text without the leading `=`
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attributes preserved from the source `<f>` element
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attrs
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `t="shared"` master or follower
    pub fn is_shared(&self) -> bool {
        self.attr("t") == Some("shared")
    }

    /// `t="array"` formula
    pub fn is_array(&self) -> bool {
        self.attr("t") == Some("array")
    }

    /// Group index (`si`) of a shared formula
    pub(crate) fn shared_index(&self) -> Option<u32> {
        if !self.is_shared() {
            return None;
        }
        self.attr("si").and_then(|si| si.trim().parse().ok())
    }

    /// The cell holding a shared formula's text and the `ref` of its group
    pub(crate) fn is_shared_master(&self) -> bool {
        self.is_shared() && self.attr("ref").is_some()
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.text = text;
    }

    /// The same formula as a standalone `<f>`, outside any shared group
    pub(crate) fn detached(&self) -> Formula {
        Formula {
            text: self.text.clone(),
            attrs: self
                .attrs
                .iter()
                .filter(|(k, _)| !matches!(k.as_str(), "t" | "si" | "ref"))
                .cloned()
                .collect(),
        }
    }
}

/// Move the relative references in `text` by `rows` and `cols`, the way a
/// shared formula is filled from its master cell. `$` parts stay put and a
/// reference pushed off the sheet becomes `#REF!`.
pub(crate) fn shift_references(text: &str, rows: i64, cols: i64) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                let end = literal_end(bytes, i, quote);
                out.push_str(&text[i..end]);
                i = end;
                continue;
            }
            // structured references: Table1[[#This Row],[Qty]]
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && (i == 0 || !is_name_byte(bytes[i - 1])) {
            if let Some((end, shifted)) = shift_token(bytes, i, rows, cols) {
                out.push_str(&shifted);
                i = end;
                continue;
            }
        }
        let ch = text[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&text[i..i + ch]);
        i += ch;
    }
    out
}

/// Index just past the quoted literal opening at `start`
fn literal_end(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'$' | b'\\') || b >= 0x80
}

/// A reference must not run into a name, a function call or a sheet prefix
fn ends_token(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i) {
        None => true,
        Some(&b) => !is_name_byte(b) && !matches!(b, b'(' | b'!' | b'['),
    }
}

/// (`$` anchored, 1-based index, index after the part)
type Part = (bool, u32, usize);

fn scan_col(bytes: &[u8], i: usize) -> Option<Part> {
    let absolute = bytes.get(i) == Some(&b'$');
    let start = if absolute { i + 1 } else { i };
    let mut end = start;
    let mut col = 0u32;
    while let Some(b) = bytes.get(end).filter(|b| b.is_ascii_alphabetic()) {
        if end - start == 3 {
            return None;
        }
        col = col * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1);
        end += 1;
    }
    (end > start && col <= MAX_COLS).then_some((absolute, col, end))
}

fn scan_row(bytes: &[u8], i: usize) -> Option<Part> {
    let absolute = bytes.get(i) == Some(&b'$');
    let start = if absolute { i + 1 } else { i };
    let mut end = start;
    let mut row = 0u32;
    while let Some(b) = bytes.get(end).filter(|b| b.is_ascii_digit()) {
        if end - start == 7 {
            return None;
        }
        row = row * 10 + u32::from(b - b'0');
        end += 1;
    }
    (end > start && (1..=MAX_ROWS).contains(&row)).then_some((absolute, row, end))
}

fn moved(part: Part, delta: i64, max: u32) -> Option<u32> {
    let (absolute, index, _) = part;
    if absolute {
        return Some(index);
    }
    let index = i64::from(index) + delta;
    (1..=i64::from(max)).contains(&index).then_some(index as u32)
}

fn col_text(part: Part, delta: i64) -> Option<String> {
    let col = moved(part, delta, MAX_COLS)?;
    Some(format!("{}{}", if part.0 { "$" } else { "" }, col_to_letter(col)))
}

fn row_text(part: Part, delta: i64) -> Option<String> {
    let row = moved(part, delta, MAX_ROWS)?;
    Some(format!("{}{row}", if part.0 { "$" } else { "" }))
}

/// Shift the reference starting at `i`: `A1`, `A:C` or `2:4`.
/// Returns the end of the token and its new text.
fn shift_token(bytes: &[u8], i: usize, rows: i64, cols: i64) -> Option<(usize, String)> {
    if let Some(col) = scan_col(bytes, i) {
        if let Some(row) = scan_row(bytes, col.2).filter(|row| ends_token(bytes, row.2)) {
            let text = match (col_text(col, cols), row_text(row, rows)) {
                (Some(c), Some(r)) => c + &r,
                _ => "#REF!".to_string(),
            };
            return Some((row.2, text));
        }
        if bytes.get(col.2) == Some(&b':') {
            let last = scan_col(bytes, col.2 + 1).filter(|last| ends_token(bytes, last.2))?;
            let text = match (col_text(col, cols), col_text(last, cols)) {
                (Some(a), Some(b)) => format!("{a}:{b}"),
                _ => "#REF!".to_string(),
            };
            return Some((last.2, text));
        }
        return None;
    }
    let first = scan_row(bytes, i)?;
    if bytes.get(first.2) != Some(&b':') {
        return None;
    }
    let last = scan_row(bytes, first.2 + 1).filter(|last| ends_token(bytes, last.2))?;
    let text = match (row_text(first, rows), row_text(last, rows)) {
        (Some(a), Some(b)) => format!("{a}:{b}"),
        _ => "#REF!".to_string(),
    };
    Some((last.2, text))
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "={}", self.text)
    }
}

/// Syntax checks: non-empty, brackets balanced outside string and sheet-name literals.
fn validate(text: &str) -> std::result::Result<(), String> {
    if text.trim().is_empty() {
        return Err("formula is empty".to_string());
    }

    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '"' | '\'' => {
                // "" and '' escape the delimiter inside a literal
                let quote = ch;
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == quote {
                        if chars.peek().map(|&(_, n)| n) == Some(quote) {
                            chars.next();
                            continue;
                        }
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    let kind = if quote == '"' { "string" } else { "sheet name" };
                    return Err(format!("unterminated {kind} starting at position {pos}"));
                }
            }
            '(' | '{' | '[' => stack.push((ch, pos)),
            ')' | '}' | ']' => {
                let expected = match ch {
                    ')' => '(',
                    '}' => '{',
                    _ => '[',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, open_pos)) => {
                        return Err(format!(
                            "'{ch}' at position {pos} does not close '{open}' at position {open_pos}"
                        ))
                    }
                    None => return Err(format!("unexpected '{ch}' at position {pos}")),
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((open, pos)) => Err(format!("unclosed '{open}' at position {pos}")),
        None => Ok(()),
    }
}
