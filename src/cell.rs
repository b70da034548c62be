//! Mutable cell handle returned by [`SheetMut::cell`](crate::SheetMut::cell)

use crate::error::{ExcelError, Result};
use crate::formula::Formula;
use crate::style::{NumberFormat, Style, StyleId, StylePatch, StyleTable};
use crate::types::{serial_to_datetime, CellRef, CellValue};
use crate::worksheet::{Cell, SheetFlags};
use chrono::{NaiveDateTime, Timelike};

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Edit one cell. Setters return `&mut Self` so calls chain:
///
/// ```
/// # fn main() -> xlsxedit::Result<()> {
/// let mut wb = xlsxedit::Workbook::blank()?;
/// let mut sheet = wb.sheet_mut(0)?;
/// sheet
///     .cell("A1")?
///     .set_value("Title")
///     .set_style(&xlsxedit::StylePatch::new().bold(true))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CellMut<'a> {
    cell: &'a mut Cell,
    at: CellRef,
    styles: &'a mut StyleTable,
    flags: &'a mut SheetFlags,
    date1904: bool,
}

impl<'a> CellMut<'a> {
    pub(crate) fn new(
        cell: &'a mut Cell,
        at: CellRef,
        styles: &'a mut StyleTable,
        flags: &'a mut SheetFlags,
        date1904: bool,
    ) -> Self {
        CellMut {
            cell,
            at,
            styles,
            flags,
            date1904,
        }
    }

    pub fn address(&self) -> CellRef {
        self.at
    }

    /// Current value. For formula cells this is the cached result.
    pub fn value(&self) -> &CellValue {
        &self.cell.value
    }

    /// The value as a date when it is one, or when it is a serial number under
    /// a date format
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        match &self.cell.value {
            CellValue::Date(d) => Some(*d),
            CellValue::Number(n) if self.style().number_format.is_date() => {
                serial_to_datetime(*n, self.date1904)
            }
            _ => None,
        }
    }

    /// Replace the value and drop any formula
    pub fn set_value(&mut self, value: impl Into<CellValue>) -> &mut Self {
        write_value(self.cell, value.into(), self.styles);
        self.flags.dirty = true;
        self
    }

    pub fn formula(&self) -> Option<&Formula> {
        self.cell.formula.as_ref()
    }

    /// Store formula text. The cached value is cleared; the opening application
    /// computes it.
    pub fn set_formula(&mut self, text: &str) -> Result<&mut Self> {
        let formula = Formula::parse(text)?;
        self.cell.formula = Some(formula);
        self.cell.value = CellValue::Empty;
        self.cell.source = None;
        self.flags.dirty = true;
        self.flags.formulas_written = true;
        Ok(self)
    }

    /// Remove value and formula, keeping the format
    pub fn clear(&mut self) -> &mut Self {
        if !self.cell.value.is_empty() || self.cell.formula.is_some() {
            self.cell.value = CellValue::Empty;
            self.cell.formula = None;
            self.cell.source = None;
            self.flags.dirty = true;
        }
        self
    }

    /// Resolved format of the cell
    pub fn style(&self) -> &Style {
        self.styles
            .get(self.cell.style)
            .unwrap_or_else(|| self.styles.default_style())
    }

    pub fn style_id(&self) -> StyleId {
        self.cell.style
    }

    /// Merge `patch` over the current format
    pub fn set_style(&mut self, patch: &StylePatch) -> Result<&mut Self> {
        let id = self.styles.resolve_patch(self.cell.style, patch)?;
        if id != self.cell.style {
            self.cell.style = id;
            self.flags.dirty = true;
        }
        Ok(self)
    }

    /// Point the cell at an existing format
    pub fn set_style_id(&mut self, id: StyleId) -> Result<&mut Self> {
        if !self.styles.is_valid(id) {
            return Err(ExcelError::InvalidStyle(format!(
                "format {id} does not exist ({} formats)",
                self.styles.len()
            )));
        }
        if id != self.cell.style {
            self.cell.style = id;
            self.flags.dirty = true;
        }
        Ok(self)
    }
}

/// Store `value` in `cell`, clearing its formula. A date written into a cell
/// without a date format also gets one, so it does not show as a bare serial.
pub(crate) fn write_value(cell: &mut Cell, value: CellValue, styles: &mut StyleTable) {
    if let CellValue::Date(d) = &value {
        cell.style = date_style(styles, cell.style, d);
    }
    cell.value = value;
    cell.formula = None;
    cell.source = None;
}

fn date_style(styles: &mut StyleTable, base: StyleId, value: &NaiveDateTime) -> StyleId {
    let current = styles.get(base).cloned().unwrap_or_default();
    if current.number_format.is_date() {
        return base;
    }
    let code = if value.num_seconds_from_midnight() == 0 && value.nanosecond() == 0 {
        DATE_FORMAT
    } else {
        DATETIME_FORMAT
    };
    let style = Style {
        number_format: NumberFormat::from_code(code),
        ..current
    };
    styles.resolve(&style)
}
