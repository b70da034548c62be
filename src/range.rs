//! Rectangular range handle returned by [`SheetMut::range`](crate::SheetMut::range)

use crate::cell::write_value;
use crate::error::{ExcelError, Result};
use crate::style::{Style, StyleId, StylePatch, StyleTable};
use crate::types::{CellRef, CellValue, RangeRef};
use crate::worksheet::Worksheet;
use std::collections::HashMap;

/// Largest range a single bulk write may touch (2^22 cells)
pub const MAX_RANGE_CELLS: u64 = 4_194_304;

/// Edit a block of cells at once
#[derive(Debug)]
pub struct RangeMut<'a> {
    sheet: &'a mut Worksheet,
    styles: &'a mut StyleTable,
    range: RangeRef,
    date1904: bool,
}

impl<'a> RangeMut<'a> {
    pub(crate) fn new(
        sheet: &'a mut Worksheet,
        styles: &'a mut StyleTable,
        range: RangeRef,
        date1904: bool,
    ) -> Self {
        RangeMut {
            sheet,
            styles,
            range,
            date1904,
        }
    }

    pub fn address(&self) -> RangeRef {
        self.range
    }

    /// Whether the workbook stores dates relative to 1904
    pub fn is_date1904(&self) -> bool {
        self.date1904
    }

    fn check_size(&self) -> Result<()> {
        let count = self.range.cell_count();
        if count > MAX_RANGE_CELLS {
            return Err(ExcelError::RangeBounds(format!(
                "range {} covers {count} cells, more than {MAX_RANGE_CELLS}",
                self.range
            )));
        }
        Ok(())
    }

    /// Values row by row; missing cells read as `Empty`
    pub fn values(&self) -> Result<Vec<Vec<CellValue>>> {
        self.check_size()?;
        let RangeRef { start, end } = self.range;
        let mut rows = Vec::with_capacity(self.range.height() as usize);
        for row in start.row..=end.row {
            let mut values = Vec::with_capacity(self.range.width() as usize);
            for col in start.col..=end.col {
                values.push(self.sheet.value((row, col))?);
            }
            rows.push(values);
        }
        Ok(rows)
    }

    /// Write the same value into every cell of the range
    pub fn set_value(&mut self, value: impl Into<CellValue>) -> Result<&mut Self> {
        self.check_size()?;
        let value = value.into();
        let (cells, flags) = self.sheet.cells_mut();
        for at in self.range.cells() {
            write_value(cells.entry(at).or_default(), value.clone(), self.styles);
        }
        flags.dirty = true;
        Ok(self)
    }

    /// Write a grid of values whose shape matches the range exactly
    pub fn set_values<V: Into<CellValue>>(&mut self, rows: Vec<Vec<V>>) -> Result<&mut Self> {
        let (height, width) = (self.range.height() as usize, self.range.width() as usize);
        if rows.len() != height || rows.iter().any(|r| r.len() != width) {
            return Err(ExcelError::RangeBounds(format!(
                "values do not match the {width}x{height} shape of {}",
                self.range
            )));
        }
        let (cells, flags) = self.sheet.cells_mut();
        let start = self.range.start;
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                let at = CellRef {
                    row: start.row + r as u32,
                    col: start.col + c as u32,
                };
                write_value(cells.entry(at).or_default(), value.into(), self.styles);
            }
        }
        flags.dirty = true;
        Ok(self)
    }

    /// Remove values and formulas, keeping formats
    pub fn clear(&mut self) -> Result<&mut Self> {
        let (cells, flags) = self.sheet.cells_mut();
        let range = self.range;
        for (_, cell) in cells
            .range_mut(range.start..=range.end)
            .filter(|(at, _)| range.contains(**at))
        {
            if !cell.value.is_empty() || cell.formula.is_some() {
                cell.value = CellValue::Empty;
                cell.formula = None;
                cell.source = None;
                flags.dirty = true;
            }
        }
        Ok(self)
    }

    /// Merge `patch` over the current format of every cell in the range
    pub fn set_style(&mut self, patch: &StylePatch) -> Result<&mut Self> {
        self.check_size()?;
        // Reject invalid attributes before any cell changes.
        patch.apply(&Style::default())?;
        let mut resolved: HashMap<StyleId, StyleId> = HashMap::new();
        let (cells, flags) = self.sheet.cells_mut();
        for at in self.range.cells() {
            let cell = cells.entry(at).or_default();
            let id = match resolved.get(&cell.style) {
                Some(id) => *id,
                None => {
                    let id = self.styles.resolve_patch(cell.style, patch)?;
                    resolved.insert(cell.style, id);
                    id
                }
            };
            cell.style = id;
        }
        flags.dirty = true;
        Ok(self)
    }

    /// Whether exactly this range is merged
    pub fn merged(&self) -> bool {
        self.sheet.merged_ranges().contains(&self.range)
    }

    /// Merge or unmerge the range. Merging a range that is already merged as a
    /// whole does nothing; merging over any other merge is an `Overlap`.
    pub fn set_merged(&mut self, merged: bool) -> Result<&mut Self> {
        match (merged, self.merged()) {
            (true, true) | (false, false) => {}
            (true, false) => self.sheet.add_merge(self.range)?,
            (false, true) => {
                self.sheet.remove_merge(self.range);
            }
        }
        Ok(self)
    }
}
