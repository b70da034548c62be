use super::{ColumnProps, RowProps, SheetFlags, Worksheet};
use crate::cell::CellMut;
use crate::error::{ExcelError, Result};
use crate::range::RangeMut;
use crate::style::StyleTable;
use crate::types::{letter_to_col, IntoCellRef, IntoRangeRef, MAX_ROWS};
use std::ops::Deref;

/// Mutable access to one worksheet. Dereferences to [`Worksheet`] for reads.
#[derive(Debug)]
pub struct SheetMut<'a> {
    pub(crate) sheet: &'a mut Worksheet,
    pub(crate) styles: &'a mut StyleTable,
    pub(crate) date1904: bool,
}

impl Deref for SheetMut<'_> {
    type Target = Worksheet;

    fn deref(&self) -> &Worksheet {
        &*self.sheet
    }
}

impl<'a> SheetMut<'a> {
    pub(crate) fn new(
        sheet: &'a mut Worksheet,
        styles: &'a mut StyleTable,
        date1904: bool,
    ) -> Result<Self> {
        sheet.require_worksheet()?;
        Ok(SheetMut {
            sheet,
            styles,
            date1904,
        })
    }

    /// Handle to a cell, creating an empty one if it does not exist
    pub fn cell(&mut self, at: impl IntoCellRef) -> Result<CellMut<'_>> {
        let at = at.into_cell_ref()?;
        let Worksheet { cells, flags, .. } = &mut *self.sheet;
        let cell = cells.entry(at).or_default();
        Ok(CellMut::new(cell, at, &mut *self.styles, flags, self.date1904))
    }

    /// Handle to a rectangular range
    pub fn range(&mut self, range: impl IntoRangeRef) -> Result<RangeMut<'_>> {
        let range = range.into_range_ref()?;
        Ok(RangeMut::new(
            &mut *self.sheet,
            &mut *self.styles,
            range,
            self.date1904,
        ))
    }

    /// Merge `range`. Fails with `Overlap` if it intersects any existing merge,
    /// including an identical one.
    pub fn merge(&mut self, range: impl IntoRangeRef) -> Result<()> {
        self.sheet.add_merge(range.into_range_ref()?)
    }

    /// Remove the merge exactly matching `range`. Returns whether it existed.
    pub fn unmerge(&mut self, range: impl IntoRangeRef) -> Result<bool> {
        Ok(self.sheet.remove_merge(range.into_range_ref()?))
    }

    /// Handle to a column's properties by letter (`"B"`)
    pub fn column(&mut self, letter: &str) -> Result<ColumnMut<'_>> {
        let col = letter_to_col(letter)?;
        let Worksheet { columns, flags, .. } = &mut *self.sheet;
        Ok(ColumnMut {
            props: columns.entry(col).or_default(),
            flags,
            col,
        })
    }

    /// Handle to a row's properties (1-based)
    pub fn row(&mut self, row: u32) -> Result<RowMut<'_>> {
        if row == 0 || row > MAX_ROWS {
            return Err(ExcelError::RangeBounds(format!(
                "row {row} outside 1..={MAX_ROWS}"
            )));
        }
        let Worksheet { rows, flags, .. } = &mut *self.sheet;
        Ok(RowMut {
            props: rows.entry(row).or_default(),
            flags,
            row,
        })
    }

    /// Column width in characters (0-255)
    pub fn set_column_width(&mut self, letter: &str, width: f64) -> Result<()> {
        self.column(letter)?.set_width(width)?;
        Ok(())
    }

    /// Row height in points (0-409)
    pub fn set_row_height(&mut self, row: u32, height: f64) -> Result<()> {
        self.row(row)?.set_height(height)?;
        Ok(())
    }
}

/// Mutable access to one column's properties
#[derive(Debug)]
pub struct ColumnMut<'a> {
    props: &'a mut ColumnProps,
    flags: &'a mut SheetFlags,
    col: u32,
}

impl ColumnMut<'_> {
    /// 1-based column number
    pub fn index(&self) -> u32 {
        self.col
    }

    pub fn width(&self) -> Option<f64> {
        self.props.width
    }

    pub fn set_width(&mut self, width: f64) -> Result<&mut Self> {
        if !(0.0..=255.0).contains(&width) {
            return Err(ExcelError::RangeBounds(format!(
                "column width {width} outside 0-255"
            )));
        }
        self.props.width = Some(width);
        self.props.custom_width = true;
        self.flags.dirty = true;
        Ok(self)
    }

    pub fn hidden(&self) -> bool {
        self.props.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) -> &mut Self {
        if self.props.hidden != hidden {
            self.props.hidden = hidden;
            self.flags.dirty = true;
        }
        self
    }
}

/// Mutable access to one row's properties
#[derive(Debug)]
pub struct RowMut<'a> {
    props: &'a mut RowProps,
    flags: &'a mut SheetFlags,
    row: u32,
}

impl RowMut<'_> {
    pub fn index(&self) -> u32 {
        self.row
    }

    pub fn height(&self) -> Option<f64> {
        self.props.height
    }

    pub fn set_height(&mut self, height: f64) -> Result<&mut Self> {
        if !(0.0..=409.0).contains(&height) {
            return Err(ExcelError::RangeBounds(format!(
                "row height {height} outside 0-409"
            )));
        }
        self.props.height = Some(height);
        self.props.custom_height = true;
        self.flags.dirty = true;
        Ok(self)
    }

    pub fn hidden(&self) -> bool {
        self.props.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) -> &mut Self {
        if self.props.hidden != hidden {
            self.props.hidden = hidden;
            self.flags.dirty = true;
        }
        self
    }
}
