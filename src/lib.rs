//! # xlsxedit
//!
//! Format-preserving editing of existing Excel (`.xlsx`) workbooks.
//!
//! ## Features
//!
//! - **Passthrough**: parts you do not edit (charts, images, pivot tables,
//!   macros, comments) are copied into the output byte-for-byte
//! - **Cells**: values, formulas and dates, one cell or a whole range at a time
//! - **Styles**: patch fonts, fills, borders, alignment and number formats;
//!   identical formats are shared, never duplicated
//! - **Structure**: merges, column widths, row heights, and adding, deleting,
//!   renaming and reordering sheets
//! - **Safe saves**: output is written to a temporary file and renamed over the
//!   target
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xlsxedit::{StylePatch, Workbook};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut wb = Workbook::open("report.xlsx")?;
//!
//! let mut sheet = wb.sheet_mut("Sheet1")?;
//! sheet
//!     .cell("A1")?
//!     .set_value("Title")
//!     .set_style(&StylePatch::new().bold(true).font_size(14.0))?;
//! sheet.cell("D2")?.set_formula("=B2*C2")?;
//! sheet.merge("A1:D1")?;
//! sheet.set_column_width("A", 24.0)?;
//!
//! wb.save("report.xlsx")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Ranges
//!
//! ```rust
//! use xlsxedit::{CellValue, Color, StylePatch, Workbook};
//!
//! # fn main() -> xlsxedit::Result<()> {
//! let mut wb = Workbook::blank()?;
//! let mut sheet = wb.sheet_mut(0)?;
//! sheet
//!     .range("A2:B3")?
//!     .set_values(vec![vec!["north", "12"], vec!["south", "7"]])?
//!     .set_style(&StylePatch::new().fill(Color::from_hex("FFF2CC")?))?;
//! assert_eq!(sheet.value("A3")?, CellValue::from("south"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Configuration
//!
//! Size limits and save behavior come from [`EngineConfig`], built directly,
//! through [`EngineConfig::builder`] or from `XLSXEDIT_*` environment
//! variables with [`EngineConfig::from_env`].

pub mod batch;
pub mod cell;
pub mod config;
pub mod error;
pub mod formula;
mod package;
pub mod range;
mod shared_strings;
pub mod style;
pub mod types;
pub mod workbook;
mod workbook_xml;
pub mod worksheet;
mod xml;
mod xml_writer;

pub use cell::CellMut;
pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{ExcelError, Result};
pub use formula::Formula;
pub use range::RangeMut;
pub use style::{
    Alignment, Border, BorderEdge, BorderStyle, Color, Fill, Font, HorizontalAlignment,
    NumberFormat, Protection, Side, Style, StyleId, StylePatch, StyleTable, Underline,
    VerticalAlignment,
};
pub use types::{CellRef, CellValue, IntoCellRef, IntoRangeRef, RangeRef};
pub use workbook::{SheetKey, Workbook};
pub use worksheet::{Cell, ColumnMut, ColumnProps, RowMut, RowProps, SheetKind, SheetMut, Worksheet};

use std::path::Path;

/// Open a workbook file. Same as [`Workbook::open`].
pub fn load(path: impl AsRef<Path>) -> Result<Workbook> {
    Workbook::open(path)
}

/// A new workbook with a single empty sheet. Same as [`Workbook::blank`].
pub fn load_blank() -> Result<Workbook> {
    Workbook::blank()
}

/// Save `workbook` to `path`. Same as [`Workbook::save`].
pub fn save(workbook: &mut Workbook, path: impl AsRef<Path>) -> Result<()> {
    workbook.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        let _ = std::marker::PhantomData::<ExcelError>;
        let _ = std::marker::PhantomData::<Workbook>;
        let _ = std::marker::PhantomData::<SheetMut<'_>>;
        let _ = std::marker::PhantomData::<RangeMut<'_>>;
    }

    #[test]
    fn test_free_functions() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("blank.xlsx");
        let mut wb = load_blank().unwrap();
        save(&mut wb, &path).unwrap();
        assert_eq!(load(&path).unwrap().sheet_names(), ["Sheet1"]);
    }
}
