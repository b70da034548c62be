//! Worksheet model: sparse cells, merged ranges, row and column properties.
//!
//! A worksheet keeps every element of its part that the model does not own
//! (views, conditional formats, data validations, drawings, ...) as raw XML and
//! only regenerates `dimension`, `cols`, `sheetData` and `mergeCells` when it
//! has been edited.

mod handle;
mod parse;
mod write;

pub use handle::{ColumnMut, RowMut, SheetMut};

use crate::error::{ExcelError, Result};
use crate::formula::Formula;
use crate::package::blank::BLANK_WORKSHEET;
use crate::style::StyleId;
use crate::types::{letter_to_col, CellRef, CellValue, IntoCellRef, RangeRef};
use crate::xml::XmlTemplate;
use std::collections::BTreeMap;

/// What kind of sheet a workbook entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Worksheet,
    Chartsheet,
    /// Dialog sheets and macro sheets: kept, renamed and reordered, never edited
    Other,
}

/// How a loaded value was stored, so an unchanged value is written back the
/// same way
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ValueSource {
    Shared(u32),
    /// Raw `<is>` element
    Inline(String),
    /// `t="d"` cell with its ISO 8601 text
    IsoDate(String),
}

/// One cell: a value, an optional formula and a format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub(crate) value: CellValue,
    pub(crate) formula: Option<Formula>,
    pub(crate) style: StyleId,
    pub(crate) source: Option<ValueSource>,
    /// Attributes of `<c>` we do not interpret (`cm`, `vm`, `ph`)
    pub(crate) extra: Vec<(String, String)>,
}

impl Cell {
    /// The value, or the cached result when the cell has a formula
    pub fn value(&self) -> &CellValue {
        &self.value
    }

    /// Formula of the cell. A shared-formula follower reports the master's
    /// text moved to this cell.
    pub fn formula(&self) -> Option<&Formula> {
        self.formula.as_ref()
    }

    pub fn style_id(&self) -> StyleId {
        self.style
    }

    /// Nothing to write: no value, formula, format or extra attributes
    pub(crate) fn is_blank(&self) -> bool {
        self.value.is_empty()
            && self.formula.is_none()
            && self.style == StyleId::DEFAULT
            && self.extra.is_empty()
    }

    /// Counts toward the used range
    pub(crate) fn is_used(&self) -> bool {
        !self.value.is_empty() || self.formula.is_some() || self.style != StyleId::DEFAULT
    }
}

/// Column width, visibility and default format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnProps {
    /// Width in characters of the default font
    pub width: Option<f64>,
    pub hidden: bool,
    pub style: Option<StyleId>,
    pub(crate) custom_width: bool,
    pub(crate) extra: Vec<(String, String)>,
}

impl ColumnProps {
    pub(crate) fn is_default(&self) -> bool {
        *self == ColumnProps::default()
    }
}

/// Row height, visibility and default format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowProps {
    /// Height in points
    pub height: Option<f64>,
    pub hidden: bool,
    pub style: Option<StyleId>,
    pub(crate) custom_height: bool,
    pub(crate) extra: Vec<(String, String)>,
}

impl RowProps {
    pub(crate) fn is_default(&self) -> bool {
        *self == RowProps::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SheetFlags {
    /// The part must be regenerated on save
    pub dirty: bool,
    /// A formula was written through the API
    pub formulas_written: bool,
}

/// A sheet of the workbook
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    kind: SheetKind,
    pub(crate) part: String,
    pub(crate) rel_id: String,
    pub(crate) sheet_id: u32,
    /// Attributes of the workbook's `<sheet>` element besides name, id and r:id
    pub(crate) sheet_attrs: Vec<(String, String)>,
    cells: BTreeMap<CellRef, Cell>,
    merges: Vec<RangeRef>,
    columns: BTreeMap<u32, ColumnProps>,
    rows: BTreeMap<u32, RowProps>,
    template: Option<XmlTemplate>,
    pub(crate) flags: SheetFlags,
}

impl Worksheet {
    /// A new, empty worksheet that has no part in the package yet
    pub(crate) fn new_blank(name: String, part: String, rel_id: String, sheet_id: u32) -> Result<Self> {
        let mut sheet = Worksheet::empty(name, SheetKind::Worksheet, part, rel_id, sheet_id);
        sheet.template = Some(XmlTemplate::parse(BLANK_WORKSHEET)?);
        sheet.flags.dirty = true;
        Ok(sheet)
    }

    /// Chartsheets and other sheet types the model does not edit
    pub(crate) fn passthrough(
        name: String,
        kind: SheetKind,
        part: String,
        rel_id: String,
        sheet_id: u32,
    ) -> Self {
        Worksheet::empty(name, kind, part, rel_id, sheet_id)
    }

    fn empty(name: String, kind: SheetKind, part: String, rel_id: String, sheet_id: u32) -> Self {
        Worksheet {
            name,
            kind,
            part,
            rel_id,
            sheet_id,
            sheet_attrs: Vec::new(),
            cells: BTreeMap::new(),
            merges: Vec::new(),
            columns: BTreeMap::new(),
            rows: BTreeMap::new(),
            template: None,
            flags: SheetFlags::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn kind(&self) -> SheetKind {
        self.kind
    }

    /// Only regular worksheets carry cells
    pub fn is_worksheet(&self) -> bool {
        self.kind == SheetKind::Worksheet
    }

    /// `state` of the sheet tab (`visible`, `hidden` or `veryHidden`)
    pub fn visibility(&self) -> &str {
        self.sheet_attrs
            .iter()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.as_str())
            .unwrap_or("visible")
    }

    /// Whether this sheet has edits that have not been saved yet
    pub fn is_dirty(&self) -> bool {
        self.flags.dirty
    }

    /// Read a cell without creating it
    pub fn cell(&self, at: impl IntoCellRef) -> Result<Option<&Cell>> {
        Ok(self.cells.get(&at.into_cell_ref()?))
    }

    /// Value at `at`, `Empty` when the cell does not exist
    pub fn value(&self, at: impl IntoCellRef) -> Result<CellValue> {
        Ok(self
            .cell(at)?
            .map(|c| c.value.clone())
            .unwrap_or_default())
    }

    /// Existing cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells.iter().map(|(at, c)| (*at, c))
    }

    /// Smallest rectangle holding every cell with a value, a formula or a non-default format
    pub fn used_range(&self) -> Option<RangeRef> {
        let mut used = self.cells.iter().filter(|(_, c)| c.is_used()).map(|(at, _)| *at);
        let first = used.next()?;
        let mut range = RangeRef::new(first, first);
        for at in used {
            range = range.union(&RangeRef::new(at, at));
        }
        Some(range)
    }

    pub fn merged_ranges(&self) -> &[RangeRef] {
        &self.merges
    }

    /// The merged range covering `at`, if any. Only its top-left cell is displayed.
    pub fn merge_anchor(&self, at: impl IntoCellRef) -> Result<Option<RangeRef>> {
        let at = at.into_cell_ref()?;
        Ok(self.merges.iter().find(|m| m.contains(at)).copied())
    }

    /// Column properties by letter (`"B"`)
    pub fn column(&self, letter: &str) -> Result<Option<&ColumnProps>> {
        Ok(self.columns.get(&letter_to_col(letter)?))
    }

    pub fn row(&self, row: u32) -> Option<&RowProps> {
        self.rows.get(&row)
    }

    pub fn column_width(&self, letter: &str) -> Result<Option<f64>> {
        Ok(self.column(letter)?.and_then(|c| c.width))
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row(row).and_then(|r| r.height)
    }

    fn require_worksheet(&self) -> Result<()> {
        if self.is_worksheet() {
            Ok(())
        } else {
            Err(ExcelError::InvalidState(format!(
                "'{}' is not a worksheet and cannot be edited",
                self.name
            )))
        }
    }

    pub(crate) fn add_merge(&mut self, range: RangeRef) -> Result<()> {
        if range.is_single_cell() {
            return Err(ExcelError::RangeBounds(format!(
                "cannot merge the single cell {range}"
            )));
        }
        if let Some(existing) = self.merges.iter().find(|m| m.intersects(&range)) {
            return Err(ExcelError::Overlap {
                range: range.to_string(),
                existing: existing.to_string(),
            });
        }
        self.merges.push(range);
        self.flags.dirty = true;
        Ok(())
    }

    /// Remove exactly `range` from the merges. Returns whether it was merged.
    pub(crate) fn remove_merge(&mut self, range: RangeRef) -> bool {
        let before = self.merges.len();
        self.merges.retain(|m| *m != range);
        let removed = self.merges.len() != before;
        if removed {
            self.flags.dirty = true;
        }
        removed
    }

    /// Cell map and edit flags, borrowed together for range edits
    pub(crate) fn cells_mut(&mut self) -> (&mut BTreeMap<CellRef, Cell>, &mut SheetFlags) {
        (&mut self.cells, &mut self.flags)
    }

    /// Number of cells that reference the shared string table
    pub(crate) fn shared_string_refs(&self) -> usize {
        self.cells
            .values()
            .filter(|c| match (&c.value, &c.source) {
                (_, Some(ValueSource::Shared(_))) => true,
                (CellValue::Text(_), None) => c.formula.is_none(),
                _ => false,
            })
            .count()
    }

    /// Mark every format id in use
    pub(crate) fn mark_used_styles(&self, used: &mut [bool]) {
        let mut mark = |id: StyleId| {
            if let Some(slot) = used.get_mut(id.index()) {
                *slot = true;
            }
        };
        self.cells.values().for_each(|c| mark(c.style));
        self.rows.values().filter_map(|r| r.style).for_each(&mut mark);
        self.columns.values().filter_map(|c| c.style).for_each(&mut mark);
        self.rows
            .values()
            .filter_map(inert_row_style)
            .for_each(&mut mark);
    }

    /// Apply an old-to-new format id map after the style table was compacted
    pub(crate) fn remap_styles(&mut self, map: &[Option<u32>]) {
        let remap = |id: StyleId| StyleId(map.get(id.index()).copied().flatten().unwrap_or(0));
        let mut changed = false;
        for cell in self.cells.values_mut() {
            let new = remap(cell.style);
            changed |= new != cell.style;
            cell.style = new;
        }
        for style in self
            .rows
            .values_mut()
            .filter_map(|r| r.style.as_mut())
            .chain(self.columns.values_mut().filter_map(|c| c.style.as_mut()))
        {
            let new = remap(*style);
            changed |= new != *style;
            *style = new;
        }
        for props in self.rows.values_mut() {
            for (_, value) in props.extra.iter_mut().filter(|(k, _)| k == "s") {
                if let Ok(old) = value.parse::<u32>() {
                    let new = remap(StyleId(old));
                    if new.0 != old {
                        *value = new.0.to_string();
                        changed = true;
                    }
                }
            }
        }
        if changed {
            self.flags.dirty = true;
        }
    }
}

/// `s` of a row without `customFormat`: not applied, but still has to point at
/// an existing format
fn inert_row_style(props: &RowProps) -> Option<StyleId> {
    props
        .extra
        .iter()
        .find(|(k, _)| k == "s")
        .and_then(|(_, v)| v.parse().ok())
        .map(StyleId)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Worksheet {
        Worksheet::new_blank(
            "Sheet1".to_string(),
            "xl/worksheets/sheet1.xml".to_string(),
            "rId1".to_string(),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_used_range_ignores_blank_cells() {
        let mut ws = sheet();
        assert_eq!(ws.used_range(), None);
        ws.cells.insert(CellRef::parse("C3").unwrap(), Cell::default());
        assert_eq!(ws.used_range(), None);

        ws.cells.insert(
            CellRef::parse("B2").unwrap(),
            Cell {
                value: CellValue::Number(1.0),
                ..Cell::default()
            },
        );
        ws.cells.insert(
            CellRef::parse("D5").unwrap(),
            Cell {
                style: StyleId(1),
                ..Cell::default()
            },
        );
        assert_eq!(ws.used_range(), Some(RangeRef::parse("B2:D5").unwrap()));
    }

    #[test]
    fn test_merge_overlap_rules() {
        let mut ws = sheet();
        ws.add_merge(RangeRef::parse("A1:B2").unwrap()).unwrap();
        let err = ws.add_merge(RangeRef::parse("B2:C3").unwrap()).unwrap_err();
        assert!(matches!(err, ExcelError::Overlap { .. }));
        let err = ws.add_merge(RangeRef::parse("A1:B2").unwrap()).unwrap_err();
        assert!(matches!(err, ExcelError::Overlap { .. }));
        assert!(ws.add_merge(RangeRef::parse("C1").unwrap()).is_err());

        assert_eq!(
            ws.merge_anchor("B1").unwrap(),
            Some(RangeRef::parse("A1:B2").unwrap())
        );
        assert!(ws.remove_merge(RangeRef::parse("A1:B2").unwrap()));
        assert!(!ws.remove_merge(RangeRef::parse("A1:B2").unwrap()));
        assert!(ws.merged_ranges().is_empty());
    }

    #[test]
    fn test_remap_styles_marks_dirty_only_on_change() {
        let mut ws = sheet();
        ws.flags.dirty = false;
        ws.cells.insert(
            CellRef::parse("A1").unwrap(),
            Cell {
                style: StyleId(2),
                ..Cell::default()
            },
        );
        ws.remap_styles(&[Some(0), None, Some(2)]);
        assert!(!ws.is_dirty());
        ws.remap_styles(&[Some(0), None, Some(1)]);
        assert!(ws.is_dirty());
        assert_eq!(ws.cell("A1").unwrap().unwrap().style_id(), StyleId(1));
    }
}
