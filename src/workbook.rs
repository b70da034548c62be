//! The editing session: load a package, edit its model, save it back.

use crate::config::EngineConfig;
use crate::error::{ExcelError, Result};
use crate::package::blank::blank_package;
use crate::package::content_types::{ContentTypes, CT_SHARED_STRINGS, CT_STYLES, CT_WORKSHEET};
use crate::package::relationships::{
    rel_type, Relationships, REL_CALC_CHAIN, REL_OFFICE_DOCUMENT, REL_SHARED_STRINGS, REL_STYLES,
    REL_WORKSHEET,
};
use crate::package::writer::{write_package, SavePlan};
use crate::package::{
    rels_for_part, relative_target, resolve_target, Package, CONTENT_TYPES_PART, ROOT_RELS_PART,
};
use crate::shared_strings::SharedStrings;
use crate::style::StyleTable;
use crate::workbook_xml::WorkbookXml;
use crate::worksheet::{SheetKind, SheetMut, Worksheet};
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Longest sheet name the format accepts
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_NAME_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Addresses a sheet by position (0-based) or by name (case-insensitive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKey<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for SheetKey<'static> {
    fn from(i: usize) -> Self {
        SheetKey::Index(i)
    }
}

impl From<u32> for SheetKey<'static> {
    fn from(i: u32) -> Self {
        SheetKey::Index(i as usize)
    }
}

impl From<i32> for SheetKey<'static> {
    fn from(i: i32) -> Self {
        SheetKey::Index(usize::try_from(i).unwrap_or(usize::MAX))
    }
}

impl<'a> From<&'a str> for SheetKey<'a> {
    fn from(name: &'a str) -> Self {
        SheetKey::Name(name)
    }
}

impl<'a> From<&'a String> for SheetKey<'a> {
    fn from(name: &'a String) -> Self {
        SheetKey::Name(name)
    }
}

impl std::fmt::Display for SheetKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetKey::Index(i) => write!(f, "#{i}"),
            SheetKey::Name(n) => f.write_str(n),
        }
    }
}

/// Check a sheet name against the workbook naming rules
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(ExcelError::InvalidSheetName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.is_empty() {
        return invalid("name is empty");
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return invalid("longer than 31 characters");
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return invalid(&format!("contains '{c}'"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return invalid("starts or ends with an apostrophe");
    }
    Ok(())
}

/// An open workbook.
///
/// Everything the model does not own is kept in the original archive and
/// copied into the output untouched.
///
/// ```
/// use xlsxedit::{StylePatch, Workbook};
///
/// # fn main() -> xlsxedit::Result<()> {
/// let mut wb = Workbook::blank()?;
/// {
///     let mut sheet = wb.sheet_mut("Sheet1")?;
///     sheet.cell("A1")?.set_value("Title").set_style(&StylePatch::new().bold(true))?;
///     sheet.cell("D2")?.set_formula("=B2*C2")?;
/// }
/// wb.add_sheet("Summary")?;
/// let bytes = wb.to_bytes()?;
/// let reopened = Workbook::from_bytes(bytes)?;
/// assert_eq!(reopened.sheet_names(), ["Sheet1", "Summary"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Workbook {
    package: Package,
    config: EngineConfig,
    workbook_part: String,
    book: WorkbookXml,
    sheets: Vec<Worksheet>,
    styles: StyleTable,
    styles_part: Option<String>,
    strings: SharedStrings,
    strings_part: Option<String>,
    rels: Relationships,
    rels_dirty: bool,
    content_types: ContentTypes,
    /// Parts of deleted sheets still present in the archive
    removed_parts: Vec<String>,
    structure_dirty: bool,
    /// A formula was written at some point in this session
    full_calc: bool,
}

/// Output of one save, applied to the model only once the archive is written
struct Staged {
    plan: SavePlan,
    rels: Relationships,
    rels_dirty: bool,
    content_types: ContentTypes,
    styles_part: Option<String>,
    strings_part: Option<String>,
    full_calc: bool,
    rewritten: usize,
}

impl Workbook {
    /// Open a workbook file with the default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Workbook::open_with_config(path, EngineConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        log::debug!("read {} ({} bytes)", path.display(), bytes.len());
        Workbook::from_bytes_with_config(bytes, config)
    }

    /// Load a workbook from archive bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Workbook::from_bytes_with_config(bytes, EngineConfig::default())
    }

    pub fn from_bytes_with_config(bytes: impl Into<Vec<u8>>, config: EngineConfig) -> Result<Self> {
        let package = Package::from_bytes(bytes.into(), &config)?;
        Workbook::load(package, config)
    }

    /// A new workbook with one empty sheet named `Sheet1`
    pub fn blank() -> Result<Self> {
        Workbook::from_bytes(blank_package()?)
    }

    fn load(mut package: Package, config: EngineConfig) -> Result<Self> {
        let content_types = ContentTypes::parse(&package.require_xml(CONTENT_TYPES_PART)?)?;
        let root_rels = Relationships::parse(&package.require_xml(ROOT_RELS_PART)?)?;
        let office = root_rels.first_of_kind(REL_OFFICE_DOCUMENT).ok_or_else(|| {
            ExcelError::InvalidFormat("package has no office document relationship".into())
        })?;
        let workbook_part = resolve_target("", &office.target);

        let rels = Relationships::parse(&package.require_xml(&rels_for_part(&workbook_part))?)?;
        let mut book = WorkbookXml::parse(&package.require_xml(&workbook_part)?)?;

        let styles_part = rels
            .first_of_kind(REL_STYLES)
            .map(|r| resolve_target(&workbook_part, &r.target));
        let styles = match &styles_part {
            Some(part) => match package.read_xml(part)? {
                Some(xml) => StyleTable::load(&xml)?,
                None => {
                    log::warn!("styles part {part} is missing; using default styles");
                    StyleTable::blank()?
                }
            },
            None => StyleTable::blank()?,
        };
        let styles_part = styles_part.filter(|p| package.contains(p));

        let strings_part = rels
            .first_of_kind(REL_SHARED_STRINGS)
            .map(|r| resolve_target(&workbook_part, &r.target))
            .filter(|p| package.contains(p));
        let strings = match &strings_part {
            Some(part) => SharedStrings::load(&package.require_xml(part)?)?,
            None => SharedStrings::new(),
        };

        let mut sheets = Vec::with_capacity(book.sheets().len());
        for entry in book.sheets() {
            let rel = rels.by_id(&entry.rel_id).ok_or_else(|| {
                ExcelError::InvalidFormat(format!(
                    "sheet '{}' points at unknown relationship {}",
                    entry.name, entry.rel_id
                ))
            })?;
            let part = resolve_target(&workbook_part, &rel.target);
            let mut sheet = match rel.kind() {
                REL_WORKSHEET => {
                    let xml = package.require_xml(&part)?;
                    Worksheet::parse(
                        entry.name.clone(),
                        part,
                        entry.rel_id.clone(),
                        entry.sheet_id,
                        &xml,
                        &strings,
                    )?
                }
                kind => {
                    let kind = if kind == "chartsheet" {
                        SheetKind::Chartsheet
                    } else {
                        SheetKind::Other
                    };
                    Worksheet::passthrough(
                        entry.name.clone(),
                        kind,
                        part,
                        entry.rel_id.clone(),
                        entry.sheet_id,
                    )
                }
            };
            sheet.sheet_attrs = entry.extra.clone();
            sheets.push(sheet);
        }

        let parts: Vec<&str> = sheets.iter().map(|s| s.part.as_str()).collect();
        book.bind(&parts);

        log::debug!(
            "loaded workbook {workbook_part}: {} sheets, {} formats, {} shared strings",
            sheets.len(),
            styles.len(),
            strings.count()
        );

        Ok(Workbook {
            package,
            config,
            workbook_part,
            book,
            sheets,
            styles,
            styles_part,
            strings,
            strings_part,
            rels,
            rels_dirty: false,
            content_types,
            removed_parts: Vec::new(),
            structure_dirty: false,
            full_calc: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether serial dates count from 1904 instead of 1900
    pub fn is_date1904(&self) -> bool {
        self.book.date1904()
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn not_found(&self, key: SheetKey<'_>) -> ExcelError {
        ExcelError::SheetNotFound {
            sheet: key.to_string(),
            available: self.sheet_names().join(", "),
        }
    }

    fn find_name(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.sheets
            .iter()
            .position(|s| s.name().to_lowercase() == wanted)
    }

    fn index_of(&self, key: SheetKey<'_>) -> Result<usize> {
        let found = match key {
            SheetKey::Index(i) => (i < self.sheets.len()).then_some(i),
            SheetKey::Name(name) => self.find_name(name),
        };
        found.ok_or_else(|| self.not_found(key))
    }

    /// Position of a sheet in the tab order
    pub fn sheet_index<'k>(&self, key: impl Into<SheetKey<'k>>) -> Result<usize> {
        self.index_of(key.into())
    }

    pub fn sheet<'k>(&self, key: impl Into<SheetKey<'k>>) -> Result<&Worksheet> {
        let index = self.index_of(key.into())?;
        Ok(&self.sheets[index])
    }

    /// Edit a worksheet. Chartsheets and other sheet types are `InvalidState`.
    pub fn sheet_mut<'k>(&mut self, key: impl Into<SheetKey<'k>>) -> Result<SheetMut<'_>> {
        let index = self.index_of(key.into())?;
        let date1904 = self.book.date1904();
        SheetMut::new(&mut self.sheets[index], &mut self.styles, date1904)
    }

    /// The workbook's cell formats
    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Resolve formats directly, e.g. to share one [`StyleId`](crate::StyleId)
    /// across many cells
    pub fn styles_mut(&mut self) -> &mut StyleTable {
        &mut self.styles
    }

    /// Whether anything changed since load or the last save
    pub fn is_dirty(&self) -> bool {
        self.structure_dirty
            || self.rels_dirty
            || self.content_types.is_dirty()
            || self.styles.is_dirty()
            || self.strings.is_dirty()
            || self.sheets.iter().any(|s| s.is_dirty())
    }

    fn check_new_name(&self, name: &str, except: Option<usize>) -> Result<()> {
        validate_sheet_name(name)?;
        match self.find_name(name) {
            Some(i) if Some(i) != except => Err(ExcelError::DuplicateName(name.to_string())),
            _ => Ok(()),
        }
    }

    fn next_sheet_part(&self) -> String {
        let dir = self
            .workbook_part
            .rsplit_once('/')
            .map(|(dir, _)| format!("{dir}/"))
            .unwrap_or_default();
        (1u32..)
            .map(|n| format!("{dir}worksheets/sheet{n}.xml"))
            .find(|part| {
                !self.package.contains(part)
                    && !self.sheets.iter().any(|s| s.part.eq_ignore_ascii_case(part))
            })
            .unwrap_or_else(|| format!("{dir}worksheets/sheet0.xml"))
    }

    /// Append an empty worksheet
    pub fn add_sheet(&mut self, name: &str) -> Result<SheetMut<'_>> {
        self.check_new_name(name, None)?;

        let part = self.next_sheet_part();
        let sheet_id = self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;
        let target = relative_target(&self.workbook_part, &part);
        let sheet = Worksheet::new_blank(name.to_string(), part.clone(), String::new(), sheet_id)?;

        let rel_id = self.rels.add(rel_type(REL_WORKSHEET), target);
        self.content_types.set_override(&part, CT_WORKSHEET);
        self.sheets.push(sheet);
        let index = self.sheets.len() - 1;
        self.sheets[index].rel_id = rel_id;
        self.rels_dirty = true;
        self.structure_dirty = true;
        log::debug!("added sheet '{name}' as {part}");

        let date1904 = self.book.date1904();
        SheetMut::new(&mut self.sheets[index], &mut self.styles, date1904)
    }

    /// Remove a sheet with its part, relationships and sheet-scoped names
    pub fn delete_sheet<'k>(&mut self, key: impl Into<SheetKey<'k>>) -> Result<()> {
        let index = self.index_of(key.into())?;
        if self.sheets.len() == 1 {
            return Err(ExcelError::InvalidState(
                "a workbook must keep at least one sheet".to_string(),
            ));
        }
        let sheet = self.sheets.remove(index);
        self.rels.remove(&sheet.rel_id);
        self.rels_dirty = true;
        self.content_types.remove_override(&sheet.part);
        let sheet_rels = rels_for_part(&sheet.part);
        for part in [&sheet.part, &sheet_rels] {
            if self.package.contains(part) {
                self.removed_parts.push(part.clone());
            }
        }
        self.book.remove_scope(&sheet.part);
        self.structure_dirty = true;
        log::debug!("deleted sheet '{}'", sheet.name());
        Ok(())
    }

    /// Rename a sheet. Formula text that mentions the old name is not rewritten.
    pub fn rename_sheet<'k>(&mut self, key: impl Into<SheetKey<'k>>, new_name: &str) -> Result<()> {
        let index = self.index_of(key.into())?;
        self.check_new_name(new_name, Some(index))?;
        if self.sheets[index].name() != new_name {
            self.sheets[index].set_name(new_name.to_string());
            self.structure_dirty = true;
        }
        Ok(())
    }

    /// Move a sheet to position `to`; the others keep their relative order
    pub fn move_sheet<'k>(&mut self, key: impl Into<SheetKey<'k>>, to: usize) -> Result<()> {
        let index = self.index_of(key.into())?;
        if to >= self.sheets.len() {
            return Err(ExcelError::RangeBounds(format!(
                "position {to} outside 0..{}",
                self.sheets.len()
            )));
        }
        if index != to {
            let sheet = self.sheets.remove(index);
            self.sheets.insert(to, sheet);
            self.structure_dirty = true;
        }
        Ok(())
    }

    /// Drop cell formats nothing refers to. Returns how many were removed.
    ///
    /// Ids of the remaining formats shift down, so every worksheet that used a
    /// shifted id is rewritten on the next save.
    pub fn compact_styles(&mut self) -> usize {
        let mut used = vec![false; self.styles.len()];
        for sheet in &self.sheets {
            sheet.mark_used_styles(&mut used);
        }
        let before = self.styles.len();
        let map = self.styles.compact(&used);
        let removed = before - self.styles.len();
        if removed > 0 {
            for sheet in &mut self.sheets {
                sheet.remap_styles(&map);
            }
        }
        removed
    }

    fn stage(&mut self) -> Result<Staged> {
        let mut plan = SavePlan::new();
        let mut rels = self.rels.clone();
        let mut rels_dirty = self.rels_dirty;
        let mut content_types = self.content_types.clone();
        let base_dir = self
            .workbook_part
            .rsplit_once('/')
            .map(|(dir, _)| format!("{dir}/"))
            .unwrap_or_default();

        for part in &self.removed_parts {
            plan.remove(part);
        }

        let date1904 = self.book.date1904();
        let mut rewritten = 0;
        for sheet in self.sheets.iter().filter(|s| s.is_worksheet() && s.is_dirty()) {
            plan.put(&sheet.part, sheet.to_xml(&mut self.strings, date1904)?);
            rewritten += 1;
        }

        if self.config.drop_calc_chain && (rewritten > 0 || !self.removed_parts.is_empty()) {
            if let Some(rel) = rels.first_of_kind(REL_CALC_CHAIN).cloned() {
                let part = resolve_target(&self.workbook_part, &rel.target);
                log::warn!("dropping calculation chain {part}; it may reference edited cells");
                plan.remove(&part);
                rels.remove(&rel.id);
                content_types.remove_override(&part);
                rels_dirty = true;
            }
        }

        let mut strings_part = self.strings_part.clone();
        if self.strings.is_dirty() {
            let part = match &strings_part {
                Some(part) => part.clone(),
                None => {
                    let part = format!("{base_dir}sharedStrings.xml");
                    rels.add(
                        rel_type(REL_SHARED_STRINGS),
                        relative_target(&self.workbook_part, &part),
                    );
                    content_types.set_override(&part, CT_SHARED_STRINGS);
                    rels_dirty = true;
                    part
                }
            };
            let references: usize = self.sheets.iter().map(|s| s.shared_string_refs()).sum();
            plan.put(&part, self.strings.to_xml(references)?);
            strings_part = Some(part);
        }

        let mut styles_part = self.styles_part.clone();
        if self.styles.is_dirty() {
            let linked = rels
                .first_of_kind(REL_STYLES)
                .map(|rel| resolve_target(&self.workbook_part, &rel.target));
            let part = match (&styles_part, linked) {
                (Some(part), _) => part.clone(),
                (None, Some(part)) => {
                    content_types.set_override(&part, CT_STYLES);
                    part
                }
                (None, None) => {
                    let part = format!("{base_dir}styles.xml");
                    rels.add(rel_type(REL_STYLES), relative_target(&self.workbook_part, &part));
                    content_types.set_override(&part, CT_STYLES);
                    rels_dirty = true;
                    part
                }
            };
            plan.put(&part, self.styles.to_xml()?);
            styles_part = Some(part);
        }

        let formulas = self.sheets.iter().any(|s| s.flags.formulas_written);
        let full_calc = self.config.full_calc_on_load && (formulas || self.full_calc);
        if self.structure_dirty || (formulas && self.config.full_calc_on_load) {
            plan.put(&self.workbook_part, self.book.to_xml(&self.sheets, full_calc)?);
        }

        if rels_dirty {
            plan.put(&rels_for_part(&self.workbook_part), rels.to_xml()?);
        }
        if content_types.is_dirty() {
            plan.put(CONTENT_TYPES_PART, content_types.to_xml()?);
        }

        Ok(Staged {
            plan,
            rels,
            rels_dirty,
            content_types,
            styles_part,
            strings_part,
            full_calc,
            rewritten,
        })
    }

    /// Serialize the workbook. Afterwards the session continues from the
    /// written state.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let staged = self.stage()?;
        let out = write_package(
            &mut self.package,
            staged.plan,
            Cursor::new(Vec::new()),
            self.config.compression_level,
        )
        .map_err(|e| ExcelError::WriteError(e.to_string()))?
        .into_inner();

        self.package = Package::from_bytes(out.clone(), &self.config)?;
        self.rels = staged.rels;
        self.rels_dirty = false;
        self.content_types = staged.content_types;
        self.content_types.mark_saved();
        self.styles_part = staged.styles_part;
        self.strings_part = staged.strings_part;
        self.full_calc = staged.full_calc;
        self.styles.mark_saved();
        self.strings.mark_saved();
        self.removed_parts.clear();
        self.structure_dirty = false;
        for sheet in &mut self.sheets {
            sheet.flags.dirty = false;
            sheet.flags.formulas_written = false;
        }

        log::info!(
            "saved workbook: {} bytes, {} worksheets rewritten{}",
            out.len(),
            staged.rewritten,
            if staged.rels_dirty { ", relationships updated" } else { "" }
        );
        Ok(out)
    }

    /// Write the workbook to `path`. The file is written next to the target
    /// and renamed over it, so a failed save leaves an existing file intact.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_error = |e: std::io::Error| ExcelError::WriteError(format!("{}: {e}", path.display()));
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(bytes).map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    tmp.persist(path).map_err(|e| write_error(e.error))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}
