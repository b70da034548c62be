//! `xl/workbook.xml`: the sheet list, defined names, views and calculation
//! settings. Only `sheets` and `definedNames` are regenerated; `bookViews` and
//! `calcPr` get attribute patches and everything else is kept as read.

use crate::error::{ExcelError, Result};
use crate::worksheet::Worksheet;
use crate::xml::{
    attributes, element_attrs, local_name, patch_attrs, read_text, XmlTemplate, DOC_REL_NS,
    WORKBOOK_ORDER,
};
use crate::xml_writer::XmlWriter;
use quick_xml::events::Event;
use quick_xml::Reader;

/// One `<sheet>` entry as read from the file
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    /// `state` and any other attributes
    pub extra: Vec<(String, String)>,
}

/// A `<definedName>`. Sheet-scoped names follow their sheet by part name, so
/// reordering sheets keeps the scope.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DefinedName {
    attrs: Vec<(String, String)>,
    text: String,
    local_index: Option<usize>,
    scope: Option<String>,
}

impl DefinedName {
    pub fn name(&self) -> &str {
        self.attrs
            .iter()
            .find(|(k, _)| k == "name")
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Part name of the sheet this name is local to
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WorkbookXml {
    template: XmlTemplate,
    /// Qualified name of the relationship id attribute on `<sheet>` (`r:id`)
    rel_attr: String,
    sheets: Vec<SheetEntry>,
    names: Vec<DefinedName>,
    date1904: bool,
    active_tab: usize,
    /// `firstSheet` when the file sets it
    first_sheet: Option<usize>,
    active_part: Option<String>,
    first_part: Option<String>,
}

fn truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

impl WorkbookXml {
    pub fn parse(xml: &str) -> Result<Self> {
        let template = XmlTemplate::parse(xml)?;
        let sheets_seg = template
            .segment("sheets")
            .ok_or_else(|| ExcelError::InvalidFormat("workbook has no <sheets> element".into()))?;

        let mut rel_attr = None;
        let mut sheets = Vec::new();
        let mut reader = Reader::from_str(&sheets_seg.xml);
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if local_name(&e) == "sheet" => {
                    let mut entry = SheetEntry {
                        name: String::new(),
                        sheet_id: 0,
                        rel_id: String::new(),
                        extra: Vec::new(),
                    };
                    for (key, value) in attributes(&e)? {
                        match key.as_str() {
                            "name" => entry.name = value,
                            "sheetId" => entry.sheet_id = value.parse().unwrap_or(0),
                            k if k == "id" || k.ends_with(":id") => {
                                rel_attr.get_or_insert_with(|| key.clone());
                                entry.rel_id = value;
                            }
                            _ => entry.extra.push((key, value)),
                        }
                    }
                    if entry.rel_id.is_empty() {
                        return Err(ExcelError::InvalidFormat(format!(
                            "sheet '{}' has no relationship id",
                            entry.name
                        )));
                    }
                    sheets.push(entry);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if sheets.is_empty() {
            return Err(ExcelError::InvalidFormat("workbook lists no sheets".into()));
        }

        let date1904 = match template.segment("workbookPr") {
            Some(seg) => element_attrs(&seg.xml)?
                .iter()
                .any(|(k, v)| k == "date1904" && truthy(v)),
            None => false,
        };

        let (mut active_tab, mut first_sheet) = (0, None);
        if let Some(seg) = template.segment("bookViews") {
            let mut reader = Reader::from_str(&seg.xml);
            loop {
                match reader.read_event()? {
                    Event::Start(e) | Event::Empty(e) if local_name(&e) == "workbookView" => {
                        for (k, v) in attributes(&e)? {
                            match k.as_str() {
                                "activeTab" => active_tab = v.parse().unwrap_or(0),
                                "firstSheet" => first_sheet = Some(v.parse().unwrap_or(0)),
                                _ => {}
                            }
                        }
                        break;
                    }
                    Event::Eof => break,
                    _ => {}
                }
            }
        }

        let names = match template.segment("definedNames") {
            Some(seg) => parse_defined_names(&seg.xml)?,
            None => Vec::new(),
        };

        let rel_attr = rel_attr.unwrap_or_else(|| default_rel_attr(template.head()));
        Ok(WorkbookXml {
            template,
            rel_attr,
            sheets,
            names,
            date1904,
            active_tab,
            first_sheet,
            active_part: None,
            first_part: None,
        })
    }

    /// Sheet entries in file order
    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    pub fn date1904(&self) -> bool {
        self.date1904
    }

    pub fn defined_names(&self) -> &[DefinedName] {
        &self.names
    }

    /// Turn positional references (`localSheetId`, `activeTab`, `firstSheet`)
    /// into part names once the sheets are known
    pub fn bind(&mut self, parts: &[&str]) {
        let part_at = |i: usize| parts.get(i).map(|p| p.to_string());
        for name in &mut self.names {
            name.scope = name.local_index.and_then(part_at);
        }
        self.active_part = part_at(self.active_tab);
        self.first_part = self.first_sheet.and_then(part_at);
    }

    /// Drop names scoped to the sheet stored at `part`
    pub fn remove_scope(&mut self, part: &str) {
        let before = self.names.len();
        self.names.retain(|n| n.scope.as_deref() != Some(part));
        let removed = before - self.names.len();
        if removed > 0 {
            log::debug!("removed {removed} defined names scoped to {part}");
        }
        if self.active_part.as_deref() == Some(part) {
            self.active_part = None;
        }
        if self.first_part.as_deref() == Some(part) {
            self.first_part = None;
        }
    }

    /// Regenerate the part for the current sheet list
    pub fn to_xml(&self, sheets: &[Worksheet], full_calc_on_load: bool) -> Result<String> {
        let t = &self.template;
        let index_of = |part: &str| sheets.iter().position(|s| s.part == part);

        let mut w = XmlWriter::in_memory();
        let sheet_tag = t.qname("sheet");
        w.start_element(&t.qname("sheets"))?;
        w.close_start_tag()?;
        for sheet in sheets {
            w.start_element(&sheet_tag)?;
            w.attribute("name", sheet.name())?;
            w.attribute_int("sheetId", sheet.sheet_id as i64)?;
            for (k, v) in &sheet.sheet_attrs {
                w.attribute(k, v)?;
            }
            w.attribute(&self.rel_attr, &sheet.rel_id)?;
            w.close_empty()?;
        }
        w.end_element(&t.qname("sheets"))?;
        let sheets_xml = w.into_string()?;

        let names_xml = if self.names.is_empty() {
            None
        } else {
            let tag = t.qname("definedName");
            let mut w = XmlWriter::in_memory();
            w.start_element(&t.qname("definedNames"))?;
            w.close_start_tag()?;
            for name in &self.names {
                let local = match &name.scope {
                    Some(part) => match index_of(part.as_str()) {
                        Some(i) => Some(i),
                        None => continue,
                    },
                    None => None,
                };
                w.start_element(&tag)?;
                for (k, v) in &name.attrs {
                    if k == "localSheetId" {
                        if let Some(i) = local {
                            w.attribute_int(k, i as i64)?;
                        }
                    } else {
                        w.attribute(k, v)?;
                    }
                }
                w.close_start_tag()?;
                w.write_escaped(&name.text)?;
                w.end_element(&tag)?;
            }
            w.end_element(&t.qname("definedNames"))?;
            Some(w.into_string()?)
        };

        let mut owned: Vec<(&str, Option<String>)> = vec![
            ("sheets", Some(sheets_xml)),
            ("definedNames", names_xml),
        ];

        if let Some(seg) = t.segment("bookViews") {
            let active = self.active_part.as_deref().and_then(index_of).unwrap_or(0);
            let first = self
                .first_sheet
                .map(|_| self.first_part.as_deref().and_then(index_of).unwrap_or(0));
            let mut patched_first_view = false;
            let views = patch_attrs(&seg.xml, "workbookView", |attrs| {
                if patched_first_view {
                    return;
                }
                patched_first_view = true;
                set_attr(attrs, "activeTab", active);
                if let Some(first) = first {
                    set_attr(attrs, "firstSheet", first);
                }
            })?;
            owned.push(("bookViews", Some(views)));
        }

        if full_calc_on_load {
            let calc = match t.segment("calcPr") {
                Some(seg) => patch_attrs(&seg.xml, "calcPr", |attrs| {
                    match attrs.iter_mut().find(|(k, _)| k == "fullCalcOnLoad") {
                        Some(slot) => slot.1 = "1".to_string(),
                        None => attrs.push(("fullCalcOnLoad".to_string(), "1".to_string())),
                    }
                })?,
                None => format!("<{} fullCalcOnLoad=\"1\"/>", t.qname("calcPr")),
            };
            owned.push(("calcPr", Some(calc)));
        }

        Ok(t.render(WORKBOOK_ORDER, &owned))
    }
}

fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: usize) {
    match attrs.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value.to_string(),
        None => attrs.push((key.to_string(), value.to_string())),
    }
}

fn default_rel_attr(head: &str) -> String {
    let needle = format!("=\"{DOC_REL_NS}\"");
    head.find(&needle)
        .and_then(|end| {
            let start = head[..end].rfind("xmlns:")?;
            Some(format!("{}:id", &head[start + 6..end]))
        })
        .unwrap_or_else(|| "r:id".to_string())
}

fn parse_defined_names(xml: &str) -> Result<Vec<DefinedName>> {
    let mut reader = Reader::from_str(xml);
    let mut names = Vec::new();
    loop {
        let (attrs, text) = match reader.read_event()? {
            Event::Start(e) if local_name(&e) == "definedName" => {
                (attributes(&e)?, read_text(&mut reader, e.name())?)
            }
            Event::Empty(e) if local_name(&e) == "definedName" => (attributes(&e)?, String::new()),
            Event::Eof => break,
            _ => continue,
        };
        let local_index = attrs
            .iter()
            .find(|(k, _)| k == "localSheetId")
            .and_then(|(_, v)| v.parse().ok());
        names.push(DefinedName {
            attrs,
            text,
            local_index,
            scope: None,
        });
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><fileVersion appName="xl"/><workbookPr date1904="1"/><bookViews><workbookView xWindow="0" activeTab="1"/></bookViews><sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Hidden" sheetId="4" state="hidden" r:id="rId2"/></sheets><definedNames><definedName name="_xlnm.Print_Area" localSheetId="1">Hidden!$A$1:$B$2</definedName><definedName name="Total">Data!$C$10</definedName></definedNames><calcPr calcId="191029"/></workbook>"#;

    fn sheet(name: &str, part: &str, id: u32, rel: &str) -> Worksheet {
        Worksheet::new_blank(name.to_string(), part.to_string(), rel.to_string(), id).unwrap()
    }

    #[test]
    fn test_parse_workbook() {
        let book = WorkbookXml::parse(BOOK).unwrap();
        assert!(book.date1904());
        assert_eq!(book.sheets().len(), 2);
        assert_eq!(book.sheets()[1].sheet_id, 4);
        assert_eq!(
            book.sheets()[1].extra,
            vec![("state".to_string(), "hidden".to_string())]
        );
        assert_eq!(book.defined_names()[0].name(), "_xlnm.Print_Area");
        assert_eq!(book.rel_attr, "r:id");
    }

    #[test]
    fn test_scoped_names_follow_their_sheet() {
        let mut book = WorkbookXml::parse(BOOK).unwrap();
        book.bind(&["xl/worksheets/sheet1.xml", "xl/worksheets/sheet2.xml"]);
        assert_eq!(book.defined_names()[0].scope(), Some("xl/worksheets/sheet2.xml"));

        // the hidden sheet moves to the front
        let sheets = vec![
            sheet("Hidden", "xl/worksheets/sheet2.xml", 4, "rId2"),
            sheet("Data", "xl/worksheets/sheet1.xml", 1, "rId1"),
        ];
        let xml = book.to_xml(&sheets, false).unwrap();
        assert!(xml.contains(r#"<definedName name="_xlnm.Print_Area" localSheetId="0">Hidden!$A$1:$B$2</definedName>"#));
        assert!(xml.contains(r#"<workbookView xWindow="0" activeTab="0"/>"#));
        assert!(xml.contains(r#"<sheets><sheet name="Hidden" sheetId="4" r:id="rId2"/><sheet name="Data" sheetId="1" r:id="rId1"/></sheets>"#));
        assert!(xml.contains(r#"<calcPr calcId="191029"/>"#));
        assert!(xml.contains(r#"<fileVersion appName="xl"/><workbookPr date1904="1"/>"#));
    }

    #[test]
    fn test_remove_scope_and_full_calc() {
        let mut book = WorkbookXml::parse(BOOK).unwrap();
        book.bind(&["xl/worksheets/sheet1.xml", "xl/worksheets/sheet2.xml"]);
        book.remove_scope("xl/worksheets/sheet2.xml");
        let sheets = vec![sheet("Data", "xl/worksheets/sheet1.xml", 1, "rId1")];
        let xml = book.to_xml(&sheets, true).unwrap();
        assert!(!xml.contains("Print_Area"));
        assert!(xml.contains(r#"<definedName name="Total">Data!$C$10</definedName>"#));
        assert!(xml.contains(r#"<calcPr calcId="191029" fullCalcOnLoad="1"/>"#));
    }

    #[test]
    fn test_calc_pr_inserted_in_schema_order() {
        let xml = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="A" sheetId="1" rel:id="rId1"/></sheets><extLst/></workbook>"#;
        let book = WorkbookXml::parse(xml).unwrap();
        assert_eq!(book.rel_attr, "rel:id");
        let sheets = vec![sheet("A", "xl/worksheets/sheet1.xml", 1, "rId1")];
        let out = book.to_xml(&sheets, true).unwrap();
        assert!(out.contains(r#"</sheets><calcPr fullCalcOnLoad="1"/><extLst/>"#));
    }

    #[test]
    fn test_default_rel_attr_from_namespace() {
        let head = r#"<workbook xmlns="urn:main" xmlns:q="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#;
        assert_eq!(default_rel_attr(head), "q:id");
        assert_eq!(default_rel_attr("<workbook>"), "r:id");
    }
}
