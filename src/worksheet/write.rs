use super::{Cell, ColumnProps, RowProps, ValueSource, Worksheet};
use crate::error::{ExcelError, Result};
use crate::formula::Formula;
use crate::shared_strings::SharedStrings;
use crate::types::{datetime_to_serial, CellRef, CellValue, RangeRef};
use crate::xml::{XmlTemplate, WORKSHEET_ORDER};
use crate::xml_writer::{number_text, XmlWriter};
use std::collections::{BTreeSet, HashSet};

type Out = XmlWriter<Vec<u8>>;

/// Qualified element names in the part's namespace prefix
struct Names {
    row: String,
    c: String,
    f: String,
    v: String,
}

impl Names {
    fn new(t: &XmlTemplate) -> Self {
        Names {
            row: t.qname("row"),
            c: t.qname("c"),
            f: t.qname("f"),
            v: t.qname("v"),
        }
    }
}

impl Worksheet {
    /// Regenerate the worksheet part. New text values are interned into `strings`.
    pub(crate) fn to_xml(&self, strings: &mut SharedStrings, date1904: bool) -> Result<String> {
        let t = self.template.as_ref().ok_or_else(|| {
            ExcelError::InvalidState(format!("sheet '{}' has no worksheet part", self.name))
        })?;

        let dimension = {
            let mut written = self.cells.iter().filter(|(_, c)| !c.is_blank()).map(|(at, _)| *at);
            let range = match written.next() {
                Some(first) => written.fold(RangeRef::new(first, first), |acc, at| {
                    acc.union(&RangeRef::new(at, at))
                }),
                None => RangeRef::new(CellRef { row: 1, col: 1 }, CellRef { row: 1, col: 1 }),
            };
            let mut w = XmlWriter::in_memory();
            w.start_element(&t.qname("dimension"))?;
            w.attribute("ref", &range.to_string())?;
            w.close_empty()?;
            w.into_string()?
        };

        let cols = self.write_cols(t)?;
        let sheet_data = self.write_sheet_data(t, strings, date1904)?;
        let merges = self.write_merges(t)?;

        Ok(t.render(
            WORKSHEET_ORDER,
            &[
                ("dimension", Some(dimension)),
                ("cols", cols),
                ("sheetData", Some(sheet_data)),
                ("mergeCells", merges),
            ],
        ))
    }

    fn write_cols(&self, t: &XmlTemplate) -> Result<Option<String>> {
        let mut spans: Vec<(u32, u32, &ColumnProps)> = Vec::new();
        for (&col, props) in self.columns.iter().filter(|(_, p)| !p.is_default()) {
            match spans.last_mut() {
                Some((_, max, last)) if *max + 1 == col && *last == props => *max = col,
                _ => spans.push((col, col, props)),
            }
        }
        if spans.is_empty() {
            return Ok(None);
        }

        let mut w = XmlWriter::in_memory();
        w.start_element(&t.qname("cols"))?;
        w.close_start_tag()?;
        for (min, max, props) in spans {
            w.start_element(&t.qname("col"))?;
            w.attribute_int("min", min as i64)?;
            w.attribute_int("max", max as i64)?;
            if let Some(width) = props.width {
                w.attribute_num("width", width)?;
            }
            if let Some(style) = props.style {
                w.attribute_int("style", style.0 as i64)?;
            }
            if props.hidden {
                w.attribute("hidden", "1")?;
            }
            if props.custom_width {
                w.attribute("customWidth", "1")?;
            }
            for (k, v) in &props.extra {
                w.attribute(k, v)?;
            }
            w.close_empty()?;
        }
        w.end_element(&t.qname("cols"))?;
        Ok(Some(w.into_string()?))
    }

    fn write_sheet_data(
        &self,
        t: &XmlTemplate,
        strings: &mut SharedStrings,
        date1904: bool,
    ) -> Result<String> {
        let names = Names::new(t);
        let groups = self.shared_groups();
        let mut row_numbers: BTreeSet<u32> = self.rows.keys().copied().collect();
        row_numbers.extend(
            self.cells
                .iter()
                .filter(|(_, c)| !c.is_blank())
                .map(|(at, _)| at.row),
        );

        let mut w = XmlWriter::in_memory();
        let sheet_data = t.qname("sheetData");
        w.start_element(&sheet_data)?;
        if row_numbers.is_empty() {
            w.close_empty()?;
            return w.into_string();
        }
        w.close_start_tag()?;

        let default_props = RowProps::default();
        for row in row_numbers {
            let props = self.rows.get(&row).unwrap_or(&default_props);
            let start = CellRef { row, col: 1 };
            let end = CellRef {
                row,
                col: crate::types::MAX_COLS,
            };
            let mut cells = self
                .cells
                .range(start..=end)
                .filter(|(_, c)| !c.is_blank())
                .peekable();

            w.start_element(&names.row)?;
            w.attribute_int("r", row as i64)?;
            write_row_attrs(&mut w, props)?;
            if cells.peek().is_none() {
                w.close_empty()?;
                continue;
            }
            w.close_start_tag()?;
            for (at, cell) in cells {
                write_cell(&mut w, &names, *at, cell, &groups, strings, date1904)?;
            }
            w.end_element(&names.row)?;
        }

        w.end_element(&sheet_data)?;
        w.into_string()
    }

    /// Shared formula groups whose master cell is still in place
    fn shared_groups(&self) -> HashSet<u32> {
        self.cells
            .values()
            .filter_map(|c| c.formula.as_ref())
            .filter(|f| f.is_shared_master())
            .filter_map(Formula::shared_index)
            .collect()
    }

    fn write_merges(&self, t: &XmlTemplate) -> Result<Option<String>> {
        if self.merges.is_empty() {
            return Ok(None);
        }
        let mut w = XmlWriter::in_memory();
        w.start_element(&t.qname("mergeCells"))?;
        w.attribute_int("count", self.merges.len() as i64)?;
        w.close_start_tag()?;
        for range in &self.merges {
            w.start_element(&t.qname("mergeCell"))?;
            w.attribute("ref", &range.to_string())?;
            w.close_empty()?;
        }
        w.end_element(&t.qname("mergeCells"))?;
        Ok(Some(w.into_string()?))
    }
}

fn write_row_attrs(w: &mut Out, props: &RowProps) -> Result<()> {
    if let Some(style) = props.style {
        w.attribute_int("s", style.0 as i64)?;
        w.attribute("customFormat", "1")?;
    }
    if let Some(height) = props.height {
        w.attribute_num("ht", height)?;
    }
    if props.hidden {
        w.attribute("hidden", "1")?;
    }
    if props.custom_height {
        w.attribute("customHeight", "1")?;
    }
    for (k, v) in &props.extra {
        w.attribute(k, v)?;
    }
    Ok(())
}

fn write_cell(
    w: &mut Out,
    names: &Names,
    at: CellRef,
    cell: &Cell,
    groups: &HashSet<u32>,
    strings: &mut SharedStrings,
    date1904: bool,
) -> Result<()> {
    w.start_element(&names.c)?;
    w.attribute("r", &at.to_a1())?;
    if cell.style.0 != 0 {
        w.attribute_int("s", cell.style.0 as i64)?;
    }

    // (type attribute, <v> text)
    let stored: Option<(Option<&str>, String)> = match (&cell.value, &cell.source) {
        (CellValue::Empty, _) => None,
        (CellValue::Date(_) | CellValue::Text(_), Some(ValueSource::IsoDate(iso))) => {
            Some((Some("d"), iso.clone()))
        }
        (CellValue::Number(n), _) if n.is_finite() => Some((None, number_text(*n))),
        (CellValue::Number(_), _) => Some((Some("e"), "#NUM!".to_string())),
        (CellValue::Date(dt), _) => Some((None, number_text(datetime_to_serial(dt, date1904)))),
        (CellValue::Bool(b), _) => Some((Some("b"), if *b { "1" } else { "0" }.to_string())),
        (CellValue::Error(e), _) => Some((Some("e"), e.clone())),
        (CellValue::Text(s), _) if cell.formula.is_some() => Some((Some("str"), s.clone())),
        (CellValue::Text(_), Some(ValueSource::Inline(_))) => Some((Some("inlineStr"), String::new())),
        (CellValue::Text(_), Some(ValueSource::Shared(index))) => Some((Some("s"), index.to_string())),
        (CellValue::Text(s), None) => Some((Some("s"), strings.add_string(s).to_string())),
    };

    if let Some((Some(kind), _)) = &stored {
        w.attribute("t", kind)?;
    }
    for (k, v) in &cell.extra {
        w.attribute(k, v)?;
    }

    if cell.formula.is_none() && stored.is_none() {
        return w.close_empty();
    }
    w.close_start_tag()?;

    if let Some(formula) = &cell.formula {
        match formula.shared_index() {
            Some(si) if !formula.is_shared_master() && groups.contains(&si) => {
                write_formula(w, names, formula, false)?
            }
            // master replaced or cleared: keep the follower as a plain formula
            Some(si) if !formula.is_shared_master() && !formula.text().is_empty() => {
                log::debug!("cell {at} leaves shared formula group {si}");
                write_formula(w, names, &formula.detached(), true)?
            }
            _ => write_formula(w, names, formula, true)?,
        }
    }

    match (&stored, &cell.source) {
        (Some((Some("inlineStr"), _)), Some(ValueSource::Inline(raw))) => w.write_str(raw)?,
        (Some((_, text)), _) => w.text_element(&names.v, text)?,
        (None, _) => {}
    }

    w.end_element(&names.c)
}

fn write_formula(w: &mut Out, names: &Names, formula: &Formula, with_text: bool) -> Result<()> {
    w.start_element(&names.f)?;
    for (k, v) in formula.attributes() {
        w.attribute(k, v)?;
    }
    if !with_text || formula.text().is_empty() {
        return w.close_empty();
    }
    w.close_start_tag()?;
    w.write_escaped(formula.text())?;
    w.end_element(&names.f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleId;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetPr><tabColor rgb="FF00B050"/></sheetPr><dimension ref="A1"/><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><r><t>rich</t></r></is></c></row></sheetData><conditionalFormatting sqref="A1"><cfRule type="cellIs" dxfId="0" priority="1" operator="equal"><formula>1</formula></cfRule></conditionalFormatting><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

    fn load(strings: &SharedStrings) -> Worksheet {
        Worksheet::parse(
            "Sheet1".to_string(),
            "xl/worksheets/sheet1.xml".to_string(),
            "rId1".to_string(),
            1,
            SHEET,
            strings,
        )
        .unwrap()
    }

    #[test]
    fn test_rewrite_keeps_unowned_elements() {
        let mut strings = SharedStrings::new();
        strings.add_string("Title");
        let mut ws = load(&strings);
        ws.cells.insert(
            CellRef::parse("C2").unwrap(),
            Cell {
                value: CellValue::Text("new".to_string()),
                style: StyleId(3),
                ..Cell::default()
            },
        );
        ws.add_merge(RangeRef::parse("A3:B3").unwrap()).unwrap();

        let xml = ws.to_xml(&mut strings, false).unwrap();
        assert!(xml.contains("<sheetPr><tabColor rgb=\"FF00B050\"/></sheetPr><dimension ref=\"A1:C2\"/>"));
        assert!(xml.contains("<c r=\"A1\" t=\"s\"><v>0</v></c>"));
        assert!(xml.contains("<c r=\"B1\" t=\"inlineStr\"><is><r><t>rich</t></r></is></c>"));
        assert!(xml.contains("<row r=\"2\"><c r=\"C2\" s=\"3\" t=\"s\"><v>1</v></c></row>"));
        assert!(xml.contains("<cfRule type=\"cellIs\" dxfId=\"0\" priority=\"1\" operator=\"equal\"><formula>1</formula></cfRule>"));

        let merge = xml.find("<mergeCells count=\"1\"><mergeCell ref=\"A3:B3\"/></mergeCells>").unwrap();
        let cf = xml.find("<conditionalFormatting").unwrap();
        assert!(xml.find("</sheetData>").unwrap() < merge && merge < cf);
        assert_eq!(strings.get(1), Some("new"));
    }

    #[test]
    fn test_formula_cell_without_cached_value() {
        let strings = SharedStrings::new();
        let mut ws = load(&strings);
        ws.cells.insert(
            CellRef::parse("D2").unwrap(),
            Cell {
                formula: Some(Formula::parse("=B2*C2").unwrap()),
                ..Cell::default()
            },
        );
        let xml = ws.to_xml(&mut SharedStrings::new(), false).unwrap();
        assert!(xml.contains("<c r=\"D2\"><f>B2*C2</f></c>"));
    }

    #[test]
    fn test_values_and_row_props() {
        let mut strings = SharedStrings::new();
        let mut ws = load(&strings);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        ws.cells.insert(
            CellRef::parse("A5").unwrap(),
            Cell {
                value: CellValue::Date(date),
                ..Cell::default()
            },
        );
        ws.cells.insert(
            CellRef::parse("B5").unwrap(),
            Cell {
                value: CellValue::Bool(false),
                ..Cell::default()
            },
        );
        ws.rows.insert(
            7,
            RowProps {
                height: Some(24.5),
                custom_height: true,
                ..RowProps::default()
            },
        );
        let xml = ws.to_xml(&mut strings, false).unwrap();
        assert!(xml.contains("<c r=\"A5\"><v>45306.5</v></c><c r=\"B5\" t=\"b\"><v>0</v></c>"));
        assert!(xml.contains("<row r=\"7\" ht=\"24.5\" customHeight=\"1\"/>"));
    }

    const SHARED: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1"><v>1</v></c><c r="B1"><f t="shared" ref="B1:B3" si="0">A1*2</f><v>2</v></c></row><row r="2"><c r="A2"><v>2</v></c><c r="B2"><f t="shared" si="0"/><v>4</v></c></row><row r="3"><c r="A3"><v>3</v></c><c r="B3"><f t="shared" si="0"/><v>6</v></c></row><row r="4"><c r="A4" t="d"><v>2024-01-15T00:00:00</v></c></row></sheetData></worksheet>"#;

    fn load_shared() -> Worksheet {
        Worksheet::parse(
            "Sheet1".to_string(),
            "xl/worksheets/sheet1.xml".to_string(),
            "rId1".to_string(),
            1,
            SHARED,
            &SharedStrings::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_shared_group_kept_while_master_exists() {
        let mut ws = load_shared();
        ws.cells.get_mut(&CellRef::parse("A1").unwrap()).unwrap().value = CellValue::Number(9.0);
        let xml = ws.to_xml(&mut SharedStrings::new(), false).unwrap();
        assert!(xml.contains(r#"<c r="B1"><f t="shared" ref="B1:B3" si="0">A1*2</f><v>2</v></c>"#));
        assert!(xml.contains(r#"<c r="B2"><f t="shared" si="0"/><v>4</v></c>"#));
        assert!(xml.contains(r#"<c r="B3"><f t="shared" si="0"/><v>6</v></c>"#));
    }

    #[test]
    fn test_followers_become_plain_formulas_without_master() {
        let mut ws = load_shared();
        ws.cells.insert(
            CellRef::parse("B1").unwrap(),
            Cell {
                value: CellValue::Text("header".to_string()),
                ..Cell::default()
            },
        );
        let xml = ws.to_xml(&mut SharedStrings::new(), false).unwrap();
        assert!(xml.contains(r#"<c r="B2"><f>A2*2</f><v>4</v></c>"#));
        assert!(xml.contains(r#"<c r="B3"><f>A3*2</f><v>6</v></c>"#));
        assert!(!xml.contains("t=\"shared\""));
    }

    #[test]
    fn test_iso_date_written_back_as_found() {
        let mut ws = load_shared();
        let xml = ws.to_xml(&mut SharedStrings::new(), false).unwrap();
        assert!(xml.contains(r#"<c r="A4" t="d"><v>2024-01-15T00:00:00</v></c>"#));

        let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let a4 = ws.cells.get_mut(&CellRef::parse("A4").unwrap()).unwrap();
        a4.value = CellValue::Date(date);
        a4.source = None;
        let xml = ws.to_xml(&mut SharedStrings::new(), false).unwrap();
        assert!(xml.contains(r#"<c r="A4"><v>45323</v></c>"#));
    }

    #[test]
    fn test_columns_group_into_spans() {
        let strings = SharedStrings::new();
        let mut ws = load(&strings);
        let wide = ColumnProps {
            width: Some(20.0),
            custom_width: true,
            ..ColumnProps::default()
        };
        ws.columns.insert(2, wide.clone());
        ws.columns.insert(3, wide);
        ws.columns.insert(5, ColumnProps::default());
        let xml = ws.to_xml(&mut SharedStrings::new(), false).unwrap();
        assert!(xml.contains("<cols><col min=\"2\" max=\"3\" width=\"20\" customWidth=\"1\"/></cols><sheetData>"));
    }
}
