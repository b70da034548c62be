use super::{Cell, ColumnProps, RowProps, SheetKind, ValueSource, Worksheet};
use crate::error::Result;
use crate::formula::{shift_references, Formula};
use crate::shared_strings::{item_text, SharedStrings};
use crate::style::StyleId;
use crate::types::{CellRef, CellValue, RangeRef, MAX_COLS};
use crate::xml::{attributes, read_text, XmlTemplate};
use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};

fn truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

impl Worksheet {
    /// Build the model of a worksheet part
    pub(crate) fn parse(
        name: String,
        part: String,
        rel_id: String,
        sheet_id: u32,
        xml: &str,
        strings: &SharedStrings,
    ) -> Result<Self> {
        let template = XmlTemplate::parse(xml)?;
        let mut sheet = Worksheet::empty(name, SheetKind::Worksheet, part, rel_id, sheet_id);

        if let Some(seg) = template.segment("cols") {
            sheet.columns = parse_cols(&seg.xml)?;
        }
        if let Some(seg) = template.segment("sheetData") {
            parse_sheet_data(&seg.xml, strings, &mut sheet.cells, &mut sheet.rows)?;
            fill_shared_formulas(&mut sheet.cells);
        }
        if let Some(seg) = template.segment("mergeCells") {
            sheet.merges = parse_merges(&seg.xml)?;
        }

        log::debug!(
            "parsed sheet '{}': {} cells, {} merges",
            sheet.name,
            sheet.cells.len(),
            sheet.merges.len()
        );
        sheet.template = Some(template);
        Ok(sheet)
    }
}

fn parse_cols(xml: &str) -> Result<BTreeMap<u32, ColumnProps>> {
    let mut reader = Reader::from_str(xml);
    let mut columns = BTreeMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"col" => {
                let mut min = 0u32;
                let mut max = 0u32;
                let mut props = ColumnProps::default();
                for (key, value) in attributes(&e)? {
                    match key.as_str() {
                        "min" => min = value.parse().unwrap_or(0),
                        "max" => max = value.parse().unwrap_or(0),
                        "width" => props.width = value.parse().ok(),
                        "customWidth" => props.custom_width = truthy(&value),
                        "hidden" => props.hidden = truthy(&value),
                        "style" => props.style = value.parse().ok().map(StyleId),
                        _ => props.extra.push((key, value)),
                    }
                }
                if min == 0 || max < min {
                    log::warn!("skipping <col> with invalid span {min}..{max}");
                    continue;
                }
                for col in min..=max.min(MAX_COLS) {
                    columns.insert(col, props.clone());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(columns)
}

fn parse_row(e: &BytesStart<'_>, previous: u32) -> Result<(u32, RowProps)> {
    let mut row = previous + 1;
    let mut props = RowProps::default();
    let mut style = None;
    let mut custom_format = false;
    for (key, value) in attributes(e)? {
        match key.as_str() {
            "r" => row = value.parse().unwrap_or(row),
            // recomputed from the cells
            "spans" => {}
            "ht" => props.height = value.parse().ok(),
            "customHeight" => props.custom_height = truthy(&value),
            "hidden" => props.hidden = truthy(&value),
            "customFormat" => custom_format = truthy(&value),
            "s" => style = Some(value),
            _ => props.extra.push((key, value)),
        }
    }
    if let Some(s) = style {
        match s.parse() {
            Ok(id) if custom_format => props.style = Some(StyleId(id)),
            // without customFormat the row format is inert; keep it as found
            _ => props.extra.push(("s".to_string(), s)),
        }
    }
    Ok((row, props))
}

fn parse_sheet_data(
    xml: &str,
    strings: &SharedStrings,
    cells: &mut BTreeMap<CellRef, Cell>,
    rows: &mut BTreeMap<u32, RowProps>,
) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    let mut current_row = 0u32;
    let mut next_col = 1u32;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let (row, props) = parse_row(&e, current_row)?;
                current_row = row;
                next_col = 1;
                if !props.is_default() {
                    rows.insert(row, props);
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let (at, cell) = parse_cell(xml, &mut reader, &e, current_row, next_col, strings, false)?;
                next_col = at.col + 1;
                cells.insert(at, cell);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let (at, cell) = parse_cell(xml, &mut reader, &e, current_row, next_col, strings, true)?;
                next_col = at.col + 1;
                cells.insert(at, cell);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// Give each shared-formula follower the master's text, moved to its own cell
fn fill_shared_formulas(cells: &mut BTreeMap<CellRef, Cell>) {
    let masters: HashMap<u32, (CellRef, String)> = cells
        .iter()
        .filter_map(|(at, cell)| {
            let formula = cell.formula.as_ref()?;
            if !formula.is_shared_master() || formula.text().is_empty() {
                return None;
            }
            Some((formula.shared_index()?, (*at, formula.text().to_string())))
        })
        .collect();
    if masters.is_empty() {
        return;
    }

    for (at, cell) in cells.iter_mut() {
        let formula = match cell.formula.as_mut() {
            Some(f) if f.is_shared() && !f.is_shared_master() && f.text().is_empty() => f,
            _ => continue,
        };
        let si = formula.shared_index();
        match si.and_then(|si| masters.get(&si)) {
            Some((origin, text)) => {
                let rows = i64::from(at.row) - i64::from(origin.row);
                let cols = i64::from(at.col) - i64::from(origin.col);
                formula.set_text(shift_references(text, rows, cols));
            }
            None => log::warn!("cell {at} refers to shared formula {si:?} with no master"),
        }
    }
}

fn parse_cell(
    xml: &str,
    reader: &mut Reader<&[u8]>,
    e: &BytesStart<'_>,
    row: u32,
    next_col: u32,
    strings: &SharedStrings,
    empty: bool,
) -> Result<(CellRef, Cell)> {
    let mut at = None;
    let mut cell_type = None;
    let mut cell = Cell::default();
    for (key, value) in attributes(e)? {
        match key.as_str() {
            "r" => at = Some(CellRef::parse(&value)?),
            "s" => cell.style = StyleId(value.parse().unwrap_or(0)),
            "t" => cell_type = Some(value),
            _ => cell.extra.push((key, value)),
        }
    }
    let at = match at {
        Some(at) => at,
        None => CellRef::new(row.max(1), next_col)?,
    };
    if empty {
        return Ok((at, cell));
    }

    let mut raw_value: Option<String> = None;
    let mut inline: Option<(String, String)> = None;
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(child) => match child.local_name().as_ref() {
                b"f" => {
                    let attrs = attributes(&child)?;
                    let text = read_text(reader, child.name())?;
                    cell.formula = Some(Formula::from_part(text, attrs));
                }
                b"v" => raw_value = Some(read_text(reader, child.name())?),
                b"is" => {
                    reader.read_to_end(child.name())?;
                    let end = reader.buffer_position() as usize;
                    let raw = xml[before..end].trim_start().to_string();
                    let (text, _) = item_text(&raw)?;
                    inline = Some((text, raw));
                }
                _ => {
                    reader.read_to_end(child.name())?;
                }
            },
            Event::Empty(child) if child.local_name().as_ref() == b"f" => {
                cell.formula = Some(Formula::from_part(String::new(), attributes(&child)?));
            }
            Event::End(end) if end.local_name().as_ref() == b"c" => break,
            Event::Eof => break,
            _ => {}
        }
    }

    cell.value = match (cell_type.as_deref(), raw_value) {
        (Some("inlineStr"), _) => match inline {
            Some((text, raw)) => {
                cell.source = Some(ValueSource::Inline(raw));
                CellValue::Text(text)
            }
            None => CellValue::Empty,
        },
        (_, None) => CellValue::Empty,
        (Some("s"), Some(v)) => match v.trim().parse::<u32>() {
            Ok(index) => {
                cell.source = Some(ValueSource::Shared(index));
                match strings.get(index) {
                    Some(text) => CellValue::Text(text.to_string()),
                    None => {
                        log::warn!("cell {at} points at missing shared string {index}");
                        CellValue::Text(String::new())
                    }
                }
            }
            Err(_) => {
                log::warn!("cell {at} has a non-numeric shared string index '{v}'");
                CellValue::Empty
            }
        },
        (Some("str"), Some(v)) => CellValue::Text(v),
        (Some("b"), Some(v)) => CellValue::Bool(truthy(v.trim())),
        (Some("e"), Some(v)) => CellValue::Error(v),
        (Some("d"), Some(v)) => {
            cell.source = Some(ValueSource::IsoDate(v.trim().to_string()));
            parse_iso_date(&v).map(CellValue::Date).unwrap_or(CellValue::Text(v))
        }
        (None | Some("n"), Some(v)) => match v.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => {
                log::warn!("cell {at} has a non-numeric value '{v}'");
                CellValue::Text(v)
            }
        },
        (Some(other), Some(v)) => {
            log::warn!("cell {at} has unknown type '{other}', reading it as text");
            CellValue::Text(v)
        }
    };
    Ok((at, cell))
}

fn parse_iso_date(v: &str) -> Option<NaiveDateTime> {
    let v = v.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_merges(xml: &str) -> Result<Vec<RangeRef>> {
    let mut reader = Reader::from_str(xml);
    let mut merges = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"mergeCell" => {
                for (key, value) in attributes(&e)? {
                    if key == "ref" {
                        match RangeRef::parse(&value) {
                            Ok(range) => merges.push(range),
                            Err(err) => log::warn!("skipping merged range '{value}': {err}"),
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(merges)
}
