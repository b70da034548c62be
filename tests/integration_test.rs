//! Integration tests for xlsxedit

use std::io::{Cursor, Read, Write};
use tempfile::TempDir;
use xlsxedit::{CellValue, EngineConfig, ExcelError, StylePatch, Workbook};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/chartsheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.chartsheet+xml"/><Override PartName="/xl/drawings/drawing1.xml" ContentType="application/vnd.openxmlformats-officedocument.drawing+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr defaultThemeVersion="164011"/><bookViews><workbookView xWindow="0" yWindow="0" windowWidth="28800" windowHeight="12300" activeTab="1"/></bookViews><sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/><sheet name="Chart1" sheetId="3" r:id="rId3"/></sheets><definedNames><definedName name="_xlnm.Print_Area" localSheetId="1">Notes!$A$1:$B$4</definedName><definedName name="Prices">Data!$C$2:$C$3</definedName></definedNames><calcPr calcId="191029"/></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/chartsheet" Target="chartsheets/sheet1.xml"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/><Relationship Id="rId6" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#;

const DATA_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1:C3"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15"/><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row><row r="2"><c r="A2" t="s"><v>3</v></c><c r="B2"><v>3</v></c><c r="C2"><v>2.5</v></c></row><row r="3"><c r="A3" t="s"><v>4</v></c><c r="B3"><v>4</v></c><c r="C3"><v>1.25</v></c><c r="D3"><f>B3*C3</f><v>5</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/><drawing r:id="rId1"/></worksheet>"#;

const DATA_SHEET_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing1.xml"/></Relationships>"#;

const NOTES_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1"/><sheetData><row r="1"><c r="A1" t="s"><v>5</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

const CHARTSHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<chartsheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetViews><sheetView zoomScale="115" workbookViewId="0" zoomToFit="1"/></sheetViews><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></chartsheet>"#;

const DRAWING: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing"><xdr:oneCellAnchor><xdr:from><xdr:col>5</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>1</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:ext cx="952500" cy="952500"/><xdr:clientData/></xdr:oneCellAnchor></xdr:wsDr>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles><dxfs count="0"/><tableStyles count="0"/></styleSheet>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="6" uniqueCount="6"><si><t>Item</t></si><si><t>Qty</t></si><si><t>Price</t></si><si><t>Widget</t></si><si><t>Gadget</t></si><si><r><rPr><b/></rPr><t>Bold</t></r><r><t> note</t></r></si></sst>"#;

const CALC_CHAIN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><c r="D3" i="1"/></calcChain>"#;

const IMAGE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13, 1, 2, 3, 4];

const CALC_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#;

const CALC_WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Calc" sheetId="1" r:id="rId1"/></sheets><calcPr calcId="191029"/></workbook>"#;

const CALC_WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;

/// B1:B3 is one shared formula group mastered at B1, E1:E2 an array formula,
/// A4 and B4 ISO dates
const CALC_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:E4"/><sheetData><row r="1"><c r="A1"><v>1</v></c><c r="B1"><f t="shared" ref="B1:B3" si="0">A1*2</f><v>2</v></c><c r="E1"><f t="array" ref="E1:E2">A1:A2*10</f><v>10</v></c></row><row r="2"><c r="A2"><v>2</v></c><c r="B2"><f t="shared" si="0"/><v>4</v></c><c r="E2"><v>20</v></c></row><row r="3"><c r="A3"><v>3</v></c><c r="B3"><f t="shared" si="0"/><v>6</v></c></row><row r="4"><c r="A4" t="d"><v>2024-01-15T00:00:00</v></c><c r="B4" t="d"><v>2024-03-01T08:30:00</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

fn package(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, bytes) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A workbook with one sheet of shared formulas, an array formula and ISO dates
fn calc_fixture() -> Vec<u8> {
    package(&[
        ("[Content_Types].xml", CALC_CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", CALC_WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", CALC_WORKBOOK_RELS.as_bytes()),
        ("xl/worksheets/sheet1.xml", CALC_SHEET.as_bytes()),
        ("xl/styles.xml", STYLES.as_bytes()),
        ("xl/sharedStrings.xml", SHARED_STRINGS.as_bytes()),
    ])
}

/// A workbook with two worksheets, a chartsheet, a drawing and a calc chain
fn fixture() -> Vec<u8> {
    package(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/worksheets/sheet1.xml", DATA_SHEET.as_bytes()),
        ("xl/worksheets/_rels/sheet1.xml.rels", DATA_SHEET_RELS.as_bytes()),
        ("xl/worksheets/sheet2.xml", NOTES_SHEET.as_bytes()),
        ("xl/chartsheets/sheet1.xml", CHARTSHEET.as_bytes()),
        ("xl/drawings/drawing1.xml", DRAWING.as_bytes()),
        ("xl/media/image1.png", IMAGE),
        ("xl/styles.xml", STYLES.as_bytes()),
        ("xl/sharedStrings.xml", SHARED_STRINGS.as_bytes()),
        ("xl/calcChain.xml", CALC_CHAIN.as_bytes()),
    ])
}

fn part(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    Some(out)
}

fn part_text(bytes: &[u8], name: &str) -> String {
    String::from_utf8(part(bytes, name).unwrap()).unwrap()
}

#[test]
fn test_untouched_parts_pass_through() {
    let input = fixture();
    let mut wb = Workbook::from_bytes(input.clone()).unwrap();
    wb.sheet_mut("Data").unwrap().cell("B2").unwrap().set_value(7);
    let output = wb.to_bytes().unwrap();

    for name in [
        "xl/worksheets/sheet2.xml",
        "xl/chartsheets/sheet1.xml",
        "xl/drawings/drawing1.xml",
        "xl/media/image1.png",
        "xl/worksheets/_rels/sheet1.xml.rels",
        "xl/styles.xml",
    ] {
        assert_eq!(part(&input, name), part(&output, name), "{name} changed");
    }

    let sheet = part_text(&output, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<c r=\"B2\"><v>7</v></c>"));
    assert!(sheet.contains("<drawing r:id=\"rId1\"/>"));
    assert!(sheet.contains("<sheetViews><sheetView workbookViewId=\"0\"/></sheetViews>"));
}

#[test]
fn test_unedited_workbook_round_trips() {
    let input = fixture();
    let mut wb = Workbook::from_bytes(input.clone()).unwrap();
    assert!(!wb.is_dirty());
    let output = wb.to_bytes().unwrap();
    let mut names_in: Vec<String> = ZipArchive::new(Cursor::new(&input[..]))
        .unwrap()
        .file_names()
        .map(String::from)
        .collect();
    let mut names_out: Vec<String> = ZipArchive::new(Cursor::new(&output[..]))
        .unwrap()
        .file_names()
        .map(String::from)
        .collect();
    names_in.sort();
    names_out.sort();
    assert_eq!(names_in, names_out);
    for name in &names_in {
        assert_eq!(part(&input, name), part(&output, name), "{name} changed");
    }
}

#[test]
fn test_title_in_bold() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.xlsx");
    std::fs::write(&path, fixture()).unwrap();

    let mut wb = Workbook::open(&path).unwrap();
    wb.sheet_mut("Data")
        .unwrap()
        .cell("A1")
        .unwrap()
        .set_value("Title")
        .set_style(&StylePatch::new().bold(true))
        .unwrap();
    wb.save(&path).unwrap();

    let back = Workbook::open(&path).unwrap();
    let cell = back.sheet("Data").unwrap().cell("A1").unwrap().unwrap();
    assert_eq!(cell.value(), &CellValue::from("Title"));
    assert!(back.styles().get(cell.style_id()).unwrap().is_bold());
    assert_eq!(
        back.sheet("Data").unwrap().value("A2").unwrap(),
        CellValue::from("Widget")
    );
}

#[test]
fn test_formula_written_without_cached_value() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    wb.sheet_mut(0)
        .unwrap()
        .cell("D2")
        .unwrap()
        .set_formula("=B2*C2")
        .unwrap();
    let output = wb.to_bytes().unwrap();

    let sheet = part_text(&output, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<c r=\"D2\"><f>B2*C2</f></c>"));
    let workbook = part_text(&output, "xl/workbook.xml");
    assert!(workbook.contains("<calcPr calcId=\"191029\" fullCalcOnLoad=\"1\"/>"));

    // The stale calculation chain is gone along with every reference to it.
    assert!(part(&output, "xl/calcChain.xml").is_none());
    assert!(!part_text(&output, "[Content_Types].xml").contains("calcChain"));
    assert!(!part_text(&output, "xl/_rels/workbook.xml.rels").contains("calcChain"));
}

#[test]
fn test_calc_chain_kept_when_configured() {
    let config = EngineConfig::builder().drop_calc_chain(false).build();
    let mut wb = Workbook::from_bytes_with_config(fixture(), config).unwrap();
    wb.sheet_mut(0).unwrap().cell("A5").unwrap().set_value(1);
    let output = wb.to_bytes().unwrap();
    assert_eq!(part_text(&output, "xl/calcChain.xml"), CALC_CHAIN);
}

#[test]
fn test_set_value_replaces_formula() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    {
        let mut sheet = wb.sheet_mut("Data").unwrap();
        assert_eq!(sheet.cell("D3").unwrap().formula().unwrap().text(), "B3*C3");
        sheet.cell("D3").unwrap().set_value(99);
    }
    let back = Workbook::from_bytes(wb.to_bytes().unwrap()).unwrap();
    let cell = back.sheet("Data").unwrap().cell("D3").unwrap().unwrap();
    assert!(cell.formula().is_none());
    assert_eq!(cell.value(), &CellValue::Number(99.0));
}

#[test]
fn test_move_last_sheet_first() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    wb.move_sheet("Chart1", 0).unwrap();
    assert_eq!(wb.sheet_names(), ["Chart1", "Data", "Notes"]);
    let output = wb.to_bytes().unwrap();

    let workbook = part_text(&output, "xl/workbook.xml");
    assert!(workbook.contains(
        "<sheets><sheet name=\"Chart1\" sheetId=\"3\" r:id=\"rId3\"/><sheet name=\"Data\" sheetId=\"1\" r:id=\"rId1\"/><sheet name=\"Notes\" sheetId=\"2\" r:id=\"rId2\"/></sheets>"
    ));
    // Print area and the selected tab still belong to Notes.
    assert!(workbook.contains("localSheetId=\"2\""));
    assert!(workbook.contains("activeTab=\"2\""));

    let back = Workbook::from_bytes(output).unwrap();
    assert_eq!(back.sheet_names(), ["Chart1", "Data", "Notes"]);
}

#[test]
fn test_sheet_names_are_case_insensitive() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    assert!(matches!(
        wb.add_sheet("data"),
        Err(ExcelError::DuplicateName(_))
    ));
    assert!(matches!(
        wb.rename_sheet("Notes", "DATA"),
        Err(ExcelError::DuplicateName(_))
    ));
    assert!(matches!(
        wb.add_sheet("bad:name"),
        Err(ExcelError::InvalidSheetName { .. })
    ));
    assert_eq!(wb.sheet("NOTES").unwrap().name(), "Notes");
    assert!(!wb.is_dirty());
}

#[test]
fn test_overlapping_merge_rejected() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    let mut sheet = wb.sheet_mut("Data").unwrap();
    sheet.merge("A1:B2").unwrap();
    assert!(matches!(
        sheet.merge("B2:C3"),
        Err(ExcelError::Overlap { .. })
    ));
    assert!(matches!(
        sheet.merge("A1:B2"),
        Err(ExcelError::Overlap { .. })
    ));
    assert_eq!(sheet.merged_ranges().len(), 1);
    assert!(sheet.unmerge("A1:B2").unwrap());
    assert!(sheet.merged_ranges().is_empty());
}

#[test]
fn test_repeated_style_adds_one_format() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    let before = wb.styles().len();
    let patch = StylePatch::new().bold(true).font_size(14.0);
    {
        let mut sheet = wb.sheet_mut("Data").unwrap();
        sheet.cell("A1").unwrap().set_style(&patch).unwrap();
        sheet.cell("A1").unwrap().set_style(&patch).unwrap();
        sheet.cell("B1").unwrap().set_style(&patch).unwrap();
    }
    assert_eq!(wb.styles().len(), before + 1);
    let sheet = wb.sheet("Data").unwrap();
    assert_eq!(
        sheet.cell("A1").unwrap().unwrap().style_id(),
        sheet.cell("B1").unwrap().unwrap().style_id()
    );

    let output = wb.to_bytes().unwrap();
    let styles = part_text(&output, "xl/styles.xml");
    assert!(styles.contains("<cellXfs count=\"2\">"));
}

#[test]
fn test_delete_sheet_removes_its_parts() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    wb.delete_sheet("Notes").unwrap();
    let output = wb.to_bytes().unwrap();

    assert!(part(&output, "xl/worksheets/sheet2.xml").is_none());
    assert!(!part_text(&output, "[Content_Types].xml").contains("/xl/worksheets/sheet2.xml"));
    assert!(!part_text(&output, "xl/_rels/workbook.xml.rels").contains("worksheets/sheet2.xml"));
    let workbook = part_text(&output, "xl/workbook.xml");
    assert!(!workbook.contains("Print_Area"));
    assert!(workbook.contains("<definedName name=\"Prices\">Data!$C$2:$C$3</definedName>"));

    let mut back = Workbook::from_bytes(output).unwrap();
    assert_eq!(back.sheet_names(), ["Data", "Chart1"]);
    back.delete_sheet("Chart1").unwrap();
    assert!(matches!(
        back.delete_sheet("Data"),
        Err(ExcelError::InvalidState(_))
    ));
}

#[test]
fn test_chartsheet_is_passthrough() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    assert!(!wb.sheet("Chart1").unwrap().is_worksheet());
    assert!(matches!(
        wb.sheet_mut("Chart1"),
        Err(ExcelError::InvalidState(_))
    ));
    wb.rename_sheet("Chart1", "Trend").unwrap();
    let output = wb.to_bytes().unwrap();
    assert_eq!(part_text(&output, "xl/chartsheets/sheet1.xml"), CHARTSHEET);
    assert!(part_text(&output, "xl/workbook.xml").contains("<sheet name=\"Trend\" sheetId=\"3\" r:id=\"rId3\"/>"));
}

#[test]
fn test_shared_strings_are_append_only() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    wb.sheet_mut("Data").unwrap().cell("A4").unwrap().set_value("Gizmo");
    let output = wb.to_bytes().unwrap();

    let sst = part_text(&output, "xl/sharedStrings.xml");
    assert!(sst.contains("<si><r><rPr><b/></rPr><t>Bold</t></r><r><t> note</t></r></si><si><t>Gizmo</t></si>"));
    assert!(sst.contains("uniqueCount=\"7\""));

    // Notes was not rewritten and still points at entry 5.
    let back = Workbook::from_bytes(output).unwrap();
    assert_eq!(
        back.sheet("Notes").unwrap().value("A1").unwrap(),
        CellValue::from("Bold note")
    );
    assert_eq!(
        back.sheet("Data").unwrap().value("A4").unwrap(),
        CellValue::from("Gizmo")
    );
}

#[test]
fn test_new_sheet_gets_fresh_part() {
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    wb.add_sheet("Summary")
        .unwrap()
        .cell("A1")
        .unwrap()
        .set_formula("=SUM(Data!B2:B3)")
        .unwrap();
    let output = wb.to_bytes().unwrap();

    let sheet = part_text(&output, "xl/worksheets/sheet3.xml");
    assert!(sheet.contains("<f>SUM(Data!B2:B3)</f>"));
    assert!(part_text(&output, "[Content_Types].xml").contains("/xl/worksheets/sheet3.xml"));
    let back = Workbook::from_bytes(output).unwrap();
    assert_eq!(back.sheet_names(), ["Data", "Notes", "Chart1", "Summary"]);
}

#[test]
fn test_failed_save_leaves_target_alone() {
    let dir = TempDir::new().unwrap();
    let mut wb = Workbook::from_bytes(fixture()).unwrap();
    let target = dir.path().join("missing-dir").join("out.xlsx");
    assert!(matches!(wb.save(&target), Err(ExcelError::WriteError(_))));
    assert!(!target.exists());
}

#[test]
fn test_rejects_bad_input() {
    assert!(Workbook::from_bytes(b"not a zip".to_vec()).is_err());

    let config = EngineConfig::builder().max_part_bytes(64).build();
    assert!(Workbook::from_bytes_with_config(fixture(), config).is_err());

    let err = Workbook::from_bytes(fixture()).unwrap().sheet("Missing").err().unwrap();
    match err {
        ExcelError::SheetNotFound { available, .. } => {
            assert_eq!(available, "Data, Notes, Chart1")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_formula_groups_and_iso_dates_survive_unrelated_edit() {
    let mut wb = Workbook::from_bytes(calc_fixture()).unwrap();
    wb.sheet_mut("Calc").unwrap().cell("C5").unwrap().set_value("note");
    let output = wb.to_bytes().unwrap();

    let sheet = part_text(&output, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c r="B1"><f t="shared" ref="B1:B3" si="0">A1*2</f><v>2</v></c>"#));
    assert!(sheet.contains(r#"<c r="B2"><f t="shared" si="0"/><v>4</v></c>"#));
    assert!(sheet.contains(r#"<c r="B3"><f t="shared" si="0"/><v>6</v></c>"#));
    assert!(sheet.contains(r#"<c r="E1"><f t="array" ref="E1:E2">A1:A2*10</f><v>10</v></c>"#));
    assert!(sheet.contains(r#"<c r="A4" t="d"><v>2024-01-15T00:00:00</v></c>"#));
    assert!(sheet.contains(r#"<c r="B4" t="d"><v>2024-03-01T08:30:00</v></c>"#));

    let back = Workbook::from_bytes(output).unwrap();
    let calc = back.sheet("Calc").unwrap();
    let b3 = calc.cell("B3").unwrap().unwrap().formula().unwrap();
    assert!(b3.is_shared());
    assert_eq!(b3.text(), "A3*2");
    assert!(calc.cell("E1").unwrap().unwrap().formula().unwrap().is_array());
    let a4 = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(calc.value("A4").unwrap(), CellValue::Date(a4));
}

#[test]
fn test_overwriting_shared_master_keeps_followers() {
    let mut wb = Workbook::from_bytes(calc_fixture()).unwrap();
    wb.sheet_mut("Calc").unwrap().cell("B1").unwrap().set_value("header");
    let output = wb.to_bytes().unwrap();

    let sheet = part_text(&output, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c r="B2"><f>A2*2</f><v>4</v></c>"#));
    assert!(sheet.contains(r#"<c r="B3"><f>A3*2</f><v>6</v></c>"#));
    assert!(!sheet.contains("si=\"0\""));

    let back = Workbook::from_bytes(output).unwrap();
    let calc = back.sheet("Calc").unwrap();
    assert_eq!(calc.value("B1").unwrap(), CellValue::from("header"));
    let b2 = calc.cell("B2").unwrap().unwrap().formula().unwrap();
    assert_eq!(b2.text(), "A2*2");
    assert!(!b2.is_shared());
}

#[test]
fn test_replacing_or_clearing_shared_master() {
    let mut wb = Workbook::from_bytes(calc_fixture()).unwrap();
    {
        let mut calc = wb.sheet_mut("Calc").unwrap();
        calc.cell("B1").unwrap().set_formula("=A1*3").unwrap();
    }
    let sheet = part_text(&wb.to_bytes().unwrap(), "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c r="B1"><f>A1*3</f></c>"#));
    assert!(sheet.contains(r#"<c r="B3"><f>A3*2</f><v>6</v></c>"#));

    let mut wb = Workbook::from_bytes(calc_fixture()).unwrap();
    wb.sheet_mut("Calc")
        .unwrap()
        .range("B1:B2")
        .unwrap()
        .clear()
        .unwrap();
    let sheet = part_text(&wb.to_bytes().unwrap(), "xl/worksheets/sheet1.xml");
    assert!(!sheet.contains("<c r=\"B2\">"));
    assert!(sheet.contains(r#"<c r="B3"><f>A3*2</f><v>6</v></c>"#));
}

#[test]
fn test_new_date_in_iso_cell_is_written_as_serial() {
    let mut wb = Workbook::from_bytes(calc_fixture()).unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    wb.sheet_mut("Calc").unwrap().cell("A4").unwrap().set_value(date);
    let output = wb.to_bytes().unwrap();

    let sheet = part_text(&output, "xl/worksheets/sheet1.xml");
    assert!(!sheet.contains("<c r=\"A4\" t=\"d\">"));
    assert!(sheet.contains("<v>45323</v>"));
    assert!(sheet.contains(r#"<c r="B4" t="d"><v>2024-03-01T08:30:00</v></c>"#));

    let back = Workbook::from_bytes(output).unwrap();
    assert_eq!(back.sheet("Calc").unwrap().value("A4").unwrap().as_datetime(), Some(date));
}
