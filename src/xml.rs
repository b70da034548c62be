//! XML reading helpers and the raw-element template used to rewrite a part
//! while keeping every element the model does not own byte-for-byte.

use crate::error::{ExcelError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use std::borrow::Cow;

pub(crate) const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
pub(crate) const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub(crate) const DOC_REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Child order of `CT_Worksheet`
pub(crate) const WORKSHEET_ORDER: &[&str] = &[
    "sheetPr",
    "dimension",
    "sheetViews",
    "sheetFormatPr",
    "cols",
    "sheetData",
    "sheetCalcPr",
    "sheetProtection",
    "protectedRanges",
    "scenarios",
    "autoFilter",
    "sortState",
    "dataConsolidate",
    "customSheetViews",
    "mergeCells",
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// Child order of `CT_Workbook`
pub(crate) const WORKBOOK_ORDER: &[&str] = &[
    "fileVersion",
    "fileSharing",
    "workbookPr",
    "workbookProtection",
    "bookViews",
    "sheets",
    "functionGroups",
    "externalReferences",
    "definedNames",
    "calcPr",
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// Child order of `CT_Stylesheet`
pub(crate) const STYLESHEET_ORDER: &[&str] = &[
    "numFmts",
    "fonts",
    "fills",
    "borders",
    "cellStyleXfs",
    "cellXfs",
    "cellStyles",
    "dxfs",
    "tableStyles",
    "colors",
    "extLst",
];

/// Decode a part as UTF-8, dropping a byte-order mark if present.
pub(crate) fn part_to_string(bytes: Vec<u8>, part: &str) -> Result<String> {
    let mut text = String::from_utf8(bytes)
        .map_err(|e| ExcelError::InvalidFormat(format!("{part} is not UTF-8: {e}")))?;
    if text.starts_with('\u{feff}') {
        text.drain(..'\u{feff}'.len_utf8());
    }
    Ok(text)
}

pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// All attributes with their qualified names and unescaped values
pub(crate) fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        out.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok(out)
}

/// Attributes of the first tag in `xml`, typically a raw element captured by a template
pub(crate) fn element_attrs(xml: &str) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => return attributes(&e),
            Event::Eof => return Ok(Vec::new()),
            _ => {}
        }
    }
}

/// Concatenated text content up to the end tag `end`
pub(crate) fn read_text(reader: &mut Reader<&[u8]>, end: QName<'_>) -> Result<String> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let t: Cow<'_, str> = e.unescape()?;
                text.push_str(&t);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::Start(e) => {
                reader.read_to_end(e.name())?;
            }
            Event::End(e) if e.name() == end => break,
            Event::Eof => {
                return Err(ExcelError::InvalidFormat(format!(
                    "unexpected end of document inside <{}>",
                    String::from_utf8_lossy(end.as_ref())
                )))
            }
            _ => {}
        }
    }
    Ok(text)
}

/// Text content of the first element in `xml` (empty for `<t/>`)
pub(crate) fn element_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => return read_text(&mut reader, e.name()),
            Event::Empty(_) | Event::Eof => return Ok(String::new()),
            _ => {}
        }
    }
}

/// One top-level child of the root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    /// Local name of the element
    pub local: String,
    /// Whitespace and comments preceding the element
    pub lead: String,
    /// The element itself, exactly as read
    pub xml: String,
}

/// A part split into its root tag and raw top-level children.
///
/// Rendering with no replacements reproduces the input exactly.
#[derive(Debug, Clone)]
pub(crate) struct XmlTemplate {
    head: String,
    root_qname: String,
    self_closing: bool,
    segments: Vec<Segment>,
    closing: String,
}

impl XmlTemplate {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let (head_end, root_qname, self_closing) = loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    break (reader.buffer_position() as usize, name, false);
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    break (reader.buffer_position() as usize, name, true);
                }
                Event::Eof => {
                    return Err(ExcelError::InvalidFormat(
                        "XML part has no root element".to_string(),
                    ))
                }
                _ => {}
            }
        };

        let mut segments = Vec::new();
        let mut cursor = head_end;
        let mut closing = String::new();

        if self_closing {
            closing.push_str(&xml[cursor..]);
        } else {
            loop {
                match reader.read_event()? {
                    Event::Start(e) => {
                        let local = local_name(&e);
                        let start = element_start(xml, cursor, e.name().as_ref());
                        reader.read_to_end(e.name())?;
                        let end = reader.buffer_position() as usize;
                        segments.push(Segment {
                            local,
                            lead: xml[cursor..start].to_string(),
                            xml: xml[start..end].to_string(),
                        });
                        cursor = end;
                    }
                    Event::Empty(e) => {
                        let local = local_name(&e);
                        let start = element_start(xml, cursor, e.name().as_ref());
                        let end = reader.buffer_position() as usize;
                        segments.push(Segment {
                            local,
                            lead: xml[cursor..start].to_string(),
                            xml: xml[start..end].to_string(),
                        });
                        cursor = end;
                    }
                    Event::End(_) | Event::Eof => {
                        closing.push_str(&xml[cursor..]);
                        break;
                    }
                    _ => {}
                }
            }
        }

        Ok(XmlTemplate {
            head: xml[..head_end].to_string(),
            root_qname,
            self_closing,
            segments,
            closing,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First child with the given local name
    pub fn segment(&self, local: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.local == local)
    }

    /// Namespace prefix used by the root element (`x` for `<x:worksheet>`)
    pub fn prefix(&self) -> Option<&str> {
        self.root_qname.split_once(':').map(|(p, _)| p)
    }

    /// Qualified name for a child element in the root's namespace
    pub fn qname(&self, local: &str) -> String {
        match self.prefix() {
            Some(p) => format!("{p}:{local}"),
            None => local.to_string(),
        }
    }

    /// Root start tag and everything before it
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn set_head(&mut self, head: String) {
        self.head = head;
    }

    /// Re-emit the part. `owned` lists element local names the caller regenerates:
    /// `Some(xml)` replaces the first existing element (or inserts one at its
    /// schema position when absent), `None` removes it. Further elements with an
    /// owned name are dropped.
    pub fn render(&self, order: &[&str], owned: &[(&str, Option<String>)]) -> String {
        let rank = |local: &str| order.iter().position(|n| *n == local);
        let mut pending: Vec<(usize, &str)> = owned
            .iter()
            .filter(|(local, xml)| xml.is_some() && self.segment(local).is_none())
            .filter_map(|(local, _)| rank(local).map(|r| (r, *local)))
            .collect();
        pending.sort_by_key(|(r, _)| *r);
        let replacement = |local: &str| -> Option<&Option<String>> {
            owned.iter().find(|(n, _)| *n == local).map(|(_, x)| x)
        };

        let mut out = String::with_capacity(self.head.len() + self.closing.len() + 1024);
        let mut emitted: Vec<&str> = Vec::new();
        let self_closing = self.self_closing && owned.iter().any(|(_, x)| x.is_some());
        if self_closing {
            // <root/> has to be reopened to take children
            let trimmed = self.head.trim_end();
            let without = trimmed.strip_suffix("/>").unwrap_or(trimmed).trim_end();
            out.push_str(without);
            out.push('>');
        } else {
            out.push_str(&self.head);
        }

        for seg in &self.segments {
            if let Some(seg_rank) = rank(&seg.local) {
                while let Some(&(r, local)) = pending.first() {
                    if r >= seg_rank {
                        break;
                    }
                    if let Some(Some(xml)) = replacement(local) {
                        out.push_str(xml);
                    }
                    pending.remove(0);
                }
            }
            match replacement(&seg.local) {
                Some(Some(xml)) => {
                    if !emitted.contains(&seg.local.as_str()) {
                        out.push_str(&seg.lead);
                        out.push_str(xml);
                        emitted.push(seg.local.as_str());
                    }
                }
                Some(None) => {}
                None => {
                    out.push_str(&seg.lead);
                    out.push_str(&seg.xml);
                }
            }
        }
        for (_, local) in pending {
            if let Some(Some(xml)) = replacement(local) {
                out.push_str(xml);
            }
        }

        if self_closing {
            out.push_str("</");
            out.push_str(&self.root_qname);
            out.push('>');
            out.push_str(self.closing.trim_start());
        } else {
            out.push_str(&self.closing);
        }
        out
    }
}

impl XmlTemplate {
    /// Append `extra` after the last child named `after` (or at the end of the
    /// root when there is none), with `head` replacing the root start tag.
    pub(crate) fn render_appended(&self, head: &str, after: &str, extra: &str) -> String {
        let mut out = String::with_capacity(head.len() + extra.len() + 1024);
        let insert_at = self
            .segments
            .iter()
            .rposition(|s| s.local == after)
            .map(|i| i + 1)
            .unwrap_or(self.segments.len());
        if self.self_closing {
            let trimmed = head.trim_end();
            out.push_str(trimmed.strip_suffix("/>").unwrap_or(trimmed).trim_end());
            out.push('>');
            out.push_str(extra);
            out.push_str("</");
            out.push_str(&self.root_qname);
            out.push('>');
            out.push_str(self.closing.trim_start());
            return out;
        }
        out.push_str(head);
        for (i, seg) in self.segments.iter().enumerate() {
            if i == insert_at {
                out.push_str(extra);
            }
            out.push_str(&seg.lead);
            out.push_str(&seg.xml);
        }
        if insert_at == self.segments.len() {
            out.push_str(extra);
        }
        out.push_str(&self.closing);
        out
    }
}

/// Byte offset of the `<qname` tag opening the element just read, scanning
/// forward from `from` past comments and processing instructions.
fn element_start(xml: &str, from: usize, qname: &[u8]) -> usize {
    let bytes = xml.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            let rest = &bytes[i + 1..];
            if rest.starts_with(b"!--") {
                i = find_from(bytes, i, b"-->").map(|p| p + 3).unwrap_or(bytes.len());
                continue;
            }
            if rest.starts_with(b"?") {
                i = find_from(bytes, i, b"?>").map(|p| p + 2).unwrap_or(bytes.len());
                continue;
            }
            if rest.starts_with(qname) {
                let after = rest.get(qname.len()).copied();
                if matches!(after, Some(b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/')) {
                    return i;
                }
            }
        }
        i += 1;
    }
    from
}

fn find_from(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Rewrite the attributes of every start/empty tag named `local` inside `xml`,
/// leaving everything else untouched.
pub(crate) fn patch_attrs<F>(xml: &str, local: &str, mut patch: F) -> Result<String>
where
    F: FnMut(&mut Vec<(String, String)>),
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = quick_xml::Writer::new(Vec::with_capacity(xml.len() + 64));

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == local.as_bytes() => {
                let mut attrs = attributes(e)?;
                patch(&mut attrs);
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let mut tag = BytesStart::new(name);
                for (k, v) in &attrs {
                    tag.push_attribute((k.as_str(), v.as_str()));
                }
                let rebuilt = match event {
                    Event::Start(_) => Event::Start(tag),
                    _ => Event::Empty(tag),
                };
                writer.write_event(rebuilt)?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(ExcelError::from)
}

/// Set or replace one attribute on the root start tag held in a template head.
pub(crate) fn set_head_attr(head: &str, root_local: &str, key: &str, value: &str) -> Result<String> {
    patch_attrs(head, root_local, |attrs| {
        match attrs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => attrs.push((key.to_string(), value.to_string())),
        }
    })
}
