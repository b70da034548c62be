//! Shared strings table for string deduplication.
//!
//! The table is append-only: entries loaded from the file keep their index
//! and their original XML (rich runs, phonetic hints), new strings are added
//! at the end.

use crate::error::Result;
use crate::xml::{element_text, set_head_attr, XmlTemplate, MAIN_NS, XML_DECL};
use crate::xml_writer::XmlWriter;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    /// Original `<si>` element for loaded entries
    raw: Option<String>,
}

/// Shared strings table that deduplicates strings across the workbook
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedStrings {
    entries: Vec<Entry>,
    string_map: HashMap<String, u32>,
    loaded_len: usize,
    template: Option<XmlTemplate>,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `sharedStrings.xml`
    pub fn load(xml: &str) -> Result<Self> {
        let template = XmlTemplate::parse(xml)?;
        let mut table = SharedStrings::new();

        for seg in template.segments().iter().filter(|s| s.local == "si") {
            let (text, plain) = item_text(&seg.xml)?;
            let index = table.entries.len() as u32;
            if plain {
                table.string_map.entry(text.clone()).or_insert(index);
            }
            table.entries.push(Entry {
                text,
                raw: Some(seg.xml.clone()),
            });
        }

        table.loaded_len = table.entries.len();
        table.template = Some(template);
        log::debug!("loaded {} shared strings", table.loaded_len);
        Ok(table)
    }

    /// Add a string and get its index
    pub fn add_string(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.string_map.get(s) {
            return index;
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            text: s.to_string(),
            raw: None,
        });
        self.string_map.insert(s.to_string(), index);
        index
    }

    /// Visible text of the entry at `index`
    pub fn get(&self, index: u32) -> Option<&str> {
        self.entries.get(index as usize).map(|e| e.text.as_str())
    }

    /// Get number of unique strings
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// True when strings were added since load (or the last save)
    pub fn is_dirty(&self) -> bool {
        self.entries.len() > self.loaded_len
    }

    /// True when the table came from an existing part
    pub fn has_part(&self) -> bool {
        self.template.is_some()
    }

    pub fn mark_saved(&mut self) {
        self.loaded_len = self.entries.len();
    }

    /// Serialize the table. `references` is the number of cells pointing into it.
    pub fn to_xml(&self, references: usize) -> Result<String> {
        let mut added = XmlWriter::in_memory();
        let new_entries = self.entries.iter().filter(|e| e.raw.is_none());

        match &self.template {
            Some(template) => {
                let si = template.qname("si");
                let t = template.qname("t");
                for entry in new_entries {
                    write_item(&mut added, &si, &t, &entry.text)?;
                }
                let head = set_head_attr(template.head(), "sst", "count", &references.to_string())?;
                let head = set_head_attr(&head, "sst", "uniqueCount", &self.entries.len().to_string())?;
                Ok(template.render_appended(&head, "si", &added.into_string()?))
            }
            None => {
                added.write_str(XML_DECL)?;
                added.start_element("sst")?;
                added.attribute("xmlns", MAIN_NS)?;
                added.attribute_int("count", references as i64)?;
                added.attribute_int("uniqueCount", self.entries.len() as i64)?;
                added.close_start_tag()?;
                for entry in new_entries {
                    write_item(&mut added, "si", "t", &entry.text)?;
                }
                added.end_element("sst")?;
                added.into_string()
            }
        }
    }
}

/// Visible text of a string item (`<si>` or an inline `<is>`), and whether it
/// is a single plain `<t>` with no runs or phonetic data.
pub(crate) fn item_text(xml: &str) -> Result<(String, bool)> {
    let item = XmlTemplate::parse(xml)?;
    let mut text = String::new();
    let mut plain = true;
    for child in item.segments() {
        match child.local.as_str() {
            "t" => text.push_str(&element_text(&child.xml)?),
            "r" => {
                plain = false;
                let run = XmlTemplate::parse(&child.xml)?;
                if let Some(t) = run.segment("t") {
                    text.push_str(&element_text(&t.xml)?);
                }
            }
            // phonetic runs and properties are not part of the visible text
            _ => plain = false,
        }
    }
    Ok((text, plain))
}

fn write_item(w: &mut XmlWriter<Vec<u8>>, si: &str, t: &str, text: &str) -> Result<()> {
    w.start_element(si)?;
    w.close_start_tag()?;
    w.start_element(t)?;
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        w.attribute("xml:space", "preserve")?;
    }
    w.close_start_tag()?;
    w.write_escaped(&escape_control_chars(text))?;
    w.end_element(t)?;
    w.end_element(si)
}

/// Control characters are not allowed in XML 1.0 and are stored as `_xHHHH_`
fn escape_control_chars(text: &str) -> std::borrow::Cow<'_, str> {
    let needs = |c: char| c < ' ' && !matches!(c, '\t' | '\n' | '\r');
    if !text.chars().any(needs) {
        return std::borrow::Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if needs(c) {
            out.push_str(&format!("_x{:04X}_", c as u32));
        } else {
            out.push(c);
        }
    }
    std::borrow::Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SST: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3"><si><t>Name</t></si><si><r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space="preserve"> tail</t></r></si><si><t>Qty</t><rPh sb="0" eb="1"><t>q</t></rPh></si></sst>"#;

    #[test]
    fn test_shared_strings() {
        let mut ss = SharedStrings::new();

        let idx1 = ss.add_string("Hello");
        let idx2 = ss.add_string("World");
        let idx3 = ss.add_string("Hello"); // Duplicate

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0); // Should return same index
        assert_eq!(ss.count(), 2);
    }

    #[test]
    fn test_load_keeps_indices_and_visible_text() {
        let ss = SharedStrings::load(SST).unwrap();
        assert_eq!(ss.count(), 3);
        assert_eq!(ss.get(0), Some("Name"));
        assert_eq!(ss.get(1), Some("Bold tail"));
        assert_eq!(ss.get(2), Some("Qty"));
        assert!(!ss.is_dirty());
    }

    #[test]
    fn test_rich_entries_are_not_reused_for_plain_text() {
        let mut ss = SharedStrings::load(SST).unwrap();
        assert_eq!(ss.add_string("Name"), 0);
        assert_eq!(ss.add_string("Bold tail"), 3);
        assert!(ss.is_dirty());
    }

    #[test]
    fn test_append_keeps_loaded_entries_verbatim() {
        let mut ss = SharedStrings::load(SST).unwrap();
        ss.add_string(" padded ");
        let xml = ss.to_xml(5).unwrap();
        assert!(xml.contains(r#"count="5" uniqueCount="4""#));
        assert!(xml.contains("<si><r><rPr><b/></rPr><t>Bold</t></r>"));
        assert!(xml.ends_with(r#"<si><t xml:space="preserve"> padded </t></si></sst>"#));

        let reloaded = SharedStrings::load(&xml).unwrap();
        assert_eq!(reloaded.get(3), Some(" padded "));
    }

    #[test]
    fn test_new_table_xml() {
        let mut ss = SharedStrings::new();
        ss.add_string("a<b");
        let xml = ss.to_xml(1).unwrap();
        assert!(xml.contains("<si><t>a&lt;b</t></si>"));
        assert!(!ss.has_part());
    }

    #[test]
    fn test_control_chars_escaped() {
        assert_eq!(escape_control_chars("a\u{1}b"), "a_x0001_b");
        assert_eq!(escape_control_chars("a\tb"), "a\tb");
    }
}
