//! `[Content_Types].xml`

use crate::error::Result;
use crate::xml::{attributes, XML_DECL};
use crate::xml_writer::XmlWriter;
use quick_xml::events::Event;
use quick_xml::Reader;

const CT_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub(crate) const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
pub(crate) const CT_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
pub(crate) const CT_SHARED_STRINGS: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";

#[derive(Debug, Clone, Default)]
pub(crate) struct ContentTypes {
    /// (extension, content type)
    defaults: Vec<(String, String)>,
    /// (part name with leading slash, content type)
    overrides: Vec<(String, String)>,
    dirty: bool,
}

fn part_key(part: &str) -> String {
    format!("/{}", part.trim_start_matches('/'))
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut types = ContentTypes::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => {
                    let attrs = attributes(&e)?;
                    let get = |k: &str| {
                        attrs
                            .iter()
                            .find(|(key, _)| key == k)
                            .map(|(_, v)| v.clone())
                            .unwrap_or_default()
                    };
                    match e.local_name().as_ref() {
                        b"Default" => types.defaults.push((get("Extension"), get("ContentType"))),
                        b"Override" => types.overrides.push((get("PartName"), get("ContentType"))),
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(types)
    }

    /// Content type of `part`: its override, or the default for its extension
    pub fn content_type_of(&self, part: &str) -> Option<&str> {
        let key = part_key(part);
        if let Some((_, ct)) = self
            .overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&key))
        {
            return Some(ct);
        }
        let ext = part.rsplit_once('.').map(|(_, e)| e)?;
        self.defaults
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, ct)| ct.as_str())
    }

    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let key = part_key(part);
        match self
            .overrides
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&key))
        {
            Some(slot) if slot.1 == content_type => return,
            Some(slot) => slot.1 = content_type.to_string(),
            None => self.overrides.push((key, content_type.to_string())),
        }
        self.dirty = true;
    }

    pub fn remove_override(&mut self, part: &str) {
        let key = part_key(part);
        let before = self.overrides.len();
        self.overrides.retain(|(name, _)| !name.eq_ignore_ascii_case(&key));
        if self.overrides.len() != before {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut w = XmlWriter::in_memory();
        w.write_str(XML_DECL)?;
        w.start_element("Types")?;
        w.attribute("xmlns", CT_NS)?;
        w.close_start_tag()?;
        for (ext, ct) in &self.defaults {
            w.start_element("Default")?;
            w.attribute("Extension", ext)?;
            w.attribute("ContentType", ct)?;
            w.close_empty()?;
        }
        for (part, ct) in &self.overrides {
            w.start_element("Override")?;
            w.attribute("PartName", part)?;
            w.attribute("ContentType", ct)?;
            w.close_empty()?;
        }
        w.end_element("Types")?;
        w.into_string()
    }
}
