//! `.rels` parts

use crate::error::Result;
use crate::xml::{attributes, XML_DECL};
use crate::xml_writer::XmlWriter;
use quick_xml::events::Event;
use quick_xml::Reader;

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub(crate) const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(crate) const REL_OFFICE_DOCUMENT: &str = "officeDocument";
pub(crate) const REL_WORKSHEET: &str = "worksheet";
pub(crate) const REL_STYLES: &str = "styles";
pub(crate) const REL_SHARED_STRINGS: &str = "sharedStrings";
pub(crate) const REL_CALC_CHAIN: &str = "calcChain";

/// Full relationship type URI for a transitional-schema kind such as `"worksheet"`
pub(crate) fn rel_type(kind: &str) -> String {
    format!("{REL_BASE}/{kind}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
    /// Any other attributes, kept in order
    pub extra: Vec<(String, String)>,
}

impl Relationship {
    /// Last path segment of the type URI. Strict and transitional documents
    /// use different base URIs for the same kinds.
    pub fn kind(&self) -> &str {
        self.rel_type.rsplit('/').next().unwrap_or(&self.rel_type)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut items = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        external: false,
                        extra: Vec::new(),
                    };
                    for (key, value) in attributes(&e)? {
                        match key.as_str() {
                            "Id" => rel.id = value,
                            "Type" => rel.rel_type = value,
                            "Target" => rel.target = value,
                            "TargetMode" => rel.external = value.eq_ignore_ascii_case("External"),
                            _ => rel.extra.push((key, value)),
                        }
                    }
                    if rel.id.is_empty() {
                        log::warn!("skipping relationship without an Id");
                        continue;
                    }
                    items.push(rel);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(Relationships { items })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn by_id(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    /// First internal relationship of the given kind
    pub fn first_of_kind(&self, kind: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| !r.external && r.kind() == kind)
    }

    /// Add a relationship with a fresh `rIdN` id and return the id
    pub fn add(&mut self, rel_type: String, target: String) -> String {
        let next = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{next}");
        self.items.push(Relationship {
            id: id.clone(),
            rel_type,
            target,
            external: false,
            extra: Vec::new(),
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.items.iter().position(|r| r.id == id)?;
        Some(self.items.remove(pos))
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut w = XmlWriter::in_memory();
        w.write_str(XML_DECL)?;
        w.start_element("Relationships")?;
        w.attribute("xmlns", RELS_NS)?;
        w.close_start_tag()?;
        for rel in &self.items {
            w.start_element("Relationship")?;
            w.attribute("Id", &rel.id)?;
            w.attribute("Type", &rel.rel_type)?;
            w.attribute("Target", &rel.target)?;
            if rel.external {
                w.attribute("TargetMode", "External")?;
            }
            for (k, v) in &rel.extra {
                w.attribute(k, v)?;
            }
            w.close_empty()?;
        }
        w.end_element("Relationships")?;
        w.into_string()
    }
}
