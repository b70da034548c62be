//! Archive access with inflate limits

use super::normalize_name;
use crate::config::EngineConfig;
use crate::error::{ExcelError, Result};
use crate::xml::part_to_string;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const ROOT_RELS_PART: &str = "_rels/.rels";

/// Read access to the parts of an xlsx archive
pub(crate) struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    /// Entry names in archive order
    names: Vec<String>,
    /// Lowercased name -> entry index
    lookup: HashMap<String, usize>,
    max_part_bytes: u64,
    max_total_bytes: u64,
    inflated: u64,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("parts", &self.names.len())
            .field("inflated", &self.inflated)
            .finish()
    }
}

impl Package {
    pub fn from_bytes(bytes: Vec<u8>, config: &EngineConfig) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExcelError::InvalidFormat(format!("not a zip archive: {e}")))?;

        let mut names = Vec::with_capacity(archive.len());
        let mut lookup = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            lookup.entry(normalize_name(&name)).or_insert(i);
            names.push(name);
        }

        log::debug!("opened package with {} parts", names.len());
        Ok(Package {
            archive,
            names,
            lookup,
            max_part_bytes: config.max_part_bytes,
            max_total_bytes: config.max_total_bytes,
            inflated: 0,
        })
    }

    /// Entry names in archive order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, part: &str) -> bool {
        self.lookup.contains_key(&normalize_name(part))
    }

    /// The stored name of `part`, matched case-insensitively
    pub fn entry_name(&self, part: &str) -> Option<&str> {
        self.lookup
            .get(&normalize_name(part))
            .map(|&i| self.names[i].as_str())
    }

    /// Inflate one part, enforcing the per-part and total size limits
    pub fn read_part(&mut self, part: &str) -> Result<Option<Vec<u8>>> {
        let Some(&index) = self.lookup.get(&normalize_name(part)) else {
            return Ok(None);
        };
        let file = self.archive.by_index(index)?;
        let declared = file.size();
        if declared > self.max_part_bytes {
            return Err(ExcelError::InvalidFormat(format!(
                "part {part} is {declared} bytes, over the {} byte limit",
                self.max_part_bytes
            )));
        }

        let mut buf = Vec::with_capacity(declared as usize);
        // The declared size can lie; never read more than the limit allows
        file.take(self.max_part_bytes + 1).read_to_end(&mut buf)?;
        if buf.len() as u64 > self.max_part_bytes {
            return Err(ExcelError::InvalidFormat(format!(
                "part {part} inflates past the {} byte limit",
                self.max_part_bytes
            )));
        }

        self.inflated += buf.len() as u64;
        if self.inflated > self.max_total_bytes {
            return Err(ExcelError::InvalidFormat(format!(
                "package inflates past the {} byte limit",
                self.max_total_bytes
            )));
        }
        Ok(Some(buf))
    }

    /// Inflate a part and decode it as UTF-8 XML
    pub fn read_xml(&mut self, part: &str) -> Result<Option<String>> {
        match self.read_part(part)? {
            Some(bytes) => Ok(Some(part_to_string(bytes, part)?)),
            None => Ok(None),
        }
    }

    /// Like [`Package::read_xml`] but a missing part is a format error
    pub fn require_xml(&mut self, part: &str) -> Result<String> {
        self.read_xml(part)?
            .ok_or_else(|| ExcelError::InvalidFormat(format!("missing required part {part}")))
    }

    pub(crate) fn archive_mut(&mut self) -> &mut ZipArchive<Cursor<Vec<u8>>> {
        &mut self.archive
    }
}
