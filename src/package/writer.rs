//! Output archive assembly: regenerated parts are written fresh, everything
//! else is copied from the source archive without recompression.

use super::{normalize_name, Package};
use crate::error::Result;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::io::{Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Parts to replace, add or drop when writing a package
#[derive(Debug, Default)]
pub(crate) struct SavePlan {
    /// normalized name -> (stored name, bytes)
    parts: IndexMap<String, (String, Vec<u8>)>,
    removed: HashSet<String>,
}

impl SavePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace (or add) `part` with `bytes`
    pub fn put(&mut self, part: &str, bytes: impl Into<Vec<u8>>) {
        let key = normalize_name(part);
        self.removed.remove(&key);
        self.parts.insert(key, (part.to_string(), bytes.into()));
    }

    /// Leave `part` out of the output
    pub fn remove(&mut self, part: &str) {
        let key = normalize_name(part);
        self.parts.shift_remove(&key);
        self.removed.insert(key);
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.removed.is_empty()
    }

    pub fn contains(&self, part: &str) -> bool {
        self.parts.contains_key(&normalize_name(part))
    }

    /// Added parts as (stored name, bytes), in insertion order
    pub fn into_parts(self) -> impl Iterator<Item = (String, Vec<u8>)> {
        self.parts.into_values()
    }
}

fn file_options(level: u32) -> SimpleFileOptions {
    if level == 0 {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level.min(9) as i64))
    }
}

/// Write `package` with `plan` applied. Entries keep their original order and
/// names; new parts are appended in the order they were added to the plan.
pub(crate) fn write_package<W: Write + Seek>(
    package: &mut Package,
    mut plan: SavePlan,
    out: W,
    compression_level: u32,
) -> Result<W> {
    let options = file_options(compression_level);
    let mut zip = ZipWriter::new(out);
    let names = package.names().to_vec();
    let archive = package.archive_mut();

    let mut copied = 0usize;
    for (index, name) in names.iter().enumerate() {
        let key = normalize_name(name);
        if plan.removed.contains(&key) {
            log::debug!("dropping part {name}");
            continue;
        }
        if let Some((_, bytes)) = plan.parts.shift_remove(&key) {
            zip.start_file(name.clone(), options)?;
            zip.write_all(&bytes)?;
        } else {
            let file = archive.by_index_raw(index)?;
            zip.raw_copy_file(file)?;
            copied += 1;
        }
    }

    for (_, (name, bytes)) in plan.parts {
        log::debug!("adding part {name}");
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }

    log::debug!("copied {copied} unchanged parts");
    Ok(zip.finish()?)
}
