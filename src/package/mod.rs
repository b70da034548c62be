//! OPC package access: the zip container, relationship parts and content types.
//!
//! A [`Package`] keeps the original archive bytes for its whole life so that
//! parts nobody edits can be copied into the output without being inflated.

pub(crate) mod blank;
pub(crate) mod content_types;
mod reader;
pub(crate) mod relationships;
pub(crate) mod writer;

pub(crate) use reader::{Package, CONTENT_TYPES_PART, ROOT_RELS_PART};

/// Lookup key for a part name: no leading slash, forward slashes, lowercase
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim_start_matches(['/', '\\'])
        .replace('\\', "/")
        .to_ascii_lowercase()
}

/// The relationships part belonging to `part`
pub(crate) fn rels_for_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns the relationship
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize_path(source_part);
    }
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize_path(absolute);
    }
    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize_path(&format!("{base_dir}/{target}"))
}

/// Relationship target for `part` as seen from `source_part`
pub(crate) fn relative_target(source_part: &str, part: &str) -> String {
    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    if base_dir.is_empty() {
        return part.to_string();
    }
    match part.strip_prefix(base_dir).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) => rest.to_string(),
        None => format!("/{part}"),
    }
}

fn normalize_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for piece in path.split('/') {
        match piece {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}
