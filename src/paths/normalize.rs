use std::fs;
use std::path::Path;

use tracing::debug;

use super::host::{HostPath, split_host_path};
use crate::error::{MigrationError, PlanWarning};
use crate::models::{ItemKind, LogicalRoot, SourceItem};

/// Normalize a selected host path into a [`SourceItem`].
///
/// The path must exist when the plan is compiled; the generated script re-checks the
/// copied tree at run time on its own. Items inherit default preservation flags, which
/// callers can override with [`SourceItem::with_preservation`].
pub fn normalize(raw_path: &str, known_user_home: &Path) -> Result<SourceItem, MigrationError> {
    let metadata = fs::metadata(raw_path)
        .map_err(|err| MigrationError::invalid_path(raw_path, err.to_string()))?;
    let kind = if metadata.is_dir() {
        ItemKind::Directory
    } else if metadata.is_file() {
        ItemKind::File
    } else {
        return Err(MigrationError::invalid_path(
            raw_path,
            "not a regular file or directory",
        ));
    };

    let (root, relative) = classify(raw_path, &known_user_home.to_string_lossy())?;
    debug!(path = raw_path, root = %root, "normalized source item");

    SourceItem::new(root, relative, kind).map(|item| item.with_source(raw_path))
}

/// Normalize every path, downgrading per-item failures into warnings.
pub fn normalize_all<I, S>(raw_paths: I, known_user_home: &Path) -> (Vec<SourceItem>, Vec<PlanWarning>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut items = Vec::new();
    let mut warnings = Vec::new();

    for raw in raw_paths {
        let raw = raw.as_ref();
        match normalize(raw, known_user_home) {
            Ok(item) => items.push(item),
            Err(err) => warnings.push(err.into_warning().unwrap_or_else(|other| {
                PlanWarning::InvalidPath {
                    path: raw.to_string(),
                    reason: other.to_string(),
                }
            })),
        }
    }

    (items, warnings)
}

/// Tag a raw absolute path with its logical root and relative segments.
///
/// Pure syntax work: no filesystem access, so Windows selections can be classified on
/// any host.
pub fn classify(raw_path: &str, known_user_home: &str) -> Result<(LogicalRoot, Vec<String>), MigrationError> {
    let path = split_host_path(raw_path);
    if !path.absolute {
        return Err(MigrationError::invalid_path(raw_path, "path must be absolute"));
    }
    if path.segments.iter().any(|segment| segment == "..") {
        return Err(MigrationError::invalid_path(
            raw_path,
            "path traversal segments are not allowed",
        ));
    }

    let home = split_host_path(known_user_home);
    if let Some(rest) = strip_home(&path, &home) {
        let mut rest = rest.to_vec();
        if let Some(root) = rest.first().and_then(|first| LogicalRoot::from_folder_name(first)) {
            rest.remove(0);
            return Ok((root, rest));
        }
        return Ok((LogicalRoot::Home, rest));
    }

    let mut relative = Vec::with_capacity(path.segments.len() + 1);
    if let Some(prefix) = path.prefix.as_deref().filter(|prefix| *prefix != "UNC") {
        relative.push(prefix.to_string());
    }
    relative.extend(path.segments);
    Ok((LogicalRoot::Custom, relative))
}

fn strip_home<'a>(path: &'a HostPath, home: &HostPath) -> Option<&'a [String]> {
    if home.segments.is_empty() || path.segments.len() < home.segments.len() {
        return None;
    }

    let case_insensitive = path.is_case_insensitive() || home.is_case_insensitive();
    let same = |left: &str, right: &str| {
        if case_insensitive {
            left.eq_ignore_ascii_case(right)
        } else {
            left == right
        }
    };

    match (&path.prefix, &home.prefix) {
        (Some(left), Some(right)) if !left.eq_ignore_ascii_case(right) => return None,
        (Some(_), None) | (None, Some(_)) => return None,
        _ => {}
    }

    let matches = path
        .segments
        .iter()
        .zip(&home.segments)
        .all(|(left, right)| same(left, right));

    matches.then(|| &path.segments[home.segments.len()..])
}
