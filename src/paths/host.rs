/// A raw host path split into an optional prefix and plain segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPath {
    /// Drive letter (`C`) or `UNC` for network shares.
    pub prefix: Option<String>,
    /// Segments with separators, empty components and `.` removed.
    pub segments: Vec<String>,
    /// Whether the path was rooted (drive, UNC or leading separator).
    pub absolute: bool,
}

impl HostPath {
    /// Windows paths compare case-insensitively.
    pub fn is_case_insensitive(&self) -> bool {
        self.prefix.is_some()
    }
}

/// Split a path written in either Windows or POSIX syntax.
///
/// Both `\` and `/` are treated as separators regardless of the host running the
/// compiler, so a selection captured on Windows can be compiled anywhere. `..` segments
/// are preserved so the caller can reject them explicitly.
pub fn split_host_path(raw: &str) -> HostPath {
    let mut rest = raw.trim();
    let mut prefix = None;
    let mut absolute = false;

    for verbatim in [r"\\?\", r"\\.\"] {
        if let Some(stripped) = rest.strip_prefix(verbatim) {
            rest = stripped;
            absolute = true;
        }
    }

    if let Some(stripped) = rest
        .strip_prefix(r"\\")
        .or_else(|| rest.strip_prefix("//"))
    {
        prefix = Some("UNC".to_string());
        absolute = true;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix("UNC\\") {
        prefix = Some("UNC".to_string());
        rest = stripped;
    } else {
        let mut chars = rest.chars();
        if let (Some(letter), Some(':')) = (chars.next(), chars.next()) {
            if letter.is_ascii_alphabetic() {
                prefix = Some(letter.to_ascii_uppercase().to_string());
                absolute = true;
                rest = &rest[2..];
            }
        }
    }

    if rest.starts_with(['/', '\\']) {
        absolute = true;
    }

    let segments = rest
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(str::to_string)
        .collect();

    HostPath {
        prefix,
        segments,
        absolute,
    }
}
