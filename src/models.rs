//! Data structures handed to and produced by the migration compiler.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, PlanWarning};

/// Well-known folder a selected item belongs to, independent of host path syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum LogicalRoot {
  /// The user's desktop folder.
  Desktop,
  /// The user's documents folder.
  Documents,
  /// The user's downloads folder.
  Downloads,
  /// The user's pictures folder.
  Pictures,
  /// The user's music folder.
  Music,
  /// The user's videos folder.
  Videos,
  /// Anything else inside the user home (`AppData`, `Favorites`, ...).
  Home,
  /// Anything outside the user home.
  Custom,
}

impl LogicalRoot {
  /// Roots recognized by name directly below the user home.
  pub const RECOGNIZED: [LogicalRoot; 6] = [
    LogicalRoot::Desktop,
    LogicalRoot::Documents,
    LogicalRoot::Downloads,
    LogicalRoot::Pictures,
    LogicalRoot::Music,
    LogicalRoot::Videos,
  ];

  /// Directory name used for this root below the destination and inside the archive.
  pub fn dir_name(&self) -> &'static str {
    match self {
      LogicalRoot::Desktop => "Desktop",
      LogicalRoot::Documents => "Documents",
      LogicalRoot::Downloads => "Downloads",
      LogicalRoot::Pictures => "Pictures",
      LogicalRoot::Music => "Music",
      LogicalRoot::Videos => "Videos",
      LogicalRoot::Home => "Home",
      LogicalRoot::Custom => "Custom",
    }
  }

  /// Match a folder name directly below the home against the recognized roots.
  pub fn from_folder_name(name: &str) -> Option<Self> {
    Self::RECOGNIZED
      .into_iter()
      .find(|root| root.dir_name().eq_ignore_ascii_case(name))
  }
}

impl fmt::Display for LogicalRoot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.dir_name())
  }
}

/// Whether a selected item is a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
  /// Regular file.
  File,
  /// Directory copied recursively.
  Directory,
}

/// A selected source item expressed as a logical root plus relative segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceItem {
  /// Well-known folder the item lives in.
  pub logical_root: LogicalRoot,
  relative_path: Vec<String>,
  /// File or directory.
  pub kind: ItemKind,
  /// Keep modes and timestamps when copying or archiving.
  pub preserve_permissions: bool,
  /// Copy symbolic links as links instead of following them.
  pub preserve_symlinks: bool,
  #[serde(skip)]
  source: PathBuf,
}

impl SourceItem {
  /// Build an item from already split segments, rejecting traversal and embedded separators.
  pub fn new(
    logical_root: LogicalRoot,
    relative_path: impl IntoIterator<Item = impl Into<String>>,
    kind: ItemKind,
  ) -> Result<Self, MigrationError> {
    let relative_path: Vec<String> = relative_path.into_iter().map(Into::into).collect();
    for segment in &relative_path {
      validate_segment(segment).map_err(|reason| {
        MigrationError::invalid_path(relative_path.join("/"), reason)
      })?;
    }

    Ok(Self {
      logical_root,
      relative_path,
      kind,
      preserve_permissions: true,
      preserve_symlinks: true,
      source: PathBuf::new(),
    })
  }

  /// Attach the host path the item was selected from.
  pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
    self.source = source.into();
    self
  }

  /// Override the preservation flags used by the copy and archive steps.
  pub fn with_preservation(mut self, permissions: bool, symlinks: bool) -> Self {
    self.preserve_permissions = permissions;
    self.preserve_symlinks = symlinks;
    self
  }

  /// Relative segments below the logical root.
  pub fn relative_path(&self) -> &[String] {
    &self.relative_path
  }

  /// Host path the item was selected from; empty when built without one.
  pub fn source(&self) -> &std::path::Path {
    &self.source
  }

  /// Forward-slash path below the destination root, e.g. `Desktop/notes.txt`.
  pub fn destination_relative(&self) -> String {
    let mut path = self.logical_root.dir_name().to_string();
    for segment in &self.relative_path {
      path.push('/');
      path.push_str(segment);
    }
    path
  }
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
  if segment.is_empty() {
    return Err("empty path segment");
  }
  if segment == "." || segment == ".." {
    return Err("path traversal segments are not allowed");
  }
  if segment.contains(['/', '\\', '\0']) {
    return Err("path segment contains a separator or NUL byte");
  }
  Ok(())
}

/// An installed application as reported by the host application registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApplicationEntry {
  /// Name shown in the registry, e.g. `Mozilla Firefox (x64 en-US)`.
  pub display_name: String,
  /// Version reported by the registry, if any.
  #[serde(default)]
  pub detected_version: Option<String>,
  /// Install location reported by the registry, if any.
  #[serde(default)]
  pub detected_install_path: Option<String>,
}

impl ApplicationEntry {
  /// Entry carrying only a display name.
  pub fn named(display_name: impl Into<String>) -> Self {
    Self {
      display_name: display_name.into(),
      ..Self::default()
    }
  }
}

/// Outcome class of an alternative lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
  /// A target package is suggested.
  Mapped,
  /// No known alternative exists for the application.
  Unmapped,
}

/// Suggested target package for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
  /// Whether a package was found.
  pub status: ResolutionStatus,
  /// Package to install on the target, present only when mapped.
  pub package_name: Option<String>,
  /// Packages tried in order when `package_name` fails to install.
  pub fallbacks: Vec<String>,
  /// Extra guidance for packages that need a third-party repository or manual steps.
  pub hint: Option<String>,
}

impl Resolution {
  /// The sentinel returned for every lookup miss.
  pub fn unmapped() -> Self {
    Self {
      status: ResolutionStatus::Unmapped,
      package_name: None,
      fallbacks: Vec::new(),
      hint: None,
    }
  }

  /// A successful lookup.
  pub fn mapped(package_name: impl Into<String>, hint: Option<String>) -> Self {
    Self {
      status: ResolutionStatus::Mapped,
      package_name: Some(package_name.into()),
      fallbacks: Vec::new(),
      hint,
    }
  }

  /// Attach fallback packages to a mapped resolution.
  pub fn with_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
    self.fallbacks = fallbacks;
    self
  }

  /// Returns `true` when a package was suggested.
  pub fn is_mapped(&self) -> bool {
    self.status == ResolutionStatus::Mapped
  }
}

/// Compiler output handed to the target machine.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationPlan {
  /// Generated POSIX shell script.
  pub script_text: String,
  /// Items bundled into the archive, in selection order.
  pub archive_manifest: Vec<SourceItem>,
  /// Non-fatal findings, in the order they were produced.
  pub warnings: Vec<PlanWarning>,
}

/// Serializable summary of a plan written next to the script.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary<'a> {
  /// `"archive"` or `"direct"`.
  pub mode: &'static str,
  /// Archive file name expected next to the script, when archive mode is active.
  pub archive_name: Option<&'a str>,
  /// Entries in archive order.
  pub entries: Vec<ManifestEntrySummary>,
  /// Rendered warnings.
  pub warnings: Vec<String>,
}

/// Serializable manifest entry.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntrySummary {
  /// Path inside the archive and below the destination root.
  pub path: String,
  /// File or directory.
  pub kind: ItemKind,
}

impl<'a> ManifestSummary<'a> {
  /// Summarise a compiled plan.
  pub fn from_plan(plan: &MigrationPlan, archive_name: Option<&'a str>) -> Self {
    Self {
      mode: if archive_name.is_some() { "archive" } else { "direct" },
      archive_name,
      entries: plan
        .archive_manifest
        .iter()
        .map(|item| ManifestEntrySummary {
          path: item.destination_relative(),
          kind: item.kind,
        })
        .collect(),
      warnings: plan.warnings.iter().map(ToString::to_string).collect(),
    }
  }
}
