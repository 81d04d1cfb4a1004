//! Error and warning types shared across the compiler.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Fatal errors raised while normalizing selections or compiling a plan.
#[derive(Debug, Error)]
pub enum MigrationError {
  /// A selected source item is missing, unreadable or structurally invalid.
  #[error("invalid source path {path}: {reason}")]
  InvalidPath {
    /// Path as it was handed to the compiler.
    path: String,
    /// Human readable reason the path was rejected.
    reason: String,
  },
  /// The migration configuration cannot produce a usable script.
  #[error("invalid configuration: {0}")]
  InvalidConfiguration(String),
  /// Failed to read the settings file from disk.
  #[error("failed to read {path}: {source}")]
  SettingsIo {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    source: std::io::Error,
  },
  /// Failed to parse the JSON settings file.
  #[error("failed to parse {path}: {source}")]
  SettingsParse {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    source: serde_json::Error,
  },
}

impl MigrationError {
  pub(crate) fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidPath {
      path: path.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
    Self::InvalidConfiguration(reason.into())
  }

  /// Downgrade a per-item path error into a plan warning; other errors stay fatal.
  pub fn into_warning(self) -> Result<PlanWarning, Self> {
    match self {
      Self::InvalidPath { path, reason } => Ok(PlanWarning::InvalidPath { path, reason }),
      other => Err(other),
    }
  }
}

/// Non-fatal conditions collected while compiling and surfaced with the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
  /// The item list handed to the archive planner was empty.
  NoItemsSelected,
  /// Neither items nor applications were selected.
  EmptyPlan,
  /// An application has no known target package and is left out of installation.
  UnmappedApplication {
    /// Display name as enumerated on the source host.
    name: String,
  },
  /// A selected path was dropped from the plan during normalization.
  InvalidPath {
    /// Path as selected on the source host.
    path: String,
    /// Reason the item was dropped.
    reason: String,
  },
}

impl fmt::Display for PlanWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NoItemsSelected => f.write_str("no items selected"),
      Self::EmptyPlan => f.write_str("empty plan: no items and no applications selected"),
      Self::UnmappedApplication { name } => {
        write!(f, "no known alternative for application '{name}'")
      }
      Self::InvalidPath { path, reason } => write!(f, "skipped {path}: {reason}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn warnings_render_as_plain_strings() {
    assert_eq!(PlanWarning::NoItemsSelected.to_string(), "no items selected");
    let unmapped = PlanWarning::UnmappedApplication {
      name: "Totally Unknown App 9000".into(),
    };
    assert!(unmapped.to_string().contains("Totally Unknown App 9000"));
  }

  #[test]
  fn only_path_errors_downgrade_to_warnings() {
    let warning = MigrationError::invalid_path("C:/x", "not found").into_warning();
    assert_eq!(
      warning.unwrap(),
      PlanWarning::InvalidPath {
        path: "C:/x".into(),
        reason: "not found".into()
      }
    );

    let config = MigrationError::invalid_config("empty").into_warning();
    assert!(matches!(config, Err(MigrationError::InvalidConfiguration(_))));
  }
}
