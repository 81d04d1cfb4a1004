//! Settings file loader describing one migration: target config plus the selection snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::alternatives::{AlternativeMapping, AlternativeTable};
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::models::ApplicationEntry;
use crate::selection::AppSelection;

/// Default settings file name searched for in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "migrator.settings.json";

/// A selected path, either bare or with per-item preservation overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SelectedPath {
  /// Path using the settings-wide preservation flags.
  Plain(String),
  /// Path with explicit flags.
  Detailed {
    /// Absolute host path.
    path: String,
    /// Overrides [`MigrationSettings::preserve_permissions`].
    #[serde(default)]
    preserve_permissions: Option<bool>,
    /// Overrides [`MigrationSettings::preserve_symlinks`].
    #[serde(default)]
    preserve_symlinks: Option<bool>,
  },
}

impl SelectedPath {
  /// Raw host path.
  pub fn path(&self) -> &str {
    match self {
      Self::Plain(path) => path,
      Self::Detailed { path, .. } => path,
    }
  }

  /// Effective `(permissions, symlinks)` flags given the settings-wide defaults.
  pub fn preservation(&self, permissions: bool, symlinks: bool) -> (bool, bool) {
    match self {
      Self::Plain(_) => (permissions, symlinks),
      Self::Detailed {
        preserve_permissions,
        preserve_symlinks,
        ..
      } => (
        preserve_permissions.unwrap_or(permissions),
        preserve_symlinks.unwrap_or(symlinks),
      ),
    }
  }
}

/// Everything the selection layer hands over for one compilation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationSettings {
  /// Target environment settings.
  #[serde(flatten)]
  pub config: MigrationConfig,
  /// User home on the source machine; defaults to the current user's home.
  pub home: Option<String>,
  /// Selected files and folders, in selection order.
  pub items: Vec<SelectedPath>,
  /// Applications selected from the registry snapshot.
  pub apps: Vec<ApplicationEntry>,
  /// Extra or replacement alternative mappings keyed by display name.
  pub alternatives: BTreeMap<String, AlternativeMapping>,
  /// Application names to leave out regardless of selection.
  pub exclude_apps: Vec<String>,
  /// Keep registry entries that look like updates, drivers or runtimes.
  pub include_system_components: bool,
  /// Default permission preservation for selected items.
  pub preserve_permissions: bool,
  /// Default symlink preservation for selected items.
  pub preserve_symlinks: bool,
}

impl Default for MigrationSettings {
  fn default() -> Self {
    Self {
      config: MigrationConfig::default(),
      home: None,
      items: Vec::new(),
      apps: Vec::new(),
      alternatives: BTreeMap::new(),
      exclude_apps: Vec::new(),
      include_system_components: false,
      preserve_permissions: true,
      preserve_symlinks: true,
    }
  }
}

impl MigrationSettings {
  /// Attempt to load settings from the provided directory.
  ///
  /// When the file does not exist or fails to parse we fall back to default values so
  /// callers can still compile an app-only or empty plan.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_SETTINGS_FILE);
    match Self::load_from_path(&candidate) {
      Ok(settings) => settings,
      Err(MigrationError::SettingsIo { source, .. })
        if source.kind() == std::io::ErrorKind::NotFound =>
      {
        Self::default()
      }
      Err(err) => {
        warn!(error = %err, "ignoring unreadable settings file");
        Self::default()
      }
    }
  }

  /// Read settings from a specific JSON file.
  pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| MigrationError::SettingsIo {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&contents).map_err(|source| MigrationError::SettingsParse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Source home directory used to tag selections.
  pub fn home_dir(&self) -> Option<PathBuf> {
    self
      .home
      .as_deref()
      .filter(|home| !home.trim().is_empty())
      .map(PathBuf::from)
      .or_else(dirs::home_dir)
  }

  /// Alternative table with this file's overrides applied.
  pub fn alternative_table(&self) -> AlternativeTable {
    if self.alternatives.is_empty() {
      AlternativeTable::builtin().clone()
    } else {
      AlternativeTable::with_overrides(&self.alternatives)
    }
  }

  /// Application filter built from the exclusion list.
  pub fn app_selection(&self) -> AppSelection {
    AppSelection::new(self.exclude_apps.iter().cloned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn discover_returns_default_for_missing_file() {
    let temp = tempdir().expect("failed to create temp dir");
    let settings = MigrationSettings::discover(temp.path());
    assert!(settings.items.is_empty());
    assert_eq!(settings.config, MigrationConfig::default());
  }

  #[test]
  fn discover_falls_back_on_parse_errors() {
    let temp = tempdir().expect("failed to create temp dir");
    fs::write(temp.path().join(DEFAULT_SETTINGS_FILE), "{ not json").unwrap();
    let settings = MigrationSettings::discover(temp.path());
    assert!(settings.apps.is_empty());
  }

  #[test]
  fn load_from_path_reports_parse_errors() {
    let temp = tempdir().expect("failed to create temp dir");
    let path = temp.path().join("broken.json");
    fs::write(&path, "[1, 2").unwrap();
    assert!(matches!(
      MigrationSettings::load_from_path(&path),
      Err(MigrationError::SettingsParse { .. })
    ));
  }

  #[test]
  fn load_from_path_reads_flattened_config_and_selection() {
    let temp = tempdir().expect("failed to create temp dir");
    let path = temp.path().join(DEFAULT_SETTINGS_FILE);
    fs::write(
      &path,
      r#"{
        "target_username": "alice",
        "package_manager_command": "dnf install -y",
        "archive_mode": true,
        "home": "C:\\Users\\Alice",
        "items": [
          "C:\\Users\\Alice\\Desktop",
          {"path": "C:\\Users\\Alice\\Documents", "preserve_symlinks": false}
        ],
        "apps": [{"display_name": "Mozilla Firefox", "detected_version": "128.0"}],
        "alternatives": {"Acme Tool": {"target_package_name": "acme"}},
        "preserve_permissions": false
      }"#,
    )
    .unwrap();

    let settings = MigrationSettings::load_from_path(&path).expect("settings should load");
    assert_eq!(settings.config.target_username.as_deref(), Some("alice"));
    assert_eq!(settings.config.package_manager_command, "dnf install -y");
    assert!(settings.config.archive_mode);
    assert_eq!(settings.home_dir(), Some(PathBuf::from("C:\\Users\\Alice")));
    assert_eq!(settings.items.len(), 2);
    assert_eq!(settings.items[0].preservation(false, true), (false, true));
    assert_eq!(settings.items[1].path(), "C:\\Users\\Alice\\Documents");
    assert_eq!(settings.items[1].preservation(false, true), (false, false));
    assert_eq!(settings.apps[0].detected_version.as_deref(), Some("128.0"));
    assert!(settings.alternative_table().get("acme tool").is_some());
    assert!(!settings.preserve_permissions);
    assert!(settings.preserve_symlinks);
  }
}
