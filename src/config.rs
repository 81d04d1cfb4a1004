//! Target environment settings for one compilation.

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Placeholder replaced by the target username inside [`MigrationConfig::destination_root`].
pub const USER_PLACEHOLDER: &str = "<user>";

/// Settings describing the target machine and how data reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
  /// Account that receives the data; prompted for at run time when absent.
  pub target_username: Option<String>,
  /// Install command of the target package manager, e.g. `apt install -y`.
  pub package_manager_command: String,
  /// Bundle every item into one archive instead of copying trees directly.
  pub archive_mode: bool,
  /// Destination template; `<user>` expands to the target username at run time.
  pub destination_root: String,
  /// File name of the archive expected next to the script.
  pub archive_name: String,
  /// Directory next to the script holding raw source trees in direct-copy mode.
  pub source_dir_name: String,
  /// Fixed log suffix; the script falls back to a date stamp when absent.
  pub run_id: Option<String>,
  /// Refresh the package index once before installing.
  pub refresh_package_index: bool,
  /// Upper bound on packages passed to one package-manager invocation.
  pub max_packages_per_invocation: Option<usize>,
}

impl Default for MigrationConfig {
  fn default() -> Self {
    Self {
      target_username: None,
      package_manager_command: "apt install -y".into(),
      archive_mode: false,
      destination_root: format!("/home/{USER_PLACEHOLDER}/migrated_windows_data"),
      archive_name: "win_migrator_backup.tar.gz".into(),
      source_dir_name: "source_windows_data".into(),
      run_id: None,
      refresh_package_index: true,
      max_packages_per_invocation: None,
    }
  }
}

impl MigrationConfig {
  /// Reject settings that cannot produce a usable script.
  pub fn validate(&self) -> Result<(), MigrationError> {
    let command = self.package_manager_command.trim();
    if command.is_empty() {
      return Err(MigrationError::invalid_config(
        "package manager command must not be empty",
      ));
    }
    if let Some(bad) = command.chars().find(|c| is_shell_operator(*c)) {
      return Err(MigrationError::invalid_config(format!(
        "package manager command contains shell metacharacter {bad:?}"
      )));
    }

    if self.destination_root.trim().is_empty() {
      return Err(MigrationError::invalid_config("destination root must not be empty"));
    }
    if self.destination_root.contains(['\n', '\r', '\0']) {
      return Err(MigrationError::invalid_config(
        "destination root must be a single line",
      ));
    }
    if !self.destination_root.starts_with('/') && !self.destination_root.starts_with("~/") {
      return Err(MigrationError::invalid_config(
        "destination root must be absolute or start with ~/",
      ));
    }

    if let Some(user) = &self.target_username {
      if !is_valid_username(user) {
        return Err(MigrationError::invalid_config(format!(
          "target username {user:?} is not a valid account name"
        )));
      }
    }

    if self.archive_mode && !is_plain_file_name(&self.archive_name) {
      return Err(MigrationError::invalid_config(
        "archive name must be a plain file name in archive mode",
      ));
    }
    if !self.archive_mode && !is_plain_file_name(&self.source_dir_name) {
      return Err(MigrationError::invalid_config(
        "source directory name must be a plain directory name",
      ));
    }

    if let Some(run_id) = &self.run_id {
      if run_id.is_empty()
        || !run_id
          .chars()
          .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
      {
        return Err(MigrationError::invalid_config(
          "run id may only contain letters, digits, '-', '_' and '.'",
        ));
      }
    }

    if self.max_packages_per_invocation == Some(0) {
      return Err(MigrationError::invalid_config(
        "max packages per invocation must be at least 1",
      ));
    }

    Ok(())
  }

  /// Username with surrounding whitespace removed; empty names count as absent.
  pub fn username(&self) -> Option<&str> {
    self
      .target_username
      .as_deref()
      .map(str::trim)
      .filter(|name| !name.is_empty())
  }
}

fn is_shell_operator(c: char) -> bool {
  matches!(
    c,
    ';' | '&' | '|' | '<' | '>' | '$' | '`' | '\\' | '"' | '\'' | '(' | ')' | '\n' | '\r' | '\0'
  )
}

fn is_valid_username(name: &str) -> bool {
  let name = name.trim();
  if name.is_empty() {
    return true;
  }
  !name.starts_with('-')
    && name.len() <= 32
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn is_plain_file_name(name: &str) -> bool {
  let name = name.trim();
  !name.is_empty()
    && name != "."
    && name != ".."
    && !name.contains(['/', '\\', '\n', '\r', '\0'])
}
