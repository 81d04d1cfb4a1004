//! Filters deciding which enumerated applications reach the resolver.

use std::collections::BTreeSet;

use crate::alternatives::normalize_app_name;
use crate::models::ApplicationEntry;

/// Trait describing selection filters for enumerated applications.
pub trait AppInclusion {
  /// Returns `true` when the application should be considered for installation.
  fn is_included(&self, entry: &ApplicationEntry) -> bool;
}

/// Drops registry entries that are not user-facing applications.
///
/// Catches Windows updates (`KB5031356`), drivers, redistributables and runtime
/// components that carry no install location, and generic system names.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryNoiseFilter;

const COMPONENT_KEYWORDS: [&str; 8] = [
  "driver",
  "redistributable",
  "runtime",
  "module",
  "package",
  "host adapter",
  "provider",
  "service pack",
];

const GENERIC_NAMES: [&str; 3] = ["windows", "microsoft windows", "host process"];

impl AppInclusion for RegistryNoiseFilter {
  fn is_included(&self, entry: &ApplicationEntry) -> bool {
    let name = entry.display_name.trim();
    if name.is_empty() || is_update_package(name) {
      return false;
    }

    let has_location = entry
      .detected_install_path
      .as_deref()
      .is_some_and(|path| !path.trim().is_empty());
    if has_location {
      return true;
    }

    let lowered = name.to_lowercase();
    !COMPONENT_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
      && !GENERIC_NAMES.contains(&lowered.as_str())
  }
}

fn is_update_package(name: &str) -> bool {
  name
    .strip_prefix("KB")
    .is_some_and(|rest| rest.len() >= 4 && rest.chars().take(4).all(|c| c.is_ascii_digit()))
}

/// Selection helper excluding applications by normalized name.
#[derive(Debug, Clone, Default)]
pub struct AppSelection {
  exclude: BTreeSet<String>,
}

impl AppSelection {
  /// Build from raw display names; entries are normalized like alternative keys.
  pub fn new(exclude: impl IntoIterator<Item = String>) -> Self {
    Self {
      exclude: normalise_list(exclude),
    }
  }

  /// Returns true when no filtering rules are active.
  pub fn is_unfiltered(&self) -> bool {
    self.exclude.is_empty()
  }
}

impl AppInclusion for AppSelection {
  fn is_included(&self, entry: &ApplicationEntry) -> bool {
    !self.exclude.contains(&normalize_app_name(&entry.display_name))
  }
}

/// Both filters must accept the entry.
impl<A: AppInclusion, B: AppInclusion> AppInclusion for (A, B) {
  fn is_included(&self, entry: &ApplicationEntry) -> bool {
    self.0.is_included(entry) && self.1.is_included(entry)
  }
}

/// Keep the entries accepted by `filter`, preserving their order.
pub fn filter_apps<F: AppInclusion>(apps: &[ApplicationEntry], filter: &F) -> Vec<ApplicationEntry> {
  apps
    .iter()
    .filter(|entry| filter.is_included(entry))
    .cloned()
    .collect()
}

/// Convert a list of raw names into a sorted, de-duplicated set of normalized keys.
fn normalise_list(values: impl IntoIterator<Item = String>) -> BTreeSet<String> {
  values
    .into_iter()
    .map(|value| normalize_app_name(&value))
    .filter(|value| !value.is_empty())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn app(name: &str, location: Option<&str>) -> ApplicationEntry {
    ApplicationEntry {
      display_name: name.into(),
      detected_version: None,
      detected_install_path: location.map(str::to_string),
    }
  }

  #[test]
  fn drops_windows_updates() {
    let filter = RegistryNoiseFilter;
    assert!(!filter.is_included(&app("KB5031356", None)));
    assert!(!filter.is_included(&app("KB2467173 Security Update", Some("C:\\x"))));
    assert!(filter.is_included(&app("KeePassXC", None)));
  }

  #[test]
  fn drops_components_without_install_location() {
    let filter = RegistryNoiseFilter;
    assert!(!filter.is_included(&app(
      "Microsoft Visual C++ 2015-2022 Redistributable (x64)",
      None
    )));
    assert!(!filter.is_included(&app("Realtek Audio Driver", Some("  "))));
    assert!(filter.is_included(&app("Node.js Package Manager", Some("C:\\Program Files\\nodejs"))));
  }

  #[test]
  fn drops_generic_system_names() {
    let filter = RegistryNoiseFilter;
    assert!(!filter.is_included(&app("Microsoft Windows", None)));
    assert!(!filter.is_included(&app("", None)));
  }

  #[test]
  fn excludes_by_normalized_name() {
    let selection = AppSelection::new(vec!["Steam".into(), String::new(), " zoom (x64) ".into()]);
    assert!(!selection.is_unfiltered());
    assert!(!selection.is_included(&app("STEAM", None)));
    assert!(!selection.is_included(&app("Zoom", None)));
    assert!(selection.is_included(&app("Discord", None)));
  }

  #[test]
  fn defaults_to_including_everything() {
    let selection = AppSelection::default();
    assert!(selection.is_unfiltered());
    assert!(selection.is_included(&app("anything", None)));
  }

  #[test]
  fn combined_filters_preserve_order() {
    let apps = vec![
      app("Mozilla Firefox", None),
      app("KB5031356", None),
      app("Steam", None),
      app("VLC media player", None),
    ];
    let filter = (RegistryNoiseFilter, AppSelection::new(vec!["Steam".into()]));
    let kept: Vec<String> = filter_apps(&apps, &filter)
      .into_iter()
      .map(|entry| entry.display_name)
      .collect();
    assert_eq!(kept, vec!["Mozilla Firefox", "VLC media player"]);
  }
}
