use tracing::debug;

use super::normalize::normalize_app_name;
use super::table::{AlternativeMapping, AlternativeTable};
use crate::models::{ApplicationEntry, Resolution};

/// Resolve an application against the built-in table.
pub fn resolve(entry: &ApplicationEntry) -> Resolution {
  resolve_with(entry, AlternativeTable::builtin())
}

/// Resolve an application against a specific table.
///
/// Lookup tiers, first hit wins:
/// 1. the normalized name equals a key;
/// 2. a key appears as a whole-word run inside the name; the longest key wins;
/// 3. every word of a multi-word key appears somewhere in the name; the longest key wins.
///
/// Ties on length resolve to the entry declared first in the table.
pub fn resolve_with(entry: &ApplicationEntry, table: &AlternativeTable) -> Resolution {
  let name = normalize_app_name(&entry.display_name);
  if name.is_empty() {
    return Resolution::unmapped();
  }

  let found = table
    .get(&name)
    .map(|mapping| (name.as_str(), mapping))
    .or_else(|| longest_match(table, |key| contains_word_run(&name, key)))
    .or_else(|| {
      longest_match(table, |key| {
        key.contains(' ') && key.split(' ').all(|word| name.split(' ').any(|token| token == word))
      })
    });

  match found {
    Some((key, mapping)) => {
      debug!(application = %entry.display_name, key, package = %mapping.target_package_name, "mapped application");
      Resolution::mapped(&mapping.target_package_name, mapping.install_hint.clone())
        .with_fallbacks(mapping.fallbacks.clone())
    }
    None => {
      debug!(application = %entry.display_name, normalized = %name, "no alternative found");
      Resolution::unmapped()
    }
  }
}

fn longest_match<'t>(
  table: &'t AlternativeTable,
  matches: impl Fn(&str) -> bool,
) -> Option<(&'t str, &'t AlternativeMapping)> {
  let mut best: Option<(&str, &AlternativeMapping)> = None;
  for (key, mapping) in table.iter() {
    if !matches(key) {
      continue;
    }
    if best.is_none_or(|(current, _)| key.len() > current.len()) {
      best = Some((key, mapping));
    }
  }
  best
}

fn contains_word_run(name: &str, key: &str) -> bool {
  format!(" {name} ").contains(&format!(" {key} "))
}
