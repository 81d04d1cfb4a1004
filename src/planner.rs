//! Decide whether selected items travel inside the archive or as direct copies.

use crate::error::PlanWarning;
use crate::models::SourceItem;

/// Placement of every selected item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchivePlan {
  /// Items bundled into the archive, in selection order.
  pub manifest: Vec<SourceItem>,
  /// Items copied by the generated script, in selection order.
  pub direct_copy: Vec<SourceItem>,
  /// Findings raised while planning.
  pub warnings: Vec<PlanWarning>,
}

impl ArchivePlan {
  /// Total number of placed items.
  pub fn len(&self) -> usize {
    self.manifest.len() + self.direct_copy.len()
  }

  /// Returns `true` when no item was placed.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Place every item according to `archive_mode`.
///
/// The mode applies to the whole plan, so exactly one of the two lists receives every
/// item. Order is the selection order, which keeps archive layout and generated scripts
/// reproducible.
pub fn plan(items: &[SourceItem], archive_mode: bool) -> ArchivePlan {
  if items.is_empty() {
    return ArchivePlan {
      warnings: vec![PlanWarning::NoItemsSelected],
      ..ArchivePlan::default()
    };
  }

  let items = items.to_vec();
  if archive_mode {
    ArchivePlan {
      manifest: items,
      ..ArchivePlan::default()
    }
  } else {
    ArchivePlan {
      direct_copy: items,
      ..ArchivePlan::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{ItemKind, LogicalRoot};

  fn items() -> Vec<SourceItem> {
    vec![
      SourceItem::new(LogicalRoot::Documents, ["report.odt"], ItemKind::File).unwrap(),
      SourceItem::new(LogicalRoot::Desktop, ["report.odt"], ItemKind::File).unwrap(),
      SourceItem::new(LogicalRoot::Pictures, Vec::<String>::new(), ItemKind::Directory).unwrap(),
    ]
  }

  #[test]
  fn archive_mode_puts_everything_in_the_manifest() {
    let selected = items();
    let plan = plan(&selected, true);
    assert_eq!(plan.manifest, selected);
    assert!(plan.direct_copy.is_empty());
    assert!(plan.warnings.is_empty());
  }

  #[test]
  fn direct_mode_leaves_the_manifest_empty() {
    let selected = items();
    let plan = plan(&selected, false);
    assert!(plan.manifest.is_empty());
    assert_eq!(plan.direct_copy, selected);
  }

  #[test]
  fn placement_accounts_for_every_item() {
    let selected = items();
    for archive_mode in [true, false] {
      for count in 0..=selected.len() {
        let plan = plan(&selected[..count], archive_mode);
        assert_eq!(plan.len(), count);
        if count > 0 {
          assert!(plan.manifest.is_empty() != plan.direct_copy.is_empty());
        }
      }
    }
  }

  #[test]
  fn empty_selection_warns_instead_of_failing() {
    let plan = plan(&[], true);
    assert!(plan.is_empty());
    assert_eq!(plan.warnings, vec![PlanWarning::NoItemsSelected]);
    assert_eq!(plan.warnings[0].to_string(), "no items selected");
  }
}
