//! Compiles a selection into the staged POSIX shell script run on the target machine.
//!
//! The script is assembled from fixed stage templates: `A` checks the environment, `B`
//! places data (archive extraction or direct copies), `C` installs packages and `D`
//! prints a summary. Stages `B` and `C` are only emitted when there is something for
//! them to do. Every value taken from the selection passes through [`shell_quote`].

mod package_manager;
mod quoting;
mod stages;
mod writer;

pub use package_manager::{PackageFamily, PackageManager, batches};
pub use quoting::{quote_template, shell_quote};
pub use stages::{
  EXIT_ARCHIVE_MISSING, EXIT_COMPLETED_WITH_ERRORS, EXIT_DESTINATION_NOT_WRITABLE,
  EXIT_EXTRACTION_FAILED, EXIT_LOG_UNAVAILABLE, EXIT_NO_TARGET_USER, EXIT_OK,
};

use crate::alternatives::{AlternativeTable, resolve_with};
use crate::config::MigrationConfig;
use crate::error::{MigrationError, PlanWarning};
use crate::models::{ApplicationEntry, MigrationPlan, SourceItem};
use crate::planner;
use crate::sink::{Level, LogSink, Stage};

use stages::PackageRequest;
use writer::ScriptWriter;

/// Compile items and applications into a plan using the built-in alternative table.
pub fn compile<S: LogSink>(
  items: &[SourceItem],
  apps: &[ApplicationEntry],
  config: &MigrationConfig,
  sink: &mut S,
) -> Result<MigrationPlan, MigrationError> {
  compile_with(items, apps, config, AlternativeTable::builtin(), sink)
}

/// Compile items and applications into a plan, resolving packages through `table`.
///
/// The output depends only on the inputs: identical calls produce byte-identical
/// scripts. The run identifier is the one value left to the script itself.
pub fn compile_with<S: LogSink>(
  items: &[SourceItem],
  apps: &[ApplicationEntry],
  config: &MigrationConfig,
  table: &AlternativeTable,
  sink: &mut S,
) -> Result<MigrationPlan, MigrationError> {
  config.validate()?;
  let manager = PackageManager::parse(&config.package_manager_command)?;

  let placement = planner::plan(items, config.archive_mode);
  let mut warnings = placement.warnings.clone();
  if placement.is_empty() {
    sink.record(Stage::Data, Level::Warn, "no items selected");
  } else {
    let mode = if config.archive_mode { "archive" } else { "direct copy" };
    sink.record(
      Stage::Data,
      Level::Info,
      &format!("{} item(s) placed for {mode}", placement.len()),
    );
  }
  if items.is_empty() && apps.is_empty() {
    let warning = PlanWarning::EmptyPlan;
    sink.record(Stage::Summary, Level::Warn, &warning.to_string());
    warnings.push(warning);
  }

  let mut requests: Vec<PackageRequest> = Vec::new();
  let mut hints: Vec<String> = Vec::new();
  let mut unmapped: Vec<String> = Vec::new();
  for app in apps {
    let resolution = resolve_with(app, table);
    let mapped = resolution.is_mapped();
    match resolution.package_name {
      Some(package) if mapped => {
        sink.record(
          Stage::Apps,
          Level::Info,
          &format!("{} -> {package}", app.display_name),
        );
        if let Some(hint) = resolution.hint {
          let hint = format!("{} ({package}): {hint}", app.display_name);
          sink.record(Stage::Apps, Level::Info, &hint);
          if !hints.contains(&hint) {
            hints.push(hint);
          }
        }
        match requests.iter_mut().find(|request| request.package == package) {
          Some(request) => {
            for fallback in resolution.fallbacks {
              if fallback != request.package && !request.fallbacks.contains(&fallback) {
                request.fallbacks.push(fallback);
              }
            }
          }
          None => requests.push(PackageRequest {
            package,
            fallbacks: resolution.fallbacks,
          }),
        }
      }
      _ => {
        let warning = PlanWarning::UnmappedApplication {
          name: app.display_name.clone(),
        };
        sink.record(Stage::Apps, Level::Warn, &warning.to_string());
        warnings.push(warning);
        unmapped.push(app.display_name.clone());
      }
    }
  }

  let mut w = ScriptWriter::new();
  stages::emit_preamble(&mut w, config, unmapped.len());
  stages::emit_environment(&mut w, config);
  if config.archive_mode && !placement.manifest.is_empty() {
    stages::emit_archive_extraction(&mut w, config, &placement.manifest);
  } else if !placement.direct_copy.is_empty() {
    stages::emit_direct_copies(&mut w, config, &placement.direct_copy);
  }
  if !apps.is_empty() {
    stages::emit_apps(&mut w, config, &manager, &requests, &hints, &unmapped);
  }
  stages::emit_summary(&mut w);

  sink.record(
    Stage::Summary,
    Level::Info,
    &format!(
      "compiled script: {} item(s), {} package(s), {} warning(s)",
      placement.len(),
      requests.len(),
      warnings.len()
    ),
  );

  Ok(MigrationPlan {
    script_text: w.finish(),
    archive_manifest: placement.manifest,
    warnings,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{ItemKind, LogicalRoot};
  use crate::sink::MemorySink;

  fn notes() -> SourceItem {
    SourceItem::new(LogicalRoot::Desktop, ["notes.txt"], ItemKind::File).unwrap()
  }

  #[test]
  fn direct_copy_of_one_file_with_firefox() {
    let mut sink = MemorySink::default();
    let plan = compile(
      &[notes()],
      &[ApplicationEntry::named("Mozilla Firefox")],
      &MigrationConfig::default(),
      &mut sink,
    )
    .unwrap();

    assert!(plan.archive_manifest.is_empty());
    assert!(plan.warnings.is_empty());
    assert!(plan.script_text.starts_with("#!/bin/sh\n"));
    assert!(plan.script_text.contains("copy_item copy_desktop_notes_txt Desktop/notes.txt file -p"));
    let install_lines = plan
      .script_text
      .lines()
      .filter(|line| line.contains("apt install -y firefox"))
      .count();
    assert_eq!(install_lines, 1);
    assert!(sink.records.iter().any(|r| r.message == "Mozilla Firefox -> firefox"));
  }

  #[test]
  fn archive_mode_with_unknown_application() {
    let pictures =
      SourceItem::new(LogicalRoot::Pictures, Vec::<String>::new(), ItemKind::Directory).unwrap();
    let config = MigrationConfig {
      archive_mode: true,
      ..MigrationConfig::default()
    };
    let mut sink = MemorySink::default();
    let plan = compile(
      &[pictures.clone()],
      &[ApplicationEntry::named("Totally Unknown App 9000")],
      &config,
      &mut sink,
    )
    .unwrap();

    assert_eq!(plan.archive_manifest, vec![pictures]);
    assert_eq!(
      plan.warnings,
      vec![PlanWarning::UnmappedApplication {
        name: "Totally Unknown App 9000".into()
      }]
    );
    assert!(plan.script_text.contains("tar -xzpf \"$ARCHIVE\" -C \"$DEST_ROOT\""));
    assert!(plan.script_text.contains("ARCHIVE=\"$SCRIPT_DIR\"/win_migrator_backup.tar.gz"));
    assert!(plan.script_text.contains("Totally Unknown App 9000"));
    assert!(!plan.script_text.contains("$SUDO apt install"));
    assert_eq!(sink.at_least(Level::Warn).count(), 1);
  }

  #[test]
  fn empty_selection_emits_only_environment_and_summary() {
    let mut sink = MemorySink::default();
    let plan = compile(&[], &[], &MigrationConfig::default(), &mut sink).unwrap();
    assert!(plan.script_text.contains("# --- Stage A:"));
    assert!(plan.script_text.contains("# --- Stage D:"));
    assert!(!plan.script_text.contains("# --- Stage B:"));
    assert!(!plan.script_text.contains("# --- Stage C:"));
    assert_eq!(
      plan.warnings,
      vec![PlanWarning::NoItemsSelected, PlanWarning::EmptyPlan]
    );
  }

  #[test]
  fn invalid_configuration_is_fatal() {
    let config = MigrationConfig {
      package_manager_command: String::new(),
      ..MigrationConfig::default()
    };
    let result = compile(&[notes()], &[], &config, &mut MemorySink::default());
    assert!(matches!(result, Err(MigrationError::InvalidConfiguration(_))));
  }

  #[test]
  fn identical_inputs_produce_identical_scripts() {
    let apps = [
      ApplicationEntry::named("VLC media player"),
      ApplicationEntry::named("GIMP 2.10.34"),
    ];
    let first = compile(&[notes()], &apps, &MigrationConfig::default(), &mut MemorySink::default())
      .unwrap();
    let second = compile(&[notes()], &apps, &MigrationConfig::default(), &mut MemorySink::default())
      .unwrap();
    assert_eq!(first.script_text, second.script_text);
  }

  #[test]
  fn shared_packages_are_installed_once() {
    let apps = [
      ApplicationEntry::named("VLC media player"),
      ApplicationEntry::named("VLC media player 3.0.20"),
    ];
    let plan = compile(&[], &apps, &MigrationConfig::default(), &mut MemorySink::default()).unwrap();
    assert!(plan.script_text.contains("elif $SUDO apt install -y vlc; then"));
    assert!(!plan.script_text.contains("vlc vlc"));
    assert!(plan.script_text.contains("install_app pkg_vlc vlc mpv smplayer"));
  }

  #[test]
  fn install_hints_reach_the_script_and_the_sink() {
    let mut sink = MemorySink::default();
    let plan = compile(
      &[],
      &[ApplicationEntry::named("Google Chrome")],
      &MigrationConfig::default(),
      &mut sink,
    )
    .unwrap();
    let hint = "Google Chrome (google-chrome-stable): requires the vendor's package repository";
    assert!(plan.script_text.contains(&format!("log APPS INFO {}", shell_quote(hint))));
    assert!(sink.records.iter().any(|r| r.level == Level::Info && r.message == hint));
  }

  #[test]
  fn failed_installs_fall_back_to_alternatives() {
    let plan = compile(
      &[],
      &[ApplicationEntry::named("Adobe Acrobat Reader DC")],
      &MigrationConfig::default(),
      &mut MemorySink::default(),
    )
    .unwrap();
    let script = &plan.script_text;
    assert!(script.contains("elif $SUDO apt install -y okular; then"));
    assert!(script.contains("install_app pkg_okular okular evince zathura"));
    assert!(script.contains("if stage_done pkg_okular; then"));
    assert!(script.contains("mark_done pkg_okular"));
  }

  #[test]
  fn shared_packages_merge_their_fallbacks() {
    let apps = [
      ApplicationEntry::named("XnView MP"),
      ApplicationEntry::named("IrfanView"),
      ApplicationEntry::named("Adobe Photoshop"),
    ];
    let config = MigrationConfig {
      max_packages_per_invocation: Some(1),
      ..MigrationConfig::default()
    };
    let plan = compile(&[], &apps, &config, &mut MemorySink::default()).unwrap();
    let gwenview_batches = plan
      .script_text
      .lines()
      .filter(|line| line.contains("apt install -y gwenview"))
      .count();
    assert_eq!(gwenview_batches, 1);
    assert!(plan.script_text.contains("install_app pkg_gwenview gwenview nomacs geeqie"));
    assert!(plan.script_text.contains("install_app pkg_gimp gimp krita"));
  }

  #[test]
  fn pacman_refreshes_with_a_full_upgrade() {
    let config = MigrationConfig {
      package_manager_command: "pacman -S --noconfirm".into(),
      ..MigrationConfig::default()
    };
    let plan = compile(
      &[],
      &[ApplicationEntry::named("VLC media player")],
      &config,
      &mut MemorySink::default(),
    )
    .unwrap();
    assert!(plan.script_text.contains("! $SUDO pacman -Syu --noconfirm; then"));
    assert!(!plan.script_text.contains("pacman -Sy;"));
    assert!(plan.script_text.contains("elif $SUDO pacman -S --noconfirm --needed vlc; then"));
  }

  #[test]
  fn hostile_names_stay_quoted() {
    let item = SourceItem::new(
      LogicalRoot::Documents,
      ["it's $(rm -rf ~) `id`.txt"],
      ItemKind::File,
    )
    .unwrap();
    let plan = compile(&[item], &[], &MigrationConfig::default(), &mut MemorySink::default())
      .unwrap();
    assert!(plan
      .script_text
      .contains(r"'Documents/it'\''s $(rm -rf ~) `id`.txt'"));
  }
}
