//! Emitters for the preamble and the four stages of the generated script.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::config::{MigrationConfig, USER_PLACEHOLDER};
use crate::models::{ItemKind, SourceItem};
use crate::sink::{Level, Stage};

use super::package_manager::{PackageManager, batches};
use super::quoting::{quote_template, shell_quote};
use super::writer::ScriptWriter;

/// Exit status of a run without failures.
pub const EXIT_OK: u8 = 0;
/// The destination root could not be created or written.
pub const EXIT_DESTINATION_NOT_WRITABLE: u8 = 10;
/// No usable target username was available.
pub const EXIT_NO_TARGET_USER: u8 = 11;
/// The archive was not found next to the script.
pub const EXIT_ARCHIVE_MISSING: u8 = 12;
/// Extracting the archive failed.
pub const EXIT_EXTRACTION_FAILED: u8 = 13;
/// The log file could not be created.
pub const EXIT_LOG_UNAVAILABLE: u8 = 14;
/// The run finished but some copies or installs failed.
pub const EXIT_COMPLETED_WITH_ERRORS: u8 = 20;

const EXIT_CODES: [(u8, &str); 7] = [
  (EXIT_OK, "migration finished without errors"),
  (EXIT_DESTINATION_NOT_WRITABLE, "destination root is not writable"),
  (EXIT_NO_TARGET_USER, "no target user was provided"),
  (EXIT_ARCHIVE_MISSING, "archive not found next to this script"),
  (EXIT_EXTRACTION_FAILED, "archive extraction failed"),
  (EXIT_LOG_UNAVAILABLE, "log file could not be created"),
  (EXIT_COMPLETED_WITH_ERRORS, "finished, but some copies or installs failed"),
];

pub(crate) fn emit_preamble(w: &mut ScriptWriter, config: &MigrationConfig, unmapped: usize) {
  w.line("#!/bin/sh");
  w.line("# Windows to Linux migration script.");
  w.line("# Review it before running. Re-running is safe: finished steps are skipped.");
  w.line("#");
  w.line("# Exit codes:");
  for (code, meaning) in EXIT_CODES {
    w.line(format!("#   {code:<3} {meaning}"));
  }
  w.line("#");
  w.line("# Environment:");
  w.line("#   MIGRATOR_RUN_ID       suffix of the log file name");
  w.line("#   MIGRATOR_TARGET_USER  account that receives the data");
  w.line("#   MIGRATOR_SUDO         elevation command for installs, empty to run directly");
  w.blank();
  w.line("set -u");
  w.blank();

  let default_run_id = match &config.run_id {
    Some(run_id) => run_id.clone(),
    None => "$(date +%Y%m%d_%H%M%S)".to_string(),
  };
  w.line("SCRIPT_DIR=$(CDPATH= cd -- \"$(dirname -- \"$0\")\" && pwd)");
  w.line(format!("RUN_ID=\"${{MIGRATOR_RUN_ID:-{default_run_id}}}\""));
  w.line("LOG_DIR=\"$HOME/WinLinuxMigrator_logs\"");
  w.line("LOG_FILE=\"$LOG_DIR/migrator_${RUN_ID}.log\"");
  w.blank();
  for counter in ["ITEMS_MIGRATED", "ITEMS_SKIPPED", "APPS_INSTALLED", "APPS_FAILED", "ERRORS"] {
    w.line(format!("{counter}=0"));
  }
  w.line(format!("APPS_UNMAPPED={unmapped}"));
  w.blank();

  w.open("log() {");
  w.line("msg=$(printf '%s' \"$3\" | tr '\\n' ' ')");
  w.line("printf '%s [%s][%s] %s\\n' \"$(date '+%Y-%m-%d %H:%M:%S')\" \"$1\" \"$2\" \"$msg\" >>\"$LOG_FILE\"");
  w.line("printf '[%s][%s] %s\\n' \"$1\" \"$2\" \"$msg\"");
  w.close("}");
  w.blank();
  w.open("stage_done() {");
  w.line("[ -f \"$STATE_DIR/$1.done\" ]");
  w.close("}");
  w.blank();
  w.open("mark_done() {");
  w.line("touch \"$STATE_DIR/$1.done\"");
  w.close("}");
  w.blank();

  w.open("if ! mkdir -p \"$LOG_DIR\" || ! touch \"$LOG_FILE\"; then");
  w.line("echo \"cannot create log file $LOG_FILE\" >&2");
  w.line(format!("exit {EXIT_LOG_UNAVAILABLE}"));
  w.close("fi");
}

pub(crate) fn emit_environment(w: &mut ScriptWriter, config: &MigrationConfig) {
  let stage = Stage::Environment;
  w.heading(stage, "environment check");
  w.log(stage, Level::Info, "stage started");

  w.line("TARGET_USER=\"${MIGRATOR_TARGET_USER:-}\"");
  match config.username() {
    Some(user) => {
      w.open("if [ -z \"$TARGET_USER\" ]; then");
      w.line(format!("TARGET_USER={}", shell_quote(user)));
      w.close("fi");
    }
    None => {
      w.open("if [ -z \"$TARGET_USER\" ] && [ -t 0 ]; then");
      w.line("printf 'Linux account that should own the migrated data: '");
      w.line("read -r TARGET_USER || TARGET_USER=\"\"");
      w.close("fi");
    }
  }
  w.open("case \"$TARGET_USER\" in");
  w.open("''|-*|*[!A-Za-z0-9._-]*)");
  w.log(stage, Level::Error, "no valid target user provided");
  w.line(format!("exit {EXIT_NO_TARGET_USER}"));
  w.close(";;");
  w.close("esac");

  w.line(format!(
    "DEST_ROOT={}",
    quote_template(&config.destination_root, USER_PLACEHOLDER, "TARGET_USER")
  ));
  w.line("STATE_DIR=\"$DEST_ROOT/.migrator_state\"");
  w.open("if ! mkdir -p \"$DEST_ROOT\" || [ ! -w \"$DEST_ROOT\" ] || ! mkdir -p \"$STATE_DIR\"; then");
  w.log_expanding(stage, Level::Error, "destination $DEST_ROOT is not writable");
  w.line(format!("exit {EXIT_DESTINATION_NOT_WRITABLE}"));
  w.close("fi");
  w.log_expanding(stage, Level::Info, "target user $TARGET_USER, destination $DEST_ROOT");
  w.log(stage, Level::Info, "stage finished");
}

pub(crate) fn emit_archive_extraction(
  w: &mut ScriptWriter,
  config: &MigrationConfig,
  manifest: &[SourceItem],
) {
  let stage = Stage::Data;
  w.heading(stage, "archive extraction");
  w.log(stage, Level::Info, "stage started");
  w.line(format!("ARCHIVE=\"$SCRIPT_DIR\"/{}", shell_quote(&config.archive_name)));

  let flags = if manifest.iter().any(|item| item.preserve_permissions) {
    "-xzpf"
  } else {
    "-xzf"
  };
  let count = manifest.len();
  let marker = archive_marker(&config.archive_name, manifest);

  w.open(format!("if stage_done {marker}; then"));
  w.log(stage, Level::Info, "archive already extracted, skipping");
  w.line(format!("ITEMS_MIGRATED=$((ITEMS_MIGRATED + {count}))"));
  w.pivot("else");
  w.open("if [ ! -f \"$ARCHIVE\" ]; then");
  w.log_expanding(stage, Level::Error, "archive not found: $ARCHIVE");
  w.line(format!("exit {EXIT_ARCHIVE_MISSING}"));
  w.close("fi");
  w.log_expanding(stage, Level::Info, "extracting $ARCHIVE into $DEST_ROOT");
  w.open(format!("if tar {flags} \"$ARCHIVE\" -C \"$DEST_ROOT\"; then"));
  w.line(format!("mark_done {marker}"));
  w.line(format!("ITEMS_MIGRATED=$((ITEMS_MIGRATED + {count}))"));
  w.log(stage, Level::Info, &format!("extracted {count} item(s)"));
  w.pivot("else");
  w.log_expanding(stage, Level::Error, "extraction of $ARCHIVE failed");
  w.line(format!("exit {EXIT_EXTRACTION_FAILED}"));
  w.close("fi");
  w.close("fi");

  emit_ownership(w);
  w.log(stage, Level::Info, "stage finished");
}

pub(crate) fn emit_direct_copies(w: &mut ScriptWriter, config: &MigrationConfig, items: &[SourceItem]) {
  let stage = Stage::Data;
  w.heading(stage, "direct copy");
  w.log(stage, Level::Info, "stage started");
  w.line(format!(
    "SOURCE_BASE=\"$SCRIPT_DIR\"/{}",
    shell_quote(&config.source_dir_name)
  ));
  w.open("if [ ! -d \"$SOURCE_BASE\" ]; then");
  w.log_expanding(stage, Level::Warn, "source directory $SOURCE_BASE not found");
  w.close("fi");
  w.blank();

  // copy_item <marker> <relative path> <file|dir> <cp flags>
  w.open("copy_item() {");
  w.line("src=\"$SOURCE_BASE/$2\"");
  w.line("dst=\"$DEST_ROOT/$2\"");
  w.open("if stage_done \"$1\"; then");
  w.log_expanding(stage, Level::Info, "already copied: $2");
  w.line("ITEMS_MIGRATED=$((ITEMS_MIGRATED + 1))");
  w.line("return 0");
  w.close("fi");
  w.open("if [ ! -e \"$src\" ] && [ ! -L \"$src\" ]; then");
  w.log_expanding(stage, Level::Warn, "source missing, skipping: $src");
  w.line("ITEMS_SKIPPED=$((ITEMS_SKIPPED + 1))");
  w.line("return 0");
  w.close("fi");
  w.open("if [ \"$3\" = dir ]; then");
  w.line("mkdir -p \"$dst\" && cp -R $4 -- \"$src/.\" \"$dst/\"");
  w.pivot("else");
  w.line("mkdir -p \"$(dirname -- \"$dst\")\" && cp $4 -- \"$src\" \"$dst\"");
  w.close("fi");
  w.line("status=$?");
  w.open("if [ \"$status\" -eq 0 ]; then");
  w.line("mark_done \"$1\"");
  w.line("ITEMS_MIGRATED=$((ITEMS_MIGRATED + 1))");
  w.log_expanding(stage, Level::Info, "copied $2");
  w.pivot("else");
  w.line("ERRORS=$((ERRORS + 1))");
  w.log_expanding(stage, Level::Error, "copy of $2 failed with status $status");
  w.close("fi");
  w.close("}");
  w.blank();

  for (item, marker) in items.iter().zip(marker_names(items)) {
    let kind = match item.kind {
      ItemKind::Directory => "dir",
      ItemKind::File => "file",
    };
    w.line(format!(
      "copy_item {marker} {} {kind} {}",
      shell_quote(&item.destination_relative()),
      shell_quote(&copy_flags(item))
    ));
  }

  emit_ownership(w);
  w.log(stage, Level::Info, "stage finished");
}

fn emit_ownership(w: &mut ScriptWriter) {
  w.open("if [ \"$(id -u)\" -eq 0 ] && [ \"$TARGET_USER\" != root ]; then");
  w.open("if ! chown -R \"$TARGET_USER\" \"$DEST_ROOT\"; then");
  w.log_expanding(Stage::Data, Level::Warn, "could not hand $DEST_ROOT to $TARGET_USER");
  w.close("fi");
  w.close("fi");
}

fn copy_flags(item: &SourceItem) -> String {
  let mut flags = String::new();
  if item.preserve_permissions {
    flags.push('p');
  }
  if item.kind == ItemKind::Directory {
    flags.push(if item.preserve_symlinks { 'P' } else { 'L' });
  }
  if flags.is_empty() {
    flags
  } else {
    format!("-{flags}")
  }
}

/// State marker names for per-item copies, unique within one script.
pub(crate) fn marker_names(items: &[SourceItem]) -> Vec<String> {
  unique_markers("copy", items.iter().map(SourceItem::destination_relative))
}

/// State marker names for packages, keyed on the primary package name.
pub(crate) fn package_marker_names(requests: &[PackageRequest]) -> Vec<String> {
  unique_markers("pkg", requests.iter().map(|request| request.package.clone()))
}

/// Marker for one archive extraction, keyed on the archive name and its contents.
pub(crate) fn archive_marker(archive_name: &str, manifest: &[SourceItem]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(archive_name.as_bytes());
  hasher.update(b"\n");
  for item in manifest {
    hasher.update(item.destination_relative().as_bytes());
    if item.kind == ItemKind::Directory {
      hasher.update(b"/");
    }
    hasher.update(b"\n");
  }
  let digest = format!("{:x}", hasher.finalize());
  format!("extract_{}", &digest[..16])
}

fn unique_markers(prefix: &str, names: impl Iterator<Item = String>) -> Vec<String> {
  let mut used = BTreeSet::new();
  names
    .map(|name| {
      let marker = sanitize_marker_name(prefix, &name, &used);
      used.insert(marker.clone());
      marker
    })
    .collect()
}

fn sanitize_marker_name(prefix: &str, name: &str, used: &BTreeSet<String>) -> String {
  let mut base = format!("{prefix}_{name}")
    .to_lowercase()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect::<String>();

  while base.contains("__") {
    base = base.replace("__", "_");
  }
  let base = base.trim_end_matches('_');
  let base: String = base.chars().take(96).collect();

  let mut candidate = base.clone();
  let mut counter = 1;
  while used.contains(&candidate) {
    candidate = format!("{base}_{counter}");
    counter += 1;
  }

  candidate
}

/// One package requested by Stage C and the packages tried after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackageRequest {
  pub(crate) package: String,
  pub(crate) fallbacks: Vec<String>,
}

impl PackageRequest {
  /// `install_app` call trying the fallbacks, preceded by the primary package when
  /// `with_primary` is set.
  fn install_app_call(&self, marker: &str, with_primary: bool) -> String {
    let primary = with_primary.then_some(&self.package);
    let mut line = format!("install_app {marker} {}", shell_quote(&self.package));
    for package in primary.into_iter().chain(&self.fallbacks) {
      line.push(' ');
      line.push_str(&shell_quote(package));
    }
    line
  }
}

pub(crate) fn emit_apps(
  w: &mut ScriptWriter,
  config: &MigrationConfig,
  manager: &PackageManager,
  requests: &[PackageRequest],
  hints: &[String],
  unmapped: &[String],
) {
  let stage = Stage::Apps;
  w.heading(stage, "application installation");
  w.log(stage, Level::Info, "stage started");
  for name in unmapped {
    w.log(
      stage,
      Level::Warn,
      &format!("no known alternative for '{name}', install it manually"),
    );
  }
  for hint in hints {
    w.log(stage, Level::Info, hint);
  }

  if !requests.is_empty() {
    let markers = package_marker_names(requests);
    let install = manager.install_command();

    w.open("if [ -n \"${MIGRATOR_SUDO+set}\" ]; then");
    w.line("SUDO=\"$MIGRATOR_SUDO\"");
    w.pivot("elif [ \"$(id -u)\" -ne 0 ]; then");
    w.open("if command -v sudo >/dev/null 2>&1; then");
    w.line("SUDO=sudo");
    w.pivot("else");
    w.line("SUDO=\"\"");
    w.log(stage, Level::Warn, "not running as root and sudo is unavailable");
    w.close("fi");
    w.pivot("else");
    w.line("SUDO=\"\"");
    w.close("fi");
    w.blank();

    if let Some(refresh) = manager.refresh_command().filter(|_| config.refresh_package_index) {
      w.line("APPS_PENDING=0");
      w.open(format!("for marker in {}; do", markers.join(" ")));
      w.line("stage_done \"$marker\" || APPS_PENDING=$((APPS_PENDING + 1))");
      w.close("done");
      w.open(format!("if [ \"$APPS_PENDING\" -gt 0 ] && ! $SUDO {refresh}; then"));
      w.log(stage, Level::Warn, "package index refresh failed, continuing");
      w.close("fi");
      w.blank();
    }

    // install_app <marker> <label> [package...]
    w.open("install_app() {");
    w.line("marker=$1");
    w.line("label=$2");
    w.line("shift 2");
    w.open("if stage_done \"$marker\"; then");
    w.line("APPS_INSTALLED=$((APPS_INSTALLED + 1))");
    w.log_expanding(stage, Level::Info, "already installed: $label");
    w.line("return 0");
    w.close("fi");
    w.open("for pkg in \"$@\"; do");
    w.open(format!("if $SUDO {install} \"$pkg\"; then"));
    w.line("mark_done \"$marker\"");
    w.line("APPS_INSTALLED=$((APPS_INSTALLED + 1))");
    w.log_expanding(stage, Level::Info, "installed $pkg");
    w.line("return 0");
    w.close("fi");
    w.log_expanding(stage, Level::Warn, "install of $pkg failed, trying the next alternative if any");
    w.close("done");
    w.line("APPS_FAILED=$((APPS_FAILED + 1))");
    w.line("ERRORS=$((ERRORS + 1))");
    w.log_expanding(stage, Level::Error, "failed to install $label");
    w.line("return 1");
    w.close("}");
    w.blank();

    let limit = config.max_packages_per_invocation;
    let mut offset = 0;
    for batch in batches(requests, limit) {
      let batch_markers = &markers[offset..offset + batch.len()];
      offset += batch.len();
      let names: Vec<&str> = batch.iter().map(|request| request.package.as_str()).collect();
      let quoted = names
        .iter()
        .map(|name| shell_quote(name))
        .collect::<Vec<_>>()
        .join(" ");
      let per_package: Vec<String> = batch
        .iter()
        .zip(batch_markers)
        .map(|(request, marker)| request.install_app_call(marker, true))
        .collect();

      let all_done = batch_markers
        .iter()
        .map(|marker| format!("stage_done {marker}"))
        .collect::<Vec<_>>();
      w.open(format!("if {}; then", all_done.join(" && ")));
      w.line(format!("APPS_INSTALLED=$((APPS_INSTALLED + {}))", batch.len()));
      w.log(stage, Level::Info, &format!("already installed: {}", names.join(" ")));
      if batch.len() > 1 {
        w.pivot(format!("elif {}; then", all_done.join(" || ")));
        for line in &per_package {
          w.line(line);
        }
      }
      w.pivot(format!("elif $SUDO {install} {quoted}; then"));
      for marker in batch_markers {
        w.line(format!("mark_done {marker}"));
      }
      w.line(format!("APPS_INSTALLED=$((APPS_INSTALLED + {}))", batch.len()));
      w.log(stage, Level::Info, &format!("installed {}", names.join(" ")));
      w.pivot("else");
      if let [single] = batch {
        w.log(stage, Level::Warn, &format!("install of {} failed", single.package));
        w.line(single.install_app_call(&batch_markers[0], false));
      } else {
        w.log(stage, Level::Warn, "batch install failed, retrying one package at a time");
        for line in &per_package {
          w.line(line);
        }
      }
      w.close("fi");
    }
  }

  w.log(stage, Level::Info, "stage finished");
}

pub(crate) fn emit_summary(w: &mut ScriptWriter) {
  let stage = Stage::Summary;
  w.heading(stage, "summary");
  w.log(stage, Level::Info, "stage started");
  w.log_expanding(stage, Level::Info, "items migrated: $ITEMS_MIGRATED");
  w.log_expanding(stage, Level::Info, "items skipped: $ITEMS_SKIPPED");
  w.log_expanding(stage, Level::Info, "apps installed: $APPS_INSTALLED");
  w.log_expanding(stage, Level::Info, "apps failed: $APPS_FAILED");
  w.log_expanding(stage, Level::Info, "apps skipped (unmapped): $APPS_UNMAPPED");
  w.log_expanding(stage, Level::Info, "log file: $LOG_FILE");
  w.log(stage, Level::Info, "stage finished");
  w.open("if [ \"$ERRORS\" -gt 0 ]; then");
  w.log_expanding(stage, Level::Warn, "finished with $ERRORS error(s)");
  w.line(format!("exit {EXIT_COMPLETED_WITH_ERRORS}"));
  w.close("fi");
  w.line(format!("exit {EXIT_OK}"));
}
