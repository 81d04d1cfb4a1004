//! Migration build orchestrator responsible for compiling the plan and writing its artifacts.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use same_file::is_same_file;
use tracing::{debug, info};

use crate::archive::write_archive;
use crate::error::PlanWarning;
use crate::models::{ApplicationEntry, ItemKind, ManifestSummary, MigrationPlan, SourceItem};
use crate::paths::normalize;
use crate::script::compile_with;
use crate::selection::{RegistryNoiseFilter, filter_apps};
use crate::settings::MigrationSettings;
use crate::sink::LogSink;

/// File name of the generated script inside the output directory.
pub const SCRIPT_FILE_NAME: &str = "migrate_to_linux.sh";
/// File name of the manifest summary inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "migration_manifest.json";

/// Files produced by one build.
#[derive(Debug)]
pub struct MigrationArtifacts {
  /// The compiled plan, including normalization warnings.
  pub plan: MigrationPlan,
  /// Generated shell script.
  pub script_path: PathBuf,
  /// Manifest summary serialised as prettified JSON.
  pub manifest_path: PathBuf,
  /// Gzip tarball, written in archive mode when items were selected.
  pub archive_path: Option<PathBuf>,
  /// Mirrored source trees, written in direct-copy mode when items were selected.
  pub source_dir: Option<PathBuf>,
}

/// High-level helper turning a settings file into a runnable migration bundle.
pub struct MigrationBuilder<'a> {
  settings: &'a MigrationSettings,
  home: PathBuf,
}

impl<'a> MigrationBuilder<'a> {
  /// Create a builder for the provided settings.
  pub fn new(settings: &'a MigrationSettings) -> Result<Self> {
    let home = settings
      .home_dir()
      .context("could not determine the source home directory")?;
    Ok(Self { settings, home })
  }

  /// Override the home directory used to tag selected paths.
  pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
    self.home = home.into();
    self
  }

  /// Normalize the selected paths, turning per-item failures into warnings.
  pub fn selected_items(&self) -> (Vec<SourceItem>, Vec<PlanWarning>) {
    let mut items = Vec::new();
    let mut warnings = Vec::new();

    for selected in &self.settings.items {
      let (permissions, symlinks) = selected.preservation(
        self.settings.preserve_permissions,
        self.settings.preserve_symlinks,
      );
      match normalize(selected.path(), &self.home) {
        Ok(item) => items.push(item.with_preservation(permissions, symlinks)),
        Err(err) => warnings.push(err.into_warning().unwrap_or_else(|other| {
          PlanWarning::InvalidPath {
            path: selected.path().to_string(),
            reason: other.to_string(),
          }
        })),
      }
    }

    (items, warnings)
  }

  /// Applications that survive the registry noise filter and the exclusion list.
  pub fn selected_apps(&self) -> Vec<ApplicationEntry> {
    let selection = self.settings.app_selection();
    if self.settings.include_system_components {
      filter_apps(&self.settings.apps, &selection)
    } else {
      filter_apps(&self.settings.apps, &(RegistryNoiseFilter, selection))
    }
  }

  /// Compile the plan without touching the output directory.
  pub fn compile<S: LogSink>(&self, sink: &mut S) -> Result<MigrationPlan> {
    self.compile_items(sink).map(|(plan, _)| plan)
  }

  /// Compile the plan and write the script, manifest and data payload into `out_dir`.
  pub fn build<S: LogSink>(&self, out_dir: &Path, sink: &mut S) -> Result<MigrationArtifacts> {
    let (plan, items) = self.compile_items(sink)?;
    let config = &self.settings.config;

    fs::create_dir_all(out_dir)
      .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let script_path = out_dir.join(SCRIPT_FILE_NAME);
    fs::write(&script_path, &plan.script_text)
      .with_context(|| format!("failed to write {}", script_path.display()))?;
    make_executable(&script_path)?;

    let archive_name = config.archive_mode.then_some(config.archive_name.as_str());
    let manifest_path = out_dir.join(MANIFEST_FILE_NAME);
    let manifest_json = serde_json::to_string_pretty(&ManifestSummary::from_plan(&plan, archive_name))?;
    fs::write(&manifest_path, manifest_json)
      .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    let mut archive_path = None;
    let mut source_dir = None;
    if config.archive_mode {
      if !plan.archive_manifest.is_empty() {
        let path = out_dir.join(&config.archive_name);
        write_archive(&plan.archive_manifest, &path)?;
        archive_path = Some(path);
      }
    } else if !items.is_empty() {
      let path = out_dir.join(&config.source_dir_name);
      let staged = stage_direct_copies(&items, &path)?;
      info!(dir = %path.display(), entries = staged, "staged direct-copy sources");
      source_dir = Some(path);
    }

    info!(script = %script_path.display(), warnings = plan.warnings.len(), "wrote migration bundle");
    Ok(MigrationArtifacts {
      plan,
      script_path,
      manifest_path,
      archive_path,
      source_dir,
    })
  }

  fn compile_items<S: LogSink>(&self, sink: &mut S) -> Result<(MigrationPlan, Vec<SourceItem>)> {
    let (items, mut warnings) = self.selected_items();
    let apps = self.selected_apps();
    let table = self.settings.alternative_table();

    let mut plan = compile_with(&items, &apps, &self.settings.config, &table, sink)?;
    warnings.append(&mut plan.warnings);
    plan.warnings = warnings;
    Ok((plan, items))
  }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;

  fs::set_permissions(path, fs::Permissions::from_mode(0o755))
    .with_context(|| format!("failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
  Ok(())
}

/// Mirror direct-copy items below `source_root` as `logical_root/relative_path`.
///
/// Files are hard-linked when possible; entries left over from earlier builds are pruned.
fn stage_direct_copies(items: &[SourceItem], source_root: &Path) -> Result<usize> {
  let mut desired = BTreeSet::new();
  fs::create_dir_all(source_root)
    .with_context(|| format!("failed to create {}", source_root.display()))?;

  for item in items {
    let source = item.source();
    if item.kind == ItemKind::Directory && source_root.starts_with(source) {
      bail!(
        "output directory {} lies inside selected directory {}",
        source_root.display(),
        source.display()
      );
    }

    let relative = PathBuf::from(item.destination_relative());
    let destination = source_root.join(&relative);
    match item.kind {
      ItemKind::File => {
        if let Some(parent) = destination.parent() {
          fs::create_dir_all(parent)?;
        }
        install_source_file(source, &destination)
          .with_context(|| format!("failed to stage {}", source.display()))?;
      }
      ItemKind::Directory => {
        mirror_directory(source, &destination, &relative, item.preserve_symlinks, &mut desired)
          .with_context(|| format!("failed to stage {}", source.display()))?;
      }
    }
    desired.insert(relative);
  }

  prune_mirror_tree(source_root, &desired)?;
  Ok(desired.len())
}

fn mirror_directory(
  source: &Path,
  destination: &Path,
  relative: &Path,
  preserve_symlinks: bool,
  desired: &mut BTreeSet<PathBuf>,
) -> std::io::Result<()> {
  fs::create_dir_all(destination)?;

  for entry in fs::read_dir(source)? {
    let entry = entry?;
    let file_name = entry.file_name();
    let entry_path = entry.path();
    let child_destination = destination.join(&file_name);
    let child_relative = relative.join(&file_name);

    if entry.file_type()?.is_symlink() && preserve_symlinks {
      install_symlink(&entry_path, &child_destination)?;
    } else if fs::metadata(&entry_path)?.is_dir() {
      mirror_directory(
        &entry_path,
        &child_destination,
        &child_relative,
        preserve_symlinks,
        desired,
      )?;
    } else {
      install_source_file(&entry_path, &child_destination)?;
    }
    desired.insert(child_relative);
  }

  Ok(())
}

/// Remove payload entries that no selected item accounts for, so `source_windows_data/`
/// holds exactly what the script's `copy_item` calls read.
///
/// A directory survives when it is a selected item itself or still holds a kept entry.
fn prune_mirror_tree(root: &Path, keep: &BTreeSet<PathBuf>) -> std::io::Result<()> {
  if root.exists() {
    prune_stale_entries(root, Path::new(""), keep)?;
  }
  Ok(())
}

/// Returns `true` when nothing below `relative` is still part of the payload.
fn prune_stale_entries(
  root: &Path,
  relative: &Path,
  keep: &BTreeSet<PathBuf>,
) -> std::io::Result<bool> {
  let entries = match fs::read_dir(root.join(relative)) {
    Ok(entries) => entries,
    Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
    Err(err) => return Err(err),
  };

  let mut still_used = false;
  for entry in entries {
    let entry = entry?;
    let child = relative.join(entry.file_name());
    let is_dir = entry.file_type()?.is_dir();
    let stale = if is_dir {
      prune_stale_entries(root, &child, keep)? && !keep.contains(&child)
    } else {
      !keep.contains(&child)
    };
    if !stale {
      still_used = true;
      continue;
    }

    let path = entry.path();
    debug!(path = %path.display(), "pruning stale payload entry");
    if is_dir {
      fs::remove_dir_all(&path)?;
    } else {
      fs::remove_file(&path)?;
    }
  }

  Ok(!still_used)
}

/// Place one payload file, hard-linked to the selected source when the filesystem
/// allows it and copied otherwise.
fn install_source_file(source: &Path, destination: &Path) -> std::io::Result<()> {
  if destination.exists() {
    if is_same_file(source, destination)? {
      return Ok(());
    }
    fs::remove_file(destination)?;
  }

  fs::hard_link(source, destination).or_else(|_| fs::copy(source, destination).map(drop))
}

#[cfg(unix)]
fn install_symlink(source: &Path, destination: &Path) -> std::io::Result<()> {
  let target = fs::read_link(source)?;
  if fs::symlink_metadata(destination).is_ok() {
    if fs::read_link(destination).is_ok_and(|existing| existing == target) {
      return Ok(());
    }
    fs::remove_file(destination)?;
  }
  std::os::unix::fs::symlink(target, destination)
}

#[cfg(not(unix))]
fn install_symlink(source: &Path, destination: &Path) -> std::io::Result<()> {
  install_source_file(source, destination)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::SelectedPath;
  use crate::sink::MemorySink;
  use tempfile::tempdir;

  fn settings_for(home: &Path) -> MigrationSettings {
    MigrationSettings {
      home: Some(home.to_string_lossy().into_owned()),
      ..MigrationSettings::default()
    }
  }

  fn seed_home(home: &Path) -> std::io::Result<()> {
    fs::create_dir_all(home.join("Desktop"))?;
    fs::create_dir_all(home.join("Pictures/2024"))?;
    fs::create_dir_all(home.join("Pictures/empty"))?;
    fs::write(home.join("Desktop/notes.txt"), b"notes")?;
    fs::write(home.join("Pictures/2024/cat.png"), b"png")
  }

  #[test]
  fn direct_mode_writes_script_manifest_and_sources() -> Result<()> {
    let temp = tempdir()?;
    let home = temp.path().join("home");
    seed_home(&home)?;

    let mut settings = settings_for(&home);
    settings.items = vec![
      SelectedPath::Plain(home.join("Desktop/notes.txt").to_string_lossy().into_owned()),
      SelectedPath::Plain(home.join("Pictures").to_string_lossy().into_owned()),
    ];
    settings.apps = vec![ApplicationEntry::named("Mozilla Firefox")];

    let out = temp.path().join("out");
    let artifacts = MigrationBuilder::new(&settings)?.build(&out, &mut MemorySink::default())?;

    let script = fs::read_to_string(&artifacts.script_path)?;
    assert!(script.contains("apt install -y firefox"));
    assert!(artifacts.archive_path.is_none());

    let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(&artifacts.manifest_path)?)?;
    assert_eq!(manifest["mode"], "direct");
    assert!(manifest["entries"].as_array().unwrap().is_empty());

    let staged = artifacts.source_dir.expect("direct mode stages sources");
    assert_eq!(fs::read(staged.join("Desktop/notes.txt"))?, b"notes");
    assert!(staged.join("Pictures/2024/cat.png").exists());
    assert!(staged.join("Pictures/empty").is_dir());
    Ok(())
  }

  #[test]
  fn archive_mode_writes_the_tarball() -> Result<()> {
    let temp = tempdir()?;
    let home = temp.path().join("home");
    seed_home(&home)?;

    let mut settings = settings_for(&home);
    settings.config.archive_mode = true;
    settings.items = vec![SelectedPath::Plain(
      home.join("Pictures").to_string_lossy().into_owned(),
    )];

    let out = temp.path().join("out");
    let artifacts = MigrationBuilder::new(&settings)?.build(&out, &mut MemorySink::default())?;
    let archive = artifacts.archive_path.expect("archive mode writes a tarball");
    assert_eq!(archive, out.join("win_migrator_backup.tar.gz"));
    assert!(archive.exists());
    assert!(artifacts.source_dir.is_none());

    let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(&artifacts.manifest_path)?)?;
    assert_eq!(manifest["mode"], "archive");
    assert_eq!(manifest["entries"][0]["path"], "Pictures");
    Ok(())
  }

  #[test]
  fn missing_paths_become_warnings() -> Result<()> {
    let temp = tempdir()?;
    let home = temp.path().join("home");
    seed_home(&home)?;

    let missing = home.join("Desktop/gone.txt").to_string_lossy().into_owned();
    let mut settings = settings_for(&home);
    settings.items = vec![
      SelectedPath::Plain(missing.clone()),
      SelectedPath::Plain(home.join("Desktop/notes.txt").to_string_lossy().into_owned()),
    ];

    let plan = MigrationBuilder::new(&settings)?.compile(&mut MemorySink::default())?;
    assert!(matches!(
      &plan.warnings[0],
      PlanWarning::InvalidPath { path, .. } if *path == missing
    ));
    assert!(plan.script_text.contains("Desktop/notes.txt"));
    Ok(())
  }

  #[test]
  fn per_item_overrides_reach_the_script() -> Result<()> {
    let temp = tempdir()?;
    let home = temp.path().join("home");
    seed_home(&home)?;

    let mut settings = settings_for(&home);
    settings.items = vec![SelectedPath::Detailed {
      path: home.join("Pictures").to_string_lossy().into_owned(),
      preserve_permissions: Some(false),
      preserve_symlinks: Some(false),
    }];

    let plan = MigrationBuilder::new(&settings)?.compile(&mut MemorySink::default())?;
    assert!(plan.script_text.contains("copy_item copy_pictures Pictures dir -L"));
    Ok(())
  }

  #[test]
  fn registry_noise_is_filtered_unless_requested() -> Result<()> {
    let temp = tempdir()?;
    let mut settings = settings_for(temp.path());
    settings.apps = vec![
      ApplicationEntry::named("KB5031356"),
      ApplicationEntry::named("VLC media player"),
    ];

    let filtered = MigrationBuilder::new(&settings)?.compile(&mut MemorySink::default())?;
    assert!(!filtered
      .warnings
      .iter()
      .any(|w| matches!(w, PlanWarning::UnmappedApplication { .. })));

    settings.include_system_components = true;
    let unfiltered = MigrationBuilder::new(&settings)?.compile(&mut MemorySink::default())?;
    assert!(unfiltered.warnings.contains(&PlanWarning::UnmappedApplication {
      name: "KB5031356".into()
    }));
    Ok(())
  }

  #[test]
  fn rebuilding_prunes_deselected_sources() -> Result<()> {
    let temp = tempdir()?;
    let home = temp.path().join("home");
    seed_home(&home)?;
    let out = temp.path().join("out");

    let mut settings = settings_for(&home);
    settings.items = vec![
      SelectedPath::Plain(home.join("Desktop/notes.txt").to_string_lossy().into_owned()),
      SelectedPath::Plain(home.join("Pictures").to_string_lossy().into_owned()),
    ];
    MigrationBuilder::new(&settings)?.build(&out, &mut MemorySink::default())?;

    settings.items.truncate(1);
    let artifacts = MigrationBuilder::new(&settings)?.build(&out, &mut MemorySink::default())?;
    let staged = artifacts.source_dir.unwrap();
    assert!(staged.join("Desktop/notes.txt").exists());
    assert!(!staged.join("Pictures").exists());
    Ok(())
  }

  #[test]
  fn refuses_to_stage_into_a_selected_directory() -> Result<()> {
    let temp = tempdir()?;
    let home = temp.path().join("home");
    seed_home(&home)?;

    let mut settings = settings_for(&home);
    settings.items = vec![SelectedPath::Plain(
      home.join("Desktop").to_string_lossy().into_owned(),
    )];
    let result = MigrationBuilder::new(&settings)?.build(&home.join("Desktop/out"), &mut MemorySink::default());
    assert!(result.is_err());
    Ok(())
  }

  #[test]
  fn prune_mirror_tree_removes_stale_entries() -> std::io::Result<()> {
    let temp = tempdir()?;
    let mirror_root = temp.path().join("mirror");

    fs::create_dir_all(mirror_root.join("Documents/reports"))?;
    fs::write(mirror_root.join("Documents/reports/q1.odt"), b"keep")?;
    fs::create_dir_all(mirror_root.join("Documents/tmp"))?;
    fs::write(mirror_root.join("Documents/tmp/unused.bin"), b"unused")?;
    fs::create_dir_all(mirror_root.join("Music"))?;
    fs::write(mirror_root.join("Music/stale.mp3"), b"stale")?;
    fs::create_dir_all(mirror_root.join("Videos/empty"))?;

    let mut keep = BTreeSet::new();
    keep.insert(PathBuf::from("Documents/reports/q1.odt"));
    keep.insert(PathBuf::from("Videos/empty"));

    prune_mirror_tree(&mirror_root, &keep)?;

    assert!(mirror_root.join("Documents/reports/q1.odt").exists());
    assert!(!mirror_root.join("Documents/tmp").exists());
    assert!(!mirror_root.join("Music").exists());
    assert!(mirror_root.join("Videos/empty").is_dir());

    Ok(())
  }

  #[test]
  fn install_source_file_reuses_existing_links() -> std::io::Result<()> {
    let temp = tempdir()?;
    let root = temp.path();

    let source = root.join("notes.txt");
    fs::write(&source, b"content")?;
    let destination = root.join("mirror/notes.txt");
    fs::create_dir_all(destination.parent().unwrap())?;

    install_source_file(&source, &destination)?;
    assert!(same_file::is_same_file(&source, &destination)?);

    install_source_file(&source, &destination)?;
    assert!(same_file::is_same_file(&source, &destination)?);

    Ok(())
  }
}
