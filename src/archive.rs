//! Gzip tarball writer for archive-mode manifests.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use same_file::is_same_file;
use tar::{Builder, HeaderMode};
use tracing::{debug, info};

use crate::models::{ItemKind, SourceItem};

/// Write `manifest` into a gzip tarball at `destination`.
///
/// Entries are stored as `logical_root/relative_path` in manifest order, which is the
/// layout the generated script extracts below the destination root. Returns the number
/// of manifest items written.
pub fn write_archive(manifest: &[SourceItem], destination: &Path) -> Result<usize> {
  if let Some(parent) = destination.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  for item in manifest {
    let source = item.source();
    if source.as_os_str().is_empty() {
      bail!(
        "archive item {} has no source path",
        item.destination_relative()
      );
    }
    if item.kind == ItemKind::Directory && destination.starts_with(source) {
      bail!(
        "archive {} would be written inside selected directory {}",
        destination.display(),
        source.display()
      );
    }
  }

  let file = File::create(destination)
    .with_context(|| format!("failed to create {}", destination.display()))?;
  let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

  for item in manifest {
    let source = item.source();
    let name = item.destination_relative();
    builder.follow_symlinks(!item.preserve_symlinks);
    builder.mode(if item.preserve_permissions {
      HeaderMode::Complete
    } else {
      HeaderMode::Deterministic
    });

    match item.kind {
      ItemKind::Directory => builder
        .append_dir_all(&name, source)
        .with_context(|| format!("failed to archive {}", source.display()))?,
      ItemKind::File => {
        if destination.exists() && is_same_file(source, destination).unwrap_or(false) {
          debug!(path = %source.display(), "skipping the archive itself");
          continue;
        }
        builder
          .append_path_with_name(source, &name)
          .with_context(|| format!("failed to archive {}", source.display()))?
      }
    }
    debug!(entry = %name, "archived item");
  }

  builder
    .into_inner()
    .and_then(|encoder| encoder.finish())
    .with_context(|| format!("failed to finish {}", destination.display()))?;

  info!(archive = %destination.display(), items = manifest.len(), "wrote archive");
  Ok(manifest.len())
}
