use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use winlinux_migrator::{
  ApplicationEntry, MigrationBuilder, MigrationSettings, TracingSink, alternatives::resolve_with,
  paths::normalize,
};

/// winlinux-migrator - compile a Windows selection into a Linux migration script
#[derive(Parser)]
#[command(name = "winlinux-migrator")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a settings file into a script, manifest and data payload
  Compile {
    /// Settings file (default: migrator.settings.json in the working directory)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Directory receiving the generated files
    #[arg(short, long, default_value = "migration_bundle")]
    out_dir: PathBuf,

    /// Source home directory used to tag selected paths
    #[arg(long)]
    home: Option<PathBuf>,

    /// Print the script to stdout instead of writing any files
    #[arg(long)]
    print: bool,
  },

  /// Show the Linux alternative suggested for application names
  Resolve {
    /// Display names as listed by the Windows application registry
    #[arg(required = true)]
    names: Vec<String>,

    /// Settings file providing alternative overrides
    #[arg(short, long)]
    settings: Option<PathBuf>,
  },

  /// Show how selected paths map onto the destination layout
  Normalize {
    /// Absolute paths to classify
    #[arg(required = true)]
    paths: Vec<String>,

    /// Source home directory (default: the current user's home)
    #[arg(long)]
    home: Option<PathBuf>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    )
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Compile {
      settings,
      out_dir,
      home,
      print,
    } => cmd_compile(settings.as_deref(), &out_dir, home, print),
    Commands::Resolve { names, settings } => cmd_resolve(&names, settings.as_deref()),
    Commands::Normalize { paths, home } => cmd_normalize(&paths, home),
  }
}

fn load_settings(path: Option<&Path>) -> Result<MigrationSettings> {
  match path {
    Some(path) => Ok(MigrationSettings::load_from_path(path)?),
    None => {
      let cwd = std::env::current_dir().context("failed to read the working directory")?;
      Ok(MigrationSettings::discover(&cwd))
    }
  }
}

fn cmd_compile(settings: Option<&Path>, out_dir: &Path, home: Option<PathBuf>, print: bool) -> Result<()> {
  let settings = load_settings(settings)?;
  let mut builder = MigrationBuilder::new(&settings)?;
  if let Some(home) = home {
    builder = builder.with_home(home);
  }

  let mut sink = TracingSink;
  if print {
    let plan = builder.compile(&mut sink)?;
    print!("{}", plan.script_text);
    for warning in &plan.warnings {
      eprintln!("warning: {warning}");
    }
    return Ok(());
  }

  let artifacts = builder.build(out_dir, &mut sink)?;
  for warning in &artifacts.plan.warnings {
    eprintln!("warning: {warning}");
  }
  println!("script:   {}", artifacts.script_path.display());
  println!("manifest: {}", artifacts.manifest_path.display());
  if let Some(archive) = &artifacts.archive_path {
    println!("archive:  {}", archive.display());
  }
  if let Some(source_dir) = &artifacts.source_dir {
    println!("sources:  {}", source_dir.display());
  }
  Ok(())
}

fn cmd_resolve(names: &[String], settings: Option<&Path>) -> Result<()> {
  let table = load_settings(settings)?.alternative_table();
  for name in names {
    let resolution = resolve_with(&ApplicationEntry::named(name.as_str()), &table);
    let Some(package) = &resolution.package_name else {
      println!("{name} -> no known alternative");
      continue;
    };
    let mut line = format!("{name} -> {package}");
    if !resolution.fallbacks.is_empty() {
      line.push_str(&format!(" (then {})", resolution.fallbacks.join(", ")));
    }
    if let Some(hint) = &resolution.hint {
      line.push_str(&format!(" [{hint}]"));
    }
    println!("{line}");
  }
  Ok(())
}

fn cmd_normalize(paths: &[String], home: Option<PathBuf>) -> Result<()> {
  let home = match home {
    Some(home) => home,
    None => dirs::home_dir().context("could not determine the home directory")?,
  };
  for path in paths {
    match normalize(path, &home) {
      Ok(item) => println!("{path} -> {}", item.destination_relative()),
      Err(err) => eprintln!("{path}: {err}"),
    }
  }
  Ok(())
}
