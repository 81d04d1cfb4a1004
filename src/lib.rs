#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod alternatives;
pub mod archive;
pub mod builder;
pub mod config;
pub mod error;
pub mod models;
pub mod paths;
pub mod planner;
pub mod script;
pub mod selection;
pub mod settings;
pub mod sink;

pub use builder::{MANIFEST_FILE_NAME, MigrationArtifacts, MigrationBuilder, SCRIPT_FILE_NAME};
pub use config::MigrationConfig;
pub use error::{MigrationError, PlanWarning};
pub use models::{
  ApplicationEntry, ItemKind, LogicalRoot, MigrationPlan, Resolution, ResolutionStatus,
  SourceItem,
};
pub use script::{compile, compile_with};
pub use selection::{AppInclusion, AppSelection, RegistryNoiseFilter};
pub use settings::{MigrationSettings, SelectedPath};
pub use sink::{Level, LogSink, MemorySink, Stage, TracingSink};
