//! Explicit logging sink for compile-time events.
//!
//! The same stage and level vocabulary is used for the `[STAGE][LEVEL] message` lines the
//! generated script appends to its log file, so compile-time and run-time records read
//! alike.

use std::fmt;

use serde::Serialize;

/// Section of the migration a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
  /// Stage A: destination and user checks.
  Environment,
  /// Stage B: archive extraction or direct copies.
  Data,
  /// Stage C: package installation.
  Apps,
  /// Stage D: final counts.
  Summary,
}

impl Stage {
  /// Tag written inside the brackets of a log line.
  pub fn tag(&self) -> &'static str {
    match self {
      Stage::Environment => "ENV",
      Stage::Data => "DATA",
      Stage::Apps => "APPS",
      Stage::Summary => "SUMMARY",
    }
  }

  /// Letter used in stage headings of the generated script.
  pub fn letter(&self) -> char {
    match self {
      Stage::Environment => 'A',
      Stage::Data => 'B',
      Stage::Apps => 'C',
      Stage::Summary => 'D',
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

/// Severity of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Level {
  /// Progress information.
  Info,
  /// Something was skipped but the migration continues.
  Warn,
  /// Something failed.
  Error,
}

impl Level {
  /// Tag written inside the brackets of a log line.
  pub fn tag(&self) -> &'static str {
    match self {
      Level::Info => "INFO",
      Level::Warn => "WARN",
      Level::Error => "ERROR",
    }
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

/// Receiver for compiler events.
pub trait LogSink {
  /// Record one event.
  fn record(&mut self, stage: Stage, level: Level, message: &str);
}

/// Forwards records to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
  fn record(&mut self, stage: Stage, level: Level, message: &str) {
    match level {
      Level::Info => tracing::info!(stage = stage.tag(), "{message}"),
      Level::Warn => tracing::warn!(stage = stage.tag(), "{message}"),
      Level::Error => tracing::error!(stage = stage.tag(), "{message}"),
    }
  }
}

/// One captured record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
  /// Stage the record belongs to.
  pub stage: Stage,
  /// Severity.
  pub level: Level,
  /// Message text.
  pub message: String,
}

impl fmt::Display for LogRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}][{}] {}", self.stage, self.level, self.message)
  }
}

/// Keeps records in memory, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
  /// Captured records.
  pub records: Vec<LogRecord>,
}

impl MemorySink {
  /// Records at or above `level`.
  pub fn at_least(&self, level: Level) -> impl Iterator<Item = &LogRecord> {
    self.records.iter().filter(move |record| record.level >= level)
  }
}

impl LogSink for MemorySink {
  fn record(&mut self, stage: Stage, level: Level, message: &str) {
    self.records.push(LogRecord {
      stage,
      level,
      message: message.to_string(),
    });
  }
}
