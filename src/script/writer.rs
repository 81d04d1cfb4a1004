//! Line-oriented builder for the generated shell script.

use crate::sink::{Level, Stage};

use super::quoting::shell_quote;

const INDENT: &str = "  ";

/// Accumulates script lines with block indentation.
#[derive(Debug, Default)]
pub(crate) struct ScriptWriter {
  out: String,
  depth: usize,
}

impl ScriptWriter {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn line(&mut self, text: impl AsRef<str>) {
    let text = text.as_ref();
    if !text.is_empty() {
      for _ in 0..self.depth {
        self.out.push_str(INDENT);
      }
      self.out.push_str(text);
    }
    self.out.push('\n');
  }

  pub(crate) fn blank(&mut self) {
    self.out.push('\n');
  }

  /// Write `text` and indent what follows, e.g. `if ...; then`.
  pub(crate) fn open(&mut self, text: impl AsRef<str>) {
    self.line(text);
    self.depth += 1;
  }

  /// Dedent and write `text`, e.g. `fi`.
  pub(crate) fn close(&mut self, text: impl AsRef<str>) {
    self.depth = self.depth.saturating_sub(1);
    self.line(text);
  }

  /// Dedent for one line, e.g. `else`.
  pub(crate) fn pivot(&mut self, text: impl AsRef<str>) {
    self.depth = self.depth.saturating_sub(1);
    self.line(text);
    self.depth += 1;
  }

  /// Emit a `log` call with a literal message.
  pub(crate) fn log(&mut self, stage: Stage, level: Level, message: &str) {
    self.line(format!(
      "log {} {} {}",
      stage.tag(),
      level.tag(),
      shell_quote(message)
    ));
  }

  /// Emit a `log` call whose message expands script variables.
  ///
  /// `template` must only contain fixed text and `$VARIABLE` references, never values
  /// taken from the selection.
  pub(crate) fn log_expanding(&mut self, stage: Stage, level: Level, template: &str) {
    self.line(format!("log {} {} \"{template}\"", stage.tag(), level.tag()));
  }

  pub(crate) fn heading(&mut self, stage: Stage, title: &str) {
    self.blank();
    self.line(format!("# --- Stage {}: {title} ---", stage.letter()));
  }

  pub(crate) fn finish(self) -> String {
    self.out
  }
}
