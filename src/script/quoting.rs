//! Quoting helpers for values embedded in generated shell code.

/// Quote a value so the shell reads it back as exactly one literal word.
///
/// Values made only of characters with no special meaning stay bare so the generated
/// script remains readable; everything else is wrapped in single quotes with embedded
/// single quotes spelled as `'\''`.
pub fn shell_quote(value: &str) -> String {
  if value.is_empty() {
    return "''".to_string();
  }
  if value.chars().all(is_safe_char) {
    return value.to_string();
  }
  format!("'{}'", value.replace('\'', r"'\''"))
}

fn is_safe_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '+' | ':' | ',' | '@' | '%')
}

/// Render a path template as one shell word, substituting `placeholder` with `variable`.
///
/// Literal parts are quoted individually and the variable is expanded inside double
/// quotes, so a template like `/home/<user>/data` becomes
/// `/home/"${TARGET_USER}"/data`. A leading `~/` expands to `$HOME`.
pub fn quote_template(template: &str, placeholder: &str, variable: &str) -> String {
  let mut word = String::new();
  let mut rest = template;
  if let Some(stripped) = rest.strip_prefix("~/") {
    word.push_str("\"${HOME}\"/");
    rest = stripped;
  }

  let mut parts = rest.split(placeholder).peekable();
  while let Some(part) = parts.next() {
    if !part.is_empty() {
      word.push_str(&shell_quote(part));
    }
    if parts.peek().is_some() {
      word.push_str(&format!("\"${{{variable}}}\""));
    }
  }

  if word.is_empty() {
    word.push_str("''");
  }
  word
}
