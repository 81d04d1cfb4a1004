use std::sync::OnceLock;

use regex::Regex;

fn bracketed_groups() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("invalid bracket regex"))
}

fn noise_tokens() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"^(?:v?\d+(?:[._-]\d+)*[a-z]?|x64|x86|amd64|arm64|win64|win32|(?:32|64)-?bit|version)$")
      .expect("invalid noise token regex")
  })
}

/// Normalize an application display name into an alternative table key.
///
/// Steps, in order:
/// 1. lowercase, drop trademark marks (`™`, `®`, `(tm)`, `(r)`) and fold the micro
///    sign and Greek mu to `u`;
/// 2. remove parenthesized and bracketed groups such as `(x64)` or `[64-bit]`;
/// 3. drop whitespace-separated tokens that are versions (`23.01`, `v2`, `2019`),
///    architecture markers (`x64`, `64-bit`) or the word `version`;
/// 4. strip remaining punctuation (`Notepad++` becomes `notepad`, `7-Zip` becomes `7zip`);
/// 5. collapse whitespace.
pub fn normalize_app_name(display_name: &str) -> String {
  let lowered = display_name
    .to_lowercase()
    .replace(['™', '®'], "")
    .replace(['\u{b5}', '\u{3bc}'], "u")
    .replace("(tm)", "")
    .replace("(r)", "");
  let without_groups = bracketed_groups().replace_all(&lowered, " ");

  without_groups
    .split_whitespace()
    .filter(|token| !noise_tokens().is_match(token))
    .map(|token| {
      token
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
    })
    .filter(|token| !token.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}
