//! Package-manager command handling for the install stage.

use std::path::Path;

use crate::error::MigrationError;

use super::quoting::shell_quote;

/// Known package-manager families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFamily {
  /// `apt` and `apt-get`.
  Apt,
  /// `dnf` and `yum`.
  Dnf,
  /// `pacman`.
  Pacman,
  /// `zypper`.
  Zypper,
  /// `apk`.
  Apk,
  /// Anything else; used verbatim.
  Other,
}

impl PackageFamily {
  fn detect(program: &str) -> Self {
    let name = Path::new(program)
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or(program);
    match name {
      "apt" | "apt-get" => Self::Apt,
      "dnf" | "yum" => Self::Dnf,
      "pacman" => Self::Pacman,
      "zypper" => Self::Zypper,
      "apk" => Self::Apk,
      _ => Self::Other,
    }
  }
}

/// Install and refresh command lines for one package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManager {
  family: PackageFamily,
  install: Vec<String>,
  refresh: Option<Vec<String>>,
}

impl PackageManager {
  /// Parse a configured install command such as `apt install -y` or just `pacman`.
  ///
  /// A bare program name of a known family is expanded to its non-interactive install
  /// form. A leading `sudo` is dropped because the script elevates on its own.
  pub fn parse(command: &str) -> Result<Self, MigrationError> {
    let mut words: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    if words.first().is_some_and(|word| word == "sudo") {
      words.remove(0);
    }
    let Some(program) = words.first().cloned() else {
      return Err(MigrationError::invalid_config(
        "package manager command must name a program",
      ));
    };

    let family = PackageFamily::detect(&program);
    if words.len() == 1 {
      words.extend(default_install_args(family).iter().map(|arg| arg.to_string()));
    }
    if family == PackageFamily::Pacman
      && words.iter().any(|word| word.starts_with("-S"))
      && !words.iter().any(|word| word == "--needed")
    {
      words.push("--needed".into());
    }

    let refresh = refresh_args(family).map(|args| {
      std::iter::once(program.clone())
        .chain(args.iter().map(|arg| arg.to_string()))
        .collect()
    });

    Ok(Self {
      family,
      install: words,
      refresh,
    })
  }

  /// Detected family.
  pub fn family(&self) -> PackageFamily {
    self.family
  }

  /// Shell-quoted install command without package arguments.
  pub fn install_command(&self) -> String {
    render(&self.install)
  }

  /// Shell-quoted index refresh command, when the family has one.
  pub fn refresh_command(&self) -> Option<String> {
    self.refresh.as_deref().map(render)
  }
}

fn default_install_args(family: PackageFamily) -> &'static [&'static str] {
  match family {
    PackageFamily::Apt | PackageFamily::Dnf | PackageFamily::Zypper => &["install", "-y"],
    PackageFamily::Pacman => &["-S", "--noconfirm", "--needed"],
    PackageFamily::Apk => &["add"],
    PackageFamily::Other => &[],
  }
}

fn refresh_args(family: PackageFamily) -> Option<&'static [&'static str]> {
  match family {
    PackageFamily::Apt => Some(&["update"]),
    PackageFamily::Dnf => Some(&["makecache"]),
    PackageFamily::Pacman => Some(&["-Syu", "--noconfirm"]),
    PackageFamily::Zypper => Some(&["refresh"]),
    PackageFamily::Apk => Some(&["update"]),
    PackageFamily::Other => None,
  }
}

fn render(words: &[String]) -> String {
  words
    .iter()
    .map(|word| shell_quote(word))
    .collect::<Vec<_>>()
    .join(" ")
}

/// Split `packages` into invocations of at most `max` names, keeping order.
pub fn batches<T>(packages: &[T], max: Option<usize>) -> Vec<&[T]> {
  if packages.is_empty() {
    return Vec::new();
  }
  match max {
    Some(limit) if limit > 0 => packages.chunks(limit).collect(),
    _ => vec![packages],
  }
}
