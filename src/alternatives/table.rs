//! Built-in alternative table and override support.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::normalize::normalize_app_name;

/// Target package suggested for an application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AlternativeMapping {
  /// Package name passed to the target package manager.
  pub target_package_name: String,
  /// Packages tried in order when the primary package fails to install.
  #[serde(default)]
  pub fallbacks: Vec<String>,
  /// Extra guidance when the package needs a third-party repository or manual steps.
  #[serde(default)]
  pub install_hint: Option<String>,
}

/// Display name, package, fallback packages, install hint.
type BuiltinRow = (&'static str, &'static str, &'static [&'static str], Option<&'static str>);

const NEEDS_VENDOR_REPO: Option<&str> = Some("requires the vendor's package repository");
const NEEDS_FLATPAK: Option<&str> = Some("usually installed from Flathub when the distribution lacks it");

static BUILTIN_ROWS: &[BuiltinRow] = &[
  ("Microsoft Office", "libreoffice", &["onlyoffice-desktopeditors", "wps-office"], None),
  ("Microsoft Word", "libreoffice-writer", &["onlyoffice-desktopeditors"], None),
  ("Microsoft Excel", "libreoffice-calc", &["onlyoffice-desktopeditors"], None),
  ("Microsoft PowerPoint", "libreoffice-impress", &["onlyoffice-desktopeditors"], None),
  ("Microsoft Outlook", "thunderbird", &["evolution", "kmail"], None),
  ("Adobe Photoshop", "gimp", &["krita"], None),
  ("Adobe Illustrator", "inkscape", &[], None),
  ("Adobe Acrobat Reader", "okular", &["evince", "zathura"], None),
  ("Adobe Acrobat Pro", "okular", &["evince"], Some("editing PDFs may need masterpdfeditor-free")),
  ("Adobe Premiere Pro", "kdenlive", &["shotcut", "olive-editor"], None),
  ("Adobe After Effects", "natron", &["blender"], None),
  ("Notepad++", "kate", &["gedit", "mousepad", "neovim"], None),
  ("7-Zip", "p7zip-full", &["p7zip", "ark"], None),
  ("WinRAR", "unrar", &["p7zip-full", "ark"], Some("unrar lives in non-free repositories on some distributions")),
  ("WinZip", "file-roller", &["ark", "p7zip-full"], None),
  ("VLC media player", "vlc", &["mpv", "smplayer"], None),
  ("Google Chrome", "google-chrome-stable", &["chromium-browser", "chromium"], NEEDS_VENDOR_REPO),
  ("Mozilla Firefox", "firefox", &["firefox-esr"], None),
  ("Microsoft Edge", "microsoft-edge-stable", &["chromium-browser", "chromium"], NEEDS_VENDOR_REPO),
  ("iTunes", "rhythmbox", &["strawberry", "elisa"], None),
  ("Spotify", "spotify-client", &["ncspot"], NEEDS_VENDOR_REPO),
  ("Steam", "steam-installer", &["steam", "lutris"], Some("requires 32-bit architecture support on the target")),
  ("Visual Studio Code", "code", &["codium"], NEEDS_VENDOR_REPO),
  ("Visual Studio", "kdevelop", &["eclipse"], Some("no direct equivalent")),
  ("Slack", "slack-desktop", &[], NEEDS_FLATPAK),
  ("Zoom", "zoom", &[], Some("download the package from the vendor website")),
  ("Skype", "skypeforlinux", &["teams-for-linux"], NEEDS_FLATPAK),
  ("TeamViewer", "teamviewer", &["remmina"], NEEDS_VENDOR_REPO),
  ("Discord", "discord", &[], NEEDS_FLATPAK),
  ("Telegram Desktop", "telegram-desktop", &[], None),
  ("WhatsApp Desktop", "whatsapp-for-linux", &[], NEEDS_FLATPAK),
  ("Lightshot", "flameshot", &["ksnip", "spectacle"], None),
  ("Paint.NET", "pinta", &["krita"], None),
  ("Microsoft Paint", "kolourpaint", &["drawing", "mypaint"], None),
  ("WinSCP", "filezilla", &["openssh-client"], None),
  ("PuTTY", "putty", &["openssh-client"], None),
  ("FileZilla", "filezilla", &["lftp"], None),
  ("μTorrent", "qbittorrent", &["transmission-gtk", "deluge", "ktorrent"], None),
  ("CCleaner", "bleachbit", &["stacer"], None),
  ("Recuva", "testdisk", &[], None),
  ("TeamSpeak", "mumble", &[], Some("the TeamSpeak client is distributed by the vendor")),
  ("Windows Media Player", "vlc", &["mpv", "totem"], None),
  ("Sublime Text", "sublime-text", &[], NEEDS_VENDOR_REPO),
  ("VMware Workstation Player", "virtualbox", &["qemu-system-x86", "gnome-boxes"], None),
  ("VMware Workstation Pro", "virtualbox", &["qemu-system-x86", "gnome-boxes"], None),
  ("Oracle VM VirtualBox", "virtualbox", &["gnome-boxes"], None),
  ("Docker Desktop", "docker.io", &["podman"], None),
  ("Git", "git", &[], None),
  ("Python", "python3", &["python"], None),
  ("Java Development Kit", "default-jdk", &["openjdk-17-jdk"], None),
  ("Node.js", "nodejs", &[], None),
  ("OBS Studio", "obs-studio", &[], None),
  ("Audacity", "audacity", &["ardour"], None),
  ("Blender", "blender", &[], None),
  ("KeePassXC", "keepassxc", &[], None),
  ("KeePass", "keepassxc", &["keepass2"], None),
  ("Bitwarden", "bitwarden", &["keepassxc"], NEEDS_FLATPAK),
  ("Dropbox", "nautilus-dropbox", &["rclone", "nextcloud-desktop"], NEEDS_VENDOR_REPO),
  ("Google Drive", "rclone", &[], Some("configure a Google Drive remote with rclone config")),
  ("OneDrive", "onedrive", &["rclone"], None),
  ("GIMP", "gimp", &[], None),
  ("Inkscape", "inkscape", &[], None),
  ("Krita", "krita", &[], None),
  ("LibreOffice", "libreoffice", &["onlyoffice-desktopeditors"], None),
  ("PowerISO", "acetoneiso", &["furiusisomount"], None),
  ("CPU-Z", "cpu-x", &["hardinfo"], None),
  ("HWiNFO", "hardinfo", &["cpu-x"], None),
  ("Rufus", "gnome-disk-utility", &[], Some("balenaEtcher or Ventoy also write bootable media")),
  ("balenaEtcher", "balena-etcher", &[], NEEDS_VENDOR_REPO),
  ("XnView MP", "gwenview", &["nomacs", "geeqie"], None),
  ("IrfanView", "gwenview", &["nomacs", "geeqie"], None),
  ("Foobar2000", "deadbeef", &["strawberry", "audacious"], None),
  ("Winamp", "audacious", &[], None),
  ("AutoCAD", "librecad", &["freecad"], None),
  ("SolidWorks", "freecad", &[], None),
  ("MATLAB", "octave", &[], None),
  ("Unity Hub", "unityhub", &[], NEEDS_VENDOR_REPO),
  ("Epic Games Launcher", "lutris", &[], Some("Heroic Games Launcher is distributed on Flathub")),
  ("Thunderbird", "thunderbird", &[], None),
  ("Mozilla Thunderbird", "thunderbird", &[], None),
];

/// Immutable mapping from normalized application names to suggested packages.
///
/// Entries keep the order they were declared in; lookups that tie on specificity
/// resolve to the earliest entry.
#[derive(Debug, Clone, Default)]
pub struct AlternativeTable {
  entries: Vec<(String, AlternativeMapping)>,
}

impl AlternativeTable {
  /// The table compiled into the binary.
  pub fn builtin() -> &'static AlternativeTable {
    static TABLE: OnceLock<AlternativeTable> = OnceLock::new();
    TABLE.get_or_init(|| {
      let mut table = AlternativeTable::default();
      for (name, package, fallbacks, hint) in BUILTIN_ROWS {
        table.insert_first(name, AlternativeMapping {
          target_package_name: (*package).to_string(),
          fallbacks: fallbacks.iter().map(|fallback| fallback.to_string()).collect(),
          install_hint: hint.map(str::to_string),
        });
      }
      table
    })
  }

  /// Build a new table from the built-in rows with user supplied overrides applied.
  ///
  /// An override whose normalized name matches a built-in key replaces that entry in
  /// place; new names are appended.
  pub fn with_overrides(overrides: &BTreeMap<String, AlternativeMapping>) -> AlternativeTable {
    let mut table = Self::builtin().clone();
    for (name, mapping) in overrides {
      let key = normalize_app_name(name);
      if key.is_empty() {
        continue;
      }
      match table.entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some((_, slot)) => *slot = mapping.clone(),
        None => table.entries.push((key, mapping.clone())),
      }
    }
    table
  }

  /// Exact lookup by an already normalized key.
  pub fn get(&self, key: &str) -> Option<&AlternativeMapping> {
    self
      .entries
      .iter()
      .find(|(existing, _)| existing == key)
      .map(|(_, mapping)| mapping)
  }

  /// Iterate over normalized keys and mappings in declaration order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &AlternativeMapping)> {
    self
      .entries
      .iter()
      .map(|(key, mapping)| (key.as_str(), mapping))
  }

  /// Number of distinct keys.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns `true` when the table has no entries.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  fn insert_first(&mut self, name: &str, mapping: AlternativeMapping) {
    let key = normalize_app_name(name);
    if key.is_empty() || self.get(&key).is_some() {
      return;
    }
    self.entries.push((key, mapping));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_keys_are_normalized_and_unique() {
    let table = AlternativeTable::builtin();
    let mut seen = std::collections::BTreeSet::new();
    for (key, _) in table.iter() {
      assert_eq!(key, normalize_app_name(key));
      assert!(seen.insert(key.to_string()), "duplicate key {key}");
    }
    assert_eq!(table.len(), seen.len());
  }

  #[test]
  fn builtin_contains_common_browsers() {
    let table = AlternativeTable::builtin();
    assert_eq!(
      table.get("mozilla firefox").map(|m| m.target_package_name.as_str()),
      Some("firefox")
    );
    assert!(table.get("google chrome").and_then(|m| m.install_hint.as_ref()).is_some());
  }

  #[test]
  fn fallbacks_never_repeat_the_primary_package() {
    for (key, mapping) in AlternativeTable::builtin().iter() {
      assert!(
        !mapping.fallbacks.contains(&mapping.target_package_name),
        "{key} lists its primary package as a fallback"
      );
    }
  }

  #[test]
  fn overrides_replace_builtin_entries_in_place() {
    let mut overrides = BTreeMap::new();
    overrides.insert("MOZILLA FIREFOX".to_string(), AlternativeMapping {
      target_package_name: "firefox-esr".into(),
      fallbacks: Vec::new(),
      install_hint: None,
    });
    overrides.insert("Acme Tool".to_string(), AlternativeMapping {
      target_package_name: "acme".into(),
      fallbacks: vec!["acme-legacy".into()],
      install_hint: Some("internal mirror".into()),
    });

    let table = AlternativeTable::with_overrides(&overrides);
    assert_eq!(table.len(), AlternativeTable::builtin().len() + 1);
    assert_eq!(table.get("mozilla firefox").unwrap().target_package_name, "firefox-esr");
    assert_eq!(table.get("acme tool").unwrap().target_package_name, "acme");
    assert_eq!(table.get("acme tool").unwrap().fallbacks, vec!["acme-legacy".to_string()]);
    assert_eq!(
      AlternativeTable::builtin().get("mozilla firefox").unwrap().target_package_name,
      "firefox"
    );
  }
}
