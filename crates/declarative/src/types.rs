//! Core types for wanted/current state tracking

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Map-typed resource kinds.
///
/// Each kind tracks a map from resource name to a boolean
/// "should be present/active" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceKind {
    /// Repository package (pacman)
    Package,
    /// AUR package (paru)
    AurPackage,
    /// System-wide systemd unit
    Service,
    /// Per-user systemd unit
    UserService,
    /// Unix group membership of the configured user
    Group,
    /// Entry in the locale definition file
    Locale,
}

impl ResourceKind {
    /// Every map-typed kind, in reconciliation order
    pub const ALL: [ResourceKind; 6] = [
        Self::Package,
        Self::AurPackage,
        Self::Service,
        Self::UserService,
        Self::Group,
        Self::Locale,
    ];

    /// Stable string form, also used in task ids
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::AurPackage => "aur-package",
            Self::Service => "service",
            Self::UserService => "user-service",
            Self::Group => "group",
            Self::Locale => "locale",
        }
    }

    /// The kind whose observed map backs this kind.
    ///
    /// AUR packages are observed through the same installed-package list
    /// as repository packages.
    pub fn observed_as(&self) -> Self {
        match self {
            Self::AurPackage => Self::Package,
            other => *other,
        }
    }

    /// Whether converging this kind needs an escalated session
    pub fn requires_privilege(&self) -> bool {
        !matches!(self, Self::UserService)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "package" | "pkg" => Ok(Self::Package),
            "aur-package" | "aur" => Ok(Self::AurPackage),
            "service" => Ok(Self::Service),
            "user-service" | "service-user" => Ok(Self::UserService),
            "group" => Ok(Self::Group),
            "locale" => Ok(Self::Locale),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Check that a resource name is safe to splice into a shell script.
///
/// Package, unit, group and locale names never need quoting; anything
/// outside `[A-Za-z0-9@._+:-]` is rejected.
pub fn validate_name(kind: ResourceKind, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '+' | ':' | '-'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName {
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }
}

/// A DNS provider known to the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsProvider {
    pub name: String,
    pub description: String,
    pub ips: Vec<String>,
}

impl DnsProvider {
    /// Name of the provider meaning "whatever the network hands out"
    pub const DEFAULT_NAME: &'static str = "Default";

    fn entry(name: &str, description: &str, ip: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            ips: vec![ip.to_string()],
        }
    }

    /// The ISP-provided default
    pub fn default_provider() -> Self {
        Self::entry(Self::DEFAULT_NAME, "Default DNS provided by your ISP", "0.0.0.0")
    }

    /// Known providers, default last
    pub fn catalogue() -> Vec<Self> {
        vec![
            Self::entry("Google", "Google Public DNS", "8.8.8.8"),
            Self::entry("Cloudflare", "Cloudflare Public DNS", "1.1.1.1"),
            Self::entry("Quad9", "Quad9 Public DNS", "9.9.9.9"),
            Self::default_provider(),
        ]
    }

    /// Look up a provider by name (case-insensitive)
    pub fn find(name: &str) -> Result<Self> {
        Self::catalogue()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownDnsProvider(name.to_string()))
    }

    /// Match an observed server address against the catalogue.
    ///
    /// Unknown addresses map to the default provider.
    pub fn from_server(ip: &str) -> Self {
        let ip = ip.trim();
        Self::catalogue()
            .into_iter()
            .find(|p| p.ips.iter().any(|known| known == ip))
            .unwrap_or_else(Self::default_provider)
    }

    pub fn is_default(&self) -> bool {
        self.name == Self::DEFAULT_NAME
    }
}

/// A login shell known to the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginShell {
    pub name: String,
    /// Distribution package carrying sensible defaults for this shell
    #[serde(default)]
    pub default_settings: Option<String>,
}

impl LoginShell {
    fn entry(name: &str, default_settings: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            default_settings: default_settings.map(str::to_string),
        }
    }

    /// Known shells
    pub fn catalogue() -> Vec<Self> {
        vec![
            Self::entry("bash", Some("garuda-bash-settings")),
            Self::entry("zsh", Some("garuda-zsh-settings")),
            Self::entry("fish", Some("garuda-fish-settings")),
            Self::entry("sh", None),
        ]
    }

    /// Look up a shell by name
    pub fn find(name: &str) -> Result<Self> {
        Self::catalogue()
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::UnknownShell(name.to_string()))
    }
}

/// A singleton setting: one observed value and one optional override.
///
/// Unlike map-typed kinds, an override equal to the observed value is
/// kept; it simply produces no script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Singleton<T> {
    pub current: Option<T>,
    pub wanted: Option<T>,
}

impl<T> Default for Singleton<T> {
    fn default() -> Self {
        Self {
            current: None,
            wanted: None,
        }
    }
}

impl<T: PartialEq> Singleton<T> {
    /// `wanted ?? current`
    pub fn effective(&self) -> Option<&T> {
        self.wanted.as_ref().or(self.current.as_ref())
    }

    /// The override, if it differs from what was observed
    pub fn pending(&self) -> Option<&T> {
        match (&self.wanted, &self.current) {
            (Some(wanted), Some(current)) if wanted == current => None,
            (wanted, _) => wanted.as_ref(),
        }
    }
}

/// Singleton settings of the "system settings" group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Setting {
    Dns,
    Shell,
    Hblock,
    Iwd,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dns => "dns",
            Self::Shell => "shell",
            Self::Hblock => "hblock",
            Self::Iwd => "iwd",
        })
    }
}

/// A unit of work for the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identity used for deduplication and removal
    pub id: String,
    /// Lower values run first
    pub priority: i32,
    pub requires_privilege: bool,
    pub display_name: String,
    pub icon: String,
    pub script: String,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        requires_privilege: bool,
        display_name: impl Into<String>,
        icon: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            requires_privilege,
            display_name: display_name.into(),
            icon: icon.into(),
            script: script.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert_eq!("aur".parse::<ResourceKind>().unwrap(), ResourceKind::AurPackage);
        assert!(matches!(
            "kernel".parse::<ResourceKind>(),
            Err(Error::UnknownKind(_))
        ));
    }

    #[test]
    fn test_only_user_services_skip_privilege() {
        let unprivileged: Vec<_> = ResourceKind::ALL
            .into_iter()
            .filter(|k| !k.requires_privilege())
            .collect();
        assert_eq!(unprivileged, vec![ResourceKind::UserService]);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name(ResourceKind::Package, "firefox").is_ok());
        assert!(validate_name(ResourceKind::Service, "systemd-oomd.service").is_ok());
        assert!(validate_name(ResourceKind::Service, "getty@tty1.service").is_ok());
        assert!(validate_name(ResourceKind::Locale, "de_DE.UTF-8").is_ok());
        assert!(validate_name(ResourceKind::Package, "g++").is_ok());

        assert!(validate_name(ResourceKind::Package, "").is_err());
        assert!(validate_name(ResourceKind::Package, "--noconfirm").is_err());
        assert!(validate_name(ResourceKind::Package, "foo; rm -rf /").is_err());
        assert!(validate_name(ResourceKind::Locale, "a/b").is_err());
        assert!(validate_name(ResourceKind::Group, "$(id)").is_err());
    }

    #[test]
    fn test_dns_from_server() {
        assert_eq!(DnsProvider::from_server("9.9.9.9").name, "Quad9");
        assert_eq!(DnsProvider::from_server(" 1.1.1.1\n").name, "Cloudflare");
        assert!(DnsProvider::from_server("1.2.3.4").is_default());
        assert!(DnsProvider::from_server("").is_default());
    }

    #[test]
    fn test_catalogue_lookup() {
        assert_eq!(DnsProvider::find("google").unwrap().ips, vec!["8.8.8.8"]);
        assert!(DnsProvider::find("nope").is_err());
        let zsh = LoginShell::find("zsh").unwrap();
        assert_eq!(zsh.name, "zsh");
        assert_eq!(zsh.default_settings.as_deref(), Some("garuda-zsh-settings"));
        assert_eq!(LoginShell::find("sh").unwrap().default_settings, None);
        assert!(matches!(LoginShell::find("tcsh"), Err(Error::UnknownShell(_))));
    }

    #[test]
    fn test_singleton_overlay() {
        let mut setting = Singleton {
            current: Some(false),
            wanted: None,
        };
        assert_eq!(setting.effective(), Some(&false));
        assert_eq!(setting.pending(), None);

        setting.wanted = Some(true);
        assert_eq!(setting.effective(), Some(&true));
        assert_eq!(setting.pending(), Some(&true));

        setting.wanted = Some(false);
        assert_eq!(setting.effective(), Some(&false));
        assert_eq!(setting.pending(), None);
    }
}
