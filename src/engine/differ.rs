//! Pending-change display

use colored::Colorize;
use declarative::{ResourceKind, Setting, StateSnapshot, Task};

/// One outstanding change, ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    /// Heading the change is grouped under
    pub group: String,
    pub enable: bool,
    pub name: String,
    pub privileged: bool,
}

/// Display heading for a kind
pub fn heading(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Package => "Packages (repo)",
        ResourceKind::AurPackage => "Packages (AUR)",
        ResourceKind::Service => "Services (system)",
        ResourceKind::UserService => "Services (user)",
        ResourceKind::Group => "Groups",
        ResourceKind::Locale => "Locales",
    }
}

fn setting_change(setting: Setting, enable: bool, name: String) -> PendingChange {
    PendingChange {
        group: "System settings".to_string(),
        enable,
        name: format!("{setting}: {name}"),
        privileged: true,
    }
}

/// Every outstanding change in `snapshot`, map kinds first
pub fn pending_changes(snapshot: &StateSnapshot) -> Vec<PendingChange> {
    let mut changes = Vec::new();

    for kind in ResourceKind::ALL {
        let diff = snapshot.diff(kind);
        let group = heading(kind).to_string();
        let entries = diff
            .to_enable
            .iter()
            .map(|name| (true, name))
            .chain(diff.to_disable.iter().map(|name| (false, name)));
        for (enable, name) in entries {
            changes.push(PendingChange {
                group: group.clone(),
                enable,
                name: name.clone(),
                privileged: kind.requires_privilege(),
            });
        }
    }

    if let Some(dns) = snapshot.dns.pending() {
        changes.push(setting_change(Setting::Dns, true, dns.name.clone()));
    }
    if let Some(shell) = snapshot.shell.pending() {
        changes.push(setting_change(Setting::Shell, true, shell.name.clone()));
    }
    if let Some(enabled) = snapshot.hblock.pending() {
        changes.push(setting_change(Setting::Hblock, *enabled, on_off(*enabled)));
    }
    if let Some(enabled) = snapshot.iwd.pending() {
        changes.push(setting_change(Setting::Iwd, *enabled, on_off(*enabled)));
    }

    changes
}

fn on_off(enabled: bool) -> String {
    if enabled { "on" } else { "off" }.to_string()
}

/// Print outstanding changes grouped by heading
pub fn display_changes(changes: &[PendingChange]) {
    if changes.is_empty() {
        println!();
        println!("  {} No changes pending", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Pending Changes".bold()
    );

    let mut last_group: Option<&str> = None;
    for change in changes {
        if last_group != Some(change.group.as_str()) {
            println!("│");
            println!("│ {}", change.group.bold());
            last_group = Some(change.group.as_str());
        }
        let symbol = if change.enable {
            "+".green()
        } else {
            "-".red()
        };
        let privilege = if change.privileged {
            " [root]".red().to_string()
        } else {
            String::new()
        };
        println!("│   {symbol} {}{privilege}", change.name);
    }

    let privileged = changes.iter().filter(|c| c.privileged).count();
    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} unprivileged, {} require root)",
        changes.len().to_string().bold(),
        (changes.len() - privileged).to_string().green(),
        privileged.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Warn that an elevation prompt is coming, listing the privileged tasks
pub fn display_privilege_boundary(tasks: &[Task]) {
    let privileged: Vec<&Task> = tasks.iter().filter(|t| t.requires_privilege).collect();
    if privileged.is_empty() {
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Privilege Boundary".yellow().bold()
    );
    println!("│");
    println!(
        "│  {}  {} task(s) run in an elevated shell:",
        "⚠".yellow(),
        privileged.len()
    );
    for task in &privileged {
        println!("│  • {} {}", task.icon, task.display_name);
    }
    println!("│");
    println!("│  Authentication is requested once for the whole pass.");
    println!("└─────────────────────────────────────────────────────────────┘");
}
