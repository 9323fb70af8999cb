//! `rani toggle`, `rani reset` and `rani set` - edit wanted overrides
//!
//! Every edit goes through the store, which replans the queue, and is then
//! persisted so the next invocation sees it.

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{DnsProvider, LoginShell, ResourceKind};

use crate::app::App;
use crate::cli::{SetCommand, Switch};
use crate::commands::print_queue_summary;
use crate::ui;

pub fn toggle(app: &App, kind: ResourceKind, name: &str, aur: bool) -> Result<()> {
    let enabled = match kind {
        ResourceKind::Package | ResourceKind::AurPackage => {
            app.store
                .toggle_package(name, aur || kind == ResourceKind::AurPackage)?
        }
        _ if aur => bail!("--aur only applies to packages"),
        _ => app.store.toggle(kind, name)?,
    };
    app.persist()?;

    let state = if enabled {
        "enabled".green()
    } else {
        "disabled".red()
    };
    ui::success(&format!("{kind} {} will be {state}", name.bold()));
    print_queue_summary(app);
    Ok(())
}

pub fn reset(app: &App, kind: Option<ResourceKind>, name: Option<&str>) -> Result<()> {
    match (kind, name) {
        (Some(kind), Some(name)) => {
            app.store.want(kind, name, None)?;
            ui::success(&format!("Dropped override for {kind} {name}"));
        }
        (Some(kind), None) => {
            app.store.reset_kind(kind);
            ui::success(&format!("Dropped all {kind} overrides"));
        }
        (None, _) => {
            app.store.reset_all();
            ui::success("Dropped all overrides");
        }
    }
    app.persist()?;
    print_queue_summary(app);
    Ok(())
}

pub fn set(app: &App, command: SetCommand) -> Result<()> {
    match command {
        SetCommand::Dns { provider, clear } => {
            let provider = match provider {
                Some(name) if !clear => Some(DnsProvider::find(&name)?),
                _ => None,
            };
            describe("DNS", provider.as_ref().map(|p| p.name.as_str()));
            app.store.want_dns(provider);
        }
        SetCommand::Shell {
            shell,
            clear,
            with_config,
        } => {
            let shell = match shell {
                Some(name) if !clear => Some(LoginShell::find(&name)?),
                _ => None,
            };
            describe("Login shell", shell.as_ref().map(|s| s.name.as_str()));
            match shell {
                Some(shell) if with_config => {
                    match &shell.default_settings {
                        Some(package) => ui::info(&format!("Also installing {}", package.bold())),
                        None => ui::warn(&format!("{} has no default settings package", shell.name)),
                    }
                    app.store.want_shell_with_config(shell)?;
                }
                shell => app.store.want_shell(shell),
            }
        }
        SetCommand::Hblock { state } => {
            let enabled = switch(
                state,
                || app.store.toggle_hblock(),
                |wanted| app.store.want_hblock(wanted),
            );
            describe("Host blocking", enabled.map(on_off));
        }
        SetCommand::Iwd { state } => {
            let enabled = switch(
                state,
                || app.store.toggle_iwd(),
                |wanted| app.store.want_iwd(wanted),
            );
            describe("iwd backend", enabled.map(on_off));
        }
    }
    app.persist()?;
    print_queue_summary(app);
    Ok(())
}

/// Apply a switch to a singleton setting, returning the new override
fn switch(
    state: Switch,
    toggle: impl FnOnce() -> bool,
    want: impl FnOnce(Option<bool>),
) -> Option<bool> {
    let wanted = match state {
        Switch::Toggle => return Some(toggle()),
        Switch::On => Some(true),
        Switch::Off => Some(false),
        Switch::Clear => None,
    };
    want(wanted);
    wanted
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn describe(setting: &str, value: Option<&str>) {
    match value {
        Some(value) => ui::success(&format!("{setting} will be set to {}", value.bold())),
        None => ui::success(&format!("{setting} override cleared")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaniConfig;
    use crate::state::RaniState;
    use declarative::{ObservedState, WantedState, queue};
    use tempfile::TempDir;

    fn app(dir: &TempDir) -> App {
        App::assemble(
            RaniConfig {
                user: "alice".to_string(),
                ..RaniConfig::default()
            },
            WantedState::default(),
            ObservedState::default(),
            dir.path().join("wanted.toml"),
        )
        .unwrap()
    }

    #[test]
    fn test_toggle_aur_flag_targets_aur_kind() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        toggle(&app, ResourceKind::Package, "yay-bin", true).unwrap();

        assert!(app.store.is_enabled(ResourceKind::AurPackage, "yay-bin"));
        assert!(queue::lock(&app.queue).contains("reconcile:aur-package"));
        let saved = RaniState::load_from(&dir.path().join("wanted.toml")).unwrap();
        assert!(saved.wanted.maps.contains_key(&ResourceKind::AurPackage));
    }

    #[test]
    fn test_aur_flag_rejected_for_other_kinds() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        assert!(toggle(&app, ResourceKind::Group, "docker", true).is_err());
    }

    #[test]
    fn test_reset_single_name() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        toggle(&app, ResourceKind::Group, "docker", false).unwrap();
        toggle(&app, ResourceKind::Group, "wheel", false).unwrap();

        reset(&app, Some(ResourceKind::Group), Some("docker")).unwrap();

        let wanted = app.store.wanted(ResourceKind::Group);
        assert!(!wanted.contains_key("docker"));
        assert!(wanted.contains_key("wheel"));
    }

    #[test]
    fn test_set_hblock_queues_system_task() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        set(&app, SetCommand::Hblock { state: Switch::On }).unwrap();

        let queue = queue::lock(&app.queue);
        assert!(queue.contains("reconcile:service"));
        assert!(queue.contains("reconcile:package"));
    }

    #[test]
    fn test_set_unknown_dns_provider_fails() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let command = SetCommand::Dns {
            provider: Some("opendns".to_string()),
            clear: false,
        };
        assert!(set(&app, command).is_err());
        assert!(queue::lock(&app.queue).is_empty());
    }

    #[test]
    fn test_toggle_switch_always_records_override() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        set(&app, SetCommand::Iwd { state: Switch::Toggle }).unwrap();
        assert_eq!(app.store.snapshot().iwd.wanted, Some(true));

        set(&app, SetCommand::Iwd { state: Switch::Toggle }).unwrap();
        assert_eq!(app.store.snapshot().iwd.wanted, Some(false));

        set(&app, SetCommand::Iwd { state: Switch::Clear }).unwrap();
        assert_eq!(app.store.snapshot().iwd.wanted, None);
    }

    #[test]
    fn test_set_shell_with_config_queues_settings_package() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let command = SetCommand::Shell {
            shell: Some("zsh".to_string()),
            clear: false,
            with_config: true,
        };
        set(&app, command).unwrap();

        assert!(app
            .store
            .is_enabled(ResourceKind::Package, "garuda-zsh-settings"));
        let queue = queue::lock(&app.queue);
        assert!(queue.contains("reconcile:package"));
        assert!(queue.contains("reconcile:service"));
    }
}
