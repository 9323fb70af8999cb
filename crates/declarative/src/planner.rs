//! Reconciliation planner - compiles outstanding diffs into tasks
//!
//! One task per slot (resource kind, plus the system settings folded into
//! the service task). Every snapshot replaces the whole set of generated
//! tasks: slots with an empty diff have their task removed.

use crate::context::{PlanContext, SnapshotListener};
use crate::error::Result;
use crate::queue::{self, SharedQueue};
use crate::store::StateSnapshot;
use crate::types::{DnsProvider, LoginShell, ResourceKind, Task, validate_name};
use std::fmt::Write as _;

/// NetworkManager drop-in holding the global DNS override
pub const DNS_DROP_IN: &str = "/etc/NetworkManager/conf.d/10-rani-dns.conf";

/// NetworkManager drop-in selecting iwd as the Wi-Fi backend
pub const IWD_DROP_IN: &str = "/etc/NetworkManager/conf.d/20-rani-wifi-backend.conf";

/// Locale definition file edited by the locale task
pub const LOCALE_GEN: &str = "/etc/locale.gen";

/// Priority of "run now" package installs
pub const ENSURE_PRIORITY: i32 = 0;

/// Stable task id for a kind's generated task
pub fn task_id(kind: ResourceKind) -> String {
    format!("reconcile:{}", kind.as_str())
}

/// Execution priority of a kind's generated task (lower runs first)
pub fn priority(kind: ResourceKind) -> i32 {
    match kind {
        ResourceKind::Package => 8,
        ResourceKind::AurPackage => 9,
        ResourceKind::Group => 11,
        ResourceKind::Service | ResourceKind::UserService => 12,
        ResourceKind::Locale => 13,
    }
}

fn describe(kind: ResourceKind) -> (&'static str, &'static str) {
    match kind {
        ResourceKind::Package => ("Apply package changes", "box"),
        ResourceKind::AurPackage => ("Apply AUR package changes", "box"),
        ResourceKind::Service => ("Apply service and system settings changes", "receipt"),
        ResourceKind::UserService => ("Apply user service changes", "receipt"),
        ResourceKind::Group => ("Apply group membership changes", "users"),
        ResourceKind::Locale => ("Apply locale changes", "language"),
    }
}

/// The desired state of every generated-task slot.
///
/// `None` means the slot has nothing to do and its task must not be
/// queued.
pub fn plan(snapshot: &StateSnapshot, ctx: &PlanContext) -> Vec<(String, Option<Task>)> {
    ResourceKind::ALL
        .into_iter()
        .map(|kind| {
            let mut script = kind_script(snapshot, kind, ctx);
            if kind == ResourceKind::Service {
                script.push_str(&settings_script(snapshot, ctx));
            }

            let task = (!script.is_empty()).then(|| {
                let (name, icon) = describe(kind);
                Task::new(
                    task_id(kind),
                    priority(kind),
                    kind.requires_privilege(),
                    name,
                    icon,
                    script,
                )
            });
            (task_id(kind), task)
        })
        .collect()
}

fn kind_script(snapshot: &StateSnapshot, kind: ResourceKind, ctx: &PlanContext) -> String {
    let diff = snapshot.diff(kind);
    let mut script = String::new();
    if diff.is_empty() {
        return script;
    }

    let remove = diff.to_disable.join(" ");
    let add = diff.to_enable.join(" ");

    match kind {
        ResourceKind::Package | ResourceKind::AurPackage => {
            let tool = if kind == ResourceKind::AurPackage {
                "paru"
            } else {
                "pacman"
            };
            if !remove.is_empty() {
                let _ = writeln!(script, "{tool} --noconfirm -Rns {remove}");
            }
            if !add.is_empty() {
                let _ = writeln!(script, "{tool} --needed --noconfirm -S {add}");
            }
        }
        ResourceKind::Service | ResourceKind::UserService => {
            let scope = if kind == ResourceKind::UserService {
                "systemctl --user"
            } else {
                "systemctl"
            };
            if !add.is_empty() {
                let _ = writeln!(script, "{scope} enable --now {add}");
            }
            if !remove.is_empty() {
                let _ = writeln!(script, "{scope} disable --now {remove}");
            }
        }
        ResourceKind::Group => {
            for group in &diff.to_enable {
                let _ = writeln!(script, "gpasswd -a {} {group}", ctx.user);
            }
            for group in &diff.to_disable {
                let _ = writeln!(script, "gpasswd -d {} {group}", ctx.user);
            }
        }
        ResourceKind::Locale => {
            let mut edits = Vec::new();
            for locale in &diff.to_enable {
                let pattern = sed_escape(locale);
                edits.push(format!(
                    "-e 's/^#[[:space:]]*({pattern}[[:space:]])/\\1/'"
                ));
            }
            for locale in &diff.to_disable {
                let pattern = sed_escape(locale);
                edits.push(format!("-e 's/^({pattern}[[:space:]])/#\\1/'"));
            }
            let _ = writeln!(script, "sed -E -i {} {LOCALE_GEN}", edits.join(" "));
            script.push_str("locale-gen\n");
        }
    }
    script
}

/// Escape regex metacharacters that can occur in a validated name
fn sed_escape(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '.' | '+') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Convergence fragments for singleton settings with a pending override
fn settings_script(snapshot: &StateSnapshot, ctx: &PlanContext) -> String {
    let mut script = String::new();

    if let Some(provider) = snapshot.dns.pending() {
        script.push_str(&dns_fragment(provider));
    }
    if let Some(shell) = snapshot.shell.pending() {
        script.push_str(&shell_fragment(shell, ctx));
    }
    if let Some(&enabled) = snapshot.hblock.pending() {
        script.push_str(if enabled {
            "systemctl enable --now hblock.timer && hblock\n"
        } else {
            "systemctl disable --now hblock.timer && hblock -S none -D none\n"
        });
    }
    if let Some(&enabled) = snapshot.iwd.pending() {
        script.push_str(&iwd_fragment(enabled));
    }
    script
}

fn dns_fragment(provider: &DnsProvider) -> String {
    let mut script = String::new();
    if provider.is_default() {
        let _ = writeln!(script, "rm -f {DNS_DROP_IN}");
    } else {
        let _ = writeln!(
            script,
            "printf '[global-dns-domain-*]\\nservers=%s\\n' '{}' > {DNS_DROP_IN}",
            provider.ips.join(",")
        );
    }
    script.push_str("nmcli general reload\n");
    script
}

fn shell_fragment(shell: &LoginShell, ctx: &PlanContext) -> String {
    format!("chsh -s \"$(command -v {})\" {}\n", shell.name, ctx.user)
}

fn iwd_fragment(enabled: bool) -> String {
    let mut script = String::from("systemctl stop NetworkManager\n");
    if enabled {
        script.push_str("systemctl disable --now wpa_supplicant.service\n");
        script.push_str("systemctl mask wpa_supplicant\n");
        let _ = writeln!(
            script,
            "printf '[device]\\nwifi.backend=iwd\\n' > {IWD_DROP_IN}"
        );
    } else {
        let _ = writeln!(script, "rm -f {IWD_DROP_IN}");
        script.push_str("systemctl unmask wpa_supplicant\n");
        script.push_str("systemctl enable wpa_supplicant.service\n");
    }
    script.push_str("systemctl daemon-reload\n");
    script.push_str("systemctl start NetworkManager\n");
    script
}

/// Build the "run now" task that installs one package
pub fn ensure_package_task(name: &str) -> Result<Task> {
    validate_name(ResourceKind::Package, name)?;
    Ok(Task::new(
        format!("install-{name}"),
        ENSURE_PRIORITY,
        true,
        format!("Install {name}"),
        "box",
        format!("pacman -S --noconfirm --needed {name}"),
    ))
}

/// Keeps the generated tasks in a queue in step with published snapshots
pub struct ReconciliationEngine {
    queue: SharedQueue,
    ctx: PlanContext,
}

impl ReconciliationEngine {
    pub fn new(queue: SharedQueue, ctx: PlanContext) -> Self {
        Self { queue, ctx }
    }

    /// Recompute every slot and apply the result to the queue
    pub fn sync(&self, snapshot: &StateSnapshot) {
        let slots = plan(snapshot, &self.ctx);
        let mut queue = queue::lock(&self.queue);
        for (id, task) in slots {
            match task {
                Some(task) => {
                    log::debug!("Scheduling {} (priority {})", task.id, task.priority);
                    queue.enqueue(task);
                }
                None => {
                    if queue.remove(&id).is_some() {
                        log::debug!("Dropped {id}: nothing left to reconcile");
                    }
                }
            }
        }
    }
}

impl SnapshotListener for ReconciliationEngine {
    fn on_snapshot(&self, snapshot: &StateSnapshot) {
        self.sync(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ObservedState, ResourceStateStore};
    use std::sync::Arc;

    fn ctx() -> PlanContext {
        PlanContext::new("alice")
    }

    fn store_with(kind: ResourceKind, installed: &[&str]) -> ResourceStateStore {
        let store = ResourceStateStore::new();
        let mut observed = ObservedState::default();
        observed.maps.insert(
            kind.observed_as(),
            installed.iter().map(|n| ((*n).to_string(), true)).collect(),
        );
        store.refresh(observed);
        store
    }

    fn task_for(snapshot: &StateSnapshot, kind: ResourceKind) -> Option<Task> {
        plan(snapshot, &ctx())
            .into_iter()
            .find(|(id, _)| *id == task_id(kind))
            .and_then(|(_, task)| task)
    }

    #[test]
    fn test_package_script_removes_before_install() {
        let store = store_with(ResourceKind::Package, &["pkgRemove"]);
        store.toggle(ResourceKind::Package, "pkgRemove").unwrap();
        store.toggle(ResourceKind::Package, "pkgInstall").unwrap();

        let task = task_for(&store.snapshot(), ResourceKind::Package).unwrap();
        assert_eq!(task.id, "reconcile:package");
        assert_eq!(task.priority, 8);
        assert!(task.requires_privilege);
        assert_eq!(
            task.script,
            "pacman --noconfirm -Rns pkgRemove\npacman --needed --noconfirm -S pkgInstall\n"
        );
    }

    #[test]
    fn test_aur_script_uses_helper() {
        let store = store_with(ResourceKind::Package, &[]);
        store.toggle_package("paru-bin", true).unwrap();

        let snapshot = store.snapshot();
        assert!(task_for(&snapshot, ResourceKind::Package).is_none());
        let task = task_for(&snapshot, ResourceKind::AurPackage).unwrap();
        assert_eq!(task.priority, 9);
        assert_eq!(task.script, "paru --needed --noconfirm -S paru-bin\n");
    }

    #[test]
    fn test_user_services_are_unprivileged() {
        let store = store_with(ResourceKind::UserService, &["old.service"]);
        store.toggle(ResourceKind::UserService, "new.service").unwrap();
        store.toggle(ResourceKind::UserService, "old.service").unwrap();

        let task = task_for(&store.snapshot(), ResourceKind::UserService).unwrap();
        assert!(!task.requires_privilege);
        assert_eq!(
            task.script,
            "systemctl --user enable --now new.service\nsystemctl --user disable --now old.service\n"
        );
    }

    #[test]
    fn test_group_script_one_command_per_pair() {
        let store = store_with(ResourceKind::Group, &["wheel"]);
        store.toggle(ResourceKind::Group, "docker").unwrap();
        store.toggle(ResourceKind::Group, "video").unwrap();
        store.toggle(ResourceKind::Group, "wheel").unwrap();

        let task = task_for(&store.snapshot(), ResourceKind::Group).unwrap();
        assert_eq!(task.priority, 11);
        assert_eq!(
            task.script,
            "gpasswd -a alice docker\ngpasswd -a alice video\ngpasswd -d alice wheel\n"
        );
    }

    #[test]
    fn test_locale_script_edits_and_regenerates() {
        let store = store_with(ResourceKind::Locale, &["fr_FR.UTF-8"]);
        store.toggle(ResourceKind::Locale, "de_DE.UTF-8").unwrap();
        store.toggle(ResourceKind::Locale, "fr_FR.UTF-8").unwrap();

        let task = task_for(&store.snapshot(), ResourceKind::Locale).unwrap();
        assert_eq!(task.priority, 13);
        assert_eq!(
            task.script,
            "sed -E -i -e 's/^#[[:space:]]*(de_DE\\.UTF-8[[:space:]])/\\1/' \
             -e 's/^(fr_FR\\.UTF-8[[:space:]])/#\\1/' /etc/locale.gen\nlocale-gen\n"
        );
    }

    #[test]
    fn test_settings_fold_into_service_task() {
        let store = ResourceStateStore::new();
        store.refresh(ObservedState {
            dns: Some(DnsProvider::default_provider()),
            shell: Some(LoginShell::find("bash").unwrap()),
            hblock: Some(false),
            iwd: Some(false),
            ..ObservedState::default()
        });
        store.want_dns(Some(DnsProvider::find("Cloudflare").unwrap()));
        store.want_shell(Some(LoginShell::find("zsh").unwrap()));

        let task = task_for(&store.snapshot(), ResourceKind::Service).unwrap();
        assert_eq!(task.priority, 12);
        assert!(task.requires_privilege);
        assert_eq!(
            task.script,
            format!(
                "printf '[global-dns-domain-*]\\nservers=%s\\n' '1.1.1.1' > {DNS_DROP_IN}\n\
                 nmcli general reload\n\
                 chsh -s \"$(command -v zsh)\" alice\n"
            )
        );
    }

    #[test]
    fn test_default_dns_removes_drop_in() {
        let store = ResourceStateStore::new();
        store.refresh(ObservedState {
            dns: Some(DnsProvider::find("Quad9").unwrap()),
            ..ObservedState::default()
        });
        store.want_dns(Some(DnsProvider::default_provider()));

        let task = task_for(&store.snapshot(), ResourceKind::Service).unwrap();
        assert!(task.script.starts_with(&format!("rm -f {DNS_DROP_IN}\n")));
    }

    #[test]
    fn test_hblock_and_iwd_fragments() {
        let store = ResourceStateStore::new();
        let mut observed = ObservedState {
            hblock: Some(true),
            iwd: Some(false),
            ..ObservedState::default()
        };
        observed.maps.insert(
            ResourceKind::Package,
            [("hblock".to_string(), true)].into_iter().collect(),
        );
        store.refresh(observed);
        store.toggle_hblock();
        store.toggle_iwd();

        let snapshot = store.snapshot();
        let script = task_for(&snapshot, ResourceKind::Service).unwrap().script;
        assert!(script.contains("systemctl disable --now hblock.timer && hblock -S none -D none\n"));
        assert!(script.contains("systemctl mask wpa_supplicant\n"));
        assert!(script.contains(&format!("wifi.backend=iwd\\n' > {IWD_DROP_IN}\n")));
        assert!(script.ends_with("systemctl start NetworkManager\n"));

        // host-block also schedules removal of its package
        let packages = task_for(&snapshot, ResourceKind::Package).unwrap();
        assert_eq!(packages.script, "pacman --noconfirm -Rns hblock\n");
    }

    #[test]
    fn test_settings_matching_current_produce_nothing() {
        let store = ResourceStateStore::new();
        store.refresh(ObservedState {
            iwd: Some(true),
            ..ObservedState::default()
        });
        store.want_iwd(Some(true));
        assert!(task_for(&store.snapshot(), ResourceKind::Service).is_none());
    }

    #[test]
    fn test_engine_replaces_and_removes_tasks() {
        let queue = queue::shared();
        let store = store_with(ResourceKind::Package, &[]);
        store.subscribe(Arc::new(ReconciliationEngine::new(queue.clone(), ctx())));

        store.toggle(ResourceKind::Package, "foo").unwrap();
        store.toggle(ResourceKind::Package, "bar").unwrap();
        {
            let q = queue::lock(&queue);
            assert_eq!(q.count(), 1);
            assert_eq!(
                q.find_by_id("reconcile:package").unwrap().script,
                "pacman --needed --noconfirm -S bar foo\n"
            );
        }

        store.toggle(ResourceKind::Package, "bar").unwrap();
        store.toggle(ResourceKind::Package, "foo").unwrap();
        assert!(store.wanted(ResourceKind::Package).get("foo").is_none());
        assert!(!queue::lock(&queue).contains("reconcile:package"));
    }

    #[test]
    fn test_engine_leaves_foreign_tasks_alone() {
        let queue = queue::shared();
        queue::lock(&queue).enqueue(ensure_package_task("git").unwrap());

        let store = ResourceStateStore::new();
        store.subscribe(Arc::new(ReconciliationEngine::new(queue.clone(), ctx())));
        store.reset_all();

        let q = queue::lock(&queue);
        assert_eq!(q.count(), 1);
        assert!(q.contains("install-git"));
    }

    #[test]
    fn test_ensure_package_task() {
        let task = ensure_package_task("hblock").unwrap();
        assert_eq!(task.id, "install-hblock");
        assert_eq!(task.priority, 0);
        assert!(task.requires_privilege);
        assert_eq!(task.script, "pacman -S --noconfirm --needed hblock");
        assert!(ensure_package_task("a b").is_err());
    }
}
