//! Wanted/current state store with snapshot publishing
//!
//! Every mutation builds a new immutable [`StateSnapshot`], swaps it in,
//! and hands it to each subscribed [`SnapshotListener`]. Readers holding an
//! older `Arc<StateSnapshot>` are never affected by later writes.

use crate::context::SnapshotListener;
use crate::diff::{self, DiffSummary, KindDiff, StateMap};
use crate::error::Result;
use crate::types::{DnsProvider, LoginShell, ResourceKind, Singleton, validate_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Package coupled to the host-block setting
pub const HBLOCK_PACKAGE: &str = "hblock";

/// Everything observed on the live system by one full scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedState {
    /// Observed maps, keyed by the kind that backs them
    /// (AUR packages are observed as [`ResourceKind::Package`])
    pub maps: BTreeMap<ResourceKind, StateMap>,
    pub dns: Option<DnsProvider>,
    pub shell: Option<LoginShell>,
    pub hblock: Option<bool>,
    pub iwd: Option<bool>,
}

/// User intent, the part of the store that outlives a process.
///
/// Settings are stored by catalogue name only; [`ResourceStateStore::restore_wanted`]
/// resolves them again and checks every resource name before anything
/// reaches a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantedState {
    #[serde(default)]
    pub maps: BTreeMap<ResourceKind, StateMap>,
    /// DNS provider name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    /// Login shell name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hblock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iwd: Option<bool>,
}

impl WantedState {
    /// Whether no override of any kind is recorded
    pub fn is_empty(&self) -> bool {
        self.maps.values().all(BTreeMap::is_empty)
            && self.dns.is_none()
            && self.shell.is_none()
            && self.hblock.is_none()
            && self.iwd.is_none()
    }
}

/// An immutable view of current and wanted state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    current: BTreeMap<ResourceKind, StateMap>,
    wanted: BTreeMap<ResourceKind, StateMap>,
    pub dns: Singleton<DnsProvider>,
    pub shell: Singleton<LoginShell>,
    pub hblock: Singleton<bool>,
    pub iwd: Singleton<bool>,
}

static EMPTY: StateMap = BTreeMap::new();

impl StateSnapshot {
    /// Observed map for a kind
    pub fn current(&self, kind: ResourceKind) -> &StateMap {
        self.current.get(&kind.observed_as()).unwrap_or(&EMPTY)
    }

    /// Wanted overrides for a kind
    pub fn wanted(&self, kind: ResourceKind) -> &StateMap {
        self.wanted.get(&kind).unwrap_or(&EMPTY)
    }

    /// `wanted ?? current` for every name either side knows about
    pub fn effective(&self, kind: ResourceKind) -> StateMap {
        let mut merged = self.current(kind).clone();
        merged.extend(self.wanted(kind).iter().map(|(k, v)| (k.clone(), *v)));
        merged
    }

    /// Effective value of a single name
    pub fn is_enabled(&self, kind: ResourceKind, name: &str) -> bool {
        self.wanted(kind)
            .get(name)
            .or_else(|| self.current(kind).get(name))
            .copied()
            .unwrap_or(false)
    }

    /// Outstanding changes for a kind
    pub fn diff(&self, kind: ResourceKind) -> KindDiff {
        diff::diff(self.current(kind), self.wanted(kind))
    }

    /// Counts across every kind and setting
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for kind in ResourceKind::ALL {
            summary.add(&self.diff(kind));
        }
        summary.settings = [
            self.dns.pending().is_some(),
            self.shell.pending().is_some(),
            self.hblock.pending().is_some(),
            self.iwd.pending().is_some(),
        ]
        .into_iter()
        .filter(|pending| *pending)
        .count();
        summary
    }

    /// Copy of the user intent held by this snapshot
    pub fn wanted_state(&self) -> WantedState {
        WantedState {
            maps: self
                .wanted
                .iter()
                .filter(|(_, map)| !map.is_empty())
                .map(|(kind, map)| (*kind, map.clone()))
                .collect(),
            dns: self.dns.wanted.as_ref().map(|p| p.name.clone()),
            shell: self.shell.wanted.as_ref().map(|s| s.name.clone()),
            hblock: self.hblock.wanted,
            iwd: self.iwd.wanted,
        }
    }

    fn set_wanted(&mut self, kind: ResourceKind, name: &str, value: Option<bool>) {
        let map = self.wanted.entry(kind).or_default();
        match value {
            Some(value) => {
                map.insert(name.to_string(), value);
            }
            None => {
                map.remove(name);
            }
        }
    }

    /// Drop wanted entries that equal the observed value.
    ///
    /// Missing observed entries count as `false`, so wanting an absent
    /// name to stay absent is pruned as well.
    fn prune(&mut self) {
        for kind in ResourceKind::ALL {
            let current = self
                .current
                .get(&kind.observed_as())
                .cloned()
                .unwrap_or_default();
            if let Some(map) = self.wanted.get_mut(&kind) {
                map.retain(|name, want| current.get(name).copied().unwrap_or(false) != *want);
                if map.is_empty() {
                    self.wanted.remove(&kind);
                }
            }
        }
    }
}

/// Holds current and wanted state and publishes a snapshot per mutation.
///
/// Publication is serialized: listeners see snapshots in the order they
/// were swapped in, and a mutation does not return before every listener
/// has seen its snapshot.
pub struct ResourceStateStore {
    snapshot: Mutex<Arc<StateSnapshot>>,
    listeners: Mutex<Vec<Arc<dyn SnapshotListener>>>,
    publish: Mutex<()>,
}

impl std::fmt::Debug for ResourceStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStateStore")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Default for ResourceStateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ResourceStateStore {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(Arc::new(StateSnapshot::default())),
            listeners: Mutex::new(Vec::new()),
            publish: Mutex::new(()),
        }
    }

    /// The latest published snapshot
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        Arc::clone(&lock(&self.snapshot))
    }

    /// Register a listener and immediately hand it the current snapshot
    pub fn subscribe(&self, listener: Arc<dyn SnapshotListener>) {
        let _publish = lock(&self.publish);
        let snapshot = self.snapshot();
        lock(&self.listeners).push(Arc::clone(&listener));
        listener.on_snapshot(&snapshot);
    }

    /// Observed map for a kind
    pub fn observe(&self, kind: ResourceKind) -> StateMap {
        self.snapshot().current(kind).clone()
    }

    /// Wanted overrides for a kind
    pub fn wanted(&self, kind: ResourceKind) -> StateMap {
        self.snapshot().wanted(kind).clone()
    }

    /// Merged `wanted ?? current` map for a kind
    pub fn effective(&self, kind: ResourceKind) -> StateMap {
        self.snapshot().effective(kind)
    }

    pub fn is_enabled(&self, kind: ResourceKind, name: &str) -> bool {
        self.snapshot().is_enabled(kind, name)
    }

    /// Set (`Some`) or clear (`None`) the wanted value of one name
    pub fn want(&self, kind: ResourceKind, name: &str, value: Option<bool>) -> Result<()> {
        validate_name(kind, name)?;
        self.mutate(|s| s.set_wanted(kind, name, value));
        Ok(())
    }

    /// Flip the effective value of one name.
    ///
    /// The first toggle records `!current`; the second records `current`,
    /// which pruning removes. Returns the new effective value.
    pub fn toggle(&self, kind: ResourceKind, name: &str) -> Result<bool> {
        validate_name(kind, name)?;
        let snapshot = self.mutate(|s| {
            let next = !s.is_enabled(kind, name);
            s.set_wanted(kind, name, Some(next));
        });
        Ok(snapshot.is_enabled(kind, name))
    }

    /// Toggle a package from either source.
    ///
    /// A package is wanted through one source at a time, so the override
    /// for the other source is dropped.
    pub fn toggle_package(&self, name: &str, aur: bool) -> Result<bool> {
        let (kind, other) = if aur {
            (ResourceKind::AurPackage, ResourceKind::Package)
        } else {
            (ResourceKind::Package, ResourceKind::AurPackage)
        };
        validate_name(kind, name)?;
        let snapshot = self.mutate(|s| {
            s.set_wanted(other, name, None);
            let next = !s.is_enabled(kind, name);
            s.set_wanted(kind, name, Some(next));
        });
        Ok(snapshot.is_enabled(kind, name))
    }

    /// Drop every override for one kind
    pub fn reset_kind(&self, kind: ResourceKind) {
        self.mutate(|s| {
            s.wanted.remove(&kind);
        });
    }

    /// Drop every override of every kind and setting
    pub fn reset_all(&self) {
        self.mutate(|s| {
            s.wanted.clear();
            s.dns.wanted = None;
            s.shell.wanted = None;
            s.hblock.wanted = None;
            s.iwd.wanted = None;
        });
    }

    pub fn want_dns(&self, provider: Option<DnsProvider>) {
        self.mutate(|s| s.dns.wanted = provider);
    }

    pub fn want_shell(&self, shell: Option<LoginShell>) {
        self.mutate(|s| s.shell.wanted = shell);
    }

    /// Set the login shell override and also want the shell's
    /// default-settings package, if it has one
    pub fn want_shell_with_config(&self, shell: LoginShell) -> Result<()> {
        let package = shell.default_settings.clone();
        if let Some(package) = &package {
            validate_name(ResourceKind::Package, package)?;
        }
        self.mutate(move |s| {
            if let Some(package) = &package {
                s.set_wanted(ResourceKind::AurPackage, package, None);
                s.set_wanted(ResourceKind::Package, package, Some(true));
            }
            s.shell.wanted = Some(shell);
        });
        Ok(())
    }

    /// Set the host-block override and the matching package override
    pub fn want_hblock(&self, enabled: Option<bool>) {
        self.mutate(|s| {
            s.hblock.wanted = enabled;
            s.set_wanted(ResourceKind::Package, HBLOCK_PACKAGE, enabled);
            s.set_wanted(ResourceKind::AurPackage, HBLOCK_PACKAGE, None);
        });
    }

    /// Flip host-block. Unlike map kinds this always records an override.
    pub fn toggle_hblock(&self) -> bool {
        let next = !self.snapshot().hblock.effective().copied().unwrap_or(false);
        self.want_hblock(Some(next));
        next
    }

    pub fn want_iwd(&self, enabled: Option<bool>) {
        self.mutate(|s| s.iwd.wanted = enabled);
    }

    /// Flip the iwd backend. Always records an override.
    pub fn toggle_iwd(&self) -> bool {
        let next = !self.snapshot().iwd.effective().copied().unwrap_or(false);
        self.want_iwd(Some(next));
        next
    }

    /// Replace all observed state with a fresh scan, keeping overrides
    /// that still differ from it
    pub fn refresh(&self, observed: ObservedState) {
        log::debug!(
            "Refreshing store: {} observed kinds",
            observed.maps.len()
        );
        self.mutate(move |s| {
            s.current = observed.maps;
            s.dns.current = observed.dns;
            s.shell.current = observed.shell;
            s.hblock.current = observed.hblock;
            s.iwd.current = observed.iwd;
        });
    }

    /// Load previously persisted overrides, replacing any in memory.
    ///
    /// Every name is validated and every setting resolved against its
    /// catalogue first; on error nothing is replaced.
    pub fn restore_wanted(&self, wanted: WantedState) -> Result<()> {
        for (kind, map) in &wanted.maps {
            for name in map.keys() {
                validate_name(*kind, name)?;
            }
        }
        let dns = wanted.dns.as_deref().map(DnsProvider::find).transpose()?;
        let shell = wanted.shell.as_deref().map(LoginShell::find).transpose()?;

        self.mutate(move |s| {
            s.wanted = wanted.maps;
            s.dns.wanted = dns;
            s.shell.wanted = shell;
            s.hblock.wanted = wanted.hblock;
            s.iwd.wanted = wanted.iwd;
        });
        Ok(())
    }

    fn mutate<F>(&self, f: F) -> Arc<StateSnapshot>
    where
        F: FnOnce(&mut StateSnapshot),
    {
        let _publish = lock(&self.publish);
        let published = {
            let mut guard = lock(&self.snapshot);
            let mut next = StateSnapshot::clone(&guard);
            f(&mut next);
            next.prune();
            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            next
        };

        let listeners: Vec<_> = lock(&self.listeners).iter().cloned().collect();
        for listener in listeners {
            listener.on_snapshot(&published);
        }
        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PlanContext;
    use crate::error::Error;
    use crate::planner::ReconciliationEngine;
    use crate::queue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn observed_packages(names: &[&str]) -> ObservedState {
        let mut observed = ObservedState::default();
        observed.maps.insert(
            ResourceKind::Package,
            names.iter().map(|n| ((*n).to_string(), true)).collect(),
        );
        observed
    }

    #[test]
    fn test_toggle_is_three_state_cycle() {
        let store = ResourceStateStore::new();
        store.refresh(observed_packages(&["vim"]));

        assert!(store.toggle(ResourceKind::Package, "foo").unwrap());
        assert_eq!(store.wanted(ResourceKind::Package).get("foo"), Some(&true));

        assert!(!store.toggle(ResourceKind::Package, "foo").unwrap());
        assert!(store.wanted(ResourceKind::Package).is_empty());

        assert!(!store.toggle(ResourceKind::Package, "vim").unwrap());
        assert_eq!(store.wanted(ResourceKind::Package).get("vim"), Some(&false));
        assert!(store.toggle(ResourceKind::Package, "vim").unwrap());
        assert!(store.wanted(ResourceKind::Package).is_empty());
    }

    #[test]
    fn test_effective_overlays_wanted() {
        let store = ResourceStateStore::new();
        store.refresh(observed_packages(&["vim", "nano"]));
        store.want(ResourceKind::Package, "nano", Some(false)).unwrap();
        store.want(ResourceKind::Package, "helix", Some(true)).unwrap();

        let snapshot = store.snapshot();
        let effective = snapshot.effective(ResourceKind::Package);
        for (name, value) in &effective {
            let expected = snapshot
                .wanted(ResourceKind::Package)
                .get(name)
                .or_else(|| snapshot.current(ResourceKind::Package).get(name))
                .copied()
                .unwrap();
            assert_eq!(*value, expected, "{name}");
        }
        assert_eq!(effective.get("vim"), Some(&true));
        assert_eq!(effective.get("nano"), Some(&false));
        assert_eq!(effective.get("helix"), Some(&true));
    }

    #[test]
    fn test_pruning_after_every_mutation() {
        let store = ResourceStateStore::new();
        store.refresh(observed_packages(&["vim"]));

        store.want(ResourceKind::Package, "vim", Some(true)).unwrap();
        store.want(ResourceKind::Package, "ghost", Some(false)).unwrap();
        assert!(store.wanted(ResourceKind::Package).is_empty());

        store.want(ResourceKind::Package, "new", Some(true)).unwrap();
        store.refresh(observed_packages(&["vim", "new"]));
        assert!(store.wanted(ResourceKind::Package).is_empty());

        for kind in ResourceKind::ALL {
            let snapshot = store.snapshot();
            for (name, want) in snapshot.wanted(kind) {
                assert_ne!(
                    snapshot.current(kind).get(name).copied().unwrap_or(false),
                    *want
                );
            }
        }
    }

    #[test]
    fn test_aur_packages_share_observed_map() {
        let store = ResourceStateStore::new();
        store.refresh(observed_packages(&["paru"]));

        assert!(store.is_enabled(ResourceKind::AurPackage, "paru"));
        assert!(store.toggle_package("yay", true).unwrap());
        assert_eq!(store.wanted(ResourceKind::AurPackage).get("yay"), Some(&true));

        // Switching source drops the other override
        assert!(store.toggle_package("yay", false).unwrap());
        assert!(store.wanted(ResourceKind::AurPackage).is_empty());
        assert_eq!(store.wanted(ResourceKind::Package).get("yay"), Some(&true));
    }

    #[test]
    fn test_invalid_name_is_rejected_without_publishing() {
        let store = ResourceStateStore::new();
        let before = store.snapshot();
        assert!(store.toggle(ResourceKind::Group, "wheel; reboot").is_err());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_singleton_toggle_always_records_override() {
        let store = ResourceStateStore::new();
        let observed = ObservedState {
            iwd: Some(false),
            ..ObservedState::default()
        };
        store.refresh(observed);

        assert!(store.toggle_iwd());
        assert_eq!(store.snapshot().iwd.wanted, Some(true));
        assert!(!store.toggle_iwd());
        assert_eq!(store.snapshot().iwd.wanted, Some(false));
        assert_eq!(store.snapshot().iwd.pending(), None);
    }

    #[test]
    fn test_hblock_couples_package() {
        let store = ResourceStateStore::new();
        store.refresh(ObservedState {
            hblock: Some(false),
            ..ObservedState::default()
        });

        assert!(store.toggle_hblock());
        assert_eq!(
            store.wanted(ResourceKind::Package).get(HBLOCK_PACKAGE),
            Some(&true)
        );

        store.want_hblock(None);
        assert!(store.wanted(ResourceKind::Package).is_empty());
        assert_eq!(store.snapshot().hblock.wanted, None);
    }

    #[test]
    fn test_refresh_keeps_differing_overrides() {
        let store = ResourceStateStore::new();
        store.want_dns(Some(DnsProvider::find("Quad9").unwrap()));
        store.want(ResourceKind::Locale, "de_DE.UTF-8", Some(true)).unwrap();

        store.refresh(ObservedState {
            dns: Some(DnsProvider::default_provider()),
            ..ObservedState::default()
        });

        let snapshot = store.snapshot();
        assert_eq!(snapshot.dns.pending().map(|p| p.name.as_str()), Some("Quad9"));
        assert_eq!(
            snapshot.wanted(ResourceKind::Locale).get("de_DE.UTF-8"),
            Some(&true)
        );
        assert_eq!(snapshot.summary().total(), 2);
    }

    #[test]
    fn test_wanted_state_round_trip_prunes_on_load() {
        let store = ResourceStateStore::new();
        store.want(ResourceKind::Service, "sshd.service", Some(true)).unwrap();
        store.want_shell(Some(LoginShell::find("fish").unwrap()));
        let wanted = store.snapshot().wanted_state();

        let text = toml::to_string(&wanted).unwrap();
        let loaded: WantedState = toml::from_str(&text).unwrap();
        assert_eq!(loaded, wanted);

        let fresh = ResourceStateStore::new();
        let mut observed = ObservedState::default();
        observed.maps.insert(
            ResourceKind::Service,
            [("sshd.service".to_string(), true)].into_iter().collect(),
        );
        fresh.refresh(observed);
        fresh.restore_wanted(loaded).unwrap();
        assert!(fresh.wanted(ResourceKind::Service).is_empty());
        assert_eq!(
            fresh.snapshot().shell.wanted.as_ref().map(|s| s.name.as_str()),
            Some("fish")
        );
    }

    #[test]
    fn test_restore_rejects_tampered_overrides() {
        let store = ResourceStateStore::new();
        store.want(ResourceKind::Group, "docker", Some(true)).unwrap();
        let before = store.snapshot();

        let bad_name: WantedState = toml::from_str(
            r#"
            [maps]
            package = { "foo;touch /tmp/owned" = true }
            "#,
        )
        .unwrap();
        assert!(matches!(
            store.restore_wanted(bad_name),
            Err(Error::InvalidName { .. })
        ));

        let bad_dns: WantedState = toml::from_str(r#"dns = "1.1.1.1' ; id ; '""#).unwrap();
        assert!(matches!(
            store.restore_wanted(bad_dns),
            Err(Error::UnknownDnsProvider(_))
        ));

        let bad_shell: WantedState = toml::from_str(r#"shell = "zsh; reboot""#).unwrap();
        assert!(matches!(
            store.restore_wanted(bad_shell),
            Err(Error::UnknownShell(_))
        ));

        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_persisted_settings_carry_names_only() {
        let store = ResourceStateStore::new();
        store.want_dns(Some(DnsProvider::find("quad9").unwrap()));
        let wanted = store.snapshot().wanted_state();
        assert_eq!(wanted.dns.as_deref(), Some("Quad9"));

        let text = toml::to_string(&wanted).unwrap();
        assert!(!text.contains("9.9.9.9"));
    }

    #[test]
    fn test_shell_with_config_wants_settings_package() {
        let store = ResourceStateStore::new();
        store
            .want_shell_with_config(LoginShell::find("fish").unwrap())
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.shell.wanted.as_ref().map(|s| s.name.as_str()), Some("fish"));
        assert_eq!(
            snapshot.wanted(ResourceKind::Package).get("garuda-fish-settings"),
            Some(&true)
        );

        store
            .want_shell_with_config(LoginShell::find("sh").unwrap())
            .unwrap();
        assert_eq!(store.wanted(ResourceKind::Package).len(), 1);
    }

    struct Counter(AtomicUsize);

    impl SnapshotListener for Counter {
        fn on_snapshot(&self, _snapshot: &StateSnapshot) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_listeners_see_every_mutation() {
        let store = ResourceStateStore::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        store.subscribe(counter.clone());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        store.toggle(ResourceKind::Group, "docker").unwrap();
        store.toggle_iwd();
        store.reset_all();
        assert_eq!(counter.0.load(Ordering::SeqCst), 4);
    }

    /// Stalls on the first snapshot that wants `foo` but not `bar`
    struct Stall {
        entered: Mutex<Option<mpsc::Sender<()>>>,
        seen: Mutex<Vec<StateMap>>,
    }

    impl SnapshotListener for Stall {
        fn on_snapshot(&self, snapshot: &StateSnapshot) {
            let wanted = snapshot.wanted(ResourceKind::Package);
            if wanted.contains_key("foo") && !wanted.contains_key("bar") {
                if let Some(entered) = lock(&self.entered).take() {
                    let _ = entered.send(());
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
            lock(&self.seen).push(wanted.clone());
        }
    }

    #[test]
    fn test_concurrent_mutations_publish_in_order() {
        let store = ResourceStateStore::new();
        let (tx, rx) = mpsc::channel();
        let stall = Arc::new(Stall {
            entered: Mutex::new(Some(tx)),
            seen: Mutex::new(Vec::new()),
        });
        store.subscribe(stall.clone());
        let tasks = queue::shared();
        store.subscribe(Arc::new(ReconciliationEngine::new(
            tasks.clone(),
            PlanContext::new("alice"),
        )));

        std::thread::scope(|scope| {
            let first = scope.spawn(|| store.toggle(ResourceKind::Package, "foo").unwrap());
            rx.recv().unwrap();
            store.toggle(ResourceKind::Package, "bar").unwrap();
            first.join().unwrap();
        });

        let seen = lock(&stall.seen);
        let last = seen.last().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(*last, store.wanted(ResourceKind::Package));
        assert_eq!(
            queue::lock(&tasks).find_by_id("reconcile:package").unwrap().script,
            "pacman --needed --noconfirm -S bar foo\n"
        );
    }
}
