//! Live-system scanner - observes what is installed, enabled and configured
//!
//! Every query is a one-shot command run through [`runner::run_bash`]; the
//! parsing of each answer is a pure function so it can be tested without a
//! system to scan. A failed query leaves its part of the observation empty
//! and is logged, it never fails the whole scan.

use anyhow::{Context, Result};
use declarative::planner::{DNS_DROP_IN, IWD_DROP_IN, LOCALE_GEN};
use declarative::{
    DnsProvider, LoginShell, ObservedState, ResourceKind, ResourceStateStore, StateMap,
};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};

use crate::engine::{RefreshFuture, StateRefresher};
use crate::runner::{self, CommandResult};

/// Only the header of the hosts file is read; hblock writes its summary there
const HOSTS_HEADER: &str = "head -n 40 /etc/hosts";

static BLOCKED_DOMAINS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"#\s*Blocked domains:\s*(\d+)")
        .map_err(|e| log::error!("Invalid hblock pattern: {e}"))
        .ok()
});

/// One row of `systemctl list-units --output json`
#[derive(Debug, Deserialize)]
struct UnitRow {
    unit: String,
    active: String,
}

/// Installed package names, one per line (`pacman -Qq`)
pub fn parse_packages(stdout: &str) -> StateMap {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|name| (name.to_string(), true))
        .collect()
}

/// Service units mapped to whether they are active
pub fn parse_units(stdout: &str) -> Result<StateMap> {
    let rows: Vec<UnitRow> =
        serde_json::from_str(stdout).context("Failed to parse systemctl JSON output")?;
    Ok(rows
        .into_iter()
        .map(|row| (row.unit, row.active == "active"))
        .collect())
}

/// Group names from `groups <user>` (`user : a b c` or just `a b c`)
pub fn parse_groups(stdout: &str) -> StateMap {
    let names = match stdout.split_once(':') {
        Some((_, rest)) => rest,
        None => stdout,
    };
    names
        .split_whitespace()
        .map(|name| (name.to_string(), true))
        .collect()
}

/// Uncommented entries of `locale.gen`, keyed by their first token
pub fn parse_locale_gen(content: &str) -> StateMap {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .map(|locale| (locale.to_string(), true))
        .collect()
}

/// Provider configured in the DNS drop-in; no drop-in means the default
pub fn parse_dns(drop_in: Option<&str>) -> DnsProvider {
    drop_in
        .and_then(|content| {
            content
                .lines()
                .find_map(|line| line.trim().strip_prefix("servers="))
        })
        .and_then(|servers| servers.split(',').next())
        .map(DnsProvider::from_server)
        .unwrap_or_else(DnsProvider::default_provider)
}

/// Login shell from a `getent passwd` line, if it is a known one
pub fn parse_login_shell(passwd: &str) -> Option<LoginShell> {
    let path = passwd.trim().split(':').nth(6)?;
    let name = path.rsplit('/').next()?;
    LoginShell::find(name).ok()
}

/// Whether the hosts header reports a non-zero blocklist
pub fn parse_hblock(hosts_header: &str) -> bool {
    BLOCKED_DOMAINS
        .as_ref()
        .and_then(|re| re.captures(hosts_header))
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .is_some_and(|count| count > 0)
}

/// Scanner for the live system
#[derive(Debug, Clone)]
pub struct SystemScanner {
    /// Account whose groups, user services and login shell are observed
    user: String,
}

fn stdout_of(query: &str, result: Result<CommandResult>) -> Option<String> {
    match result {
        Ok(result) if result.success() => Some(result.stdout),
        Ok(result) => {
            log::warn!("Query '{query}' failed: {}", result.stderr.trim());
            None
        }
        Err(e) => {
            log::warn!("Query '{query}' could not run: {e:#}");
            None
        }
    }
}

fn units(query: &str, result: Result<CommandResult>) -> Option<StateMap> {
    let stdout = stdout_of(query, result)?;
    parse_units(&stdout)
        .map_err(|e| log::warn!("{e:#}"))
        .ok()
}

impl SystemScanner {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    /// Run every query concurrently and assemble one observation
    pub async fn scan(&self) -> ObservedState {
        let user = &self.user;
        let packages_q = "pacman -Qq".to_string();
        let services_q =
            "systemctl list-units --type service --all --full --output json --no-pager".to_string();
        let user_services_q =
            "systemctl --user list-units --type service --all --full --output json --no-pager"
                .to_string();
        let groups_q = format!("groups '{user}'");
        let locales_q = format!("cat {LOCALE_GEN}");
        let dns_q = format!("cat {DNS_DROP_IN}");
        let shell_q = format!("getent passwd '{user}'");
        let iwd_q = format!("test -f {IWD_DROP_IN}");

        let (packages, services, user_services, groups, locales, dns, shell, hblock, iwd) = tokio::join!(
            runner::run_bash(&packages_q),
            runner::run_bash(&services_q),
            runner::run_bash(&user_services_q),
            runner::run_bash(&groups_q),
            runner::run_bash(&locales_q),
            runner::run_bash(&dns_q),
            runner::run_bash(&shell_q),
            runner::run_bash(HOSTS_HEADER),
            runner::run_bash(&iwd_q),
        );

        let mut observed = ObservedState::default();
        let maps = [
            (
                ResourceKind::Package,
                stdout_of(&packages_q, packages).map(|out| parse_packages(&out)),
            ),
            (ResourceKind::Service, units(&services_q, services)),
            (ResourceKind::UserService, units(&user_services_q, user_services)),
            (
                ResourceKind::Group,
                stdout_of(&groups_q, groups).map(|out| parse_groups(&out)),
            ),
            (
                ResourceKind::Locale,
                stdout_of(&locales_q, locales).map(|out| parse_locale_gen(&out)),
            ),
        ];
        for (kind, map) in maps
            .into_iter()
            .filter_map(|(kind, map)| map.map(|map| (kind, map)))
        {
            log::debug!("Observed {} {kind} entries", map.len());
            observed.maps.insert(kind, map);
        }

        // a missing drop-in is the normal "default provider" case
        let dns_drop_in = dns.ok().filter(CommandResult::success).map(|r| r.stdout);
        observed.dns = Some(parse_dns(dns_drop_in.as_deref()));
        observed.shell = stdout_of(&shell_q, shell).and_then(|out| parse_login_shell(&out));
        observed.hblock = stdout_of(HOSTS_HEADER, hblock).map(|out| parse_hblock(&out));
        observed.iwd = match iwd {
            Ok(result) => Some(result.success()),
            Err(e) => {
                log::warn!("Query '{iwd_q}' could not run: {e:#}");
                None
            }
        };

        observed
    }
}

/// Rescans the system and replaces the observed side of a store
pub struct StoreRefresher {
    scanner: SystemScanner,
    store: Arc<ResourceStateStore>,
}

impl StoreRefresher {
    pub fn new(scanner: SystemScanner, store: Arc<ResourceStateStore>) -> Self {
        Self { scanner, store }
    }
}

impl StateRefresher for StoreRefresher {
    fn refresh(&self) -> RefreshFuture<'_> {
        Box::pin(async move {
            let observed = self.scanner.scan().await;
            self.store.refresh(observed);
            Ok(())
        })
    }
}
