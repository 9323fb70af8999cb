//! `rani status` - observed state, pending overrides and settings

use anyhow::Result;
use colored::Colorize;
use declarative::{ResourceKind, Singleton, StateSnapshot, queue};

use crate::Context;
use crate::app::App;
use crate::engine::differ;
use crate::ui;

pub fn run(ctx: &Context, app: &App, kind: Option<ResourceKind>) -> Result<()> {
    ui::header("Rani Status");
    let snapshot = app.store.snapshot();

    match kind {
        Some(kind) => show_kind(&snapshot, kind),
        None => show_overview(&snapshot),
    }
    show_settings(&snapshot);

    let queued = queue::lock(&app.queue).count();
    println!();
    if queued == 0 {
        ui::success("Everything is up to date");
    } else {
        ui::info(&format!(
            "{queued} task(s) queued, run {} to apply",
            "rani apply".bold()
        ));
        if !ctx.quiet {
            differ::display_changes(&differ::pending_changes(&snapshot));
        }
    }

    Ok(())
}

fn show_overview(snapshot: &StateSnapshot) {
    ui::section("Resources");
    for kind in ResourceKind::ALL {
        let enabled = snapshot.effective(kind).values().filter(|on| **on).count();
        let pending = snapshot.diff(kind).len();
        let pending = if pending == 0 {
            String::new()
        } else {
            format!(", {pending} pending").yellow().to_string()
        };
        ui::kv(differ::heading(kind), &format!("{enabled} enabled{pending}"));
    }
}

fn show_kind(snapshot: &StateSnapshot, kind: ResourceKind) {
    ui::section(differ::heading(kind));
    let wanted = snapshot.wanted(kind);
    let effective = snapshot.effective(kind);
    if effective.is_empty() {
        ui::dim("(nothing observed)");
        return;
    }
    for (name, enabled) in &effective {
        println!(
            "  {} {name}",
            ui::toggle_marker(*enabled, wanted.contains_key(name))
        );
    }
}

fn describe<T: PartialEq>(setting: &Singleton<T>, name: impl Fn(&T) -> String) -> String {
    let value = setting
        .effective()
        .map(&name)
        .unwrap_or_else(|| "unknown".dimmed().to_string());
    if setting.pending().is_some() {
        format!("{value} {}", "*".yellow().bold())
    } else {
        value
    }
}

fn on_off(enabled: &bool) -> String {
    if *enabled { "on" } else { "off" }.to_string()
}

fn show_settings(snapshot: &StateSnapshot) {
    ui::section("System settings");
    ui::kv("DNS", &describe(&snapshot.dns, |p| p.name.clone()));
    ui::kv("Login shell", &describe(&snapshot.shell, |s| s.name.clone()));
    ui::kv("Host blocking", &describe(&snapshot.hblock, on_off));
    ui::kv("iwd backend", &describe(&snapshot.iwd, on_off));
}
