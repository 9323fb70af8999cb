//! `rani apply`, `rani ensure`, `rani run` and `rani scan`
//!
//! Everything that reaches the live system through a session pass.

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{
    ResourceKind, StateSnapshot, Task, ensure_package_task, queue, validate_name,
};
use shellkit::{OutputBus, SessionKind};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::Context;
use crate::app::App;
use crate::cli::ApplyArgs;
use crate::commands::{print_queue_summary, tasks};
use crate::engine::{
    CoordinatorStatus, ExecutionCoordinator, ExecutionObserver, PassReport, TaskOutcome, differ,
};
use crate::runner;
use crate::ui;

/// Prints pass progress to the terminal
struct ConsoleObserver;

impl ExecutionObserver for ConsoleObserver {
    fn on_sessions_ready(&self, kinds: &[SessionKind]) {
        if kinds.iter().any(|k| k.is_escalated()) {
            log::info!("Elevated session ready");
        }
    }

    fn on_task_start(&self, task: &Task, position: usize, total: usize) {
        println!();
        ui::step(position, total, &format!("{} {}", task.icon, task.display_name));
    }

    fn on_task_complete(&self, task: &Task, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Succeeded => ui::success(&task.display_name),
            TaskOutcome::Skipped { reason } => {
                ui::dim(&format!("{} skipped ({reason})", task.display_name));
            }
            other => ui::error(&format!("{}: {other}", task.display_name)),
        }
    }
}

/// Copy session output to stdout until aborted
fn stream_output(bus: &OutputBus) -> JoinHandle<()> {
    let mut subscription = bus.subscribe();
    tokio::spawn(async move {
        while let Some(chunk) = subscription.recv().await {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(chunk.text.as_bytes());
            let _ = stdout.flush();
        }
    })
}

/// Give in-flight output a moment to reach the terminal, then stop copying
async fn stop_streaming(streamer: Option<JoinHandle<()>>) {
    if let Some(streamer) = streamer {
        tokio::time::sleep(Duration::from_millis(100)).await;
        streamer.abort();
    }
}

fn coordinator(app: &App) -> Result<ExecutionCoordinator> {
    Ok(app.coordinator()?.with_observer(Arc::new(ConsoleObserver)))
}

/// Run a full pass, turning Ctrl-C into an abort after the current task
async fn drive(coordinator: &ExecutionCoordinator) -> Result<PassReport> {
    let pass = coordinator.execute_all();
    tokio::pin!(pass);
    loop {
        tokio::select! {
            result = &mut pass => return Ok(result?),
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                warn_interrupted(&coordinator.status());
                coordinator.abort();
            }
        }
    }
}

fn warn_interrupted(status: &CoordinatorStatus) {
    if !status.running || status.aborting {
        ui::warn("Already stopping");
        return;
    }
    match &status.current {
        Some(task) => ui::warn(&format!(
            "Interrupted during {} ({} of {} queued), stopping after it",
            task.display_name,
            status.position.display_rank(),
            status.queued
        )),
        None => ui::warn("Interrupted, stopping before the next task"),
    }
}

fn print_report(report: &PassReport) {
    println!();
    ui::section("Summary");
    ui::kv("Succeeded", &report.succeeded().to_string().green().to_string());
    ui::kv("Failed", &report.failed().to_string().red().to_string());
    ui::kv("Skipped", &report.skipped().to_string());
    let violations = report
        .tasks
        .iter()
        .filter(|t| t.outcome == TaskOutcome::IntegrityViolation)
        .count();
    if violations > 0 {
        ui::kv("Integrity violations", &violations.to_string().red().bold().to_string());
    }
}

pub async fn apply(ctx: &Context, app: &App, args: &ApplyArgs) -> Result<()> {
    ui::header("Applying Changes");

    let pending = queue::lock(&app.queue).sorted();
    if pending.is_empty() {
        ui::success("Nothing to apply");
        return Ok(());
    }

    differ::display_changes(&differ::pending_changes(&app.store.snapshot()));

    if args.dry_run {
        ui::warn("Dry run - no changes will be made");
        println!();
        print!("{}", tasks::render_scripts(&pending));
        return Ok(());
    }

    differ::display_privilege_boundary(&pending);
    println!();
    if !args.yes && !ui::confirm_proceed("Apply these changes?")? {
        ui::info("Cancelled");
        return Ok(());
    }

    let coordinator = coordinator(app)?;
    let streamer = (!ctx.quiet).then(|| stream_output(&app.bus));
    let result = drive(&coordinator).await;
    stop_streaming(streamer).await;

    app.persist()?;
    let report = result?;
    print_report(&report);
    print_queue_summary(app);

    if report.failed() > 0 {
        bail!("{} task(s) failed", report.failed());
    }
    println!();
    ui::success("Apply complete!");
    Ok(())
}

/// Whether a package is missing from the live system.
///
/// Overrides are ignored: a pending install is not an installed package.
fn needs_install(snapshot: &StateSnapshot, package: &str) -> bool {
    !snapshot
        .current(ResourceKind::Package)
        .get(package)
        .copied()
        .unwrap_or(false)
}

pub async fn ensure(ctx: &Context, app: &App, package: &str) -> Result<()> {
    validate_name(ResourceKind::Package, package)?;
    if !needs_install(&app.store.snapshot(), package) {
        ui::success(&format!("{} is already installed", package.bold()));
        return Ok(());
    }

    let task = ensure_package_task(package)?;
    let outcome = run_now(ctx, app, task).await?;
    if outcome.is_failure() {
        ui::warn(&format!("Install task {outcome}"));
    }

    let check = runner::run_bash(&format!("pacman -Qq {package}")).await?;
    if !check.success() {
        bail!("{package} is still not installed");
    }
    ui::success(&format!("{} is installed", package.bold()));
    Ok(())
}

pub async fn run(
    ctx: &Context,
    app: &App,
    script: &str,
    privileged: bool,
    name: &str,
) -> Result<()> {
    let task = Task::new("run-now", 0, privileged, name, "▶", script);
    let outcome = run_now(ctx, app, task).await?;
    match outcome {
        TaskOutcome::Succeeded => {
            ui::success(&format!("{name} finished"));
            Ok(())
        }
        other => bail!("{name}: {other}"),
    }
}

async fn run_now(ctx: &Context, app: &App, task: Task) -> Result<TaskOutcome> {
    let coordinator = coordinator(app)?;
    let streamer = (!ctx.quiet).then(|| stream_output(&app.bus));
    let result = coordinator.execute_one(task).await;
    stop_streaming(streamer).await;
    app.persist()?;

    let outcome = result?;
    // output was not streamed, show it when something went wrong
    if ctx.quiet && outcome.is_failure() {
        eprint!("{}", coordinator.output());
    }
    Ok(outcome)
}

/// Persist overrides after the startup scan pruned the satisfied ones
pub fn scan(app: &App) -> Result<()> {
    let pending = app.store.snapshot().summary().total();
    app.persist()?;
    ui::success("Overrides saved");
    ui::kv("Pending changes", &pending.to_string());
    print_queue_summary(app);
    Ok(())
}
