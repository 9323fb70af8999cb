//! Progress callbacks for execution passes

use declarative::Task;
use shellkit::SessionKind;

use super::coordinator::{PassReport, TaskOutcome};

/// Receives lifecycle events of a pass. Every method defaults to a no-op.
pub trait ExecutionObserver: Send + Sync {
    fn on_pass_start(&self, _tasks: &[Task]) {}

    fn on_sessions_ready(&self, _kinds: &[SessionKind]) {}

    /// `position` is 1-based within the pass
    fn on_task_start(&self, _task: &Task, _position: usize, _total: usize) {}

    fn on_task_complete(&self, _task: &Task, _outcome: &TaskOutcome) {}

    fn on_pass_complete(&self, _report: &PassReport) {}
}

/// Writes pass events to the log
#[derive(Debug, Default)]
pub struct LogObserver;

impl ExecutionObserver for LogObserver {
    fn on_pass_start(&self, tasks: &[Task]) {
        log::info!("Starting execution pass with {} task(s)", tasks.len());
    }

    fn on_sessions_ready(&self, kinds: &[SessionKind]) {
        let names: Vec<String> = kinds.iter().map(ToString::to_string).collect();
        log::debug!("Sessions ready: {}", names.join(", "));
    }

    fn on_task_start(&self, task: &Task, position: usize, total: usize) {
        log::info!("[{position}/{total}] {}", task.display_name);
    }

    fn on_task_complete(&self, task: &Task, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Succeeded => log::info!("{} finished", task.display_name),
            TaskOutcome::Skipped { reason } => {
                log::debug!("{} skipped: {reason}", task.display_name);
            }
            other => log::warn!("{}: {other}", task.display_name),
        }
    }

    fn on_pass_complete(&self, report: &PassReport) {
        log::info!(
            "Pass complete: {} succeeded, {} failed, {} skipped",
            report.succeeded(),
            report.failed(),
            report.skipped()
        );
    }
}
