//! Runs queued tasks through persistent shell sessions
//!
//! A pass snapshots the queue in priority order, starts only the sessions
//! that snapshot needs, and dispatches one verified script at a time. Task
//! failures are recorded and the pass moves on; only a refused session or
//! an unusable script path ends a pass early.

use declarative::{QueuePosition, SharedQueue, Task, queue};
use shellkit::{
    CommandSession, OutputBus, OutputCapture, OutputChunk, OutputSubscription, PoolRequest,
    PrivilegeElevator, SessionKind, SessionPool, SessionSettings,
};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::error::ExecutionError;
use super::integrity;
use super::observer::{ExecutionObserver, LogObserver};

/// How long to wait for the completion line once the script file is gone
const COMPLETION_GRACE: Duration = Duration::from_secs(2);

/// Quiet period used to collect the last output of a dead session
const SETTLE_WINDOW: Duration = Duration::from_millis(250);

/// Bytes of session output kept while waiting for a sentinel
const TAIL_LIMIT: usize = 8 * 1024;

pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Re-reads the live system after a pass
pub trait StateRefresher: Send + Sync {
    fn refresh(&self) -> RefreshFuture<'_>;
}

/// What happened to one task in a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    /// Non-zero exit, or no exit status reported (`None`)
    Failed { code: Option<i32> },
    /// The staged script changed on disk before it ran; its session is gone
    IntegrityViolation,
    /// The session exited before the task could finish
    SessionLost,
    Skipped { reason: String },
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::IntegrityViolation | Self::SessionLost
        )
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed { code: Some(code) } => write!(f, "failed with exit code {code}"),
            Self::Failed { code: None } => write!(f, "failed without an exit status"),
            Self::IntegrityViolation => write!(f, "script changed before it ran, not executed"),
            Self::SessionLost => write!(f, "session ended unexpectedly"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub id: String,
    pub display_name: String,
    pub outcome: TaskOutcome,
}

/// Outcomes of one pass, in dispatch order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub tasks: Vec<TaskReport>,
}

impl PassReport {
    fn record(&mut self, task: &Task, outcome: TaskOutcome) {
        self.tasks.push(TaskReport {
            id: task.id.clone(),
            display_name: task.display_name.clone(),
            outcome,
        });
    }

    #[cfg(test)]
    pub fn outcome(&self, id: &str) -> Option<&TaskOutcome> {
        self.tasks.iter().find(|t| t.id == id).map(|t| &t.outcome)
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| *o == TaskOutcome::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskOutcome::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.tasks.iter().filter(|t| pred(&t.outcome)).count()
    }
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStatus {
    pub running: bool,
    pub aborting: bool,
    pub current: Option<Task>,
    pub position: QueuePosition,
    pub queued: usize,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub settings: SessionSettings,
    /// How often the staged script file is checked while a task runs
    pub poll_interval: Duration,
    pub script_path: PathBuf,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Returns the coordinator to idle however a pass ends
struct PassGuard<'a> {
    running: &'a AtomicBool,
    aborting: &'a AtomicBool,
    current: &'a Mutex<Option<Task>>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *lock(self.current) = None;
        self.aborting.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Session output of one kind, trimmed to the most recent bytes
struct OutputTail {
    source: SessionKind,
    subscription: OutputSubscription,
    text: String,
}

impl OutputTail {
    fn new(source: SessionKind, subscription: OutputSubscription) -> Self {
        Self {
            source,
            subscription,
            text: String::new(),
        }
    }

    fn push(&mut self, chunk: OutputChunk) {
        if chunk.source != self.source {
            return;
        }
        self.text.push_str(&chunk.text);
        if self.text.len() > TAIL_LIMIT {
            let mut cut = self.text.len() - TAIL_LIMIT;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }
    }

    fn drain(&mut self) {
        while let Some(chunk) = self.subscription.try_recv() {
            self.push(chunk);
        }
    }

    /// Collect until nothing arrives for `window`
    async fn settle(&mut self, window: Duration) {
        while let Ok(Some(chunk)) = tokio::time::timeout(window, self.subscription.recv()).await {
            self.push(chunk);
        }
    }

    async fn wait_for_completion(&mut self, grace: Duration) -> Option<i32> {
        let deadline = Instant::now() + grace;
        loop {
            self.drain();
            if let Some(code) = integrity::parse_completion(&self.text) {
                return Some(code);
            }
            match tokio::time::timeout_at(deadline, self.subscription.recv()).await {
                Ok(Some(chunk)) => self.push(chunk),
                Ok(None) | Err(_) => return integrity::parse_completion(&self.text),
            }
        }
    }
}

async fn script_pending(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Drives execution passes over a shared task queue.
///
/// At most one pass runs at a time; a second request while one is in
/// flight is refused with [`ExecutionError::Busy`].
pub struct ExecutionCoordinator {
    queue: SharedQueue,
    bus: OutputBus,
    elevator: Arc<dyn PrivilegeElevator>,
    config: CoordinatorConfig,
    refresher: Arc<dyn StateRefresher>,
    observer: Arc<dyn ExecutionObserver>,
    running: AtomicBool,
    aborting: AtomicBool,
    current: Mutex<Option<Task>>,
    capture: OutputCapture,
}

impl ExecutionCoordinator {
    /// Must be called inside a tokio runtime
    pub fn new(
        queue: SharedQueue,
        bus: OutputBus,
        elevator: Arc<dyn PrivilegeElevator>,
        config: CoordinatorConfig,
        refresher: Arc<dyn StateRefresher>,
    ) -> Self {
        let capture = OutputCapture::start(&bus);
        Self {
            queue,
            bus,
            elevator,
            config,
            refresher,
            observer: Arc::new(LogObserver),
            running: AtomicBool::new(false),
            aborting: AtomicBool::new(false),
            current: Mutex::new(None),
            capture,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Everything the sessions printed during the latest pass
    pub fn output(&self) -> String {
        self.capture.contents()
    }

    pub fn status(&self) -> CoordinatorStatus {
        let current = lock(&self.current).clone();
        let queue = queue::lock(&self.queue);
        let position = match &current {
            Some(task) => queue.progress(&task.id),
            None => QueuePosition::NotQueued,
        };
        CoordinatorStatus {
            running: self.running.load(Ordering::SeqCst),
            aborting: self.aborting.load(Ordering::SeqCst),
            current,
            position,
            queued: queue.count(),
        }
    }

    /// Ask the running pass to stop after the in-flight task.
    ///
    /// The in-flight task itself is never interrupted. No effect when idle.
    pub fn abort(&self) {
        if self.running.load(Ordering::SeqCst) {
            log::info!("Abort requested, stopping after the current task");
            self.aborting.store(true, Ordering::SeqCst);
        }
    }

    /// Run everything queued, in priority order
    pub async fn execute_all(&self) -> Result<PassReport, ExecutionError> {
        let _guard = self.begin()?;
        self.capture.clear();
        let tasks = queue::lock(&self.queue).sorted();
        let result = self.run_pass(&tasks, true).await;
        self.refresh().await;
        result
    }

    /// Run a single task that need not be queued
    pub async fn execute_one(&self, task: Task) -> Result<TaskOutcome, ExecutionError> {
        let _guard = self.begin()?;
        self.capture.clear();
        let result = self.run_pass(std::slice::from_ref(&task), false).await;
        self.refresh().await;

        let report = result?;
        Ok(report
            .tasks
            .into_iter()
            .next()
            .map(|t| t.outcome)
            .unwrap_or(TaskOutcome::Skipped {
                reason: "not dispatched".to_string(),
            }))
    }

    fn begin(&self) -> Result<PassGuard<'_>, ExecutionError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ExecutionError::Busy)?;
        self.aborting.store(false, Ordering::SeqCst);
        Ok(PassGuard {
            running: &self.running,
            aborting: &self.aborting,
            current: &self.current,
        })
    }

    async fn refresh(&self) {
        if let Err(e) = self.refresher.refresh().await {
            log::warn!("Failed to refresh system state: {e:#}");
        }
    }

    async fn run_pass(
        &self,
        tasks: &[Task],
        consult_queue: bool,
    ) -> Result<PassReport, ExecutionError> {
        if tasks.is_empty() {
            log::debug!("Nothing to execute");
            return Ok(PassReport::default());
        }
        integrity::ensure_safe_path(&self.config.script_path)?;

        self.observer.on_pass_start(tasks);
        let request = PoolRequest::from_privileges(tasks.iter().map(|t| t.requires_privilege));
        let mut pool = SessionPool::new(
            request,
            &self.config.settings,
            self.elevator.as_ref(),
            &self.bus,
        );
        pool.start_all().await.map_err(ExecutionError::Spawn)?;
        self.observer.on_sessions_ready(&pool.kinds());

        let result = self.dispatch(&pool, tasks, consult_queue).await;
        pool.stop_all().await;

        let report = result?;
        self.observer.on_pass_complete(&report);
        Ok(report)
    }

    async fn dispatch(
        &self,
        pool: &SessionPool,
        tasks: &[Task],
        consult_queue: bool,
    ) -> Result<PassReport, ExecutionError> {
        let mut report = PassReport::default();
        let total = tasks.len();

        for (index, planned) in tasks.iter().enumerate() {
            if self.aborting.load(Ordering::SeqCst) {
                self.remove_if_unchanged(planned);
                self.finish(planned, skipped("aborted"), &mut report);
                continue;
            }

            // the queue may have been edited since the pass began
            let task = if consult_queue {
                let latest = queue::lock(&self.queue).find_by_id(&planned.id).cloned();
                match latest {
                    Some(task) => task,
                    None => {
                        self.finish(planned, skipped("removed from queue"), &mut report);
                        continue;
                    }
                }
            } else {
                planned.clone()
            };

            let outcome = match pool.session(task.requires_privilege) {
                Some(session) if session.is_alive() => {
                    *lock(&self.current) = Some(task.clone());
                    self.observer.on_task_start(&task, index + 1, total);
                    let outcome = self.run_task(session, &task).await;
                    *lock(&self.current) = None;
                    outcome?
                }
                _ => TaskOutcome::SessionLost,
            };

            self.remove_if_unchanged(&task);
            self.finish(&task, outcome, &mut report);
        }

        Ok(report)
    }

    fn finish(&self, task: &Task, outcome: TaskOutcome, report: &mut PassReport) {
        self.observer.on_task_complete(task, &outcome);
        report.record(task, outcome);
    }

    /// Drop `task` from the queue unless it was replaced in the meantime
    fn remove_if_unchanged(&self, task: &Task) {
        let mut queue = queue::lock(&self.queue);
        if queue.find_by_id(&task.id) == Some(task) {
            queue.remove(&task.id);
        }
    }

    async fn run_task(
        &self,
        session: &CommandSession,
        task: &Task,
    ) -> Result<TaskOutcome, ExecutionError> {
        let staged = match integrity::stage(&self.config.script_path, &task.script).await {
            Ok(staged) => staged,
            Err(ExecutionError::Io(e)) => {
                log::warn!("Could not stage script for {}: {e}", task.id);
                return Ok(TaskOutcome::Failed { code: None });
            }
            Err(e) => return Err(e),
        };
        let snippet = integrity::verification_snippet(&staged)?;

        let mut tail = OutputTail::new(session.kind(), self.bus.subscribe());
        if let Err(e) = session.write_line(&snippet).await {
            log::warn!("Could not dispatch {}: {e}", task.id);
            return Ok(TaskOutcome::SessionLost);
        }

        while session.is_alive() && script_pending(&staged.path).await {
            tokio::time::sleep(self.config.poll_interval).await;
            tail.drain();
        }

        if !session.is_alive() {
            tail.settle(SETTLE_WINDOW).await;
            if integrity::reports_mismatch(&tail.text) {
                log::error!("Script for {} was modified before it ran", task.id);
                return Ok(TaskOutcome::IntegrityViolation);
            }
            return Ok(TaskOutcome::SessionLost);
        }

        Ok(match tail.wait_for_completion(COMPLETION_GRACE).await {
            Some(0) => TaskOutcome::Succeeded,
            code => TaskOutcome::Failed { code },
        })
    }
}

fn skipped(reason: &str) -> TaskOutcome {
    TaskOutcome::Skipped {
        reason: reason.to_string(),
    }
}
