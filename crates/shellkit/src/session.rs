//! A persistent interactive interpreter process

use crate::bus::OutputBus;
use crate::elevator::{CommandSpec, PrivilegeElevator};
use crate::error::{Result, SessionError};
use std::fmt;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep, timeout};

/// Liveness polling interval for startup and stop
const POLL: Duration = Duration::from_millis(100);

/// Which privilege level a session runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Normal,
    Escalated,
}

impl SessionKind {
    pub fn from_privilege(escalated: bool) -> Self {
        if escalated { Self::Escalated } else { Self::Normal }
    }

    pub fn is_escalated(self) -> bool {
        self == Self::Escalated
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Escalated => "escalated",
        })
    }
}

/// How sessions are launched and torn down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Interpreter executable
    pub interpreter: String,
    /// Interpreter arguments (non-interactive, no rc files)
    pub args: Vec<String>,
    /// Upper bound on waiting for a session to accept input
    pub startup_timeout: Duration,
    /// How long `stop` waits after asking the interpreter to exit
    pub stop_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            interpreter: "bash".to_string(),
            args: vec!["--noprofile".to_string(), "--norc".to_string()],
            startup_timeout: Duration::from_secs(30),
            stop_grace: Duration::from_secs(5),
        }
    }
}

impl SessionSettings {
    /// The unwrapped interpreter command
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new(self.interpreter.clone(), self.args.iter().cloned())
    }
}

/// State that exists only while the process is running
struct SessionHandle {
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    alive: Arc<AtomicBool>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
    pid: Option<u32>,
}

impl SessionHandle {
    fn terminate(&self) {
        let sender = match self.kill.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

/// One long-lived interpreter whose output goes to an [`OutputBus`]
pub struct CommandSession {
    kind: SessionKind,
    command: CommandSpec,
    settings: SessionSettings,
    bus: OutputBus,
    handle: Option<SessionHandle>,
}

impl fmt::Debug for CommandSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSession")
            .field("kind", &self.kind)
            .field("command", &self.command.to_string())
            .field("pid", &self.pid())
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl CommandSession {
    /// A session running as the invoking user
    pub fn normal(settings: &SessionSettings, bus: &OutputBus) -> Self {
        Self::with_command(SessionKind::Normal, settings.command(), settings, bus)
    }

    /// A session wrapped by `elevator`
    pub fn escalated(
        settings: &SessionSettings,
        elevator: &dyn PrivilegeElevator,
        bus: &OutputBus,
    ) -> Self {
        let command = elevator.wrap(&settings.command());
        Self::with_command(SessionKind::Escalated, command, settings, bus)
    }

    fn with_command(
        kind: SessionKind,
        command: CommandSpec,
        settings: &SessionSettings,
        bus: &OutputBus,
    ) -> Self {
        Self {
            kind,
            command,
            settings: settings.clone(),
            bus: bus.clone(),
            handle: None,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.pid)
    }

    /// Whether the process has been started and has not exited
    pub fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| h.alive.load(Ordering::SeqCst))
    }

    /// Spawn the interpreter and wait until it accepts input.
    ///
    /// Readiness is confirmed by echoing a marker through the interpreter,
    /// so a refused elevation prompt (the wrapper exits) surfaces here as
    /// [`SessionError::Spawn`]. Calling `start` on a running session is a
    /// no-op.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_alive() {
            return Ok(());
        }

        log::debug!("Starting {} session: {}", self.kind, self.command);
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e.to_string()))?;

        let mut ready = self.bus.subscribe();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, self.bus.clone(), self.kind));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, self.bus.clone(), self.kind));
        }

        let alive = Arc::new(AtomicBool::new(true));
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let pid = child.id();
        let stdin = child.stdin.take();

        let flag = Arc::clone(&alive);
        let kind = self.kind;
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => log::debug!("{kind} session exited: {status}"),
                    Err(e) => log::warn!("{kind} session wait failed: {e}"),
                },
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        log::warn!("Failed to kill {kind} session: {e}");
                    }
                    log::debug!("{kind} session killed");
                }
            }
            flag.store(false, Ordering::SeqCst);
        });

        self.handle = Some(SessionHandle {
            stdin: tokio::sync::Mutex::new(stdin),
            alive,
            kill: Mutex::new(Some(kill_tx)),
            pid,
        });

        let marker = format!("rani:session-ready:{}", self.kind);
        let probe = format!("printf '%s\\n' '{marker}'");
        if self.write_line(&probe).await.is_err() {
            return Err(self.abandon("exited before accepting input").await);
        }

        let wait = async {
            let mut seen = String::new();
            loop {
                tokio::select! {
                    chunk = ready.recv() => match chunk {
                        Some(chunk) if chunk.source == self.kind => {
                            seen.push_str(&chunk.text);
                            if seen.contains(&marker) {
                                return true;
                            }
                        }
                        Some(_) => {}
                        None => return false,
                    },
                    () = sleep(POLL) => {
                        if !self.is_alive() {
                            return false;
                        }
                    }
                }
            }
        };

        match timeout(self.settings.startup_timeout, wait).await {
            Ok(true) => {
                log::info!("{} session ready (pid {:?})", self.kind, self.pid());
                Ok(())
            }
            Ok(false) => Err(self.abandon("exited before becoming ready").await),
            Err(_) => {
                let message = format!(
                    "not ready after {}s",
                    self.settings.startup_timeout.as_secs()
                );
                Err(self.abandon(&message).await)
            }
        }
    }

    /// Send one line of input
    pub async fn write_line(&self, text: &str) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(SessionError::NotStarted)?;
        if !handle.alive.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }

        let mut stdin = handle.stdin.lock().await;
        let pipe = stdin.as_mut().ok_or(SessionError::Closed)?;
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        let written = async {
            pipe.write_all(line.as_bytes()).await?;
            pipe.flush().await
        };
        match written.await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Err(SessionError::Closed),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    /// Ask the interpreter to exit, then kill it after the grace period.
    ///
    /// Safe to call any number of times, and on a never-started session.
    pub async fn stop(&self) {
        let Some(handle) = self.handle.as_ref() else {
            return;
        };

        if handle.alive.load(Ordering::SeqCst) {
            if let Err(e) = self.write_line("exit 0").await {
                log::debug!("{} session did not take exit: {e}", self.kind);
            }
            if !wait_dead(&handle.alive, self.settings.stop_grace).await {
                log::warn!(
                    "{} session still alive after {}s, terminating",
                    self.kind,
                    self.settings.stop_grace.as_secs()
                );
                handle.terminate();
                wait_dead(&handle.alive, Duration::from_secs(2)).await;
            }
        }

        handle.stdin.lock().await.take();
    }

    /// Kill a session that failed to come up and build the startup error
    async fn abandon(&self, message: &str) -> SessionError {
        if let Some(handle) = self.handle.as_ref() {
            handle.terminate();
            wait_dead(&handle.alive, Duration::from_secs(2)).await;
            handle.stdin.lock().await.take();
        }
        self.spawn_error(message.to_string())
    }

    fn spawn_error(&self, message: String) -> SessionError {
        SessionError::Spawn {
            program: self.command.program.clone(),
            message,
        }
    }
}

/// Poll `alive` until it clears; false if `limit` passes first
async fn wait_dead(alive: &AtomicBool, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while alive.load(Ordering::SeqCst) {
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL).await;
    }
    true
}

/// Forward a pipe to the bus, holding back split UTF-8 sequences
async fn pump<R>(mut reader: R, bus: OutputBus, kind: SessionKind)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                log::debug!("{kind} session pipe closed: {e}");
                break;
            }
        };
        pending.extend_from_slice(&buf[..n]);

        let complete = match std::str::from_utf8(&pending) {
            Ok(_) => pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => pending.len(),
        };
        if complete > 0 {
            let rest = pending.split_off(complete);
            bus.publish(kind, String::from_utf8_lossy(&pending).into_owned());
            pending = rest;
        }
    }
    if !pending.is_empty() {
        bus.publish(kind, String::from_utf8_lossy(&pending).into_owned());
    }
}
