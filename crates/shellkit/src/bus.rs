//! Broadcast fan-out of session output
//!
//! Every subscriber receives every chunk (pub/sub, not work-queue). A slow
//! subscriber that falls more than the channel capacity behind loses the
//! oldest chunks and is told how many.

use crate::session::SessionKind;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;

/// Default number of chunks buffered per subscriber
pub const DEFAULT_CAPACITY: usize = 1024;

/// A piece of combined stdout/stderr from one session.
///
/// Not line-buffered: a line may be split across chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub source: SessionKind,
    pub text: String,
}

/// Cloneable handle publishing to all current subscribers
#[derive(Debug, Clone)]
pub struct OutputBus {
    tx: broadcast::Sender<OutputChunk>,
}

impl Default for OutputBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl OutputBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a chunk; dropped silently when nobody is listening
    pub fn publish(&self, source: SessionKind, text: impl Into<String>) {
        let _ = self.tx.send(OutputChunk {
            source,
            text: text.into(),
        });
    }

    /// Receive every chunk published from now on
    pub fn subscribe(&self) -> OutputSubscription {
        OutputSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

/// One subscriber's view of the bus
#[derive(Debug)]
pub struct OutputSubscription {
    rx: broadcast::Receiver<OutputChunk>,
}

impl OutputSubscription {
    /// Next chunk, or `None` once every bus handle is gone
    pub async fn recv(&mut self) -> Option<OutputChunk> {
        loop {
            match self.rx.recv().await {
                Ok(chunk) => return Some(chunk),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Output subscriber lagged, {skipped} chunks dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next chunk if one is already buffered
    pub fn try_recv(&mut self) -> Option<OutputChunk> {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => return Some(chunk),
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("Output subscriber lagged, {skipped} chunks dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Accumulates everything published on a bus into a text buffer.
///
/// The collecting task stops when the capture is dropped.
#[derive(Debug)]
pub struct OutputCapture {
    buffer: Arc<Mutex<String>>,
    task: JoinHandle<()>,
}

fn lock(buffer: &Mutex<String>) -> MutexGuard<'_, String> {
    match buffer.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl OutputCapture {
    /// Start capturing. Must be called inside a tokio runtime.
    pub fn start(bus: &OutputBus) -> Self {
        let buffer = Arc::new(Mutex::new(String::new()));
        let mut subscription = bus.subscribe();
        let sink = Arc::clone(&buffer);
        let task = tokio::spawn(async move {
            while let Some(chunk) = subscription.recv().await {
                lock(&sink).push_str(&chunk.text);
            }
        });
        Self { buffer, task }
    }

    /// Everything captured so far
    pub fn contents(&self) -> String {
        lock(&self.buffer).clone()
    }

    pub fn clear(&self) {
        lock(&self.buffer).clear();
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        self.task.abort();
    }
}
