//! Ordered, deduplicated queue of pending tasks

use crate::types::Task;
use std::sync::{Arc, Mutex, MutexGuard};

/// Position of the running task within the sorted queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePosition {
    /// 1-based rank in priority order
    Rank(usize),
    /// The task is not (or no longer) queued, e.g. a "run now" task
    NotQueued,
}

impl QueuePosition {
    /// Rank for display; a task outside the queue counts as the first
    pub fn display_rank(self) -> usize {
        match self {
            Self::Rank(rank) => rank,
            Self::NotQueued => 1,
        }
    }
}

/// Pending tasks in arrival order.
///
/// At most one task per id. Reads in priority order use a stable sort, so
/// equal priorities keep arrival order.
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    tasks: Vec<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task, replacing any queued task with the same id.
    ///
    /// A replaced task loses its arrival slot and moves to the back.
    pub fn enqueue(&mut self, task: Task) {
        if self.remove(&task.id).is_some() {
            log::debug!("Replacing queued task {}", task.id);
        }
        self.tasks.push(task);
    }

    /// Tasks sorted by ascending priority, without removing them
    pub fn sorted(&self) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by_key(|t| t.priority);
        tasks
    }

    /// Take every task, sorted by ascending priority
    pub fn dequeue_all_sorted(&mut self) -> Vec<Task> {
        let mut tasks = std::mem::take(&mut self.tasks);
        tasks.sort_by_key(|t| t.priority);
        tasks
    }

    /// Remove a task by id, returning it if it was queued
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Rank of `current_id` in priority order
    pub fn progress(&self, current_id: &str) -> QueuePosition {
        self.sorted()
            .iter()
            .position(|t| t.id == current_id)
            .map_or(QueuePosition::NotQueued, |i| QueuePosition::Rank(i + 1))
    }
}

/// Queue shared between the planner and the coordinator
pub type SharedQueue = Arc<Mutex<TaskQueue>>;

/// Create an empty shared queue
pub fn shared() -> SharedQueue {
    Arc::new(Mutex::new(TaskQueue::new()))
}

/// Lock a shared queue, recovering from poisoning
pub fn lock(queue: &SharedQueue) -> MutexGuard<'_, TaskQueue> {
    match queue.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: i32) -> Task {
        Task::new(id, priority, true, id, "", format!("echo {id}"))
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_priority_ordering() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task("five", 5));
        queue.enqueue(task("one", 1));
        queue.enqueue(task("three", 3));

        assert_eq!(ids(&queue.dequeue_all_sorted()), vec!["one", "three", "five"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task("a", 2));
        queue.enqueue(task("b", 2));
        queue.enqueue(task("first", 0));

        assert_eq!(ids(&queue.sorted()), vec!["first", "a", "b"]);
    }

    #[test]
    fn test_enqueue_replaces_same_id() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task("reconcile:package", 8));
        let mut latest = task("reconcile:package", 8);
        latest.script = "pacman --noconfirm -S vim\n".to_string();
        queue.enqueue(latest);

        assert_eq!(queue.count(), 1);
        assert_eq!(
            queue.find_by_id("reconcile:package").unwrap().script,
            "pacman --noconfirm -S vim\n"
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task("a", 1));
        queue.enqueue(task("b", 1));

        assert_eq!(queue.remove("a").map(|t| t.id), Some("a".to_string()));
        assert!(queue.remove("a").is_none());
        assert!(!queue.contains("a"));
        assert!(queue.contains("b"));

        queue.clear();
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn test_progress() {
        let mut queue = TaskQueue::new();
        queue.enqueue(task("late", 9));
        queue.enqueue(task("early", 1));

        assert_eq!(queue.progress("early"), QueuePosition::Rank(1));
        assert_eq!(queue.progress("late"), QueuePosition::Rank(2));
        assert_eq!(queue.progress("gone"), QueuePosition::NotQueued);
        assert_eq!(queue.progress("gone").display_rank(), 1);
    }
}
