use std::thread::{self, JoinHandle};

use boardio_hal::{Error, Result};
use log::{debug, warn};

/// Longest accepted task name in bytes
pub const MAX_TASK_NAME_LEN: usize = 32;

/// Scheduling priority
///
/// Numerically lower values are more urgent. Non-positive priorities are
/// cooperative: such a task is not preempted by other application tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub i32);

impl Priority {
    pub const fn is_cooperative(self) -> bool {
        self.0 <= 0
    }
}

/// Task name and attributes, consumed by [`TaskBuilder::spawn`]
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    name: Option<heapless::String<MAX_TASK_NAME_LEN>>,
    priority: Priority,
    stack_size: usize,
}

impl TaskBuilder {
    pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

    /// Start a builder; names longer than [`MAX_TASK_NAME_LEN`] make
    /// `spawn` fail
    pub fn new(name: &str) -> Self {
        let mut owned = heapless::String::new();
        let name = owned.push_str(name).ok().map(|_| owned);
        Self {
            name,
            priority: Priority::default(),
            stack_size: Self::DEFAULT_STACK_SIZE,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Start a task running `entry`
    ///
    /// The closure owns whatever parameters the task needs.
    pub fn spawn<F>(self, entry: F) -> Result<Task>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = self.name.ok_or(Error::InvalidArgument)?;
        if self.stack_size == 0 {
            return Err(Error::InvalidArgument);
        }
        let handle = thread::Builder::new()
            .name(name.as_str().into())
            .stack_size(self.stack_size)
            .spawn(entry)
            .map_err(|e| {
                warn!("task {} failed to start: {}", name, e);
                Error::Busy
            })?;
        debug!(
            "task {} started (priority {}, stack {} bytes)",
            name, self.priority.0, self.stack_size
        );
        Ok(Task {
            name,
            priority: self.priority,
            handle,
        })
    }
}

/// A running task
#[derive(Debug)]
pub struct Task {
    name: heapless::String<MAX_TASK_NAME_LEN>,
    priority: Priority,
    handle: JoinHandle<()>,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to return; a panicked task reports `Io`
    pub fn join(self) -> Result<()> {
        self.handle.join().map_err(|_| {
            warn!("task {} panicked", self.name);
            Error::Io
        })
    }
}

/// Give up the processor to other ready tasks
pub fn yield_now() {
    thread::yield_now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_spawn_runs_entry_with_captured_params() {
        let hits = Arc::new(AtomicU32::new(0));
        let (a, b, c) = (1u32, 2u32, 3u32);
        let h = Arc::clone(&hits);
        let task = TaskBuilder::new("worker")
            .priority(Priority(5))
            .spawn(move || {
                h.fetch_add(a + b + c, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(task.name(), "worker");
        assert_eq!(task.priority(), Priority(5));
        task.join().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_name_too_long() {
        let name = "x".repeat(MAX_TASK_NAME_LEN + 1);
        assert_eq!(
            TaskBuilder::new(&name).spawn(|| {}).err(),
            Some(Error::InvalidArgument)
        );
        let exact = "y".repeat(MAX_TASK_NAME_LEN);
        TaskBuilder::new(&exact).spawn(|| {}).unwrap().join().unwrap();
    }

    #[test]
    fn test_zero_stack_rejected() {
        assert_eq!(
            TaskBuilder::new("t").stack_size(0).spawn(|| {}).err(),
            Some(Error::InvalidArgument)
        );
    }

    #[test]
    fn test_panicking_task_reports_io() {
        let task = TaskBuilder::new("boom").spawn(|| panic!("boom")).unwrap();
        assert_eq!(task.join(), Err(Error::Io));
    }

    #[test]
    fn test_cooperative_priorities() {
        assert!(Priority(-1).is_cooperative());
        assert!(Priority(0).is_cooperative());
        assert!(!Priority(3).is_cooperative());
    }
}
