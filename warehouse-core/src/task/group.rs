use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::{TaskError, TaskGroupError};
use crate::task::task::{CancellationToken, Task};

const DEFAULT_MAX_PARALLEL_TASKS: usize = 30;
const DEFAULT_MAX_EXCEPTIONS: usize = 100;

struct State {
    active: HashMap<u64, Task>,
    completed_ids: VecDeque<u64>,
    exceptions: VecDeque<(String, TaskError)>,
    failed_count: usize,
    stopped: bool,
    stop_on_error: bool,
}

struct Inner {
    max_parallel_tasks: usize,
    max_exceptions: usize,
    state: Mutex<State>,
    condvar: Condvar,
    on_task_ended: RwLock<Vec<Box<dyn Fn(&str) + Send + Sync>>>,
    on_task_error: RwLock<Vec<Box<dyn Fn(&str, &TaskError) + Send + Sync>>>,
}

/// A bounded-parallelism collection of [`Task`]s with failure aggregation.
///
/// `add` blocks while the group is already running `max_parallel_tasks`
/// tasks; `wait` drains every task (running registered callbacks as each one
/// finishes) and reports how many failed.
///
/// # Examples
///
/// ```
/// use warehouse_core::task::TaskGroup;
///
/// let group = TaskGroup::new(4);
/// for i in 0..3 {
///     group.add(format!("job-{i}"), move |_token| Ok(()));
/// }
/// assert!(group.wait().is_ok());
/// ```
pub struct TaskGroup {
    inner: Arc<Inner>,
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARALLEL_TASKS)
    }
}

impl Clone for TaskGroup {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl TaskGroup {
    pub fn new(max_parallel_tasks: usize) -> Self {
        Self::with_limits(max_parallel_tasks, DEFAULT_MAX_EXCEPTIONS)
    }

    pub fn with_limits(max_parallel_tasks: usize, max_exceptions: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_parallel_tasks: max_parallel_tasks.max(1),
                max_exceptions: max_exceptions.max(1),
                state: Mutex::new(State {
                    active: HashMap::new(),
                    completed_ids: VecDeque::new(),
                    exceptions: VecDeque::new(),
                    failed_count: 0,
                    stopped: false,
                    stop_on_error: false,
                }),
                condvar: Condvar::new(),
                on_task_ended: RwLock::new(Vec::new()),
                on_task_error: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn set_stop_on_error(&self, enabled: bool) {
        self.inner.state.lock().stop_on_error = enabled;
    }

    pub fn on_task_ended(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.inner.on_task_ended.write().push(Box::new(callback));
    }

    pub fn on_task_error(&self, callback: impl Fn(&str, &TaskError) + Send + Sync + 'static) {
        self.inner.on_task_error.write().push(Box::new(callback));
    }

    /// Registers `work` as a new task, blocking until a slot is free. A no-op
    /// once [`TaskGroup::stop`] has been called.
    pub fn add<F>(&self, name: impl Into<String>, work: F)
    where
        F: FnOnce(&CancellationToken) -> Result<(), TaskError> + Send + 'static,
    {
        let name = name.into();
        let mut guard = self.inner.state.lock();
        loop {
            if guard.stopped {
                return;
            }
            if guard.active.len() < self.inner.max_parallel_tasks {
                break;
            }
            self.inner.condvar.wait(&mut guard);
        }

        let inner = Arc::clone(&self.inner);
        let task = Task::spawn_with_notify(name, work, move |id, _status| {
            let mut guard = inner.state.lock();
            guard.completed_ids.push_back(id);
            inner.condvar.notify_all();
        });
        guard.active.insert(task.id(), task);
    }

    /// Blocks until either no task remains active or a task has already
    /// finished, processes one finished task's outcome, and returns whether
    /// any task (active or completed) remains.
    pub fn wait_some(&self) -> bool {
        let (_id, task) = {
            let mut guard = self.inner.state.lock();
            loop {
                if guard.active.is_empty() && guard.completed_ids.is_empty() {
                    return false;
                }
                if let Some(id) = guard.completed_ids.pop_front() {
                    let task = guard.active.remove(&id);
                    break (id, task);
                }
                self.inner.condvar.wait(&mut guard);
            }
        };

        let Some(task) = task else {
            return true; // defensive: id already reaped
        };

        let name = task.name().to_string();
        match task.wait() {
            Ok(()) => {
                for cb in self.inner.on_task_ended.read().iter() {
                    cb(&name);
                }
            }
            Err(e) => {
                self.record_failure(&name, e.clone());
                for cb in self.inner.on_task_error.read().iter() {
                    cb(&name, &e);
                }
            }
        }
        self.inner.condvar.notify_all();
        true
    }

    fn record_failure(&self, name: &str, error: TaskError) {
        let mut guard = self.inner.state.lock();
        guard.exceptions.push_back((name.to_string(), error));
        if guard.exceptions.len() > self.inner.max_exceptions {
            guard.exceptions.pop_front();
        }
        guard.failed_count += 1;
        if guard.stop_on_error && !guard.stopped {
            guard.stopped = true;
            for task in guard.active.values() {
                task.cancel();
            }
        }
    }

    /// Drains every task, dispatching callbacks as each one finishes.
    /// Fails with the number of failures observed if any task failed.
    pub fn wait(&self) -> Result<(), TaskGroupError> {
        while self.wait_some() {}
        let failed = self.inner.state.lock().failed_count;
        if failed > 0 {
            Err(TaskGroupError::Failed(failed))
        } else {
            Ok(())
        }
    }

    /// Cancels every active task and refuses further `add` calls. Idempotent.
    pub fn stop(&self) {
        let mut guard = self.inner.state.lock();
        if guard.stopped {
            return;
        }
        guard.stopped = true;
        for task in guard.active.values() {
            task.cancel();
        }
        drop(guard);
        self.inner.condvar.notify_all();
    }

    pub fn exception_info(&self) -> Vec<(String, TaskError)> {
        self.inner.state.lock().exceptions.iter().cloned().collect()
    }

    pub fn take_exception_info(&self) -> Vec<(String, TaskError)> {
        let mut guard = self.inner.state.lock();
        guard.failed_count = 0;
        guard.exceptions.drain(..).collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn all_successful_tasks_wait_cleanly() {
        let group = TaskGroup::new(2);
        let completed = Arc::new(AtomicUsize::new(0));
        for i in 0..5 {
            let completed = Arc::clone(&completed);
            group.add(format!("t{i}"), move |_| {
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert!(group.wait().is_ok());
        assert_eq!(completed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn add_blocks_at_parallelism_limit() {
        let group = TaskGroup::new(1);
        let first_running = Arc::new(std::sync::Barrier::new(2));
        let fr = Arc::clone(&first_running);
        group.add("slow", move |_| {
            fr.wait();
            std::thread::sleep(Duration::from_millis(50));
            Ok(())
        });
        first_running.wait();
        assert_eq!(group.active_count(), 1);
        group.add("fast", |_| Ok(()));
        assert!(group.wait().is_ok());
    }

    #[test]
    fn failures_are_aggregated_and_reported() {
        let group = TaskGroup::new(4);
        group.add("ok", |_| Ok(()));
        group.add("bad", |_| {
            Err(TaskError::Failed {
                name: "bad".to_string(),
                cause: crate::error::Error::new("broke"),
            })
        });
        let result = group.wait();
        assert!(matches!(result, Err(TaskGroupError::Failed(1))));
        assert_eq!(group.exception_info().len(), 1);
    }

    #[test]
    fn stop_on_error_cancels_remaining_active_tasks() {
        let group = TaskGroup::new(4);
        group.set_stop_on_error(true);
        let cancelled = Arc::new(AtomicUsize::new(0));
        let c1 = Arc::clone(&cancelled);
        group.add("long-runner", move |token| {
            for _ in 0..100 {
                if token.is_cancelled() {
                    c1.fetch_add(1, Ordering::SeqCst);
                    return Err(TaskError::Interrupted);
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        });
        group.add("fails-fast", |_| {
            Err(TaskError::Failed {
                name: "fails-fast".to_string(),
                cause: crate::error::Error::new("boom"),
            })
        });
        let _ = group.wait();
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_task_ended_callback_fires() {
        let group = TaskGroup::new(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        group.on_task_ended(move |name| seen2.lock().push(name.to_string()));
        group.add("job", |_| Ok(()));
        group.wait().unwrap();
        assert_eq!(*seen.lock(), vec!["job".to_string()]);
    }

    #[test]
    fn stop_prevents_further_additions() {
        let group = TaskGroup::new(4);
        group.stop();
        group.add("dropped", |_| Ok(()));
        assert_eq!(group.active_count(), 0);
        assert!(group.wait().is_ok());
    }
}
