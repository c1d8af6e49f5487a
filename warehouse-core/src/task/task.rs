use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::TaskError;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// A cooperative cancellation flag shared between a [`Task`] and its work closure.
///
/// Rust has no built-in thread interruption, so cancellation here is advisory:
/// the work closure must poll [`CancellationToken::interruption_point`] (or
/// [`CancellationToken::is_cancelled`]) at points of its own choosing.
#[derive(Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(TaskError::Interrupted)` if cancellation has been requested.
    pub fn interruption_point(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    NotStarted,
    Active,
    Ok,
    Failed,
    Interrupted,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Ok | TaskStatus::Failed | TaskStatus::Interrupted)
    }
}

/// A single cancellable unit of work running on its own thread.
///
/// # Examples
///
/// ```
/// use warehouse_core::task::Task;
///
/// let task = Task::spawn("greet", |_token| Ok(()));
/// task.wait().unwrap();
/// assert!(task.ended());
/// ```
pub struct Task {
    id: u64,
    name: String,
    token: CancellationToken,
    status: Arc<Mutex<TaskStatus>>,
    failure: Arc<Mutex<Option<TaskError>>>,
    done: Arc<(Mutex<bool>, Condvar)>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Task {
    /// Starts `work` immediately on a dedicated thread.
    pub fn spawn<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> Result<(), TaskError> + Send + 'static,
    {
        Self::spawn_with_notify(name, work, |_, _| {})
    }

    /// Like [`Task::spawn`], but invokes `on_done(id, status)` right after the
    /// terminal status and any captured failure are written, and before the
    /// task thread exits — used by [`crate::task::group::TaskGroup`] to post
    /// completions without missing a wakeup.
    pub(crate) fn spawn_with_notify<F, N>(name: impl Into<String>, work: F, on_done: N) -> Self
    where
        F: FnOnce(&CancellationToken) -> Result<(), TaskError> + Send + 'static,
        N: FnOnce(u64, TaskStatus) + Send + 'static,
    {
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        let name = name.into();
        let token = CancellationToken::new();
        let status = Arc::new(Mutex::new(TaskStatus::NotStarted));
        let failure = Arc::new(Mutex::new(None));
        let done = Arc::new((Mutex::new(false), Condvar::new()));

        let thread_token = token.clone();
        let thread_status = Arc::clone(&status);
        let thread_failure = Arc::clone(&failure);
        let thread_done = Arc::clone(&done);

        *thread_status.lock() = TaskStatus::Active;

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| work(&thread_token)));
                let final_status = match result {
                    Ok(Ok(())) => TaskStatus::Ok,
                    Ok(Err(TaskError::Interrupted)) => TaskStatus::Interrupted,
                    Ok(Err(e)) => {
                        *thread_failure.lock() = Some(e);
                        TaskStatus::Failed
                    }
                    Err(panic) => {
                        let message = panic_message(&panic);
                        *thread_failure.lock() = Some(TaskError::Failed {
                            name: "panic".to_string(),
                            cause: crate::error::Error::new(message),
                        });
                        TaskStatus::Failed
                    }
                };
                *thread_status.lock() = final_status;

                on_done(id, final_status);

                let (lock, cvar) = &*thread_done;
                *lock.lock() = true;
                cvar.notify_all();
            })
            .expect("failed to spawn task thread");

        Self {
            id,
            name,
            token,
            status,
            failure,
            done,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        *self.status.lock()
    }

    pub fn ended(&self) -> bool {
        self.status().is_terminal()
    }

    /// Requests cooperative cancellation; has no effect once the task has ended.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Blocks until the task ends, then re-raises any captured failure.
    pub fn wait(&self) -> Result<(), TaskError> {
        let (lock, cvar) = &*self.done;
        let mut done = lock.lock();
        if !*done {
            cvar.wait_while(&mut done, |d| !*d);
        }
        drop(done);
        self.join_thread();
        self.outcome()
    }

    /// `None` if still running; otherwise the same result as [`Task::wait`].
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), TaskError>> {
        let (lock, cvar) = &*self.done;
        let mut done = lock.lock();
        if !*done {
            let result = cvar.wait_for(&mut done, timeout);
            if result.timed_out() && !*done {
                return None;
            }
        }
        drop(done);
        self.join_thread();
        Some(self.outcome())
    }

    fn outcome(&self) -> Result<(), TaskError> {
        match &*self.failure.lock() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn join_thread(&self) {
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        if let Some(e) = self.failure.lock().take() {
            tracing::warn!(task = %self.name, error = %e, "task dropped with an unhandled failure");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
