//! Error chain and per-subsystem error types.
//!
//! [`Error`] is a linked, timestamped chain of failure information: each node
//! carries a message, an optional cause, and a set of free-form details/parameters
//! a caller can attach while propagating a failure up the stack. The cache, pool,
//! and task modules each expose their own
//! `thiserror`-derived enum (`CacheError`, `PoolError`, `TaskError`, `TaskGroupError`)
//! so call sites can match on a concrete failure kind; those enums carry an [`Error`]
//! chain as their source when the failure needs to preserve an inner cause.

use std::fmt;
use std::time::SystemTime;

thread_local! {
    static FORCE_STACK_TRACE: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// A node in a singly linked chain of failure information.
///
/// # Examples
///
/// ```
/// use warehouse_core::error::Error;
///
/// let cause = Error::new("disk full");
/// let err = Error::new("failed to write cache entry").with_cause(cause);
/// assert!(err.to_string().contains("disk full"));
/// ```
#[derive(Debug, Clone)]
pub struct Error {
    timestamp: SystemTime,
    location: &'static std::panic::Location<'static>,
    message: String,
    details: Vec<String>,
    parameters: Vec<(String, String)>,
    cause: Option<Box<Error>>,
    logging_disabled: bool,
    stack_trace_disabled: bool,
}

impl Error {
    /// Creates a new chain root with no cause.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            location: std::panic::Location::caller(),
            message: message.into(),
            details: Vec::new(),
            parameters: Vec::new(),
            cause: None,
            logging_disabled: false,
            stack_trace_disabled: false,
        }
    }

    /// Wraps a foreign [`std::error::Error`] as the cause, recording its type name so
    /// diagnostics identify what actually failed even after wrapping.
    #[track_caller]
    pub fn trace<E: std::error::Error>(message: impl Into<String>, source: E) -> Self {
        let cause = Error::new(source.to_string()).with_detail(std::any::type_name::<E>());
        Self::new(message).with_cause(cause)
    }

    /// Attaches `cause` as the previous link in the chain.
    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn with_details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.extend(details.into_iter().map(Into::into));
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn disable_logging(mut self) -> Self {
        self.logging_disabled = true;
        self
    }

    pub fn disable_stack_trace(mut self) -> Self {
        self.stack_trace_disabled = true;
        self
    }

    /// Like [`Error::disable_stack_trace`] but propagates the flag onto every node
    /// already present in the cause chain.
    pub fn disable_stack_trace_recursive(mut self) -> Self {
        self.stack_trace_disabled = true;
        if let Some(cause) = self.cause.take() {
            self.cause = Some(Box::new(cause.disable_stack_trace_recursive()));
        }
        self
    }

    pub fn logging_disabled(&self) -> bool {
        self.logging_disabled
    }

    pub fn stack_trace_disabled(&self) -> bool {
        self.stack_trace_disabled && !self.has_added_info() && !Self::force_stack_trace_active()
    }

    fn has_added_info(&self) -> bool {
        !self.details.is_empty() || !self.parameters.is_empty()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Temporarily forces full rendering of `stack_trace_disabled` nodes on the
    /// current thread for the life of the returned guard.
    pub fn force_stack_trace() -> ForceStackTraceGuard {
        let previous = FORCE_STACK_TRACE.with(|f| f.replace(true));
        ForceStackTraceGuard { previous }
    }

    fn force_stack_trace_active() -> bool {
        FORCE_STACK_TRACE.with(|f| f.get())
    }

    fn render_node(&self, out: &mut String) {
        out.push_str(&self.message);
        out.push_str(&format!(
            " [{} {}:{}]",
            self.location.file(),
            self.location.line(),
            self.location.column()
        ));
        if self.stack_trace_disabled() {
            return;
        }
        for detail in &self.details {
            out.push_str("\n    detail: ");
            out.push_str(detail);
        }
        for (name, value) in &self.parameters {
            out.push_str("\n    param: ");
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
    }

    /// Renders the chain deepest-cause-last, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut node = Some(self);
        let mut first = true;
        while let Some(e) = node {
            if !first {
                out.push('\n');
            }
            first = false;
            e.render_node(&mut out);
            node = e.cause.as_deref();
        }
        out
    }

    /// Same sections as [`Error::render`], as an HTML fragment.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"error-chain\">");
        let mut node = Some(self);
        while let Some(e) = node {
            out.push_str("<div class=\"error-node\"><p class=\"message\">");
            out.push_str(&html_escape(&e.message));
            out.push_str("</p>");
            if !e.stack_trace_disabled() {
                if !e.details.is_empty() {
                    out.push_str("<ul class=\"details\">");
                    for d in &e.details {
                        out.push_str("<li>");
                        out.push_str(&html_escape(d));
                        out.push_str("</li>");
                    }
                    out.push_str("</ul>");
                }
                if !e.parameters.is_empty() {
                    out.push_str("<ul class=\"parameters\">");
                    for (name, value) in &e.parameters {
                        out.push_str("<li>");
                        out.push_str(&html_escape(name));
                        out.push('=');
                        out.push_str(&html_escape(value));
                        out.push_str("</li>");
                    }
                    out.push_str("</ul>");
                }
            }
            out.push_str("</div>");
            node = e.cause.as_deref();
        }
        out.push_str("</div>");
        out
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Restores the previous force-stack-trace state on drop.
pub struct ForceStackTraceGuard {
    previous: bool,
}

impl Drop for ForceStackTraceGuard {
    fn drop(&mut self) {
        FORCE_STACK_TRACE.with(|f| f.set(self.previous));
    }
}

/// Failure kinds raised by [`crate::cache`] and [`crate::cache::file`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("value is too large to ever fit in this cache (capacity {capacity}, size {size})")]
    CacheFull { capacity: usize, size: usize },

    #[error("cache I/O failure: {0}")]
    Io(#[source] Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failure kinds raised by [`crate::pool`].
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("timed out waiting for a pool item")]
    Timeout,

    #[error("pool has been shut down")]
    Shutdown,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("pool item factory failed: {0}")]
    Factory(#[source] Error),
}

/// Failure kinds raised by [`crate::task`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    #[error("task was cancelled")]
    Interrupted,

    #[error("task '{name}' failed: {cause}")]
    Failed { name: String, cause: Error },
}

/// Failure kinds raised by [`crate::task::group`].
#[derive(Debug, thiserror::Error)]
pub enum TaskGroupError {
    #[error("{0} task(s) in the group failed")]
    Failed(usize),
}
