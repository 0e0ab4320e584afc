//! Task run progress reporting.
//!
//! Reporters receive [`ProgressEvent`]s from the task runner and render them
//! for a human (colored console lines) or a machine (one JSON object per
//! line).
//!
//! # Example
//!
//! ```ignore
//! use stylebuild::build::progress::{ConsoleProgress, ProgressEvent, ProgressReporter, TaskStatus};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::RunStarted { total_tasks: 3 });
//! reporter.report(ProgressEvent::TaskCompleted {
//!     task: "sass-variables".to_string(),
//!     status: TaskStatus::Success,
//!     duration_ms: 42,
//! });
//! ```

use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Status of a task in progress events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task body ran and succeeded
    Success,
    /// Task was not run because an earlier task failed
    Skipped,
    /// Task body returned an error
    Failed(String),
}

impl TaskStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Failed(e) => write!(f, "failed: {}", e),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Events reported during a task run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    RunStarted {
        /// Number of tasks in execution order
        total_tasks: usize,
    },
    /// A task started
    TaskStarted { task: String },
    /// A task finished
    TaskCompleted {
        task: String,
        status: TaskStatus,
        duration_ms: u64,
    },
    /// Run finished
    RunCompleted {
        success: bool,
        duration_ms: u64,
        succeeded: usize,
        skipped: usize,
        failed: usize,
    },
    /// A task produced a warning
    Warning { task: Option<String>, message: String },
    /// An error outside of a task body
    Error { task: Option<String>, message: String },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    current: AtomicUsize,
    total: AtomicUsize,
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a console reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console reporter that writes to a custom output, without colors.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }

    fn prefixed(task: Option<String>, message: &str) -> String {
        match task {
            Some(task) => format!("{}: {}", task, message),
            None => message.to_string(),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { total_tasks } => {
                self.total.store(total_tasks, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if self.verbose {
                    self.writeln(&format!(
                        "{} Running {} task{}...",
                        self.cyan("[run]"),
                        total_tasks,
                        if total_tasks == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::TaskStarted { task } => {
                let current = self.current.load(Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);
                self.writeln(&format!(
                    "{} [{}/{}] Starting '{}'...",
                    self.cyan("[run]"),
                    current,
                    total,
                    task
                ));
            }
            ProgressEvent::TaskCompleted { task, status, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    TaskStatus::Success => self.green("Finished"),
                    TaskStatus::Skipped => self.yellow("Skipped"),
                    TaskStatus::Failed(_) => self.red("FAILED"),
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} '{}' after {}",
                    self.cyan("[run]"),
                    current,
                    total,
                    status_str,
                    task,
                    format_duration(duration_ms)
                ));

                if let TaskStatus::Failed(err) = status {
                    for line in err.lines() {
                        self.writeln(&format!("        {}", self.red(line)));
                    }
                }
            }
            ProgressEvent::RunCompleted { success, duration_ms, succeeded, skipped, failed } => {
                let duration_str = format_duration(duration_ms);
                if success {
                    self.writeln(&format!(
                        "{} {} task{} in {}",
                        self.green("[done]"),
                        succeeded,
                        if succeeded == 1 { "" } else { "s" },
                        duration_str
                    ));
                } else {
                    self.writeln(&format!(
                        "{} Run failed: {} succeeded, {} skipped, {} {} in {}",
                        self.red("[error]"),
                        succeeded,
                        skipped,
                        failed,
                        if failed == 1 { "failure" } else { "failures" },
                        duration_str
                    ));
                }
            }
            ProgressEvent::Warning { task, message } => {
                let line = Self::prefixed(task, &message);
                self.writeln(&format!("{} {}", self.yellow("[warn]"), line));
            }
            ProgressEvent::Error { task, message } => {
                let line = Self::prefixed(task, &message);
                self.writeln(&format!("{} {}", self.red("[error]"), line));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON-lines progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a JSON reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: &serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::RunStarted { total_tasks } => {
                json!({ "event": "run_started", "total_tasks": total_tasks })
            }
            ProgressEvent::TaskStarted { task } => json!({ "event": "task_started", "task": task }),
            ProgressEvent::TaskCompleted { task, status, duration_ms } => {
                let mut value = json!({
                    "event": "task_completed",
                    "task": task,
                    "status": status.as_str(),
                    "duration_ms": duration_ms,
                });
                if let TaskStatus::Failed(e) = status {
                    value["error"] = json!(e);
                }
                value
            }
            ProgressEvent::RunCompleted { success, duration_ms, succeeded, skipped, failed } => {
                json!({
                    "event": "run_completed",
                    "success": success,
                    "duration_ms": duration_ms,
                    "succeeded": succeeded,
                    "skipped": skipped,
                    "failed": failed,
                })
            }
            ProgressEvent::Warning { task, message } => {
                json!({ "event": "warning", "message": message, "task": task })
            }
            ProgressEvent::Error { task, message } => {
                json!({ "event": "error", "message": message, "task": task })
            }
        };
        self.write_json(&value);
    }
}

/// Aggregates run statistics for the final event.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    start_time: Option<Instant>,
    total: usize,
    succeeded: usize,
    skipped: usize,
    failed: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a run.
    pub fn start(&mut self, total_tasks: usize) {
        *self = Self { start_time: Some(Instant::now()), total: total_tasks, ..Self::default() };
    }

    /// Record a finished task.
    pub fn task_completed(&mut self, status: &TaskStatus) {
        match status {
            TaskStatus::Success => self.succeeded += 1,
            TaskStatus::Skipped => self.skipped += 1,
            TaskStatus::Failed(_) => self.failed += 1,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded + self.skipped + self.failed >= self.total
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Build the `RunCompleted` event from current state.
    pub fn run_completed_event(&self) -> ProgressEvent {
        ProgressEvent::RunCompleted {
            success: self.is_success(),
            duration_ms: self.elapsed().as_millis() as u64,
            succeeded: self.succeeded,
            skipped: self.skipped,
            failed: self.failed,
        }
    }
}

/// Format a duration in milliseconds to a human-readable string.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{} ms", ms)
    } else if ms < 60_000 {
        format!("{:.2} s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{} min {} s", minutes, seconds)
    }
}
