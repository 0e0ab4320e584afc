//! Task run result types.

use super::progress::TaskStatus;
use std::path::PathBuf;
use std::time::Duration;

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: String,
    pub status: TaskStatus,
    /// Files written by the task
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
    pub warnings: Vec<String>,
    /// The task asked connected browsers to reload
    pub reload: bool,
}

impl TaskResult {
    pub fn success(task: String, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self {
            task,
            status: TaskStatus::Success,
            outputs,
            duration,
            warnings: vec![],
            reload: false,
        }
    }

    /// A task not reached because an earlier one failed.
    pub fn skipped(task: String) -> Self {
        Self {
            task,
            status: TaskStatus::Skipped,
            outputs: vec![],
            duration: Duration::ZERO,
            warnings: vec![],
            reload: false,
        }
    }

    pub fn failed(task: String, error: String, duration: Duration) -> Self {
        Self {
            task,
            status: TaskStatus::Failed(error),
            outputs: vec![],
            duration,
            warnings: vec![],
            reload: false,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, TaskStatus::Failed(_))
    }
}

/// Result of a complete run, in execution order.
#[derive(Debug, Default)]
pub struct RunResult {
    pub tasks: Vec<TaskResult>,
    pub total_duration: Duration,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    pub fn success_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.is_success()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status == TaskStatus::Skipped).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.is_failure()).count()
    }

    /// No task failed.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Look up a task's result by name.
    pub fn get(&self, task: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task == task)
    }

    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    pub fn all_warnings(&self) -> Vec<&String> {
        self.tasks.iter().flat_map(|r| r.warnings.iter()).collect()
    }

    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| r.is_failure()).collect()
    }

    /// Any successful task requested a reload.
    pub fn reload_requested(&self) -> bool {
        self.tasks.iter().any(|r| r.reload && r.is_success())
    }

    /// Format a summary of the run.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.tasks.len();

        if failed > 0 {
            lines.push(format!(
                "Run failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for task in self.failures() {
                lines.push(format!("  - {}: {}", task.task, task.status));
            }
        } else {
            lines.push(format!("Run succeeded: {} tasks in {:?}", success, self.total_duration));
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}):", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_result_counts() {
        let mut result = RunResult::new();
        result.add_result(TaskResult::success("a".to_string(), vec![], Duration::ZERO));
        result.add_result(TaskResult::failed("b".to_string(), "error".to_string(), Duration::ZERO));
        result.add_result(TaskResult::skipped("c".to_string()));

        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert!(!result.is_success());
        assert_eq!(result.get("b").unwrap().status, TaskStatus::Failed("error".to_string()));
    }

    #[test]
    fn test_reload_only_from_successful_tasks() {
        let mut result = RunResult::new();
        result.add_result(
            TaskResult::failed("a".to_string(), "e".to_string(), Duration::ZERO).with_reload(true),
        );
        assert!(!result.reload_requested());

        let reloading = TaskResult::success("b".to_string(), vec![], Duration::ZERO);
        result.add_result(reloading.with_reload(true));
        assert!(result.reload_requested());
    }

    #[test]
    fn test_outputs_and_warnings() {
        let mut result = RunResult::new();
        result.add_result(
            TaskResult::success("a".to_string(), vec![PathBuf::from("a.css")], Duration::ZERO)
                .with_warnings(vec!["w1".to_string()]),
        );
        result.add_result(TaskResult::success(
            "b".to_string(),
            vec![PathBuf::from("b.css"), PathBuf::from("c.css")],
            Duration::ZERO,
        ));

        assert_eq!(result.all_outputs().len(), 3);
        assert_eq!(result.all_warnings(), vec!["w1"]);
    }

    #[test]
    fn test_summary() {
        let mut result = RunResult::new();
        result.add_result(TaskResult::success("sass".to_string(), vec![], Duration::ZERO));
        assert!(result.summary().starts_with("Run succeeded: 1 tasks"));

        let failed =
            TaskResult::failed("sass-lint".to_string(), "2 problems".to_string(), Duration::ZERO);
        result.add_result(failed);
        let summary = result.summary();
        assert!(summary.contains("Run failed"));
        assert!(summary.contains("  - sass-lint: failed: 2 problems"));
    }
}
