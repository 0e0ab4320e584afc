//! Named task registry with dependency ordering.
//!
//! Tasks are registered by name with the names of the tasks that must run
//! before them. Running a set of root tasks executes the transitive
//! dependency closure once each, dependencies first, and stops at the first
//! failure.

use super::context::BuildContext;
use super::progress::{ProgressEvent, ProgressReporter, ProgressTracker, TaskStatus};
use super::result::{RunResult, TaskResult};
use crate::sass::SassError;
use crate::variables::ExportError;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// What a task body produced.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Problems that did not fail the task
    pub warnings: Vec<String>,
    /// Ask connected browsers to reload
    pub reload: bool,
}

impl TaskOutput {
    pub fn with_outputs(outputs: Vec<PathBuf>) -> Self {
        Self { outputs, ..Self::default() }
    }
}

/// Error returned by a task body.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Sass(#[from] SassError),
    #[error("{0}")]
    Message(String),
}

/// Error in the task graph itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task '{0}' is already registered")]
    DuplicateTask(String),
    #[error("task '{name}' is not registered{}", required_by_suffix(.required_by))]
    UnknownTask { name: String, required_by: Option<String> },
    #[error("circular dependency detected involving task '{0}'")]
    CyclicDependency(String),
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    required_by.as_ref().map(|r| format!(" (required by '{}')", r)).unwrap_or_default()
}

/// A task body.
pub type TaskAction = Box<dyn Fn(&BuildContext) -> Result<TaskOutput, TaskError> + Send + Sync>;

struct Task {
    name: String,
    dependencies: Vec<String>,
    action: Option<TaskAction>,
}

/// Registry of named tasks.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry").field("tasks", &self.names()).finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with a body.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        dependencies: Vec<String>,
        action: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&BuildContext) -> Result<TaskOutput, TaskError> + Send + Sync + 'static,
    {
        self.insert(name.into(), dependencies, Some(Box::new(action)))
    }

    /// Register a task that only groups its dependencies.
    pub fn register_group(
        &mut self,
        name: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Result<(), RegistryError> {
        self.insert(name.into(), dependencies, None)
    }

    fn insert(
        &mut self,
        name: String,
        dependencies: Vec<String>,
        action: Option<TaskAction>,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTask(name));
        }
        self.index.insert(name.clone(), self.tasks.len());
        self.tasks.push(Task { name, dependencies, action });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered task names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// Direct dependencies of a task.
    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(|t| t.dependencies.as_slice())
    }

    fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// Tasks to run for `roots`, dependencies before dependents, each once.
    pub fn execution_order<S: AsRef<str>>(&self, roots: &[S]) -> Result<Vec<&str>, RegistryError> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for root in roots {
            self.visit(root.as_ref(), None, &mut visited, &mut visiting, &mut result)?;
        }

        Ok(result)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        required_by: Option<&str>,
        visited: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        result: &mut Vec<&'a str>,
    ) -> Result<(), RegistryError> {
        let task = self.get(name).ok_or_else(|| RegistryError::UnknownTask {
            name: name.to_string(),
            required_by: required_by.map(str::to_string),
        })?;
        let name = task.name.as_str();

        if visited.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name) {
            return Err(RegistryError::CyclicDependency(name.to_string()));
        }

        for dep in &task.dependencies {
            self.visit(dep, Some(name), visited, visiting, result)?;
        }

        visiting.remove(name);
        visited.insert(name);
        result.push(name);
        Ok(())
    }

    /// Transitive prerequisites of `name` in execution order, excluding `name`.
    pub fn prerequisites(&self, name: &str) -> Result<Vec<&str>, RegistryError> {
        let mut order = self.execution_order(&[name])?;
        order.pop();
        Ok(order)
    }

    /// Run `roots` and their prerequisites.
    ///
    /// Graph errors are returned before anything runs. A failing task stops
    /// the run; the tasks after it are recorded as skipped.
    pub fn run<S: AsRef<str>>(
        &self,
        roots: &[S],
        ctx: &BuildContext,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunResult, RegistryError> {
        let order = self.execution_order(roots)?;
        let start = Instant::now();
        let mut tracker = ProgressTracker::new();
        tracker.start(order.len());
        reporter.report(ProgressEvent::RunStarted { total_tasks: order.len() });

        let mut result = RunResult::new();
        let mut failed = false;

        for name in order {
            let task_result = if failed {
                TaskResult::skipped(name.to_string())
            } else {
                self.run_task(name, ctx, reporter)
            };

            failed |= task_result.is_failure();
            tracker.task_completed(&task_result.status);
            if task_result.status == TaskStatus::Skipped {
                reporter.report(ProgressEvent::TaskCompleted {
                    task: name.to_string(),
                    status: TaskStatus::Skipped,
                    duration_ms: 0,
                });
            }
            result.add_result(task_result);
        }

        reporter.report(tracker.run_completed_event());
        let result = result.with_duration(start.elapsed());
        info!(
            succeeded = result.success_count(),
            failed = result.failed_count(),
            skipped = result.skipped_count(),
            "run finished"
        );
        Ok(result)
    }

    fn run_task(
        &self,
        name: &str,
        ctx: &BuildContext,
        reporter: &dyn ProgressReporter,
    ) -> TaskResult {
        reporter.report(ProgressEvent::TaskStarted { task: name.to_string() });
        let start = Instant::now();

        let outcome = match self.get(name).and_then(|t| t.action.as_ref()) {
            Some(action) => action(ctx),
            None => Ok(TaskOutput::default()),
        };
        let duration = start.elapsed();

        let result = match outcome {
            Ok(output) => {
                for warning in &output.warnings {
                    reporter.report(ProgressEvent::Warning {
                        task: Some(name.to_string()),
                        message: warning.clone(),
                    });
                }
                TaskResult::success(name.to_string(), output.outputs, duration)
                    .with_warnings(output.warnings)
                    .with_reload(output.reload)
            }
            Err(e) => TaskResult::failed(name.to_string(), e.to_string(), duration),
        };

        debug!(task = name, status = %result.status, "task finished");
        reporter.report(ProgressEvent::TaskCompleted {
            task: name.to_string(),
            status: result.status.clone(),
            duration_ms: duration.as_millis() as u64,
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::progress::NullProgress;
    use crate::config::default_config;
    use std::sync::{Arc, Mutex};

    fn deps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ctx() -> BuildContext {
        BuildContext::new(default_config(), PathBuf::from("/site"))
    }

    fn recording(
        registry: &mut TaskRegistry,
        log: &Arc<Mutex<Vec<String>>>,
        name: &str,
        on: &[&str],
    ) {
        let log = Arc::clone(log);
        let task = name.to_string();
        registry
            .register(name, deps(on), move |_| {
                log.lock().unwrap().push(task.clone());
                Ok(TaskOutput::default())
            })
            .unwrap();
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = TaskRegistry::new();
        registry.register_group("sass", vec![]).unwrap();
        assert_eq!(
            registry.register_group("sass", vec![]),
            Err(RegistryError::DuplicateTask("sass".to_string()))
        );
        assert!(registry.contains("sass"));
        assert_eq!(registry.names(), vec!["sass"]);
    }

    #[test]
    fn test_execution_order_dependencies_first_once() {
        let mut registry = TaskRegistry::new();
        registry.register_group("icons", vec![]).unwrap();
        registry.register_group("sass-variables", deps(&["icons"])).unwrap();
        registry.register_group("sass-compile-w-core", vec![]).unwrap();
        registry
            .register_group("sass-watch-core", deps(&["sass-compile-w-core", "sass-variables"]))
            .unwrap();

        let order = registry.execution_order(&["sass-watch-core", "sass-variables"]).unwrap();
        assert_eq!(
            order,
            vec!["sass-compile-w-core", "icons", "sass-variables", "sass-watch-core"]
        );
    }

    #[test]
    fn test_unknown_task() {
        let mut registry = TaskRegistry::new();
        registry.register_group("sass-variables", deps(&["icons"])).unwrap();

        let err = registry.execution_order(&["sass-variables"]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownTask {
                name: "icons".to_string(),
                required_by: Some("sass-variables".to_string())
            }
        );
        assert_eq!(
            err.to_string(),
            "task 'icons' is not registered (required by 'sass-variables')"
        );

        let err = registry.execution_order(&["nope"]).unwrap_err();
        assert_eq!(err.to_string(), "task 'nope' is not registered");
    }

    #[test]
    fn test_cycle_detected() {
        let mut registry = TaskRegistry::new();
        registry.register_group("a", deps(&["b"])).unwrap();
        registry.register_group("b", deps(&["a"])).unwrap();
        assert!(matches!(
            registry.execution_order(&["a"]),
            Err(RegistryError::CyclicDependency(_))
        ));
    }

    #[test]
    fn test_prerequisites() {
        let mut registry = TaskRegistry::new();
        registry.register_group("sass-lint", vec![]).unwrap();
        registry.register_group("sass-compile", vec![]).unwrap();
        registry.register_group("sass", deps(&["sass-lint", "sass-compile"])).unwrap();

        assert_eq!(registry.prerequisites("sass").unwrap(), vec!["sass-lint", "sass-compile"]);
        assert!(registry.prerequisites("sass-lint").unwrap().is_empty());
    }

    #[test]
    fn test_run_executes_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        recording(&mut registry, &log, "lint", &[]);
        recording(&mut registry, &log, "compile", &[]);
        registry.register_group("all", deps(&["lint", "compile"])).unwrap();

        let result = registry.run(&["all"], &ctx(), &NullProgress::new()).unwrap();
        assert!(result.is_success());
        assert_eq!(result.tasks.len(), 3);
        assert_eq!(*log.lock().unwrap(), vec!["lint", "compile"]);
    }

    #[test]
    fn test_run_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry
            .register("lint", vec![], |_| Err(TaskError::Message("3 problems".to_string())))
            .unwrap();
        recording(&mut registry, &log, "compile", &[]);
        registry.register_group("all", deps(&["lint", "compile"])).unwrap();

        let result = registry.run(&["all"], &ctx(), &NullProgress::new()).unwrap();
        assert!(!result.is_success());
        assert_eq!(
            result.get("lint").unwrap().status,
            TaskStatus::Failed("3 problems".to_string())
        );
        assert_eq!(result.get("compile").unwrap().status, TaskStatus::Skipped);
        assert_eq!(result.get("all").unwrap().status, TaskStatus::Skipped);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_run_collects_outputs_and_reload() {
        let mut registry = TaskRegistry::new();
        registry
            .register("compile", vec![], |_| {
                Ok(TaskOutput {
                    outputs: vec![PathBuf::from("a.css")],
                    warnings: vec!["bad.scss skipped".to_string()],
                    reload: true,
                })
            })
            .unwrap();

        let result = registry.run(&["compile"], &ctx(), &NullProgress::new()).unwrap();
        assert!(result.reload_requested());
        assert_eq!(result.all_outputs(), vec![&PathBuf::from("a.css")]);
        assert_eq!(result.all_warnings().len(), 1);
    }

    #[test]
    fn test_run_unknown_root_runs_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        recording(&mut registry, &log, "lint", &[]);

        assert!(registry.run(&["lint", "missing"], &ctx(), &NullProgress::new()).is_err());
        assert!(log.lock().unwrap().is_empty());
    }
}
