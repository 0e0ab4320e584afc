//! Watch mode: re-run stylesheet tasks when their sources change.
//!
//! Each sass project contributes a [`WatchRule`] mapping its stylesheets to
//! its `sass-watch-<id>` task. Changes are debounced, mapped to the tasks
//! they trigger and run through the task registry. A failing run is reported
//! and watching continues.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::build::tasks::watch_task_name;
use crate::build::{BuildContext, ProgressReporter, RegistryError, RunResult, TaskRegistry};

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", .path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// Invalid watch pattern
    #[error("Invalid watch pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    /// A watched task cannot be scheduled
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// None of the watched directories exist
    #[error("Nothing to watch: no stylesheet source directory exists")]
    NothingToWatch,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Glob patterns and the tasks a matching change triggers.
///
/// A pattern starting with `!` excludes paths. A path matches when some
/// positive pattern matches it and no negative pattern does.
#[derive(Debug, Clone)]
pub struct WatchRule {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    pub tasks: Vec<String>,
}

impl WatchRule {
    pub fn new<S: AsRef<str>>(patterns: &[S], tasks: Vec<String>) -> Result<Self, WatchError> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let (negated, glob) = match pattern.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pattern),
            };
            let compiled = Pattern::new(glob)
                .map_err(|source| WatchError::Pattern { pattern: pattern.to_string(), source })?;
            if negated {
                exclude.push(compiled);
            } else {
                include.push(compiled);
            }
        }
        Ok(Self { include, exclude, tasks })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.include.iter().any(|p| p.matches_path_with(path, MATCH_OPTIONS))
            && !self.exclude.iter().any(|p| p.matches_path_with(path, MATCH_OPTIONS))
    }

    /// Directories to watch: the literal prefix of each positive pattern.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.include.iter().map(|p| literal_prefix(p.as_str())).collect()
    }
}

fn literal_prefix(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in Path::new(pattern).components() {
        if let Component::Normal(part) = component {
            if part.to_string_lossy().contains(['*', '?', '[']) {
                break;
            }
        }
        root.push(component);
    }
    root
}

/// One rule per sass project:
/// `<cwd>/<src>/**/*.scss`, excluding `<cwd>/<src>/**/generated/*.scss`,
/// triggers `sass-watch-<id>`.
pub fn watch_rules(ctx: &BuildContext) -> Result<Vec<WatchRule>, WatchError> {
    ctx.config()
        .sass_projects()
        .map(|project| {
            let src = ctx.project_src_dir(project);
            let patterns = [
                src.join("**").join("*.scss").to_string_lossy().into_owned(),
                format!("!{}", src.join("**").join("generated").join("*.scss").display()),
            ];
            WatchRule::new(&patterns, vec![watch_task_name(&project.id)])
        })
        .collect()
}

/// Tasks triggered by `paths`, in rule order, each once.
pub fn triggered_tasks(rules: &[WatchRule], paths: &[PathBuf]) -> Vec<String> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .filter(|rule| paths.iter().any(|p| rule.matches(p)))
        .flat_map(|rule| rule.tasks.iter())
        .filter(|task| seen.insert(task.as_str()))
        .cloned()
        .collect()
}

/// Receives reload requests after a successful run that wrote stylesheets.
pub trait ReloadNotifier {
    fn reload(&self, paths: &[PathBuf]);
}

/// Logs reload requests.
#[derive(Debug, Default)]
pub struct LogReloadNotifier;

impl ReloadNotifier for LogReloadNotifier {
    fn reload(&self, paths: &[PathBuf]) {
        info!(files = paths.len(), "reload requested");
    }
}

/// Tracks failing tasks across runs to report recoveries.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    failing: HashSet<String>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run; returns the tasks that failed last time and succeeded now.
    pub fn update(&mut self, result: &RunResult) -> Vec<String> {
        let mut fixed = Vec::new();
        for task in &result.tasks {
            if task.is_failure() {
                self.failing.insert(task.task.clone());
            } else if task.is_success() && self.failing.remove(&task.task) {
                fixed.push(task.task.clone());
            }
        }
        fixed
    }

    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Clear the terminal screen
fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Current UTC time of day for log lines
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Run `tasks` once, report recoveries and forward reload requests.
pub fn run_cycle(
    registry: &TaskRegistry,
    tasks: &[String],
    ctx: &BuildContext,
    reporter: &dyn ProgressReporter,
    tracker: &mut ErrorTracker,
    notifier: &dyn ReloadNotifier,
) -> Result<RunResult, RegistryError> {
    let result = registry.run(tasks, ctx, reporter)?;

    for task in tracker.update(&result) {
        println!("[{}] Fixed: {}", timestamp(), task);
    }

    if result.reload_requested() {
        let outputs: Vec<PathBuf> = result.all_outputs().into_iter().cloned().collect();
        notifier.reload(&outputs);
    }

    if !result.is_success() {
        warn!("{}", result.summary());
    }
    Ok(result)
}

/// Run every watch task once, then re-run the triggered tasks on change.
///
/// Blocks until the watcher channel closes.
pub fn watch_and_run(
    registry: &TaskRegistry,
    ctx: &BuildContext,
    reporter: &dyn ProgressReporter,
    notifier: &dyn ReloadNotifier,
) -> Result<(), WatchError> {
    let rules = watch_rules(ctx)?;
    let all_tasks: Vec<String> = rules.iter().flat_map(|r| r.tasks.iter().cloned()).collect();
    registry.execution_order(&all_tasks)?;

    let watch_config = &ctx.config().watch;
    let (tx, rx) = channel();
    let debounce = Duration::from_millis(u64::from(watch_config.debounce_ms));
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;

    let mut watched = 0;
    for root in rules.iter().flat_map(WatchRule::roots).collect::<HashSet<_>>() {
        if !root.exists() {
            warn!(path = %root.display(), "watch directory does not exist");
            continue;
        }
        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: root.clone(), source })?;
        watched += 1;
    }
    if watched == 0 {
        return Err(WatchError::NothingToWatch);
    }

    let mut tracker = ErrorTracker::new();

    if watch_config.clear_screen {
        clear_screen();
    }
    run_cycle(registry, &all_tasks, ctx, reporter, &mut tracker, notifier)?;
    let noun = if watched == 1 { "directory" } else { "directories" };
    println!("[{}] Watching {} {} for changes...", timestamp(), watched, noun);

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .collect();

                let tasks = triggered_tasks(&rules, &changed);
                if tasks.is_empty() {
                    continue;
                }

                for path in changed.iter().filter(|p| rules.iter().any(|r| r.matches(p))) {
                    println!("[{}] Changed: {}", timestamp(), path.display());
                }
                if watch_config.clear_screen {
                    clear_screen();
                }
                if let Err(e) = run_cycle(registry, &tasks, ctx, reporter, &mut tracker, notifier) {
                    error!("{}", e);
                }
            }
            Ok(Err(e)) => {
                warn!("watch error: {:?}", e);
            }
            Err(e) => return Err(WatchError::ChannelError(e.to_string())),
        }
    }
}
