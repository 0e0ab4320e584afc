//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod tasks;
mod variables;
mod watch;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::build::{
    register_stylesheet_tasks, BuildContext, ConsoleProgress, JsonProgress, NullProgress,
    ProgressReporter, TaskRegistry,
};
use crate::config::{
    default_config, find_config, load_config, merge_cli_overrides, workspace_root, CliOverrides,
};
use crate::logging::{setup_logging, LogFormat};

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// stylebuild - Lint, compile and export workspace stylesheets
#[derive(Parser)]
#[command(name = "stylebuild")]
#[command(about = "Lint, compile and export workspace stylesheets")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to stylebuild.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Task progress output
    #[arg(long, value_enum, default_value_t = ProgressKind::Console, global = true)]
    pub progress: ProgressKind,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Task progress output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressKind {
    Console,
    Json,
    None,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run named tasks and their prerequisites (default: sass)
    Run {
        /// Task names
        tasks: Vec<String>,
    },

    /// Export variables.scss and variables.less
    Variables {
        /// Write to this directory instead of the configured ones (repeatable)
        #[arg(long = "out", value_name = "DIR")]
        out: Vec<PathBuf>,
    },

    /// Lint stylesheets
    Lint {
        /// Only lint these projects (repeatable)
        #[arg(long = "project", value_name = "ID")]
        projects: Vec<String>,

        /// Report problems without failing
        #[arg(long)]
        dev: bool,
    },

    /// Compile stylesheets to CSS
    Compile {
        /// Only compile these projects (repeatable)
        #[arg(long = "project", value_name = "ID")]
        projects: Vec<String>,

        /// Skip stylesheets that fail to compile
        #[arg(long)]
        dev: bool,
    },

    /// List registered tasks
    Tasks {
        /// Show the prerequisite chain of this task instead
        #[arg(long, value_name = "NAME")]
        deps: Option<String>,
    },

    /// Run the watch tasks, then re-run them when stylesheets change
    Watch {
        /// Debounce delay in milliseconds
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u32>,

        /// Keep previous output instead of clearing the screen
        #[arg(long)]
        no_clear: bool,
    },
}

/// A loaded workspace: run context plus every registered task.
pub(crate) struct Workspace {
    pub ctx: BuildContext,
    pub registry: TaskRegistry,
}

/// Find and load the configuration, apply overrides and register tasks.
pub(crate) fn load_workspace(
    global: &GlobalArgs,
    overrides: &CliOverrides,
) -> Result<Workspace, String> {
    let config_path = global.config.clone().or_else(find_config);

    let (mut config, root) = match &config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using config");
            let config =
                load_config(Some(path)).map_err(|e| format!("Error loading config: {}", e))?;
            let root = workspace_root(path)
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(current_dir);
            (config, root)
        }
        None => {
            tracing::info!("no stylebuild.toml found, using defaults");
            (default_config(), current_dir())
        }
    };

    if let Some(ids) = &overrides.projects {
        if let Some(unknown) = ids.iter().find(|id| config.find_project(id).is_none()) {
            return Err(format!("Unknown project '{}'", unknown));
        }
    }
    merge_cli_overrides(&mut config, overrides);

    let mut registry = TaskRegistry::new();
    register_stylesheet_tasks(&mut registry, &config).map_err(|e| e.to_string())?;

    let ctx = BuildContext::new(config, root).with_verbose(global.verbose > 0);
    Ok(Workspace { ctx, registry })
}

pub(crate) fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Progress reporter for the selected output kind.
pub(crate) fn reporter(global: &GlobalArgs) -> Box<dyn ProgressReporter> {
    match global.progress {
        ProgressKind::Console => {
            let colors = !global.no_color && atty::is(atty::Stream::Stderr);
            Box::new(ConsoleProgress::new().with_colors(colors).with_verbose(global.verbose > 0))
        }
        ProgressKind::Json => Box::new(JsonProgress::new()),
        ProgressKind::None => Box::new(NullProgress::new()),
    }
}

/// Entry point for the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format);

    let global = &cli.global;
    match cli.command {
        None => tasks::run_tasks(global, &[]),
        Some(Commands::Run { tasks }) => tasks::run_tasks(global, &tasks),
        Some(Commands::Variables { out }) => variables::run_variables(global, &out),
        Some(Commands::Lint { projects, dev }) => tasks::run_lint(global, projects, dev),
        Some(Commands::Compile { projects, dev }) => tasks::run_compile(global, projects, dev),
        Some(Commands::Tasks { deps }) => tasks::list_tasks(global, deps.as_deref()),
        Some(Commands::Watch { debounce_ms, no_clear }) => {
            let overrides = CliOverrides {
                debounce_ms,
                clear_screen: no_clear.then_some(false),
                ..CliOverrides::default()
            };
            watch::run_watch(global, &overrides)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = ["stylebuild", "run", "sass-lint", "sass-variables", "-vv", "--no-color"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert!(cli.global.no_color);
        match cli.command {
            Some(Commands::Run { tasks }) => assert_eq!(tasks, vec!["sass-lint", "sass-variables"]),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_lint_projects() {
        let args = ["stylebuild", "lint", "--project", "core", "--project", "docs", "--dev"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Lint { projects, dev }) => {
                assert_eq!(projects, vec!["core", "docs"]);
                assert!(dev);
            }
            _ => panic!("expected lint"),
        }
    }

    #[test]
    fn test_parse_progress_and_log_format() {
        let args = ["stylebuild", "--progress", "json", "--log-format", "json", "watch"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.global.progress, ProgressKind::Json);
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert!(matches!(
            cli.command,
            Some(Commands::Watch { debounce_ms: None, no_clear: false })
        ));
    }

    #[test]
    fn test_parse_watch_options() {
        let args = ["stylebuild", "watch", "--debounce-ms", "250", "--no-clear"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Watch { debounce_ms, no_clear }) => {
                assert_eq!(debounce_ms, Some(250));
                assert!(no_clear);
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["stylebuild"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["stylebuild", "-q", "-v"]).is_err());
    }
}
