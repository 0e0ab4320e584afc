//! Watch command

use std::process::ExitCode;

use super::{load_workspace, reporter, GlobalArgs, EXIT_ERROR, EXIT_SUCCESS};
use crate::config::CliOverrides;
use crate::watch::{watch_and_run, LogReloadNotifier};

/// Run the watch tasks once, then watch until interrupted.
pub fn run_watch(global: &GlobalArgs, overrides: &CliOverrides) -> ExitCode {
    let workspace = match load_workspace(global, overrides) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    println!("Starting watch mode...");
    println!("Press Ctrl+C to stop");
    println!();

    let reporter = reporter(global);
    let notifier = LogReloadNotifier;
    match watch_and_run(&workspace.registry, &workspace.ctx, reporter.as_ref(), &notifier) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
