//! Task command implementations (run, lint, compile, tasks)

use std::process::ExitCode;

use super::{
    load_workspace, reporter, GlobalArgs, Workspace, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS,
};
use crate::build::tasks::{compile_task_name, lint_task_name};
use crate::build::DEFAULT_TASK;
use crate::config::CliOverrides;

/// Run the given tasks (or the default task) and their prerequisites.
pub fn run_tasks(global: &GlobalArgs, tasks: &[String]) -> ExitCode {
    let workspace = match load_workspace(global, &CliOverrides::default()) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let tasks = if tasks.is_empty() { vec![DEFAULT_TASK.to_string()] } else { tasks.to_vec() };
    execute(global, &workspace, &tasks)
}

/// Lint every (or the selected) sass project.
pub fn run_lint(global: &GlobalArgs, projects: Vec<String>, dev: bool) -> ExitCode {
    run_per_project(global, projects, |id| lint_task_name(id, dev))
}

/// Compile every (or the selected) sass project.
pub fn run_compile(global: &GlobalArgs, projects: Vec<String>, dev: bool) -> ExitCode {
    run_per_project(global, projects, |id| compile_task_name(id, dev))
}

fn run_per_project(
    global: &GlobalArgs,
    projects: Vec<String>,
    task_name: impl Fn(&str) -> String,
) -> ExitCode {
    let overrides = CliOverrides {
        projects: if projects.is_empty() { None } else { Some(projects) },
        ..CliOverrides::default()
    };
    let workspace = match load_workspace(global, &overrides) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let tasks: Vec<String> =
        workspace.ctx.config().sass_projects().map(|p| task_name(&p.id)).collect();
    if tasks.is_empty() {
        eprintln!("No projects with a sass configuration");
        return ExitCode::from(EXIT_ERROR);
    }
    execute(global, &workspace, &tasks)
}

fn execute(global: &GlobalArgs, workspace: &Workspace, tasks: &[String]) -> ExitCode {
    let reporter = reporter(global);
    match workspace.registry.run(tasks, &workspace.ctx, reporter.as_ref()) {
        Ok(result) if result.is_success() => ExitCode::from(EXIT_SUCCESS),
        Ok(_) => ExitCode::from(EXIT_ERROR),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_INVALID_ARGS)
        }
    }
}

/// Print the registered tasks, or one task's prerequisite chain.
pub fn list_tasks(global: &GlobalArgs, deps: Option<&str>) -> ExitCode {
    let workspace = match load_workspace(global, &CliOverrides::default()) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let registry = &workspace.registry;

    match deps {
        Some(name) => match registry.prerequisites(name) {
            Ok(chain) => {
                for task in chain {
                    println!("{}", task);
                }
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_INVALID_ARGS)
            }
        },
        None => {
            for name in registry.names() {
                match registry.dependencies(name) {
                    Some(d) if !d.is_empty() => println!("{} -> {}", name, d.join(", ")),
                    _ => println!("{}", name),
                }
            }
            ExitCode::from(EXIT_SUCCESS)
        }
    }
}
