//! Stylesheet task definitions.
//!
//! For every project with a `sass` block this registers:
//!
//! | task                   | body                                        |
//! |------------------------|---------------------------------------------|
//! | `sass-lint-<id>`       | lint all stylesheets, fail on problems      |
//! | `sass-lint-w-<id>`     | lint all stylesheets, report only           |
//! | `sass-compile-<id>`    | compile entry stylesheets, fail on errors   |
//! | `sass-compile-w-<id>`  | compile entry stylesheets, skip bad files   |
//! | `sass-watch-<id>`      | group: compile-w (+ `sass-variables`)       |
//!
//! plus the `sass-lint`, `sass-compile` and `sass` aggregates and, when the
//! workspace has a `[variables]` section, `sass-variables`.

use super::context::BuildContext;
use super::registry::{RegistryError, TaskError, TaskOutput, TaskRegistry};
use crate::config::{ProjectConfig, StyleConfig};
use crate::sass::{
    compile_project, discover_stylesheets, lint_files, Autoprefixer, LintOptions,
    StylesheetCompiler,
};
use crate::variables::VariableExport;
use tracing::info;

/// Default task for `stylebuild run`.
pub const DEFAULT_TASK: &str = "sass";
pub const VARIABLES_TASK: &str = "sass-variables";

pub fn lint_task_name(id: &str, dev_mode: bool) -> String {
    if dev_mode {
        format!("sass-lint-w-{}", id)
    } else {
        format!("sass-lint-{}", id)
    }
}

pub fn compile_task_name(id: &str, dev_mode: bool) -> String {
    if dev_mode {
        format!("sass-compile-w-{}", id)
    } else {
        format!("sass-compile-{}", id)
    }
}

pub fn watch_task_name(id: &str) -> String {
    format!("sass-watch-{}", id)
}

/// Register every stylesheet task for `config`.
pub fn register_stylesheet_tasks(
    registry: &mut TaskRegistry,
    config: &StyleConfig,
) -> Result<(), RegistryError> {
    let mut lint_all = Vec::new();
    let mut compile_all = Vec::new();

    for project in config.sass_projects() {
        let id = project.id.as_str();
        for dev_mode in [false, true] {
            let lint = lint_action(id.to_string(), dev_mode);
            registry.register(lint_task_name(id, dev_mode), vec![], lint)?;
            let compile = compile_action(id.to_string(), dev_mode);
            registry.register(compile_task_name(id, dev_mode), vec![], compile)?;
        }
        lint_all.push(lint_task_name(id, false));
        compile_all.push(compile_task_name(id, false));

        let mut watch_deps = vec![compile_task_name(id, true)];
        let watch_variables = project.sass.as_ref().is_some_and(|s| s.watch_variables);
        if watch_variables && config.variables.is_some() {
            watch_deps.push(VARIABLES_TASK.to_string());
        }
        registry.register_group(watch_task_name(id), watch_deps)?;
    }

    registry.register_group("sass-lint", lint_all)?;
    registry.register_group("sass-compile", compile_all)?;
    registry
        .register_group(DEFAULT_TASK, vec!["sass-lint".to_string(), "sass-compile".to_string()])?;

    if let Some(variables) = &config.variables {
        registry.register(VARIABLES_TASK, variables.depends_on.clone(), |ctx| {
            let output = variable_export(ctx)?.run()?;
            Ok(TaskOutput::with_outputs(output.written))
        })?;
    }

    Ok(())
}

fn find_project<'a>(ctx: &'a BuildContext, id: &str) -> Result<&'a ProjectConfig, TaskError> {
    ctx.config()
        .find_project(id)
        .filter(|p| p.sass.is_some())
        .ok_or_else(|| TaskError::Message(format!("project '{}' has no sass configuration", id)))
}

fn lint_action(
    id: String,
    dev_mode: bool,
) -> impl Fn(&BuildContext) -> Result<TaskOutput, TaskError> + Send + Sync {
    move |ctx| {
        let project = find_project(ctx, &id)?;
        let files = discover_stylesheets(&ctx.project_src_dir(project), true)?;
        let options = LintOptions::from_config(&ctx.config().lint, dev_mode);

        let report = lint_files(&files, &options)?;
        info!("{}: {} stylesheets linted", id, report.files);

        let warnings = report
            .diagnostics
            .iter()
            .map(|d| {
                format!("{}:{}:{}: {} ({})", d.file.display(), d.line, d.column, d.message, d.rule)
            })
            .collect();
        Ok(TaskOutput { warnings, ..TaskOutput::default() })
    }
}

fn compile_action(
    id: String,
    dev_mode: bool,
) -> impl Fn(&BuildContext) -> Result<TaskOutput, TaskError> + Send + Sync {
    move |ctx| {
        let project = find_project(ctx, &id)?;
        let prefixer = Autoprefixer::new(&ctx.config().autoprefixer.browsers)?;
        let src_dir = ctx.project_src_dir(project);
        let mut load_paths = vec![src_dir.clone()];
        load_paths.extend(ctx.load_paths());
        let compiler = StylesheetCompiler::new(load_paths, prefixer);

        let dests = ctx.project_dests(project);
        let report = compile_project(&compiler, &src_dir, &dests, dev_mode)?;
        info!("{}: {} stylesheets written", id, report.written.len());

        Ok(TaskOutput {
            outputs: report.written,
            warnings: report.failures.iter().map(ToString::to_string).collect(),
            reload: true,
        })
    }
}

/// Build the variable export job from the `[variables]` section, with paths
/// resolved against the variables project directory.
pub fn variable_export(ctx: &BuildContext) -> Result<VariableExport, TaskError> {
    let variables = ctx
        .config()
        .variables
        .as_ref()
        .ok_or_else(|| TaskError::Message("no [variables] section configured".to_string()))?;

    let resolve = |paths: &[std::path::PathBuf]| {
        paths.iter().map(|p| ctx.resolve_in_project(&variables.project, p)).collect::<Vec<_>>()
    };

    let export = VariableExport::new(resolve(&variables.sources), resolve(&variables.dests));
    Ok(match &variables.header {
        Some(header) => export.with_header(header.clone()),
        None => export,
    })
}
