//! Task runner integration tests
//!
//! Lints and compiles real stylesheet projects in a temporary workspace
//! through the registered tasks.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stylebuild::build::progress::TaskStatus;
use stylebuild::build::{
    register_stylesheet_tasks, BuildContext, NullProgress, RegistryError, TaskRegistry,
    DEFAULT_TASK,
};
use stylebuild::config::{load_config_file, merge_cli_overrides, CliOverrides};
use stylebuild::watch::{triggered_tasks, watch_rules};

const CONFIG: &str = r#"
[workspace]
name = "design-system"

[[project]]
id = "core"
cwd = "packages/core"

[project.sass]

[[project]]
id = "docs"
cwd = "packages/docs"

[project.sass]
dests = ["dist"]
watch_variables = false

[variables]
project = "core"
sources = ["src/_colors.scss"]
dests = ["lib"]
"#;

const COLORS: &str = "$accent: #137cbd;\n";

const BROKEN: (&str, &str) =
    ("packages/core/src/broken.scss", ".broken {\n    color: $missing;\n}\n");

const BUTTON: &str = r#"@import "colors";

.pt-button {
    color: $accent;
}
"#;

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

struct Fixture {
    temp: TempDir,
    ctx: BuildContext,
    registry: TaskRegistry,
}

impl Fixture {
    fn new(extra: &[(&str, &str)]) -> Self {
        Self::with_overrides(extra, &CliOverrides::default())
    }

    fn with_overrides(extra: &[(&str, &str)], overrides: &CliOverrides) -> Self {
        let temp = TempDir::new().unwrap();
        let config_path = write(temp.path(), "stylebuild.toml", CONFIG);
        write(temp.path(), "packages/core/src/_colors.scss", COLORS);
        write(temp.path(), "packages/core/src/button.scss", BUTTON);
        write(temp.path(), "packages/docs/src/docs.scss", ".docs {\n    margin: 0;\n}\n");
        for (rel, content) in extra {
            write(temp.path(), rel, content);
        }

        let mut config = load_config_file(&config_path).unwrap();
        merge_cli_overrides(&mut config, overrides);
        let mut registry = TaskRegistry::new();
        register_stylesheet_tasks(&mut registry, &config).unwrap();
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        Self { temp, ctx, registry }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }
}

#[test]
fn test_default_task_lints_and_compiles_every_project() {
    let fx = Fixture::new(&[]);

    let result = fx.registry.run(&[DEFAULT_TASK], &fx.ctx, &NullProgress::new()).unwrap();
    assert!(result.is_success(), "{}", result.summary());

    let css = fs::read_to_string(fx.path("packages/core/build/src/button.css")).unwrap();
    assert!(css.contains(".pt-button"));
    assert!(css.contains("#137cbd"));
    assert!(fx.path("packages/core/build/global/button.css").is_file());
    assert!(fx.path("packages/docs/dist/docs.css").is_file());
    assert!(!fx.path("packages/core/build/src/_colors.css").exists());
}

#[test]
fn test_compiled_css_keeps_doc_comments_and_rules() {
    let doc = concat!(
        "/** Documented */\n",
        ".doc {\n    color: #ff0000;\n}\n\n",
        ".doc-alt {\n    color: #ff0000;\n}\n",
    );
    let fx = Fixture::new(&[("packages/core/src/doc.scss", doc)]);

    let result = fx.registry.run(&["sass-compile-core"], &fx.ctx, &NullProgress::new()).unwrap();
    assert!(result.is_success(), "{}", result.summary());

    let css = fs::read_to_string(fx.path("packages/core/build/src/doc.css")).unwrap();
    assert!(css.starts_with("/** Documented */"), "{}", css);
    assert!(css.contains(".doc {"));
    assert!(css.contains(".doc-alt {"));
    assert_eq!(css.matches("#ff0000").count(), 2);
}

#[test]
fn test_lint_failure_skips_compilation() {
    let fx = Fixture::new(&[("packages/core/src/loud.scss", ".loud {\n    color: #FFFFFF;\n}\n")]);

    let result = fx.registry.run(&[DEFAULT_TASK], &fx.ctx, &NullProgress::new()).unwrap();
    assert!(!result.is_success());

    let lint = result.get("sass-lint-core").unwrap();
    assert!(matches!(lint.status, TaskStatus::Failed(_)));
    assert_eq!(result.get("sass-compile-core").unwrap().status, TaskStatus::Skipped);
    assert!(!fx.path("packages/core/build").exists());
}

#[test]
fn test_dev_lint_reports_without_failing() {
    let fx = Fixture::new(&[("packages/core/src/loud.scss", ".loud {\n    color: #FFFFFF;\n}\n")]);

    let result = fx.registry.run(&["sass-lint-w-core"], &fx.ctx, &NullProgress::new()).unwrap();
    assert!(result.is_success());

    let warnings = &result.get("sass-lint-w-core").unwrap().warnings;
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("color-hex-case"));
    assert!(warnings[0].contains("loud.scss:2:"));
}

#[test]
fn test_strict_compile_error_writes_nothing() {
    let fx = Fixture::new(&[BROKEN]);

    let result = fx.registry.run(&["sass-compile-core"], &fx.ctx, &NullProgress::new()).unwrap();
    let compile = result.get("sass-compile-core").unwrap();
    match &compile.status {
        TaskStatus::Failed(message) => assert!(message.contains("broken.scss")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!fx.path("packages/core/build/src/button.css").exists());
}

#[test]
fn test_dev_compile_skips_broken_stylesheet() {
    let fx = Fixture::new(&[BROKEN]);

    let result = fx.registry.run(&["sass-compile-w-core"], &fx.ctx, &NullProgress::new()).unwrap();
    assert!(result.is_success());

    let compile = result.get("sass-compile-w-core").unwrap();
    assert_eq!(compile.warnings.len(), 1);
    assert!(compile.reload);
    assert!(fx.path("packages/core/build/src/button.css").is_file());
    assert!(!fx.path("packages/core/build/src/broken.css").exists());
}

#[test]
fn test_watch_group_exports_variables_when_enabled() {
    let fx = Fixture::new(&[]);

    let core = fx.registry.execution_order(&["sass-watch-core"]).unwrap();
    assert_eq!(core, vec!["sass-compile-w-core", "sass-variables", "sass-watch-core"]);

    let docs = fx.registry.execution_order(&["sass-watch-docs"]).unwrap();
    assert_eq!(docs, vec!["sass-compile-w-docs", "sass-watch-docs"]);

    let result = fx.registry.run(&["sass-watch-core"], &fx.ctx, &NullProgress::new()).unwrap();
    assert!(result.is_success(), "{}", result.summary());
    assert!(result.reload_requested());
    assert!(fx.path("packages/core/lib/variables.less").is_file());
}

#[test]
fn test_changed_stylesheet_triggers_its_project_watch_task() {
    let fx = Fixture::new(&[]);
    let rules = watch_rules(&fx.ctx).unwrap();

    let tasks = triggered_tasks(&rules, &[fx.path("packages/docs/src/docs.scss")]);
    assert_eq!(tasks, vec!["sass-watch-docs".to_string()]);

    let tasks = triggered_tasks(&rules, &[fx.path("packages/core/build/src/button.css")]);
    assert!(tasks.is_empty());
}

#[test]
fn test_project_filter_drops_other_projects_tasks() {
    let overrides =
        CliOverrides { projects: Some(vec!["docs".to_string()]), ..CliOverrides::default() };
    let fx = Fixture::with_overrides(&[], &overrides);

    assert!(fx.registry.contains("sass-lint-docs"));
    assert!(!fx.registry.contains("sass-lint-core"));

    let result = fx.registry.run(&["sass-compile"], &fx.ctx, &NullProgress::new()).unwrap();
    assert!(result.is_success(), "{}", result.summary());
    assert!(fx.path("packages/docs/dist/docs.css").is_file());
    assert!(!fx.path("packages/core/build").exists());
}

#[test]
fn test_unknown_task_is_rejected_before_running() {
    let fx = Fixture::new(&[]);

    let err = fx
        .registry
        .run(&["sass-lint-core", "publish"], &fx.ctx, &NullProgress::new())
        .unwrap_err();
    assert_eq!(err, RegistryError::UnknownTask { name: "publish".to_string(), required_by: None });
    assert!(!fx.path("packages/core/build").exists());
}
