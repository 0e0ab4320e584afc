//! Configuration loading and discovery for `stylebuild.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{
    AutoprefixerConfig, LintConfig, ProjectConfig, ProjectSassConfig, SassConfig, StyleConfig,
    WatchConfig, WorkspaceConfig,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "stylebuild.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse stylebuild.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", bullet_list(.0))]
    Validation(Vec<String>),
}

fn bullet_list(issues: &[String]) -> String {
    issues.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n")
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Restrict stylesheet tasks to these project ids
    pub projects: Option<Vec<String>>,
    /// Override variable bundle destinations
    pub variables_dests: Option<Vec<PathBuf>>,
    /// Override watch debounce delay
    pub debounce_ms: Option<u32>,
    /// Override screen clearing in watch mode
    pub clear_screen: Option<bool>,
}

/// Find stylebuild.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for stylebuild.toml
/// 2. Check XDG_CONFIG_HOME/stylebuild/stylebuild.toml (or ~/.config/stylebuild/stylebuild.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find stylebuild.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("stylebuild").join(CONFIG_FILE_NAME);
    config_path.exists().then_some(config_path)
}

/// Find stylebuild.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a stylebuild.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("packages/stylebuild.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<StyleConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => {
            debug!("no {} found, using defaults", CONFIG_FILE_NAME);
            Ok(default_config())
        }
    }
}

/// Load configuration from a specific file path.
pub fn load_config_file(path: &Path) -> Result<StyleConfig, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str) -> Result<StyleConfig, ConfigError> {
    let config: StyleConfig = toml::from_str(contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no stylebuild.toml is found.
///
/// The workspace is named after the current directory and holds a single
/// project rooted there, with stylesheets under `src/`.
pub fn default_config() -> StyleConfig {
    let workspace_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    StyleConfig {
        workspace: WorkspaceConfig { name: workspace_name.clone() },
        projects: vec![ProjectConfig {
            id: workspace_name,
            cwd: PathBuf::from("."),
            sass: Some(ProjectSassConfig::default()),
        }],
        sass: SassConfig::default(),
        autoprefixer: AutoprefixerConfig::default(),
        lint: LintConfig::default(),
        variables: None,
        watch: WatchConfig::default(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. A project filter
/// only removes `sass` blocks; the projects stay so that `[variables]` can
/// still resolve its project directory.
pub fn merge_cli_overrides(config: &mut StyleConfig, overrides: &CliOverrides) {
    if let Some(ref ids) = overrides.projects {
        for project in &mut config.projects {
            if !ids.iter().any(|id| *id == project.id) {
                project.sass = None;
            }
        }
    }

    if let Some(ref dests) = overrides.variables_dests {
        if let Some(variables) = config.variables.as_mut() {
            variables.dests = dests.clone();
        }
    }

    if let Some(debounce) = overrides.debounce_ms {
        config.watch.debounce_ms = debounce;
    }

    if let Some(clear) = overrides.clear_screen {
        config.watch.clear_screen = clear;
    }
}

/// Get the workspace root directory from a config path.
///
/// Returns the parent directory of the stylebuild.toml file.
pub fn workspace_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to a root directory.
///
/// If the path is absolute, returns it unchanged. Otherwise, joins it with the root.
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::VariablesConfig;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    fn test_find_config_from_current_dir() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(temp.path(), "[workspace]\nname = \"test\"\n");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(temp.path(), "[workspace]\nname = \"test\"\n");

        let subdir = temp.path().join("packages").join("core");
        fs::create_dir_all(&subdir).unwrap();

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("empty");
        fs::create_dir_all(&subdir).unwrap();

        let found = find_config_from(subdir);
        if let Some(path) = found {
            assert!(!path.starts_with(temp.path()));
        }
    }

    #[test]
    fn test_load_config_file() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            r#"
[workspace]
name = "blueprint"

[[project]]
id = "core"
cwd = "packages/core"

[project.sass]

[variables]
project = "core"
sources = ["src/common/_colors.scss"]
"#,
        );

        let config = load_config(Some(&config_path)).unwrap();
        assert_eq!(config.workspace.name, "blueprint");
        assert_eq!(config.projects[0].id, "core");
        assert_eq!(config.variables.unwrap().dests.len(), 2);
    }

    #[test]
    fn test_load_config_parse_error() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(temp.path(), "[workspace\nname = ");

        let err = load_config(Some(&config_path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(temp.path(), "[workspace]\nname = \"\"\n");

        let err = load_config(Some(&config_path)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("workspace.name"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/stylebuild.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert!(!config.workspace.name.is_empty());
        assert_eq!(config.projects.len(), 1);
        assert!(config.projects[0].sass.is_some());
        assert!(config.variables.is_none());
        assert!(config.is_valid());
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = default_config();
        config.projects.push(ProjectConfig {
            id: "docs".to_string(),
            cwd: PathBuf::from("docs"),
            sass: Some(ProjectSassConfig::default()),
        });
        let first = config.projects[0].id.clone();
        config.variables = Some(VariablesConfig {
            project: first.clone(),
            sources: vec![PathBuf::from("_colors.scss")],
            dests: vec![PathBuf::from("build/src")],
            header: None,
            depends_on: vec![],
        });

        let overrides = CliOverrides {
            projects: Some(vec!["docs".to_string()]),
            variables_dests: Some(vec![PathBuf::from("out")]),
            debounce_ms: Some(500),
            clear_screen: Some(false),
        };

        merge_cli_overrides(&mut config, &overrides);

        assert!(config.find_project(&first).unwrap().sass.is_none());
        assert!(config.find_project("docs").unwrap().sass.is_some());
        assert_eq!(config.variables.unwrap().dests, vec![PathBuf::from("out")]);
        assert_eq!(config.watch.debounce_ms, 500);
        assert!(!config.watch.clear_screen);
    }

    #[test]
    fn test_merge_cli_overrides_empty() {
        let mut config = default_config();
        let before = config.projects[0].sass.is_some();
        merge_cli_overrides(&mut config, &CliOverrides::default());
        assert_eq!(config.projects[0].sass.is_some(), before);
        assert_eq!(config.watch.debounce_ms, 100);
    }

    #[test]
    fn test_workspace_root() {
        let root = workspace_root(Path::new("/home/user/site/stylebuild.toml"));
        assert_eq!(root, Some(Path::new("/home/user/site")));
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/home/user/site");
        assert_eq!(
            resolve_path(root, Path::new("packages/core")),
            PathBuf::from("/home/user/site/packages/core")
        );
        assert_eq!(
            resolve_path(root, Path::new("/absolute/path")),
            PathBuf::from("/absolute/path")
        );
    }

    #[test]
    #[serial]
    fn test_find_xdg_config() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("stylebuild");
        fs::create_dir_all(&dir).unwrap();
        write_config(&dir, "[workspace]\nname = \"global\"\n");

        let previous = env::var_os("XDG_CONFIG_HOME");
        env::set_var("XDG_CONFIG_HOME", temp.path());
        let found = find_xdg_config();
        match previous {
            Some(value) => env::set_var("XDG_CONFIG_HOME", value),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }

        assert_eq!(found, Some(dir.join(CONFIG_FILE_NAME)));
    }

    #[test]
    #[serial]
    fn test_find_xdg_config_missing() {
        let temp = TempDir::new().unwrap();

        let previous = env::var_os("XDG_CONFIG_HOME");
        env::set_var("XDG_CONFIG_HOME", temp.path());
        let found = find_xdg_config();
        match previous {
            Some(value) => env::set_var("XDG_CONFIG_HOME", value),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }

        assert!(found.is_none());
    }
}
