//! Configuration schema types for `stylebuild.toml`
//!
//! Defines the structure and validation rules for a stylesheet workspace:
//! the projects whose SCSS is linted and compiled, the shared compile and
//! lint settings, and the variable bundle export.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::sass::autoprefix::parse_browser_query;

/// Workspace metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace name (required)
    pub name: String,
}

/// Per-project `sass` block. A project without one has no stylesheet tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSassConfig {
    /// Output directories, overriding `[sass].dests` for this project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dests: Option<Vec<PathBuf>>,
    /// Re-export the variable bundle when this project's stylesheets change
    #[serde(default = "default_true")]
    pub watch_variables: bool,
}

impl Default for ProjectSassConfig {
    fn default() -> Self {
        Self { dests: None, watch_variables: true }
    }
}

/// A project in the workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Unique project id, used in task names (`sass-compile-<id>`)
    pub id: String,
    /// Project directory, relative to the workspace root
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
    /// Stylesheet settings for this project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sass: Option<ProjectSassConfig>,
}

fn default_cwd() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

/// Shared SCSS compile settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SassConfig {
    /// Stylesheet source directory inside each project
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Output directories inside each project
    #[serde(default = "default_dests")]
    pub dests: Vec<PathBuf>,
    /// Extra `@import` search paths, relative to the workspace root
    #[serde(default)]
    pub load_paths: Vec<PathBuf>,
}

impl Default for SassConfig {
    fn default() -> Self {
        Self { src: default_src(), dests: default_dests(), load_paths: vec![] }
    }
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_dests() -> Vec<PathBuf> {
    vec![PathBuf::from("build/src"), PathBuf::from("build/global")]
}

/// Vendor prefixing targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoprefixerConfig {
    /// Browser queries such as `"Chrome >= 37"`
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

impl Default for AutoprefixerConfig {
    fn default() -> Self {
        Self { browsers: default_browsers() }
    }
}

fn default_browsers() -> Vec<String> {
    ["Chrome >= 37", "Explorer >= 9", "Firefox >= 24", "iOS >= 7", "Safari >= 7"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Syntax the linter parses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LintSyntax {
    /// SCSS (`//` comments allowed)
    #[default]
    Scss,
    /// Plain CSS
    Css,
}

/// Diagnostic output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReporterFormat {
    /// Human-readable, grouped by file
    #[default]
    String,
    /// One JSON array per run
    Json,
}

/// A lint reporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Output format
    #[serde(default)]
    pub formatter: ReporterFormat,
    /// Print to the console
    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self { formatter: ReporterFormat::String, console: true }
    }
}

/// Letter case for hex colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HexCase {
    Lower,
    Upper,
}

/// Lint rule settings. `None` or `false` disables a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintRules {
    /// Maximum consecutive empty lines
    #[serde(default = "default_max_empty_lines")]
    pub max_empty_lines: Option<usize>,
    /// Indentation width in spaces
    #[serde(default = "default_indentation")]
    pub indentation: Option<usize>,
    /// Required case of hex colors
    #[serde(default = "default_hex_case")]
    pub color_hex_case: Option<HexCase>,
    /// Disallow whitespace at end of line
    #[serde(default = "default_true")]
    pub no_eol_whitespace: bool,
    /// Require a final newline
    #[serde(default = "default_true")]
    pub no_missing_end_of_source_newline: bool,
    /// Disallow `{}` blocks
    #[serde(default = "default_true")]
    pub block_no_empty: bool,
}

impl Default for LintRules {
    fn default() -> Self {
        Self {
            max_empty_lines: default_max_empty_lines(),
            indentation: default_indentation(),
            color_hex_case: default_hex_case(),
            no_eol_whitespace: true,
            no_missing_end_of_source_newline: true,
            block_no_empty: true,
        }
    }
}

fn default_max_empty_lines() -> Option<usize> {
    Some(1)
}

fn default_indentation() -> Option<usize> {
    Some(4)
}

fn default_hex_case() -> Option<HexCase> {
    Some(HexCase::Lower)
}

/// Stylesheet lint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintConfig {
    /// Input syntax
    #[serde(default)]
    pub syntax: LintSyntax,
    /// Where and how diagnostics are printed
    #[serde(default = "default_reporters")]
    pub reporters: Vec<ReporterConfig>,
    /// Rule settings
    #[serde(default)]
    pub rules: LintRules,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            syntax: LintSyntax::default(),
            reporters: default_reporters(),
            rules: LintRules::default(),
        }
    }
}

fn default_reporters() -> Vec<ReporterConfig> {
    vec![ReporterConfig::default()]
}

/// Variable bundle export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariablesConfig {
    /// Project whose directory the paths below are relative to
    pub project: String,
    /// Variable files, concatenated in this order
    pub sources: Vec<PathBuf>,
    /// Output directories
    #[serde(default = "default_dests")]
    pub dests: Vec<PathBuf>,
    /// License header text; a built-in header is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Tasks that must run before the export (e.g. icon generation)
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default = "default_true")]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: true }
    }
}

/// Complete stylebuild.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Workspace metadata (required)
    pub workspace: WorkspaceConfig,
    /// Projects
    #[serde(default, rename = "project")]
    pub projects: Vec<ProjectConfig>,
    /// Shared compile settings
    #[serde(default)]
    pub sass: SassConfig,
    /// Prefixing targets
    #[serde(default)]
    pub autoprefixer: AutoprefixerConfig,
    /// Lint settings
    #[serde(default)]
    pub lint: LintConfig,
    /// Variable export, if the workspace publishes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<VariablesConfig>,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "variables.sources")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stylebuild.toml: '{}' {}", self.field, self.message)
    }
}

impl StyleConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: &str| {
            errors.push(ConfigValidationError { field, message: message.to_string() });
        };

        if self.workspace.name.is_empty() {
            push("workspace.name".to_string(), "must be a non-empty string");
        }

        let mut seen = HashSet::new();
        for (i, project) in self.projects.iter().enumerate() {
            if project.id.is_empty() {
                push(format!("project[{}].id", i), "must be a non-empty string");
            } else if !seen.insert(project.id.as_str()) {
                push(format!("project[{}].id", i), "must be unique");
            }
            if let Some(dests) = project.sass.as_ref().and_then(|s| s.dests.as_ref()) {
                if dests.is_empty() {
                    push(
                        format!("project[{}].sass.dests", i),
                        "must contain at least one directory",
                    );
                }
            }
        }

        if self.sass.dests.is_empty() {
            push("sass.dests".to_string(), "must contain at least one directory");
        }

        for (i, query) in self.autoprefixer.browsers.iter().enumerate() {
            if parse_browser_query(query).is_err() {
                push(format!("autoprefixer.browsers[{}]", i), "is not a recognized browser query");
            }
        }

        if self.lint.rules.indentation == Some(0) {
            push("lint.rules.indentation".to_string(), "must be a positive integer");
        }

        if let Some(variables) = &self.variables {
            if self.find_project(&variables.project).is_none() {
                push("variables.project".to_string(), "must name a configured project");
            }
            if variables.sources.is_empty() {
                push("variables.sources".to_string(), "must contain at least one file");
            }
            if variables.dests.is_empty() {
                push("variables.dests".to_string(), "must contain at least one directory");
            }
        }

        if self.watch.debounce_ms == 0 {
            push("watch.debounce_ms".to_string(), "must be a positive integer");
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Look up a project by id
    pub fn find_project(&self, id: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Projects that have a `sass` block
    pub fn sass_projects(&self) -> impl Iterator<Item = &ProjectConfig> {
        self.projects.iter().filter(|p| p.sass.is_some())
    }

    /// Output directories for a project (project override or shared default)
    pub fn effective_dests<'a>(&'a self, project: &'a ProjectConfig) -> &'a [PathBuf] {
        project
            .sass
            .as_ref()
            .and_then(|s| s.dests.as_deref())
            .unwrap_or(&self.sass.dests)
    }
}
