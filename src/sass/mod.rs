//! SCSS tooling: discovery, compilation, vendor prefixing and linting.

pub mod autoprefix;
pub mod compile;
pub mod lint;

pub use autoprefix::{parse_browser_query, Autoprefixer, Browser, BrowserQuery};
pub use compile::{compile_project, postprocess, CompileReport, StylesheetCompiler};
pub use lint::{lint_files, LintDiagnostic, LintOptions, LintReport, Linter};

use glob::glob;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Error from a stylesheet step.
#[derive(Debug, Error)]
pub enum SassError {
    /// Browser query not understood
    #[error("invalid browser query '{query}': {reason}")]
    BrowserQuery { query: String, reason: String },
    /// The Sass compiler rejected a file
    #[error("{}: {message}", .file.display())]
    Compile { file: PathBuf, message: String },
    /// The compiled CSS could not be prefixed
    #[error("{}: prefixing failed: {message}", .file.display())]
    Prefix { file: PathBuf, message: String },
    /// Lint found problems and the run is strict
    #[error("{count} stylelint problem(s) found")]
    Lint { count: usize },
    /// Invalid glob pattern
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    /// A stylesheet could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Compiled CSS could not be written
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A partial is a stylesheet whose file name starts with `_`; it is only
/// ever imported, never compiled on its own.
pub fn is_partial(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('_'))
}

/// Find every `*.scss` under `src_dir`, sorted.
pub fn discover_stylesheets(
    src_dir: &Path,
    include_partials: bool,
) -> Result<Vec<PathBuf>, SassError> {
    let full_pattern = src_dir.join("**").join("*.scss");
    let pattern = full_pattern.to_string_lossy().into_owned();

    let paths =
        glob(&pattern).map_err(|source| SassError::Pattern { pattern: pattern.clone(), source })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() && (include_partials || !is_partial(&path)) {
                    files.push(path);
                }
            }
            Err(e) => warn!("error reading path: {}", e),
        }
    }

    files.sort();
    Ok(files)
}
