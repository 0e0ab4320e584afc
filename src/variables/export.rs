//! Export pipeline for `variables.scss` / `variables.less`.

use crate::less::{self, LessError};
use crate::variables::transform::{
    collapse_blank_lines, expand_border_shadow, scss_to_less, strip_block_comments,
    strip_imports_and_line_comments, CommentPolicy,
};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, info_span};

/// File name of the SCSS bundle.
pub const SCSS_FILE_NAME: &str = "variables.scss";

/// File name of the LESS bundle.
pub const LESS_FILE_NAME: &str = "variables.less";

/// License header prepended to both bundles unless the config supplies one.
pub const DEFAULT_HEADER: &str = concat!(
    "/*\n",
    " * Copyright (c) the stylebuild authors. All rights reserved.\n",
    " * Licensed under the MIT License.\n",
    " */\n\n",
);

/// Error during variable export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing to concatenate
    #[error("no variable sources configured")]
    NoSources,
    /// Nowhere to write
    #[error("no destination directories configured")]
    NoDestinations,
    /// A listed source could not be read; nothing was written
    #[error("failed to read variable source {}: {source}", .path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A bundle could not be written
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The generated LESS bundle does not compile
    #[error("variables.less failed to compile at {error}\n{}", excerpt(.text, .error))]
    DialectConversion { error: LessError, text: String },
}

impl ExportError {
    /// The generated LESS text, when the failure was a conversion error.
    pub fn generated_text(&self) -> Option<&str> {
        match self {
            ExportError::DialectConversion { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Quote the offending line with a caret under the failing column.
fn excerpt(text: &str, error: &LessError) -> String {
    let line = text.lines().nth(error.line.saturating_sub(1)).unwrap_or("");
    let caret = " ".repeat(error.column.saturating_sub(1));
    format!("  {:>4} | {}\n       | {}^", error.line, line, caret)
}

/// The two generated documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundles {
    /// Cleaned SCSS bundle with header
    pub scss: String,
    /// LESS translation of [`Bundles::scss`]
    pub less: String,
}

/// Build both bundles from source file contents, in order.
///
/// This is the text-only half of the pipeline: concatenate, strip every
/// block comment, collapse blank lines, drop imports and line comments,
/// expand `border-shadow(...)`, collapse again, prepend `header`, then
/// translate the result into LESS.
pub fn render_bundles<S: AsRef<str>>(contents: &[S], header: &str) -> Bundles {
    let joined = contents.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n");

    let text = strip_block_comments(&joined, CommentPolicy::StripAll);
    let text = collapse_blank_lines(&text);
    let text = strip_imports_and_line_comments(&text);
    let text = expand_border_shadow(&text);
    let text = collapse_blank_lines(&text);

    let scss = format!("{}{}", header, text);
    let less = scss_to_less(&scss);
    Bundles { scss, less }
}

/// Outcome of a successful export.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// The generated documents
    pub bundles: Bundles,
    /// Every file written, SCSS bundles first
    pub written: Vec<PathBuf>,
    /// Variables declared by the LESS bundle
    pub variables: Vec<String>,
}

/// Variable export job: ordered sources, destination directories and header.
#[derive(Debug, Clone)]
pub struct VariableExport {
    sources: Vec<PathBuf>,
    destinations: Vec<PathBuf>,
    header: String,
}

impl VariableExport {
    /// Create an export job with the default header.
    pub fn new(sources: Vec<PathBuf>, destinations: Vec<PathBuf>) -> Self {
        Self { sources, destinations, header: DEFAULT_HEADER.to_string() }
    }

    /// Replace the license header.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Source files in concatenation order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Destination directories.
    pub fn destinations(&self) -> &[PathBuf] {
        &self.destinations
    }

    /// Run the export.
    ///
    /// All sources are read before anything is written. The SCSS bundle is
    /// written to every destination before the LESS bundle, and the LESS
    /// bundle is validated only after it has been written. A validation
    /// failure therefore leaves both files on disk.
    pub fn run(&self) -> Result<ExportOutput, ExportError> {
        let _span = info_span!(
            "export_variables",
            sources = self.sources.len(),
            destinations = self.destinations.len()
        )
        .entered();

        if self.sources.is_empty() {
            return Err(ExportError::NoSources);
        }
        if self.destinations.is_empty() {
            return Err(ExportError::NoDestinations);
        }

        let contents = self
            .sources
            .iter()
            .map(|path| {
                debug!(path = %path.display(), "reading variable source");
                fs::read_to_string(path)
                    .map_err(|source| ExportError::SourceRead { path: path.clone(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bundles = render_bundles(&contents, &self.header);

        let mut written = write_to_all(&self.destinations, SCSS_FILE_NAME, &bundles.scss)?;
        written.extend(write_to_all(&self.destinations, LESS_FILE_NAME, &bundles.less)?);

        let summary = less::validate(&bundles.less).map_err(|error| {
            ExportError::DialectConversion { error, text: bundles.less.clone() }
        })?;

        info!(variables = summary.variables.len(), files = written.len(), "exported variables");
        Ok(ExportOutput { bundles, written, variables: summary.variables })
    }
}

/// Export with the default header.
pub fn export_variables(
    sources: &[PathBuf],
    destinations: &[PathBuf],
) -> Result<ExportOutput, ExportError> {
    VariableExport::new(sources.to_vec(), destinations.to_vec()).run()
}

/// Write `text` as `file_name` into every directory. Directories are
/// independent, so the writes run in parallel.
fn write_to_all(
    directories: &[PathBuf],
    file_name: &str,
    text: &str,
) -> Result<Vec<PathBuf>, ExportError> {
    directories.par_iter().map(|dir| write_file(dir, file_name, text)).collect()
}

fn write_file(dir: &Path, file_name: &str, text: &str) -> Result<PathBuf, ExportError> {
    let path = dir.join(file_name);
    fs::create_dir_all(dir)
        .and_then(|_| fs::write(&path, text))
        .map_err(|source| ExportError::Write { path: path.clone(), source })?;
    debug!(path = %path.display(), bytes = text.len(), "wrote bundle");
    Ok(path)
}
