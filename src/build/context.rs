//! Run context containing configuration and paths for task bodies.

use crate::config::{ProjectConfig, StyleConfig};
use std::path::{Path, PathBuf};

/// Configuration and paths shared by every task in a run.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: StyleConfig,
    /// Workspace root directory (where stylebuild.toml is located)
    workspace_root: PathBuf,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    pub fn new(config: StyleConfig, workspace_root: PathBuf) -> Self {
        Self { config, workspace_root, verbose: false }
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve a path relative to the workspace root.
    ///
    /// If the path is absolute, returns it unchanged.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    /// A project's directory.
    pub fn project_dir(&self, project: &ProjectConfig) -> PathBuf {
        self.resolve_path(&project.cwd)
    }

    /// A project's stylesheet source directory.
    pub fn project_src_dir(&self, project: &ProjectConfig) -> PathBuf {
        resolve_in(&self.project_dir(project), &self.config.sass.src)
    }

    /// A project's output directories.
    pub fn project_dests(&self, project: &ProjectConfig) -> Vec<PathBuf> {
        let dir = self.project_dir(project);
        self.config.effective_dests(project).iter().map(|d| resolve_in(&dir, d)).collect()
    }

    /// Resolve a path relative to the directory of the project with `id`.
    /// Falls back to the workspace root when no such project exists.
    pub fn resolve_in_project(&self, id: &str, path: &Path) -> PathBuf {
        match self.config.find_project(id) {
            Some(project) => resolve_in(&self.project_dir(project), path),
            None => self.resolve_path(path),
        }
    }

    /// Configured extra `@import` search paths, resolved.
    pub fn load_paths(&self) -> Vec<PathBuf> {
        self.config.sass.load_paths.iter().map(|p| self.resolve_path(p)).collect()
    }
}

fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
