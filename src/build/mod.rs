//! Task runner for the stylesheet build
//!
//! # Overview
//!
//! - **Registry**: named tasks with dependencies ([`TaskRegistry`])
//! - **Tasks**: lint, compile, watch and variable export tasks per project
//! - **Execution**: dependency-ordered, fail-fast runs reported through a
//!   [`ProgressReporter`]
//!
//! # Example
//!
//! ```ignore
//! use stylebuild::build::{register_stylesheet_tasks, BuildContext, ConsoleProgress, TaskRegistry};
//! use stylebuild::config::load_config;
//!
//! let config = load_config(None)?;
//! let mut registry = TaskRegistry::new();
//! register_stylesheet_tasks(&mut registry, &config)?;
//!
//! let ctx = BuildContext::new(config, workspace_root);
//! let result = registry.run(&["sass"], &ctx, &ConsoleProgress::new())?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod progress;
pub mod registry;
pub mod result;
pub mod tasks;

pub use context::*;
pub use progress::*;
pub use registry::*;
pub use result::*;
pub use tasks::{register_stylesheet_tasks, variable_export, DEFAULT_TASK, VARIABLES_TASK};
