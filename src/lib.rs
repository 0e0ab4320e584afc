//! Stylebuild - stylesheet tasks for a multi-project workspace
//!
//! This library provides functionality to:
//! - Export shared SCSS variables as `variables.scss` and `variables.less` bundles
//! - Lint and compile each project's SCSS sources, with vendor prefixing
//! - Run named tasks with prerequisites, once or in watch mode

pub mod build;
pub mod cli;
pub mod config;
pub mod less;
pub mod logging;
pub mod sass;
pub mod variables;
pub mod watch;
