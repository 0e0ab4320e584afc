//! Configuration module for the stylesheet build
//!
//! Provides types, discovery and parsing for `stylebuild.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
