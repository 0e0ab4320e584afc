//! Variable bundle export.
//!
//! Concatenates a project's SCSS variable files into one `variables.scss`,
//! translates it into `variables.less`, writes both into every destination
//! directory and validates the LESS output.
//!
//! # Example
//!
//! ```
//! use stylebuild::variables::render_bundles;
//!
//! let sources = ["$black: #000;", "$shadow: border-shadow($black, 0.1);"];
//! let bundles = render_bundles(&sources, "/* header */\n");
//!
//! assert!(bundles.scss.contains("$shadow: 0 0 0 1px rgba($black, 0.1);"));
//! assert!(bundles.less.contains("@shadow: 0 0 0 1px fade(@black, 10%);"));
//! ```

pub mod export;
pub mod transform;

pub use export::*;
pub use transform::{
    collapse_blank_lines, convert_literal_alpha, convert_variable_alpha, expand_border_shadow,
    replace_sigils, scss_to_less, strip_block_comments, strip_imports_and_line_comments,
    CommentPolicy,
};
