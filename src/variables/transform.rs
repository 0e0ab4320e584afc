//! Text transforms applied to the variable bundle.
//!
//! Every function here is a pure rewrite of the whole document. The export
//! pipeline chains them in a fixed order; see [`render_bundles`](super::render_bundles).

use regex::{Captures, Regex};
use std::sync::LazyLock;

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank run pattern"));

static IMPORT_OR_LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(@import|//).*(?:\n+|\z)").expect("import pattern"));

static BORDER_SHADOW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"border-shadow\(").expect("border-shadow pattern"));

static LITERAL_ALPHA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"rgba\((\$[0-9A-Za-z_-]+), ([0-9.]+)\)").expect("literal alpha pattern")
});

static VARIABLE_ALPHA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"rgba\((\$[0-9A-Za-z_-]+), (\$[0-9A-Za-z_-]+)\)").expect("variable alpha pattern")
});

/// Sigil that prefixes variables in SCSS.
pub const SCSS_SIGIL: char = '$';

/// Sigil that prefixes variables in LESS.
pub const LESS_SIGIL: char = '@';

/// Color of every expanded `border-shadow(...)`.
const BORDER_SHADOW_COLOR: &str = "$black";

/// How [`strip_block_comments`] treats `/* ... */` comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentPolicy {
    /// Remove every block comment.
    StripAll,
    /// Keep comments whose body starts with the marker (`'*'` keeps `/** ... */`).
    Preserve(char),
}

/// Remove block comments according to `policy`.
///
/// Comment markers inside quoted strings are left alone. Strings end at the
/// matching quote or at the end of the line, so an apostrophe in a `//`
/// comment cannot swallow the rest of the file. An unterminated comment runs
/// to the end of the input.
pub fn strip_block_comments(input: &str, policy: CommentPolicy) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut copied_from = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q || b == b'\n' {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' => {
                quote = Some(b);
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let body_start = i + 2;
                let (body_end, end) = match input[body_start..].find("*/") {
                    Some(offset) => (body_start + offset, body_start + offset + 2),
                    None => (bytes.len(), bytes.len()),
                };
                let keep = match policy {
                    CommentPolicy::StripAll => false,
                    CommentPolicy::Preserve(marker) => {
                        input[body_start..body_end].starts_with(marker)
                    }
                };
                if !keep {
                    out.push_str(&input[copied_from..i]);
                    copied_from = end;
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    out.push_str(&input[copied_from..]);
    out
}

/// Collapse every run of three or more newlines into exactly two.
pub fn collapse_blank_lines(input: &str) -> String {
    BLANK_RUN_RE.replace_all(input, "\n\n").into_owned()
}

/// Remove `@import` directives and `//` comments up to the end of their line,
/// together with all newlines that follow.
///
/// A trailing comment takes its newline with it, so the next line is joined
/// onto the declaration that preceded the comment.
pub fn strip_imports_and_line_comments(input: &str) -> String {
    IMPORT_OR_LINE_COMMENT_RE.replace_all(input, "").into_owned()
}

/// Expand the `border-shadow(...)` helper into a literal box-shadow value.
///
/// `border-shadow(AMOUNT)` and `border-shadow(COLOR, AMOUNT)` both become
/// `0 0 0 1px rgba($black, AMOUNT)`. Each call ends at its own balanced `)`,
/// so other values on the same line are kept. A call left open at the end of
/// its line is not rewritten.
pub fn expand_border_shadow(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(m) = BORDER_SHADOW_RE.find(rest) {
        let args_start = m.end();
        let Some(len) = closing_paren(&rest[args_start..]) else {
            out.push_str(&rest[..args_start]);
            rest = &rest[args_start..];
            continue;
        };
        out.push_str(&rest[..m.start()]);
        out.push_str(&border_shadow_value(&rest[args_start..args_start + len]));
        rest = &rest[args_start + len + 1..];
    }
    out.push_str(rest);
    out
}

fn border_shadow_value(args: &str) -> String {
    let amount = match split_top_level_args(args).as_slice() {
        [_, amount] => *amount,
        _ => args.trim(),
    };
    format!("0 0 0 1px rgba({}, {})", BORDER_SHADOW_COLOR, amount)
}

/// Byte length of the argument list before the `)` that closes it.
fn closing_paren(args: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            '\n' => return None,
            _ => {}
        }
    }
    None
}

/// Split a function argument list on commas that are not nested in parens.
fn split_top_level_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());
    parts
}

/// Rewrite `rgba($color, 0.25)` into `fade($color, 25%)`.
pub fn convert_literal_alpha(input: &str) -> String {
    LITERAL_ALPHA_RE
        .replace_all(input, |caps: &Captures| {
            let ratio = caps[2].parse::<f64>().unwrap_or(f64::NAN);
            format!("fade({}, {}%)", &caps[1], format_number(ratio * 100.0))
        })
        .into_owned()
}

/// Rewrite `rgba($color, $ratio)` into `fade($color, $ratio * 100%)`.
pub fn convert_variable_alpha(input: &str) -> String {
    VARIABLE_ALPHA_RE.replace_all(input, "fade(${1}, ${2} * 100%)").into_owned()
}

/// Replace every SCSS variable sigil with the LESS one.
pub fn replace_sigils(input: &str) -> String {
    input.replace(SCSS_SIGIL, &LESS_SIGIL.to_string())
}

/// Translate a cleaned SCSS variable bundle into LESS.
///
/// The literal-ratio rewrite runs before the variable-ratio rewrite, and
/// both run before the sigil swap, which would otherwise hide the `$` the
/// patterns anchor on.
pub fn scss_to_less(input: &str) -> String {
    let text = convert_literal_alpha(input);
    let text = convert_variable_alpha(&text);
    replace_sigils(&text)
}

/// Shortest round-trip decimal, spelled the way stylesheet tools print numbers.
///
/// Magnitudes below `1e-6` or from `1e21` up use exponent form (`1e-7`,
/// `1e+21`).
fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let spelled = if value > 0.0 { "Infinity" } else { "-Infinity" };
        spelled.to_string()
    } else if value != 0.0 && (value.abs() < 1e-6 || value.abs() >= 1e21) {
        let spelled = format!("{:e}", value);
        match spelled.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => spelled,
        }
    } else {
        format!("{}", value)
    }
}
