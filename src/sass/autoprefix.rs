//! Vendor prefixing of compiled CSS for a set of browser targets.
//!
//! Targets are written as `"<Name> >= <major>[.<minor>]"`. Each query sets
//! the minimum supported version of one browser; when a browser appears more
//! than once the lowest version wins.
//!
//! Prefixing works one declaration at a time. Prefixed copies are inserted
//! above the declaration they came from; selectors, comments and values that
//! need no prefix are left exactly as written.

use super::SassError;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleAttribute};
use lightningcss::targets::{Browsers, Targets};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::trace;

static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)(-?[A-Za-z][A-Za-z0-9-]*)\s*:\s*(.+?);\s*$").expect("declaration pattern")
});

/// Browsers a query may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Android,
    Chrome,
    Edge,
    Explorer,
    Firefox,
    Ios,
    Opera,
    Safari,
}

impl Browser {
    fn from_name(name: &str) -> Option<Self> {
        let browser = match name.to_ascii_lowercase().as_str() {
            "android" => Browser::Android,
            "chrome" => Browser::Chrome,
            "edge" => Browser::Edge,
            "explorer" | "ie" => Browser::Explorer,
            "firefox" | "ff" => Browser::Firefox,
            "ios" | "ios_saf" => Browser::Ios,
            "opera" => Browser::Opera,
            "safari" => Browser::Safari,
            _ => return None,
        };
        Some(browser)
    }

    fn slot(self, browsers: &mut Browsers) -> &mut Option<u32> {
        match self {
            Browser::Android => &mut browsers.android,
            Browser::Chrome => &mut browsers.chrome,
            Browser::Edge => &mut browsers.edge,
            Browser::Explorer => &mut browsers.ie,
            Browser::Firefox => &mut browsers.firefox,
            Browser::Ios => &mut browsers.ios_saf,
            Browser::Opera => &mut browsers.opera,
            Browser::Safari => &mut browsers.safari,
        }
    }
}

/// A parsed `"<Name> >= <version>"` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserQuery {
    pub browser: Browser,
    pub major: u32,
    pub minor: u32,
}

impl BrowserQuery {
    /// Version in the `major << 16 | minor << 8` encoding lightningcss uses.
    pub fn encoded_version(&self) -> u32 {
        (self.major << 16) | (self.minor << 8)
    }
}

/// Parse a single browser query.
pub fn parse_browser_query(query: &str) -> Result<BrowserQuery, SassError> {
    let fail = |reason: &str| SassError::BrowserQuery {
        query: query.to_string(),
        reason: reason.to_string(),
    };

    let (name, version) =
        query.split_once(">=").ok_or_else(|| fail("expected '<name> >= <version>'"))?;
    let browser = Browser::from_name(name.trim()).ok_or_else(|| fail("unknown browser"))?;

    let version = version.trim();
    let (major, minor) = match version.split_once('.') {
        Some((major, minor)) => (major, minor),
        None => (version, "0"),
    };
    let major: u32 = major.parse().map_err(|_| fail("version must be numeric"))?;
    let minor: u32 = minor.parse().map_err(|_| fail("version must be numeric"))?;
    if major > 0xffff || minor > 0xff {
        return Err(fail("version out of range"));
    }

    Ok(BrowserQuery { browser, major, minor })
}

/// Fold queries into a lightningcss browser set.
pub fn browsers_from_queries<S: AsRef<str>>(queries: &[S]) -> Result<Browsers, SassError> {
    let mut browsers = Browsers::default();
    for query in queries {
        let parsed = parse_browser_query(query.as_ref())?;
        let slot = parsed.browser.slot(&mut browsers);
        let version = parsed.encoded_version();
        *slot = Some(slot.map_or(version, |current| current.min(version)));
    }
    Ok(browsers)
}

/// Adds and removes vendor prefixes for a fixed set of targets.
#[derive(Debug, Clone, Copy)]
pub struct Autoprefixer {
    targets: Targets,
}

impl Autoprefixer {
    /// Create a prefixer from browser queries.
    pub fn new<S: AsRef<str>>(queries: &[S]) -> Result<Self, SassError> {
        let browsers = browsers_from_queries(queries)?;
        Ok(Self { targets: Targets::from(browsers) })
    }

    /// Prefix `css`. `file` is only used for error messages.
    ///
    /// Only single-line declarations inside a block are considered. A
    /// declaration lightningcss cannot parse is kept unchanged.
    pub fn process(&self, css: &str, file: &Path) -> Result<String, SassError> {
        let mut out = String::with_capacity(css.len());
        let mut scan = BlockScan::default();
        let mut added = 0usize;

        for line in css.split_inclusive('\n') {
            let candidate = scan.depth > 0 && !scan.in_comment && !line.contains("/*");
            scan.advance(line);
            if !candidate {
                out.push_str(line);
                continue;
            }
            let Some(caps) = DECLARATION_RE.captures(line.trim_end_matches(['\n', '\r'])) else {
                out.push_str(line);
                continue;
            };
            let indent = &caps[1];
            for extra in self.prefixed(&caps[2], line.trim(), file)? {
                out.push_str(indent);
                out.push_str(&extra);
                out.push_str(";\n");
                added += 1;
            }
            out.push_str(line);
        }

        trace!(file = %file.display(), added, "prefixed stylesheet");
        Ok(out)
    }

    /// Prefixed declarations to insert above `declaration`, without the
    /// trailing `;`.
    fn prefixed(
        &self,
        name: &str,
        declaration: &str,
        file: &Path,
    ) -> Result<Vec<String>, SassError> {
        if name.starts_with("--") {
            return Ok(Vec::new());
        }
        let filename = file.display().to_string();
        let options = ParserOptions { filename, ..ParserOptions::default() };
        let Ok(mut attr) = StyleAttribute::parse(declaration, options) else {
            return Ok(Vec::new());
        };
        attr.minify(MinifyOptions { targets: self.targets, ..MinifyOptions::default() });

        let block = &attr.declarations;
        let normal = block.declarations.iter().map(|p| (p, false));
        let important = block.important_declarations.iter().map(|p| (p, true));
        let mut printed = Vec::new();
        for (property, important) in normal.chain(important) {
            let options = PrinterOptions { targets: self.targets, ..PrinterOptions::default() };
            let text = property.to_css_string(important, options).map_err(|e| {
                SassError::Prefix { file: file.to_path_buf(), message: e.to_string() }
            })?;
            printed.push(text);
        }

        let name = name.to_ascii_lowercase();
        let vendor_suffix = format!("-{}", name);
        let mut extras: Vec<String> = printed
            .into_iter()
            .filter(|text| {
                let printed = declared_name(text);
                printed == name || (printed.starts_with('-') && printed.ends_with(&vendor_suffix))
            })
            .collect();
        // The original line stands in for the unprefixed declaration.
        if let Some(last) = extras.iter().rposition(|text| declared_name(text) == name) {
            extras.remove(last);
        }
        Ok(extras)
    }
}

fn declared_name(declaration: &str) -> String {
    declaration.split(':').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// Brace depth and comment state carried from line to line.
#[derive(Debug, Default)]
struct BlockScan {
    depth: usize,
    in_comment: bool,
}

impl BlockScan {
    fn advance(&mut self, line: &str) {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if self.in_comment {
                if bytes[i..].starts_with(b"*/") {
                    self.in_comment = false;
                    i += 1;
                }
            } else if bytes[i..].starts_with(b"/*") {
                self.in_comment = true;
                i += 1;
            } else if bytes[i] == b'{' {
                self.depth += 1;
            } else if bytes[i] == b'}' {
                self.depth = self.depth.saturating_sub(1);
            }
            i += 1;
        }
    }
}
