//! Line-based stylesheet linter and its reporters.

use super::SassError;
use crate::config::{HexCase, LintConfig, LintRules, LintSyntax, ReporterConfig, ReporterFormat};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(?:[0-9A-Fa-f]{8}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{3,4})\b").unwrap());

static EMPTY_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\s*\}").unwrap());

/// Settings for one lint run.
#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Return an error when any problem is found
    pub fail_after_error: bool,
    pub syntax: LintSyntax,
    pub reporters: Vec<ReporterConfig>,
    pub rules: LintRules,
}

impl LintOptions {
    /// Dev mode reports problems without failing the run.
    pub fn from_config(config: &LintConfig, dev_mode: bool) -> Self {
        Self {
            fail_after_error: !dev_mode,
            syntax: config.syntax,
            reporters: config.reporters.clone(),
            rules: config.rules.clone(),
        }
    }
}

/// A single lint problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintDiagnostic {
    pub file: PathBuf,
    /// 1-based
    pub line: usize,
    /// 1-based
    pub column: usize,
    pub rule: &'static str,
    pub message: String,
}

/// Applies the configured rules to stylesheet text.
#[derive(Debug, Clone)]
pub struct Linter {
    rules: LintRules,
    syntax: LintSyntax,
}

impl Linter {
    pub fn new(rules: LintRules, syntax: LintSyntax) -> Self {
        Self { rules, syntax }
    }

    /// Lint `text`, reporting problems against `file`.
    pub fn lint_source(&self, text: &str, file: &Path) -> Vec<LintDiagnostic> {
        let mut out = Vec::new();
        let mut report = |line: usize, column: usize, rule: &'static str, message: String| {
            out.push(LintDiagnostic { file: file.to_path_buf(), line, column, rule, message });
        };

        let mut empty_run = 0;
        let mut in_comment = false;

        for (index, line) in text.lines().enumerate() {
            let number = index + 1;
            let trimmed_end = line.trim_end();

            let trailing = trimmed_end.len() != line.len() && !trimmed_end.is_empty();
            if self.rules.no_eol_whitespace && trailing {
                report(
                    number,
                    trimmed_end.chars().count() + 1,
                    "no-eol-whitespace",
                    "Unexpected whitespace at end of line".to_string(),
                );
            }

            if trimmed_end.is_empty() {
                empty_run += 1;
                if let Some(max) = self.rules.max_empty_lines {
                    if empty_run > max {
                        report(
                            number,
                            1,
                            "max-empty-lines",
                            format!("Expected no more than {} empty line(s)", max),
                        );
                    }
                }
                continue;
            }
            empty_run = 0;

            let content = line.trim_start();
            let comment_line =
                in_comment || content.starts_with("/*") || self.is_line_comment(content);
            if content.contains("/*") && !content.contains("*/") {
                in_comment = true;
            } else if in_comment && content.contains("*/") {
                in_comment = false;
            }

            if let Some(width) = self.rules.indentation {
                let indent = &line[..line.len() - content.len()];
                if indent.contains('\t') {
                    report(number, 1, "indentation", "Expected spaces, found a tab".to_string());
                } else if !comment_line && indent.len() % width != 0 {
                    report(
                        number,
                        indent.len() + 1,
                        "indentation",
                        format!("Expected indentation of a multiple of {} spaces", width),
                    );
                }
            }

            if let Some(case) = self.rules.color_hex_case {
                if !comment_line {
                    if let Some(colon) = line.find(':') {
                        for m in HEX_COLOR_RE.find_iter(&line[colon..]) {
                            let hex = m.as_str();
                            let expected = match case {
                                HexCase::Lower => hex.to_ascii_lowercase(),
                                HexCase::Upper => hex.to_ascii_uppercase(),
                            };
                            if hex != expected {
                                let column = line[..colon + m.start()].chars().count() + 1;
                                report(
                                    number,
                                    column,
                                    "color-hex-case",
                                    format!("Expected \"{}\" to be \"{}\"", hex, expected),
                                );
                            }
                        }
                    }
                }
            }
        }

        if self.rules.block_no_empty {
            for m in EMPTY_BLOCK_RE.find_iter(text) {
                if text[..m.start()].ends_with('#') {
                    continue;
                }
                let (line, column) = position(text, m.start());
                report(line, column, "block-no-empty", "Unexpected empty block".to_string());
            }
        }

        let missing_newline = !text.is_empty() && !text.ends_with('\n');
        if self.rules.no_missing_end_of_source_newline && missing_newline {
            let (line, column) = position(text, text.len());
            report(
                line,
                column,
                "no-missing-end-of-source-newline",
                "Unexpected missing end-of-source newline".to_string(),
            );
        }

        out.sort_by_key(|d| (d.line, d.column));
        out
    }

    fn is_line_comment(&self, content: &str) -> bool {
        self.syntax == LintSyntax::Scss && content.starts_with("//")
    }
}

/// 1-based line and column of a byte offset.
fn position(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, before[line_start..].chars().count() + 1)
}

/// Result of linting a set of files.
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    /// Number of stylesheets linted
    pub files: usize,
    pub diagnostics: Vec<LintDiagnostic>,
}

#[derive(Serialize)]
struct JsonWarning<'a> {
    line: usize,
    column: usize,
    rule: &'a str,
    severity: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    source: String,
    errored: bool,
    warnings: Vec<JsonWarning<'a>>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn by_file(&self) -> BTreeMap<&Path, Vec<&LintDiagnostic>> {
        let mut grouped: BTreeMap<&Path, Vec<&LintDiagnostic>> = BTreeMap::new();
        for d in &self.diagnostics {
            grouped.entry(d.file.as_path()).or_default().push(d);
        }
        grouped
    }

    /// Human-readable output grouped by file. Empty when clean.
    pub fn format_string(&self) -> String {
        let mut out = String::new();
        for (file, diagnostics) in self.by_file() {
            out.push('\n');
            out.push_str(&file.display().to_string());
            out.push('\n');
            for d in diagnostics {
                out.push_str(&format!(
                    " {:>4}:{:<4} error  {}  {}\n",
                    d.line, d.column, d.message, d.rule
                ));
            }
        }
        out
    }

    /// JSON array with one entry per file that has problems.
    pub fn format_json(&self) -> String {
        let results: Vec<JsonResult<'_>> = self
            .by_file()
            .into_iter()
            .map(|(file, diagnostics)| JsonResult {
                source: file.display().to_string(),
                errored: true,
                warnings: diagnostics
                    .into_iter()
                    .map(|d| JsonWarning {
                        line: d.line,
                        column: d.column,
                        rule: d.rule,
                        severity: "error",
                        text: &d.message,
                    })
                    .collect(),
            })
            .collect();
        serde_json::to_string_pretty(&results).unwrap_or_else(|_| "[]".to_string())
    }

    /// Text for every console reporter, or nothing when the report is clean.
    pub fn render(&self, reporters: &[ReporterConfig]) -> Vec<String> {
        if self.is_clean() {
            return Vec::new();
        }
        reporters.iter().filter(|r| r.console).map(|r| self.format(r.formatter)).collect()
    }

    /// Render with the given reporter format.
    pub fn format(&self, format: ReporterFormat) -> String {
        match format {
            ReporterFormat::String => self.format_string(),
            ReporterFormat::Json => self.format_json(),
        }
    }
}

/// Lint `files`, log every console reporter's output, and fail if the run is
/// strict and problems were found.
pub fn lint_files(files: &[PathBuf], options: &LintOptions) -> Result<LintReport, SassError> {
    let linter = Linter::new(options.rules.clone(), options.syntax);

    let per_file = files
        .par_iter()
        .map(|path| {
            let text = fs::read_to_string(path)
                .map_err(|source| SassError::Read { path: path.clone(), source })?;
            Ok(linter.lint_source(&text, path))
        })
        .collect::<Result<Vec<_>, SassError>>()?;

    let report =
        LintReport { files: files.len(), diagnostics: per_file.into_iter().flatten().collect() };
    debug!(files = report.files, problems = report.diagnostics.len(), "linted stylesheets");

    for text in report.render(&options.reporters) {
        warn!("{}", text);
    }

    if options.fail_after_error && !report.is_clean() {
        return Err(SassError::Lint { count: report.diagnostics.len() });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn linter() -> Linter {
        Linter::new(LintRules::default(), LintSyntax::Scss)
    }

    fn rules_of(diagnostics: &[LintDiagnostic]) -> Vec<&'static str> {
        diagnostics.iter().map(|d| d.rule).collect()
    }

    #[test]
    fn test_clean_source() {
        let text = concat!(
            "// Buttons\n.pt-button {\n    color: #137cbd;\n\n",
            "    &:hover {\n        color: $blue;\n    }\n}\n",
        );
        assert!(linter().lint_source(text, Path::new("a.scss")).is_empty());
    }

    #[test]
    fn test_eol_whitespace() {
        let d = linter().lint_source(".a {\n    color: red;  \n}\n", Path::new("a.scss"));
        assert_eq!(rules_of(&d), vec!["no-eol-whitespace"]);
        assert_eq!((d[0].line, d[0].column), (2, 16));
    }

    #[test]
    fn test_max_empty_lines() {
        let d = linter().lint_source("$a: 1;\n\n\n$b: 2;\n", Path::new("a.scss"));
        assert_eq!(rules_of(&d), vec!["max-empty-lines"]);
        assert_eq!(d[0].line, 3);
    }

    #[test]
    fn test_indentation() {
        let text = ".a {\n   color: red;\n\tmargin: 0;\n}\n";
        let d = linter().lint_source(text, Path::new("a.scss"));
        assert_eq!(rules_of(&d), vec!["indentation", "indentation"]);
        assert_eq!(d[0].message, "Expected indentation of a multiple of 4 spaces");
        assert_eq!(d[1].message, "Expected spaces, found a tab");
    }

    #[test]
    fn test_indentation_ignores_comment_bodies() {
        let text = "/*\n * Header\n */\n$a: 1;\n";
        assert!(linter().lint_source(text, Path::new("a.scss")).is_empty());
    }

    #[test]
    fn test_color_hex_case() {
        let text = "$blue: #137CBD;\n#Main {\n    color: #FFF;\n}\n";
        let d = linter().lint_source(text, Path::new("a.scss"));
        assert_eq!(rules_of(&d), vec!["color-hex-case", "color-hex-case"]);
        assert_eq!(d[0].message, "Expected \"#137CBD\" to be \"#137cbd\"");
        assert_eq!((d[0].line, d[0].column), (1, 8));
        assert_eq!(d[1].line, 3);
    }

    #[test]
    fn test_block_no_empty_and_final_newline() {
        let d = linter().lint_source(".a {}\n.b { width: #{$w}; }", Path::new("a.scss"));
        assert_eq!(rules_of(&d), vec!["block-no-empty", "no-missing-end-of-source-newline"]);
        assert_eq!((d[1].line, d[1].column), (2, 21));
    }

    #[test]
    fn test_disabled_rules() {
        let rules = LintRules {
            max_empty_lines: None,
            indentation: None,
            color_hex_case: None,
            no_eol_whitespace: false,
            no_missing_end_of_source_newline: false,
            block_no_empty: false,
        };
        let text = ".a {}  \n\n\n\n\t$b: #FFF;";
        let d = Linter::new(rules, LintSyntax::Scss).lint_source(text, Path::new("a.scss"));
        assert!(d.is_empty());
    }

    #[test]
    fn test_string_and_json_reporters() {
        let report = LintReport {
            files: 1,
            diagnostics: linter().lint_source(".a {}\n", Path::new("src/a.scss")),
        };

        let text = report.format(ReporterFormat::String);
        assert!(text.contains("src/a.scss"));
        assert!(text.contains("Unexpected empty block  block-no-empty"));

        let json: serde_json::Value =
            serde_json::from_str(&report.format(ReporterFormat::Json)).unwrap();
        assert_eq!(json[0]["source"], "src/a.scss");
        assert_eq!(json[0]["warnings"][0]["rule"], "block-no-empty");
        assert_eq!(json[0]["warnings"][0]["line"], 1);
    }

    #[test]
    fn test_render_uses_console_reporters_only() {
        let reporters = vec![
            ReporterConfig { formatter: ReporterFormat::String, console: true },
            ReporterConfig { formatter: ReporterFormat::Json, console: false },
            ReporterConfig { formatter: ReporterFormat::Json, console: true },
        ];
        let report = LintReport {
            files: 1,
            diagnostics: linter().lint_source(".a {}\n", Path::new("src/a.scss")),
        };

        let rendered = report.render(&reporters);
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0], report.format_string());
        assert_eq!(rendered[1], report.format_json());

        let clean = LintReport { files: 1, diagnostics: Vec::new() };
        assert!(clean.render(&reporters).is_empty());
    }

    #[test]
    fn test_lint_files_strict_and_dev() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("_colors.scss");
        fs::write(&file, "$blue: #137CBD;\n").unwrap();
        let config = LintConfig {
            reporters: vec![ReporterConfig { formatter: ReporterFormat::String, console: false }],
            ..LintConfig::default()
        };

        let strict = lint_files(&[file.clone()], &LintOptions::from_config(&config, false));
        assert!(matches!(strict, Err(SassError::Lint { count: 1 })));

        let dev = lint_files(&[file], &LintOptions::from_config(&config, true)).unwrap();
        assert_eq!(dev.files, 1);
        assert_eq!(dev.diagnostics.len(), 1);
    }
}
