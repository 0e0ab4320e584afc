//! SCSS → CSS compilation for a project.

use super::{discover_stylesheets, Autoprefixer, SassError};
use crate::variables::{collapse_blank_lines, strip_block_comments, CommentPolicy};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Comments starting with this marker (`/**`) survive compilation.
const PRESERVED_COMMENT_MARKER: char = '*';

/// Compiles single stylesheets: Sass, then prefixing, then cleanup.
#[derive(Debug, Clone)]
pub struct StylesheetCompiler {
    load_paths: Vec<PathBuf>,
    prefixer: Autoprefixer,
}

impl StylesheetCompiler {
    /// `load_paths` are searched for `@import` after the importing file's directory.
    pub fn new(load_paths: Vec<PathBuf>, prefixer: Autoprefixer) -> Self {
        Self { load_paths, prefixer }
    }

    /// Compile one entry stylesheet to CSS text.
    pub fn compile_file(&self, path: &Path) -> Result<String, SassError> {
        let mut load_paths: Vec<&Path> = Vec::with_capacity(self.load_paths.len() + 1);
        if let Some(parent) = path.parent() {
            load_paths.push(parent);
        }
        load_paths.extend(self.load_paths.iter().map(PathBuf::as_path));

        let options = grass::Options::default()
            .style(grass::OutputStyle::Expanded)
            .load_paths(&load_paths);

        let css = grass::from_path(path, &options)
            .map_err(|e| SassError::Compile { file: path.to_path_buf(), message: e.to_string() })?;

        let css = self.prefixer.process(&css, path)?;
        Ok(postprocess(&css))
    }
}

/// Strip unmarked comments and collapse blank-line runs.
pub fn postprocess(css: &str) -> String {
    let text = strip_block_comments(css, CommentPolicy::Preserve(PRESERVED_COMMENT_MARKER));
    collapse_blank_lines(&text)
}

/// Outcome of compiling a project's stylesheets.
#[derive(Debug, Default)]
pub struct CompileReport {
    /// CSS files written
    pub written: Vec<PathBuf>,
    /// Stylesheets that failed (dev mode only; otherwise the first failure is returned)
    pub failures: Vec<SassError>,
}

/// Compile every non-partial stylesheet in `src_dir` and write each result
/// into every directory of `dests`, mirroring the source layout.
///
/// In dev mode a file that fails to compile is logged and skipped so that a
/// typo does not stop the watcher; otherwise the first failure is returned
/// and nothing further is written.
pub fn compile_project(
    compiler: &StylesheetCompiler,
    src_dir: &Path,
    dests: &[PathBuf],
    dev_mode: bool,
) -> Result<CompileReport, SassError> {
    let entries = discover_stylesheets(src_dir, false)?;
    debug!(src = %src_dir.display(), files = entries.len(), "compiling stylesheets");

    let compiled: Vec<(PathBuf, Result<String, SassError>)> = entries
        .into_par_iter()
        .map(|path| {
            let result = compiler.compile_file(&path);
            (path, result)
        })
        .collect();

    let mut report = CompileReport::default();
    let mut outputs = Vec::new();
    for (path, result) in compiled {
        match result {
            Ok(css) => outputs.push((path, css)),
            Err(e) if dev_mode => {
                warn!("{}", e);
                report.failures.push(e);
            }
            Err(e) => return Err(e),
        }
    }

    for (path, css) in &outputs {
        for dest in dests {
            let out = output_path(src_dir, path, dest);
            write_css(&out, css)?;
            report.written.push(out);
        }
    }

    Ok(report)
}

/// `<dest>/<path relative to src_dir>` with a `.css` extension.
pub fn output_path(src_dir: &Path, file: &Path, dest: &Path) -> PathBuf {
    let relative = file.strip_prefix(src_dir).unwrap_or(file);
    dest.join(relative).with_extension("css")
}

fn write_css(path: &Path, css: &str) -> Result<(), SassError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| SassError::Write { path: path.to_path_buf(), source })?;
    }
    fs::write(path, css).map_err(|source| SassError::Write { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn compiler() -> StylesheetCompiler {
        StylesheetCompiler::new(vec![], Autoprefixer::new(&["Chrome >= 37"]).unwrap())
    }

    #[test]
    fn test_postprocess_keeps_doc_comments() {
        let css = concat!(
            "/** Keep */\n.a {\n  color: red;\n}\n",
            "/* drop */\n\n\n\n.b {\n  color: blue;\n}\n",
        );
        let out = postprocess(css);
        assert!(out.contains("/** Keep */"));
        assert!(!out.contains("drop"));
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn test_compile_file_keeps_rules_and_doc_comments() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("colors.scss");
        let scss = "/** Keep me */\n.a{color:#ff0000}\n.b{color:#ff0000}\n/* drop */\n";
        fs::write(&path, scss).unwrap();

        let css = compiler().compile_file(&path).unwrap();
        assert!(css.contains("/** Keep me */"), "{}", css);
        assert!(css.contains(".a {"), "{}", css);
        assert!(css.contains(".b {"), "{}", css);
        assert_eq!(css.matches("color: #ff0000;").count(), 2, "{}", css);
        assert!(!css.contains("drop"));
    }

    #[test]
    fn test_compile_file_adds_vendor_prefixes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("select.scss");
        fs::write(&path, ".a {\n  .b { user-select: none; }\n}\n").unwrap();

        let css = compiler().compile_file(&path).unwrap();
        assert!(css.contains(".a .b {"), "{}", css);
        assert!(css.contains("-webkit-user-select: none;"), "{}", css);
        assert!(css.contains("  user-select: none;"), "{}", css);
    }

    #[test]
    fn test_output_path_mirrors_layout() {
        let out = output_path(
            Path::new("/p/src"),
            Path::new("/p/src/common/button.scss"),
            Path::new("/p/build/src"),
        );
        assert_eq!(out, PathBuf::from("/p/build/src/common/button.css"));
    }

    #[test]
    fn test_compile_project_writes_every_dest() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("common")).unwrap();
        fs::write(src.join("common/_colors.scss"), "$blue: #137cbd;\n").unwrap();
        fs::write(
            src.join("blueprint.scss"),
            "@import \"common/colors\";\n.pt-button {\n  .pt-icon { color: $blue; }\n}\n",
        )
        .unwrap();

        let dests = vec![temp.path().join("build/src"), temp.path().join("build/global")];
        let report = compile_project(&compiler(), &src, &dests, false).unwrap();

        assert_eq!(report.written.len(), 2);
        assert!(report.failures.is_empty());
        for dest in &dests {
            let css = fs::read_to_string(dest.join("blueprint.css")).unwrap();
            assert!(css.contains(".pt-button .pt-icon"));
            assert!(css.contains("#137cbd"));
            assert!(!dest.join("common/_colors.css").exists());
        }
    }

    #[test]
    fn test_compile_error_strict_vs_dev() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("bad.scss"), ".a { color: $undefined; }\n").unwrap();
        fs::write(src.join("good.scss"), ".b { color: red; }\n").unwrap();
        let dests = vec![temp.path().join("out")];

        let err = compile_project(&compiler(), &src, &dests, false).unwrap_err();
        assert!(matches!(err, SassError::Compile { .. }));
        assert!(!temp.path().join("out/good.css").exists());

        let report = compile_project(&compiler(), &src, &dests, true).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.written, vec![temp.path().join("out/good.css")]);
    }
}
