//! Variable export command

use std::path::PathBuf;
use std::process::ExitCode;

use super::{current_dir, load_workspace, GlobalArgs, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::variable_export;
use crate::config::CliOverrides;
use crate::variables::ExportError;

/// Run the variable export directly, without its configured prerequisites.
///
/// `out` directories are relative to the current directory and replace the
/// configured destinations.
pub fn run_variables(global: &GlobalArgs, out: &[PathBuf]) -> ExitCode {
    let overrides = CliOverrides {
        variables_dests: if out.is_empty() {
            None
        } else {
            let cwd = current_dir();
            Some(out.iter().map(|p| cwd.join(p)).collect())
        },
        ..CliOverrides::default()
    };

    let workspace = match load_workspace(global, &overrides) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let export = match variable_export(&workspace.ctx) {
        Ok(export) => export,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match export.run() {
        Ok(output) => {
            for path in &output.written {
                println!("{}", path.display());
            }
            println!("Exported {} variables", output.variables.len());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e @ ExportError::DialectConversion { .. }) => {
            eprintln!("Error: {}", e);
            eprintln!("The bundles were written; fix the source variables and re-run.");
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
