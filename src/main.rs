//! Stylebuild - Command-line tool for workspace stylesheet tasks

use std::process::ExitCode;

use stylebuild::cli;

fn main() -> ExitCode {
    cli::run()
}
