//! # hukum CLI
//!
//! Command-line interface for the Hukum legal retrieval engine.
//! Run `hukum --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
