//! ## virtclock
//! **Replays subscription scenarios on a virtual clock**
//!
//! `virtclock replay <scenario.yaml>` advances virtual time step by step,
//! prints every delivery, and hashes the resulting trace so runs can be
//! compared with `--validate-hash`. `virtclock demo` runs a built-in scenario.

use clap::Parser;

mod commands;
mod error;
mod replay;
mod scenario;

use commands::Cli;
use error::CliError;

fn main() -> Result<(), CliError> {
    commands::run_command(Cli::parse())
}
