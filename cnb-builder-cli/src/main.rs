//! The `cnb-builder` command line tool: resolves multi-platform builder configurations.

mod cli;
mod env;
mod error;
mod exit_code;
mod resolve;

use crate::cli::{Cli, Command};
use clap::Parser;
use log::error;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use assert_cmd as _;
#[cfg(test)]
use tempfile as _;

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match &cli.command {
        Command::Resolve(args) => resolve::execute(args),
        Command::Env(args) => env::execute(args),
    };

    if let Err(error) = result {
        error!("{error}");
        std::process::exit(exit_code::UNSPECIFIED_ERROR);
    }
}

fn setup_logging(verbose: u8) {
    // Info by default, every -v adds one level up to trace.
    if let Err(error) = stderrlog::new()
        .verbosity(2 + usize::from(verbose))
        .init()
    {
        eprintln!("Unable to initialize logger: {error}");
        std::process::exit(exit_code::UNSPECIFIED_ERROR);
    }
}
