use clap::{ArgAction, Parser, Subcommand};
use cnb_builder_data::target::Target;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cnb-builder", bin_name = "cnb-builder", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Increase log verbosity, can be given multiple times
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Resolves a builder configuration into one configuration per target
    Resolve(ResolveArgs),
    /// Resolves the build-time environment variables of a builder configuration
    Env(EnvArgs),
}

#[derive(Parser)]
pub(crate) struct ResolveArgs {
    /// Path to the builder configuration
    pub config: PathBuf,
    /// Target to resolve for, replaces the targets of the configuration. Format:
    /// os[/arch[/variant]][:name@version[@version...][;name@version...]]
    #[arg(long = "target")]
    pub targets: Vec<Target>,
    /// Write every resolved configuration to <OUTPUT_DIR>/<target>/builder.toml instead of stdout
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub(crate) struct EnvArgs {
    /// Path to the builder configuration
    pub config: PathBuf,
    /// Write the environment as one file per variable to this directory instead of stdout
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}
