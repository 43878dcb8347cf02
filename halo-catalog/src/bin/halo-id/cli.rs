//! CLI argument definitions for halo-id

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "halo-id")]
#[command(about = "Select halo IDs from a snapshot catalog, dropping subhalos")]
#[command(version)]
pub struct Cli {
    /// Log progress at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a selection and write one `ID Snapshot` row per halo
    Run(RunArgs),

    /// Validate a configuration file without reading any catalog
    Check(CheckArgs),

    /// Print an annotated example configuration
    ExampleConfig,
}

#[derive(Parser)]
pub struct RunArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Write rows here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: PathBuf,
}
