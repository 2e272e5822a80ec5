use std::path::PathBuf;

use clap::Parser;

use crate::{Commands, ENV_SERVER};

/// Main CLI application arguments and command structure
#[derive(Parser, Debug)]
#[clap(
    version,
    about = "Note-taking server and command-line client"
)]
pub struct Cli {
    /// Path to the server configuration file (JSON)
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Base URL of the notes server
    #[clap(short, long, env = ENV_SERVER)]
    pub server: Option<String>,

    /// Where the client keeps its session
    #[clap(long, value_parser)]
    pub session_file: Option<PathBuf>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the notably application
    #[clap(subcommand)]
    pub command: Commands,
}
