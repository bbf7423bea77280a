use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "concord", version, about = "Find recorded identities matching a new one")]
pub struct Cli {
    /// Config file (defaults to $CONCORD_CONFIG, then ./concord.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rank candidates for a query identity
    Reconcile {
        /// Query identity as JSON, read from a file or `-` for stdin
        #[arg(long)]
        query: String,

        /// Show at most this many candidates
        #[arg(long)]
        top: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the stage names accepted in `engine.stages`
    Stages,
}
