use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "anishift",
    version,
    about = "Track starred shows and move their watch progress between sources"
)]
pub struct Cli {
    /// Config file (defaults to $ANISHIFT_CONFIG, then the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List configured sources in priority order
    Sources,
    /// Search one source
    Search {
        source: String,
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Star a show found on a source
    Star {
        source: String,
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Result number to star (1-based)
        #[arg(long, default_value_t = 1)]
        pick: usize,
    },
    /// List starred shows
    List,
    /// Record where you are in a starred show
    Progress {
        /// Row number from `list`
        row: usize,
        #[arg(long)]
        line: String,
        #[arg(long)]
        episode: i64,
    },
    /// Remove a starred show
    Unstar { row: usize },
    /// Find a starred show on other sources and move its progress there
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Row number from `list`
    pub row: usize,
    /// Candidate source, in priority order (repeatable)
    #[arg(long = "to", value_name = "SOURCE")]
    pub to: Vec<String>,
    /// Results to collect per source before it stops paging
    #[arg(long)]
    pub min_results: Option<usize>,
    /// Use this candidate (1-based) instead of the best match
    #[arg(long)]
    pub pick: Option<usize>,
    /// Play line to resume on
    #[arg(long)]
    pub line: Option<String>,
    /// Episode order to resume at (requires --line)
    #[arg(long, requires = "line")]
    pub episode: Option<i64>,
    /// Save without asking
    #[arg(long)]
    pub yes: bool,
}
