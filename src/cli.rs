use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use sharefind_search::{Breadth, MatchBehavior};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "sharefind", version)]
#[command(about = "Find every occurrence of a file or directory across a file share and its snapshots")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "SHAREFIND_CONFIG")]
    pub config: Option<PathBuf>,
    /// More logging on stderr (-v, -vv, -vvv); overridden by SHAREFIND_LOG
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search a file share (and its snapshots) for an item by exact name
    Search(SearchArgs),
    /// Delete everything recorded in the cache
    ClearCache(ClearCacheArgs),
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(long)]
    pub subscription: Uuid,
    #[arg(long)]
    pub resource_group: String,
    #[arg(long)]
    pub storage_account: String,
    #[arg(long)]
    pub file_share: String,
    /// Exact name of the file or directory to find
    #[arg(long)]
    pub target_item: String,
    #[arg(long, value_enum, default_value_t = Breadth::Both)]
    pub search_scope: Breadth,
    /// What to do after a match
    #[arg(long, value_enum, default_value_t = MatchBehavior::ScopeEnd)]
    pub match_behavior: MatchBehavior,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
    /// Cache database to use instead of the configured one
    #[arg(long)]
    pub cache_path: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ClearCacheArgs {
    /// Cache database to clear instead of the configured one
    #[arg(long)]
    pub cache_path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `share[@snapshot]:path`, one match per line
    Text,
    /// One JSON object per match, one per line
    Json,
}
