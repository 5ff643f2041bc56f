use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "evr",
    about = "Event registry -- register and query immutable events in a transactional ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// World-state snapshot file (overrides the config file)
    ///
    /// Each run loads the whole file and rewrites it after a write. Conflicts
    /// are only detected within one process, so at most one `evr` process may
    /// write to a given file at a time; concurrent writers lose commits.
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a new event under an unused key
    Register(RegisterArgs),
    /// Register a new event and overwrite existing ones in the same transaction
    RegisterUpdate(RegisterUpdateArgs),
    /// Check whether a key holds an event
    Exists(KeyArgs),
    /// Show the event stored under a key
    Query(KeyArgs),
    /// Show the events for a JSON array of keys, in array order
    QueryKeys(QueryKeysArgs),
    /// Show the events matching a JSON selector
    QueryRich(QueryRichArgs),
    /// List the events in a key range
    QueryRange(QueryRangeArgs),
    /// Invoke an operation by name with positional arguments
    Invoke(InvokeArgs),
    /// List the available operations
    Ops,
}

#[derive(Args)]
pub struct RegisterArgs {
    pub key: String,
    pub payload: String,
}

#[derive(Args)]
pub struct RegisterUpdateArgs {
    pub key: String,
    pub payload: String,
    /// JSON object mapping existing keys to their new payloads
    pub updates: String,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct QueryKeysArgs {
    /// JSON array of keys, e.g. '["a","b"]'
    pub keys: String,
}

#[derive(Args)]
pub struct QueryRichArgs {
    /// JSON selector, e.g. '{"selector":{"kind":"ship"}}'
    pub query: String,
}

#[derive(Args)]
pub struct QueryRangeArgs {
    /// Inclusive start key ("" for the beginning)
    #[arg(default_value = "")]
    pub start: String,
    /// Exclusive end key ("" for no upper bound)
    #[arg(default_value = "")]
    pub end: String,
}

#[derive(Args)]
pub struct InvokeArgs {
    pub operation: String,
    pub args: Vec<String>,
}
