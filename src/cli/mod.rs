//! CLI module for fleetsync
//!
//! Command-line front end over the sync layer.
//!
//! # Commands
//!
//! - `watch` - Poll the configured widgets and log snapshot transitions
//! - `users list` - Show one page of the user listing
//! - `users bulk` - Run a bulk action over user ids
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Watch the dashboard widgets, merging push events piped on stdin
//! fleetsync watch --events-stdin < events.jsonl
//!
//! # Second page of active users
//! fleetsync users list --status active --page 2
//!
//! # Disable three users
//! fleetsync users bulk disable 3 7 9
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod users;
pub mod watch;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// fleetsync - VPN fleet dashboard sync client
#[derive(Parser, Debug)]
#[command(
    name = "fleetsync",
    version,
    about = "Client-side data synchronization for a VPN fleet dashboard"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll dashboard widgets and log every snapshot change
    Watch(WatchArgs),
    /// User listing and bulk actions
    #[command(subcommand)]
    Users(UsersCommands),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where to find the config file and backend API.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "fleetsync.toml")]
    pub config: PathBuf,

    /// Override the backend API base URL
    #[arg(short = 'u', long, env = "FLEETSYNC_API_URL")]
    pub api_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FLEETSYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Only watch these widgets (default: all configured)
    #[arg(short, long = "widget")]
    pub widgets: Vec<String>,

    /// Read push events as JSON lines from stdin
    #[arg(long)]
    pub events_stdin: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// Show one page of users
    List(UsersListArgs),
    /// Apply an action (enable, disable, delete, ...) to several users
    Bulk(UsersBulkArgs),
}

#[derive(Args, Debug)]
pub struct UsersListArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Page number (1-based)
    #[arg(short, long, default_value = "1")]
    pub page: u32,

    /// Rows per page (default from config)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Free-text search
    #[arg(short, long)]
    pub search: Option<String>,

    /// Filter by status (active, disabled, ...)
    #[arg(long)]
    pub status: Option<String>,

    /// Sort field
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UsersBulkArgs {
    /// Action name sent to the backend
    pub action: String,

    /// User ids
    #[arg(required = true)]
    pub ids: Vec<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "fleetsync.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
