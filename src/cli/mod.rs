//! CLI surface using clap: `beacon issues list`, `beacon login`/`logout`,
//! `beacon completions`. The login/logout/completions commands are glue
//! so the core (target resolution, fetch, cursors, aliases) is
//! exercisable end to end.

pub mod commands;

use crate::model::SortKey;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line client for a hosted error-tracking service.
#[derive(Parser, Debug)]
#[command(name = "beacon", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the local store location (default: `~/.beacon/beacon.db`).
    #[arg(long = "config-dir", global = true, env = "BEACON_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Override the control-plane base URL, for self-hosted deployments.
    #[arg(long, global = true, env = "BEACON_BASE_URL")]
    pub url: Option<String>,

    /// Emit machine-readable JSON instead of a plain table.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Issue-tracking operations.
    Issues {
        #[command(subcommand)]
        command: IssuesCommands,
    },

    /// Authenticate against the service.
    Login {
        /// A manual access token, bypassing the OAuth refresh flow
        /// entirely (no refresh token means a 401 can never be
        /// recovered automatically).
        #[arg(long)]
        token: Option<String>,
    },

    /// Clear stored credentials and the cached region directory.
    Logout,

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum IssuesCommands {
    /// List issues across one or more targets.
    List(ListArgs),
}

/// `beacon issues list [<target>]`.
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// `org/project`, `org/`, `/project`, a bare project name, or a
    /// service URL. Omit to auto-detect from the environment, stored
    /// default, working tree, or directory name.
    pub target: Option<String>,

    /// Free-text search query, passed through to the service.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Maximum number of issues to return (1..=1000).
    #[arg(short = 'n', long, default_value_t = 25)]
    pub limit: u32,

    /// Sort order (all descending).
    #[arg(short, long, value_enum, default_value_t = SortKey::Date)]
    pub sort: SortKey,

    /// Lookback window, e.g. `90d`, `14d`, `24h`.
    #[arg(short = 't', long, default_value = "90d")]
    pub period: String,

    /// Resume from the stored cursor (`last`), or omit for a fresh query.
    #[arg(short, long)]
    pub cursor: Option<String>,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
