//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "keeper")]
#[command(about = "Local-first notes with optional account-based sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local data directory
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keeper server base URL (overrides config and KEEPER_SERVER_URL)
    #[arg(long, value_name = "URL", global = true)]
    pub server: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: String,
        /// Markdown body
        #[arg(short, long, default_value = "")]
        markdown: String,
        /// Tag labels; missing tags are created
        #[arg(short, long = "tag", value_name = "LABEL")]
        tags: Vec<String>,
    },
    /// List notes
    List {
        /// Filter notes by tag label
        #[arg(long)]
        tag: Option<String>,
        /// Filter notes by title substring
        #[arg(long)]
        title: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one note
    Show {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        markdown: Option<String>,
        /// Replacement tag labels (omit to keep current tags)
        #[arg(short, long = "tag", value_name = "LABEL")]
        tags: Option<Vec<String>>,
    },
    /// Delete a note locally (no server round-trip)
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Manage local tags
    Tags {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Reconcile notes and tags with the server
    Sync,
    /// Push the whole local collection, then reconcile
    SyncAll,
    /// Push one note to the server
    Push {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Delete one note on the server, keeping the local copy
    Unlink {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Create a public read-only link for a note
    Share {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Revoke a note's public link
    Revoke {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Fetch a note through its public link (no sign-in needed)
    Shared {
        /// Permalink token
        permalink: String,
    },
    /// Sign in to the Keeper server
    Login {
        username: String,
        password: String,
    },
    /// Sign out and unsync local data
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Show or update CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum TagCommands {
    /// List tags with note counts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a tag
    Rename {
        /// Tag ID, unique ID prefix, or current label
        tag: String,
        label: String,
    },
    /// Delete a tag and detach it from notes
    Delete {
        /// Tag ID, unique ID prefix, or label
        tag: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved configuration
    Show,
    /// Set the Keeper server base URL
    SetServer { url: String },
    /// Set the local data directory
    SetDataDir { path: PathBuf },
}
