//! Command-line argument structures and enums

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tagmark")]
#[command(version)]
#[command(about = "Tag and route bookmarks across remote, local, synced, and file storage", long_about = None)]
pub struct Cli {
    /// Override config file location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the bookmark stored for a URL
    Get {
        /// Bookmark URL
        url: String,
    },

    /// Show the tags stored for a URL
    Tags {
        /// Bookmark URL
        url: String,
    },

    /// Recent bookmarks across all backends
    Recent {
        /// How many to show
        #[arg(short = 'n', long, default_value_t = 15)]
        count: usize,
    },

    /// Save (create or update) a bookmark
    Save {
        /// Bookmark URL
        url: String,

        /// Tags, space-delimited (e.g. "rust async")
        #[arg(short, long)]
        tags: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Extended notes
        #[arg(short, long)]
        extended: Option<String>,

        /// Mark as to-read
        #[arg(long)]
        toread: bool,

        /// Mark as private (shared defaults to yes)
        #[arg(long)]
        private: bool,
    },

    /// Delete the bookmark for a URL
    Delete {
        /// Bookmark URL
        url: String,
    },

    /// Add or remove a single tag
    Tag {
        #[command(subcommand)]
        operation: TagCommands,
    },

    /// Show which backend holds a URL
    Backend {
        /// Bookmark URL
        url: String,
    },

    /// Move a bookmark to another storage backend
    Move {
        /// Bookmark URL
        url: String,

        /// Target backend: remote, local, synced, or file
        target: String,
    },

    /// List bookmarks for the index page
    List {
        /// Aggregate every backend instead of only local
        #[arg(short, long)]
        all: bool,
    },

    /// Store the remote API credential
    Login {
        /// Credential in user:TOKEN form
        token: String,
    },

    /// Select the default storage backend for new bookmarks
    UseBackend {
        /// remote, local, synced, or file
        backend: String,
    },

    /// Grant a directory to the file backend
    GrantDir {
        /// Directory that will hold the bookmark document
        path: PathBuf,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
pub enum TagCommands {
    /// Add a tag to a bookmark
    Add {
        /// Bookmark URL
        url: String,
        /// Tag value
        value: String,
    },

    /// Remove a tag from a bookmark
    Rm {
        /// Bookmark URL
        url: String,
        /// Tag value
        value: String,
    },
}
