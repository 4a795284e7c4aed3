use crate::core::{BookStatus, DeleteTarget};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bookshell
///
/// Keep a PDF/EPUB library in sync between a local folder and Google Drive
#[derive(Parser, Debug)]
#[command(name = "bookshell")]
#[command(about, long_about = None, version)]
pub struct Cli {
    /// Also print logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local library folder and the Drive root folder
    Setup {
        /// Local library folder (default: ~/Bookshell)
        #[arg(long, value_name = "PATH")]
        local_path: Option<PathBuf>,

        /// Name of the Drive root folder
        #[arg(long, value_name = "NAME", default_value = crate::storage::DEFAULT_ROOT_FOLDER)]
        folder_name: String,
    },

    /// Show or change settings
    Config {
        /// Change a setting
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Show the merged library
    Library {
        /// Read the local mapping cache instead of listing both sides
        #[arg(long)]
        offline: bool,
    },

    /// Show pending uploads and downloads
    Diff,

    /// Upload books to Drive
    Push {
        /// File to upload
        #[arg(value_name = "PATH", required_unless_present = "all", conflicts_with = "all")]
        path: Option<PathBuf>,

        /// Drive category for the file (default: its local folder)
        #[arg(short, long, requires = "path")]
        category: Option<String>,

        /// Push every local book
        #[arg(long)]
        all: bool,

        /// Do not prompt; duplicates fail and category mismatches are skipped
        #[arg(short, long)]
        yes: bool,
    },

    /// Download books from Drive
    Pull {
        /// Book name
        #[arg(value_name = "NAME", required_unless_present = "all", conflicts_with = "all")]
        name: Option<String>,

        /// Pull every book that only exists on Drive
        #[arg(long)]
        all: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Push everything, then pull everything
    Sync {
        /// Do not prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Set the reading status of a book
    Status {
        name: String,

        #[arg(value_enum)]
        status: StatusArg,
    },

    /// Move a book to another category on both sides
    Move { name: String, category: String },

    /// Delete a book
    Delete {
        name: String,

        /// Which copy to delete
        #[arg(long, default_value = "both")]
        target: DeleteTarget,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Share a book with anyone who has the link
    Share {
        name: String,

        /// Revoke public access instead
        #[arg(long)]
        private: bool,
    },

    /// Open a book in the preferred reader, downloading it first if needed
    Open { name: String },

    /// Manage ebook readers
    Reader {
        #[command(subcommand)]
        command: ReaderCommand,
    },

    /// Show or change logging settings
    Log {
        #[arg(long)]
        enabled: Option<bool>,

        #[arg(long)]
        level: Option<String>,

        #[arg(long, value_name = "MB")]
        max_size_mb: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReaderCommand {
    /// List readers available on this platform
    List,
    /// Set the preferred reader
    Set { name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    New,
    Reading,
    Finished,
}

impl From<StatusArg> for BookStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::New => BookStatus::New,
            StatusArg::Reading => BookStatus::Reading,
            StatusArg::Finished => BookStatus::Finished,
        }
    }
}
