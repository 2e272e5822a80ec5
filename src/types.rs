//! Shared result alias and the command-line command set.
use std::path::PathBuf;

use clap::Subcommand;

use crate::NotesError;

/// A specialized Result type for notably operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Available subcommands for the notably application
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the notes API server
    Serve {
        /// Port to listen on (overrides config and NOTABLY_PORT)
        #[clap(short, long)]
        port: Option<u16>,

        /// Directory holding notes and users (overrides config)
        #[clap(long)]
        data_dir: Option<PathBuf>,
    },

    /// Create an account
    Register {
        /// Display name
        #[clap(short, long)]
        name: String,

        #[clap(short, long)]
        email: String,

        #[clap(short, long, env = "NOTABLY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log in and remember the session
    Login {
        #[clap(short, long)]
        email: String,

        #[clap(short, long, env = "NOTABLY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the session here and on the server
    Logout,

    /// Request a password reset link
    ForgotPassword {
        #[clap(short, long)]
        email: String,
    },

    /// List your notes
    List {
        /// Format output as JSON
        #[clap(short, long)]
        json: bool,

        /// Only show note IDs and titles
        #[clap(short, long)]
        brief: bool,
    },

    /// Search notes by title or body
    Search {
        /// Search query text
        query: String,

        /// Limit the number of search results
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Create a new note
    Create {
        /// Title of the note
        #[clap(short = 'T', long)]
        title: String,

        /// Body of the note, may contain HTML
        #[clap(short, long)]
        body: String,
    },

    /// Edit an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New title for the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New body for the note
        #[clap(short, long)]
        body: Option<String>,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Suggest keyword tags and filter notes by them
    Tags {
        /// Suggest keywords containing this text
        #[clap(short, long)]
        term: Option<String>,

        /// Show only notes having any of these keywords (comma-separated)
        #[clap(short, long)]
        select: Option<String>,
    },
}
