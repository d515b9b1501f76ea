//! CLI argument definitions for BookiT.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// BookiT -- browse books and keep a list of favorites.
#[derive(Parser)]
#[command(
    name = "bookit",
    version,
    about = "BookiT -- browse books and keep a list of favorites",
    long_about = "Browse the book catalogue, create an account and keep your favorites \
                  in sync. The login is remembered on this device until you log out."
)]
pub struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and log in.
    Register {
        #[arg(long, short)]
        name: String,
        #[arg(long, short)]
        email: String,
        /// Prompted for (visibly) when omitted.
        #[arg(long, short)]
        password: Option<String>,
        /// Must match the password; prompted for (visibly) when omitted.
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Log in with email and password.
    Login {
        #[arg(long, short)]
        email: String,
        /// Prompted for (visibly) when omitted.
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Log out and forget the session on this device.
    Logout,

    /// Show the logged-in user.
    Whoami,

    /// Reload the logged-in user from the server.
    Refresh,

    /// Browse the book catalogue.
    Books {
        #[command(subcommand)]
        action: BookAction,
    },

    /// Manage your favorites.
    Favorites {
        #[command(subcommand)]
        action: FavoriteAction,
    },

    /// Manage your profile.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

/// Actions for browsing the catalogue.
#[derive(Subcommand)]
pub enum BookAction {
    /// List every book.
    List,
    /// Find books by title or author.
    Search {
        query: String,
    },
    /// Show one book's details.
    Show {
        /// Exact book title.
        name: String,
    },
}

/// Actions on the favorites list.
#[derive(Subcommand)]
pub enum FavoriteAction {
    /// List favorites with book details.
    List,
    /// Add a book (repeats are kept).
    Add {
        name: String,
    },
    /// Remove every occurrence of a book.
    Remove {
        name: String,
    },
    /// Add the book if absent, remove it otherwise.
    Toggle {
        name: String,
    },
    /// Replace the whole list.
    Set {
        names: Vec<String>,
    },
}

/// Actions on the profile.
#[derive(Subcommand)]
pub enum ProfileAction {
    /// Change name and/or email. Omitted fields keep their value.
    Update {
        #[arg(long, short)]
        name: Option<String>,
        #[arg(long, short)]
        email: Option<String>,
    },
}
