//! Shared helper functions used across CLI subcommands.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use bookit_catalogue::Book;
use bookit_session::SessionError;
use bookit_store::UserRecord;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Return `given` or read one line from stdin after printing `label`.
///
/// The terminal echoes what is typed; the prompt says so. Pass `--password`
/// or pipe stdin to keep it off screen.
pub fn password_or_prompt(given: Option<String>, label: &str) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }

    eprint!("{}", prompt_text(label));
    io::stderr().flush().context("failed to flush prompt")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn prompt_text(label: &str) -> String {
    format!("{label} (input is visible): ")
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

pub fn print_user(user: &UserRecord) {
    println!("  {} <{}>", user.name, user.email);
    println!("  id:        {}", user.id);
    println!("  favorites: {}", user.favorites.len());
}

pub fn print_book(book: &Book) {
    println!("  {} by {}", book.name, book.author);
    if !book.description.is_empty() {
        println!("    {}", book.description);
    }
}

/// The message shown for a failed command: the session error's user-facing
/// text when there is one, otherwise the full error chain.
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<SessionError>() {
        Some(session_err) => session_err.user_message().to_string(),
        None => format!("{err:#}"),
    }
}
