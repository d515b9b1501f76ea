//! # bookit-catalogue
//!
//! The list of books users can browse and mark as favorites.
//!
//! Favorites are stored as plain book names, so a name is the lookup key and
//! must be unique within a catalogue. A favorite whose name is not in the
//! catalogue is kept in the user record but has no details to show.

pub mod error;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use error::{CatalogueError, CatalogueResult};

const BUILTIN: &str = include_str!("../data/books.json");

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
}

/// An immutable, ordered set of books indexed by name.
#[derive(Debug, Clone)]
pub struct Catalogue {
    books: Vec<Book>,
    by_name: HashMap<String, usize>,
}

impl Catalogue {
    /// The catalogue compiled into the binary.
    pub fn builtin() -> CatalogueResult<Self> {
        Self::from_json(BUILTIN)
    }

    /// Load a catalogue from a JSON array of books on disk.
    pub fn from_path(path: impl AsRef<Path>) -> CatalogueResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalogue = Self::from_json(&raw)?;
        info!(path = %path.display(), books = catalogue.len(), "catalogue loaded");
        Ok(catalogue)
    }

    pub fn from_json(raw: &str) -> CatalogueResult<Self> {
        let books: Vec<Book> = serde_json::from_str(raw)?;
        Self::new(books)
    }

    /// Build a catalogue, rejecting empty or repeated names.
    pub fn new(books: Vec<Book>) -> CatalogueResult<Self> {
        let mut by_name = HashMap::with_capacity(books.len());
        for (index, book) in books.iter().enumerate() {
            if book.name.trim().is_empty() {
                return Err(CatalogueError::Invalid(format!(
                    "book at position {index} has an empty name"
                )));
            }
            if by_name.insert(book.name.clone(), index).is_some() {
                return Err(CatalogueError::Invalid(format!(
                    "duplicate book name: {}",
                    book.name
                )));
            }
        }
        debug!(books = books.len(), "catalogue indexed");
        Ok(Self { books, by_name })
    }

    pub fn all(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Exact, case-sensitive lookup by name.
    pub fn get(&self, name: &str) -> Option<&Book> {
        self.by_name.get(name).map(|&index| &self.books[index])
    }

    /// Books whose name or author contains `query`, ignoring case, in
    /// catalogue order. A blank query matches everything.
    pub fn search(&self, query: &str) -> Vec<&Book> {
        let needle = query.trim().to_lowercase();
        self.books
            .iter()
            .filter(|book| {
                needle.is_empty()
                    || book.name.to_lowercase().contains(&needle)
                    || book.author.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Details for each favorite name in order, repeats included. Names not
    /// in the catalogue are skipped.
    pub fn resolve<'a>(&'a self, favorites: &[String]) -> Vec<&'a Book> {
        favorites.iter().filter_map(|name| self.get(name)).collect()
    }
}

// ── tests ────────────────────────────────────────────────────────────
