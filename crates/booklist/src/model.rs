//! The book record handed to the display layer.

use serde::Serialize;

/// A single book entry found by a search.
///
/// Records have no identity beyond their content, two records with the same author and title
/// are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BookRecord {
    author: String,
    title: String,
}

impl BookRecord {
    /// Creates a new [`BookRecord`] from an already formatted author string and a title.
    #[must_use]
    pub const fn new(author: String, title: String) -> Self {
        Self { author, title }
    }

    /// The display string of the authors of this book, see [`format_authors`][fa].
    ///
    /// [fa]: crate::format_authors
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// The title of this book.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}
