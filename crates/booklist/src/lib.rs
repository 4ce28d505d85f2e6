#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::missing_safety_doc,
    clippy::missing_const_for_fn
)]
#![warn(missing_docs, rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]

//! # booklist
//!
//! booklist searches the Google Books API for books matching a free text query and turns the
//! response into a list of [`BookRecord`]s.
//!
//! Interactive callers should use a [`LoadCoordinator`], which runs the request off the calling
//! thread, lets a newer search replace an older one and delivers a single [`LoadResult`] per
//! search. [`search_books`] performs the same search synchronously.

mod api;
mod error;
pub mod loader;
pub mod model;
pub mod query;

pub use api::google_books::{extract_records, format_authors, NO_AUTHORS};
pub use api::Client;
pub use error::{Error, ErrorKind};
pub use loader::{AttemptId, LoadCoordinator, LoadResult, LoadState};
pub use model::BookRecord;
pub use query::{build_url, SearchQuery};

use log::trace;

type DefaultClient = reqwest::blocking::Client;

/// Search books matching the raw user input using the default client, blocking the caller.
///
/// # Errors
///
/// An `Err` is returned when the query is blank, see [`ErrorKind::InvalidQuery`].
/// An `Err` is returned when the request fails or the server does not answer with `200 OK`.
/// An `Err` is returned when the response cannot be parsed into [`BookRecord`]s.
#[inline]
pub fn search_books(raw: &str) -> Result<Vec<BookRecord>, Error> {
    trace!("Search books for '{raw}'");
    let query = SearchQuery::parse(raw)
        .ok_or_else(|| Error::new(ErrorKind::InvalidQuery, "Search query is blank"))?;
    api::google_books::search(&DefaultClient::default(), &query)
}

#[test]
fn blank_search_is_rejected_before_any_request() {
    let kind = search_books(" \t ").map(|_| ()).map_err(|e| e.kind());
    assert_eq!(Err(ErrorKind::InvalidQuery), kind);
}
