use log::{info, trace};
use serde::Deserialize;

use crate::{model::BookRecord, query::SearchQuery, Error, ErrorKind};

use super::Client;

/// Display string used when a book has no author list.
pub const NO_AUTHORS: &str = "No authors specified";

pub(crate) fn search<C: Client>(client: &C, query: &SearchQuery) -> Result<Vec<BookRecord>, Error> {
    info!("Searching for '{query}' using Google Books API");
    let body = client.get_text(&query.url())?;

    trace!("Request was successful");

    extract_records(&body)
}

/// Parses a Google Books volume search response into book records, in response order.
///
/// An empty or blank body produces no records and is not an error.
///
/// # Errors
///
/// An [`ErrorKind::ParseFailure`] error is returned when the body is not valid JSON, has no
/// `items` array, or any item lacks a `volumeInfo` with a `title` and an `authors` list. A
/// single malformed item fails the whole extraction.
pub fn extract_records(body: &str) -> Result<Vec<BookRecord>, Error> {
    if body.trim().is_empty() {
        trace!("Empty response body - no records to extract");
        return Ok(Vec::new());
    }

    let SearchModel { items } =
        serde_json::from_str(body).map_err(|e| Error::wrap(ErrorKind::ParseFailure, e))?;

    trace!("Response contained {} items", items.len());

    Ok(items.into_iter().map(BookRecord::from).collect())
}

/// Joins the author names into a single display string.
///
/// Names are joined with `", "` in their original order, a missing list is shown as
/// [`NO_AUTHORS`].
#[must_use]
pub fn format_authors<S: AsRef<str>>(authors: Option<&[S]>) -> String {
    authors.map_or_else(
        || NO_AUTHORS.to_owned(),
        |authors| {
            authors
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(", ")
        },
    )
}

#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct SearchModel {
    items: Vec<Item>,
}

#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct Item {
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

/// Volume information from the Google Book API
#[derive(Deserialize)]
#[cfg_attr(test, derive(Debug))]
struct VolumeInfo {
    // both are required, an item without them fails the response
    authors: Vec<String>,
    title: String,
}

impl From<Item> for BookRecord {
    fn from(item: Item) -> Self {
        let Item {
            volume_info: VolumeInfo { authors, title },
        } = item;

        Self::new(format_authors(Some(authors.as_slice())), title)
    }
}
