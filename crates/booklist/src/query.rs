//! Turning raw user input into search requests.

use std::fmt;

/// The Google Books volume search endpoint, the query is appended as the `q` parameter.
pub const SEARCH_URL: &str = "https://www.googleapis.com/books/v1/volumes?q=";

/// A normalized search query.
///
/// The query has no leading or trailing whitespace and every internal run of whitespace has
/// been replaced with a single `+`, so it can be appended to [`SEARCH_URL`] as is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Normalizes the raw user input into a [`SearchQuery`].
    ///
    /// Returns [`None`] when the input is empty or only contains whitespace.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let query = raw.split_whitespace().collect::<Vec<_>>().join("+");
        if query.is_empty() {
            None
        } else {
            Some(Self(query))
        }
    }

    /// The normalized query string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The request URL for this query.
    #[must_use]
    pub fn url(&self) -> String {
        let mut url = SEARCH_URL.to_owned();
        url.push_str(&self.0);
        url
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the request URL for the raw user input.
///
/// Only whitespace is substituted, no other characters are percent-encoded.
///
/// Returns [`None`] when the input is blank, in which case no request should be made.
#[must_use]
pub fn build_url(raw: &str) -> Option<String> {
    SearchQuery::parse(raw).map(|query| query.url())
}
