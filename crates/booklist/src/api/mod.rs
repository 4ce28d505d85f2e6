use log::{info, trace};
use reqwest::StatusCode;

pub(crate) mod google_books;

/// The seam between the search pipeline and the network.
///
/// Implementations issue a blocking `GET` request for the url and return the full response body
/// as text. They must only be called off the foreground thread.
pub trait Client
where
    Self: Default,
{
    /// Fetches the body of the resource at `url`.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::Network`] error is returned when the request cannot be completed.
    /// An [`ErrorKind::HttpStatus`] error is returned when the status code is not `200 OK`.
    fn get_text(&self, url: &str) -> Result<String, Error>;
}

impl Client for reqwest::blocking::Client {
    fn get_text(&self, url: &str) -> Result<String, Error> {
        info!("GET {url}");
        // The response owns the connection and releases it when dropped on any return path.
        let resp = self
            .get(url)
            .send()
            .map_err(|e| Error::wrap(ErrorKind::Network, e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(Error::new(
                ErrorKind::HttpStatus(status.as_u16()),
                status
                    .canonical_reason()
                    .unwrap_or("Unexpected response status"),
            ));
        }

        let bytes = resp
            .bytes()
            .map_err(|e| Error::wrap(ErrorKind::Network, e))?;
        trace!("Read {} bytes from response body", bytes.len());

        String::from_utf8(bytes.to_vec()).map_err(|e| Error::wrap(ErrorKind::ParseFailure, e))
    }
}

#[cfg(test)]
pub(crate) use test::{
    assert_url, impl_text_producer, MockClient, NetworkErrorProducer, Producer, URL_SINK,
};

use crate::{Error, ErrorKind};
