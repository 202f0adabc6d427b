//! HTTP access shared by discovery and fetching.
//!
//! All requests carry the same identifying headers and a bounded timeout.
//! A non-2xx status is reported as [`FetchError::Status`] rather than being
//! handed to the parser.

use crate::error::FetchError;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::{debug, instrument};

pub const USER_AGENT_VALUE: &str = "VitosScrapper/1.0";
pub const ACCEPT_VALUE: &str = "text/html,application/xml;q=0.9,*/*;q=0.8";
pub const ACCEPT_LANGUAGE_VALUE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Retrieves the body of a page as text.
///
/// Implemented by [`HttpClient`] for real crawls and by an in-memory
/// fetcher in tests.
pub trait PageFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// `reqwest` client preconfigured with the crawler's headers and timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Build the shared client.
    ///
    /// # Returns
    ///
    /// A client sending the crawler's `User-Agent`, `Accept` and
    /// `Accept-Language` headers with a 10 second timeout, or an error if the
    /// TLS backend cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpClient {
    #[instrument(level = "debug", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values_are_valid() {
        assert!(HeaderValue::from_str(USER_AGENT_VALUE).is_ok());
        assert!(HeaderValue::from_str(ACCEPT_VALUE).is_ok());
        assert!(HeaderValue::from_str(ACCEPT_LANGUAGE_VALUE).is_ok());
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpClient::new().is_ok());
    }
}
