// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP endpoint transport.
//!
//! The cloud side exposes a single function URL that answers "latest
//! snapshot for this device": a POST with `{"uuid": <id>, "points": "1"}`
//! returns the payload JSON. Each fetch is an independent request with its
//! own timeout, so one [`HttpEndpoint`] serves any number of subscription
//! workers concurrently.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use crate::error::{ConfigError, Error, FetchError, Result};
use crate::fetch::Fetcher;
use crate::payload::Payload;

/// A pull-style endpoint backed by an HTTP function URL.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use iort_client::{Fetcher, HttpEndpoint};
///
/// # fn main() -> iort_client::Result<()> {
/// let endpoint = HttpEndpoint::new("https://api.example.com/get-latest-by-uuid")?;
/// let payload = endpoint.fetch("device-uuid", Duration::from_secs(1))?;
/// println!("{}", payload.data());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    url: String,
    client: Client,
}

impl HttpEndpoint {
    /// Creates an endpoint for the given function URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] when `url` is not an
    /// http(s) URL, or a fetch error when the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(ConfigError::InvalidAddress(url)));
        }

        let client = Client::builder().build().map_err(FetchError::Http)?;
        Ok(Self { url, client })
    }

    /// Creates an endpoint using an already-configured blocking client.
    ///
    /// Useful for proxies, custom TLS roots, or connection-pool tuning.
    #[must_use]
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    /// Returns the function URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Fetcher for HttpEndpoint {
    fn fetch(&self, id: &str, timeout: Duration) -> std::result::Result<Payload, FetchError> {
        tracing::trace!(url = %self.url, %id, "fetching snapshot");

        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(&json!({ "uuid": id, "points": "1" }))
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    FetchError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
                } else {
                    FetchError::Http(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().map_err(FetchError::Http)?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_urls() {
        assert!(HttpEndpoint::new("http://example.com/fn").is_ok());
        assert!(HttpEndpoint::new("https://example.com/fn").is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        let result = HttpEndpoint::new("ftp://example.com/fn");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidAddress(_)))
        ));
    }

    #[test]
    fn url_accessor() {
        let endpoint = HttpEndpoint::new("https://example.com/fn").unwrap();
        assert_eq!(endpoint.url(), "https://example.com/fn");
    }
}
