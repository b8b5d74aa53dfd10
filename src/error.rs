// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the IoRT client library.
//!
//! Fetch failures are deliberately kept local to the subscription worker
//! that encountered them (they feed the consecutive-failure counter and are
//! never propagated to the subscription's owner); the types here surface at
//! the public API only from one-shot operations such as [`crate::Core::get`]
//! and from transport construction.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A fetch against the endpoint failed.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Invalid configuration was supplied.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors produced by a single fetch or receive attempt against an endpoint.
///
/// Inside a subscription worker every variant counts as exactly one
/// transient failure; none of them are fatal on their own.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP transport failure (connection, TLS, request timeout).
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT client operation failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// MQTT connection-level failure while waiting for a message.
    #[cfg(feature = "mqtt")]
    #[error("MQTT connection error: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),

    /// The endpoint answered with a non-success status code.
    #[error("endpoint returned HTTP status {0}")]
    Status(u16),

    /// No data arrived within the per-call timeout budget.
    #[error("no data within {0} ms")]
    Timeout(u64),

    /// The response body was not a valid payload.
    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Connecting to the endpoint failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Errors related to subscription or transport configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A poll rate must be positive and finite.
    #[error("poll rate {0} is not a positive, finite value")]
    InvalidRate(f64),

    /// An endpoint address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let err = FetchError::Status(503);
        assert_eq!(err.to_string(), "endpoint returned HTTP status 503");
    }

    #[test]
    fn timeout_display() {
        let err = FetchError::Timeout(1000);
        assert_eq!(err.to_string(), "no data within 1000 ms");
    }

    #[test]
    fn error_from_fetch_error() {
        let err: Error = FetchError::Status(404).into();
        assert!(matches!(err, Error::Fetch(FetchError::Status(404))));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidRate(-5.0);
        assert_eq!(
            err.to_string(),
            "poll rate -5 is not a positive, finite value"
        );
    }

    #[test]
    fn decode_error_wraps_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: FetchError = json_err.into();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
