// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded endpoint payload.
//!
//! Every snapshot the cloud endpoint hands out carries three fields the
//! client cares about: a message id (one per published snapshot, used for
//! deduplication), the device data itself, and the time the device published
//! it. Anything else in the JSON object is ignored.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;

/// A single decoded snapshot from an endpoint.
///
/// # Examples
///
/// ```
/// use iort_client::Payload;
///
/// let payload: Payload = serde_json::from_str(
///     r#"{"aws_msg_uuid": "m-1", "data": {"temp": 21}, "time": 1700000000000000}"#,
/// ).unwrap();
///
/// assert_eq!(payload.msg_id(), "m-1");
/// assert_eq!(payload.data()["temp"], 21);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Payload {
    #[serde(rename = "aws_msg_uuid")]
    msg_id: String,
    data: Value,
    /// Publish time in microseconds since the Unix epoch.
    #[serde(default, rename = "time")]
    published_us: Option<i64>,
}

impl Payload {
    /// Creates a payload directly, mainly useful for tests and in-memory
    /// endpoint implementations.
    #[must_use]
    pub fn new(msg_id: impl Into<String>, data: Value) -> Self {
        Self {
            msg_id: msg_id.into(),
            data,
            published_us: None,
        }
    }

    /// Returns the message id identifying this snapshot.
    #[must_use]
    pub fn msg_id(&self) -> &str {
        &self.msg_id
    }

    /// Returns the device data.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the payload, returning the device data.
    #[must_use]
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Returns the time the device published this snapshot, if present.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.published_us.and_then(DateTime::from_timestamp_micros)
    }

    /// Returns how long ago this snapshot was published.
    ///
    /// Returns `None` when the payload carries no timestamp. Clock skew
    /// between the device and this host can make the value negative.
    #[must_use]
    pub fn age(&self) -> Option<TimeDelta> {
        self.timestamp().map(|t| Utc::now() - t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_full_payload() {
        let payload: Payload = serde_json::from_value(json!({
            "aws_msg_uuid": "abc-123",
            "data": {"distance": 42, "unit": "cm"},
            "time": 1_700_000_000_000_000_i64,
        }))
        .unwrap();

        assert_eq!(payload.msg_id(), "abc-123");
        assert_eq!(payload.data()["distance"], 42);
        assert_eq!(
            payload.timestamp().unwrap().timestamp_micros(),
            1_700_000_000_000_000
        );
    }

    #[test]
    fn decode_without_time() {
        let payload: Payload = serde_json::from_value(json!({
            "aws_msg_uuid": "abc-123",
            "data": 7,
        }))
        .unwrap();

        assert!(payload.timestamp().is_none());
        assert!(payload.age().is_none());
    }

    #[test]
    fn unknown_fields_ignored() {
        let payload: Payload = serde_json::from_value(json!({
            "aws_msg_uuid": "abc-123",
            "data": {},
            "time": 0,
            "shard": "us-east-2",
        }))
        .unwrap();

        assert_eq!(payload.msg_id(), "abc-123");
    }

    #[test]
    fn missing_msg_id_is_an_error() {
        let result: std::result::Result<Payload, _> =
            serde_json::from_value(json!({ "data": {} }));
        assert!(result.is_err());
    }

    #[test]
    fn into_data_moves_value() {
        let payload = Payload::new("m-1", json!([1, 2, 3]));
        assert_eq!(payload.into_data(), json!([1, 2, 3]));
    }

    #[test]
    fn age_of_recent_payload_is_small() {
        let payload: Payload = serde_json::from_value(json!({
            "aws_msg_uuid": "m-now",
            "data": {},
            "time": Utc::now().timestamp_micros(),
        }))
        .unwrap();

        let age = payload.age().unwrap();
        assert!(age.num_seconds().abs() < 5);
    }
}
