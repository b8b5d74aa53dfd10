// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the HTTP endpoint transport using wiremock.
//!
//! The endpoint client is blocking, so each test builds a tokio runtime by
//! hand to host the mock server and performs the fetches from the plain
//! test thread.

#![cfg(feature = "http")]

use std::time::Duration;

use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use iort_client::{FetchError, Fetcher, HttpEndpoint};

fn mock_server(rt: &Runtime) -> MockServer {
    rt.block_on(MockServer::start())
}

#[test]
fn fetch_decodes_snapshot() {
    let rt = Runtime::new().unwrap();
    let server = mock_server(&rt);

    rt.block_on(
        Mock::given(method("POST"))
            .and(body_json(json!({ "uuid": "device-1", "points": "1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "aws_msg_uuid": "m-77",
                "data": { "distance": 12, "unit": "cm" },
                "time": 1_700_000_000_000_000_i64,
            })))
            .mount(&server),
    );

    let endpoint = HttpEndpoint::new(server.uri()).unwrap();
    let payload = endpoint.fetch("device-1", Duration::from_secs(1)).unwrap();

    assert_eq!(payload.msg_id(), "m-77");
    assert_eq!(payload.data()["distance"], 12);
    assert!(payload.timestamp().is_some());
}

#[test]
fn non_success_status_is_an_error() {
    let rt = Runtime::new().unwrap();
    let server = mock_server(&rt);

    rt.block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server),
    );

    let endpoint = HttpEndpoint::new(server.uri()).unwrap();
    let err = endpoint
        .fetch("device-1", Duration::from_secs(1))
        .unwrap_err();

    assert!(matches!(err, FetchError::Status(503)));
}

#[test]
fn undecodable_body_is_an_error() {
    let rt = Runtime::new().unwrap();
    let server = mock_server(&rt);

    rt.block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server),
    );

    let endpoint = HttpEndpoint::new(server.uri()).unwrap();
    let err = endpoint
        .fetch("device-1", Duration::from_secs(1))
        .unwrap_err();

    assert!(matches!(err, FetchError::Decode(_)));
}

#[test]
fn slow_endpoint_times_out() {
    let rt = Runtime::new().unwrap();
    let server = mock_server(&rt);

    rt.block_on(
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "aws_msg_uuid": "m-1", "data": {} }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server),
    );

    let endpoint = HttpEndpoint::new(server.uri()).unwrap();
    let err = endpoint
        .fetch("device-1", Duration::from_millis(100))
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout(100)));
}

#[test]
fn missing_msg_id_is_a_decode_error() {
    let rt = Runtime::new().unwrap();
    let server = mock_server(&rt);

    rt.block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .mount(&server),
    );

    let endpoint = HttpEndpoint::new(server.uri()).unwrap();
    let err = endpoint
        .fetch("device-1", Duration::from_secs(1))
        .unwrap_err();

    assert!(matches!(err, FetchError::Decode(_)));
}
