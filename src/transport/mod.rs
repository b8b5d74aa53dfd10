// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in endpoint transports.
//!
//! Both implement the narrow contracts in [`crate::fetch`] and are entirely
//! optional: any [`crate::Fetcher`] or [`crate::PushSource`] implementation
//! plugs into the same subscription machinery.

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "http")]
pub use http::HttpEndpoint;
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttSource, MqttSourceConfig, data_topic};
