// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `iort-client` - a Rust client for IoRT cloud telemetry endpoints.
//!
//! Devices publish JSON snapshots to a cloud endpoint; this library lets an
//! application subscribe to a device's stream by its opaque id and receive
//! change notifications through a callback, without coupling the caller to
//! network timing.
//!
//! # Architecture
//!
//! - Each [`Subscription`] owns one background worker thread that polls the
//!   endpoint on a fixed cadence and deduplicates snapshots by message id.
//! - All workers feed one shared FIFO [`DispatchQueue`].
//! - A single [`Dispatcher`] thread (owned by [`Core`]) drains the queue and
//!   invokes user callbacks strictly one at a time.
//!
//! Network I/O and user code therefore never share a thread: a slow endpoint
//! cannot stall callbacks for other devices, and a slow callback cannot
//! stall polling.
//!
//! Workers never panic or return errors across the thread boundary. A
//! subscription that keeps failing gives up after a configured number of
//! consecutive failures and reports it through
//! [`Subscription::is_running`] and [`Subscription::stop_cause`]; there is
//! no automatic restart.
//!
//! # Quick Start
//!
//! ## HTTP polling
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use iort_client::{Core, HttpEndpoint, SubscriptionOptions};
//!
//! fn main() -> iort_client::Result<()> {
//!     let endpoint = HttpEndpoint::new("https://api.example.com/get-latest-by-uuid")?;
//!     let core = Core::new(Arc::new(endpoint));
//!
//!     // One-shot read
//!     let snapshot = core.get("device-uuid", Duration::from_secs(1))?;
//!     println!("now: {}", snapshot.data());
//!
//!     // Continuous updates at 10 Hz, give up after 5 consecutive failures
//!     let options = SubscriptionOptions::new()
//!         .with_max_failures(5)
//!         .with_rate(10.0)?;
//!     let sub = core.subscribe_with("device-uuid", |data| {
//!         println!("update: {data}");
//!     }, options);
//!
//!     std::thread::sleep(Duration::from_secs(30));
//!     sub.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## MQTT push
//!
//! ```no_run
//! use std::sync::Arc;
//! use iort_client::{Core, MqttSourceConfig};
//!
//! # fn main() -> iort_client::Result<()> {
//! # let (ca, cert, key) = (vec![], vec![], vec![]);
//! let source = MqttSourceConfig::new("broker.example.com")
//!     .with_tls(ca, cert, key)
//!     .connect("device-uuid")?;
//!
//! let core = Core::new(Arc::new(source));
//! let _sub = core.subscribe("device-uuid", |data| {
//!     println!("pushed: {data}");
//! });
//! # Ok(())
//! # }
//! ```

mod core;
mod dispatcher;
pub mod error;
mod failure;
mod fetch;
mod payload;
mod queue;
mod signal;
mod subscription;
pub mod transport;

pub use crate::core::Core;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, Error, FetchError, Result};
pub use failure::FailureTracker;
pub use fetch::{Fetcher, PushSource};
pub use payload::Payload;
pub use queue::{Callback, CallbackEnvelope, DeliveryGate, DispatchQueue};
pub use subscription::{RunState, StopCause, Subscription, SubscriptionOptions};

#[cfg(feature = "http")]
pub use transport::HttpEndpoint;
#[cfg(feature = "mqtt")]
pub use transport::{MqttSource, MqttSourceConfig};
