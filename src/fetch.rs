// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The two transport contracts the client core consumes.
//!
//! Subscription workers and [`crate::Core::get`] talk to the outside world
//! exclusively through [`Fetcher`]: "fetch the current snapshot for this
//! entity id, within this timeout". Push-style transports (an MQTT broker
//! delivering snapshots as they are published) implement the narrower
//! [`PushSource`] contract instead, "hand me the next pushed message,
//! within this timeout", and are adapted to `Fetcher` by a blanket impl,
//! so the subscription machinery never distinguishes the two.

use std::time::Duration;

use crate::error::FetchError;
use crate::payload::Payload;

/// A pull-style endpoint: fetch the current snapshot for an entity.
///
/// Implementations must be usable from many subscription worker threads at
/// once; each call is independent and must respect its own `timeout` budget
/// (exceeding it should surface as an error rather than an unbounded wait).
pub trait Fetcher: Send + Sync {
    /// Fetches the latest snapshot published by the entity `id`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on transport failure, non-success response,
    /// timeout, or undecodable payload.
    fn fetch(&self, id: &str, timeout: Duration) -> Result<Payload, FetchError>;
}

/// A push-style source: messages arrive on their own schedule.
///
/// The entity binding happens at construction time (e.g. the broker topic
/// subscribed to), so unlike [`Fetcher`] there is no id parameter.
pub trait PushSource: Send + Sync {
    /// Waits up to `timeout` for the next pushed message.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] when no message arrives in time, or
    /// another [`FetchError`] on transport failure.
    fn next_message(&self, timeout: Duration) -> Result<Payload, FetchError>;
}

// A push source is a fetcher whose "current snapshot" is whatever arrives
// next; the id was fixed when the source was built.
impl<S: PushSource> Fetcher for S {
    fn fetch(&self, _id: &str, timeout: Duration) -> Result<Payload, FetchError> {
        self.next_message(timeout)
    }
}
