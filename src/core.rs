// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process-level entry point tying the pieces together.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::payload::Payload;
use crate::queue::DispatchQueue;
use crate::subscription::{Subscription, SubscriptionOptions};

/// Owns the shared dispatch queue and the dispatcher thread, and hands out
/// subscriptions bound to them.
///
/// Create one `Core` per process (or per logical client) at startup. The
/// dispatcher starts with the core and stops when the core is dropped;
/// subscriptions are created and destroyed freely in between, each with a
/// lifetime independent of the others.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use iort_client::{Core, HttpEndpoint};
///
/// fn main() -> iort_client::Result<()> {
///     let endpoint = HttpEndpoint::new("https://example.execute-api.us-east-2.amazonaws.com/prod/get-latest-by-uuid")?;
///     let core = Core::new(Arc::new(endpoint));
///
///     let sub = core.subscribe("3b241101-e2bb-4255-8caf-4136c566a962", |data| {
///         println!("distance: {}", data["distance"]);
///     });
///
///     std::thread::sleep(Duration::from_secs(10));
///     sub.stop();
///     Ok(())
/// }
/// ```
pub struct Core {
    queue: Arc<DispatchQueue>,
    dispatcher: Dispatcher,
    fetcher: Arc<dyn Fetcher>,
}

impl Core {
    /// Creates a core around `fetcher` and starts the dispatcher thread.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_poll_interval(fetcher, Dispatcher::DEFAULT_POLL_INTERVAL)
    }

    /// Creates a core with a custom dispatcher idle-poll interval.
    #[must_use]
    pub fn with_poll_interval(fetcher: Arc<dyn Fetcher>, poll_interval: Duration) -> Self {
        let queue = Arc::new(DispatchQueue::new());
        let dispatcher = Dispatcher::with_poll_interval(Arc::clone(&queue), poll_interval);
        dispatcher.start();
        tracing::debug!("core created, dispatcher running");
        Self {
            queue,
            dispatcher,
            fetcher,
        }
    }

    /// Fetches the latest snapshot for `id` once, bypassing the
    /// subscription machinery.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`crate::FetchError`] on transport failure,
    /// timeout, or undecodable payload.
    pub fn get(&self, id: &str, timeout: Duration) -> Result<Payload> {
        Ok(self.fetcher.fetch(id, timeout)?)
    }

    /// Subscribes to `id` with default options and starts the worker.
    ///
    /// `callback` runs on the dispatcher thread, one invocation at a time,
    /// never concurrently with any other callback.
    pub fn subscribe<F>(&self, id: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.subscribe_with(id, callback, SubscriptionOptions::default())
    }

    /// Subscribes to `id` with explicit options and starts the worker.
    pub fn subscribe_with<F>(
        &self,
        id: impl Into<String>,
        callback: F,
        options: SubscriptionOptions,
    ) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let subscription = Subscription::new(
            id,
            callback,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.queue),
            options,
        );
        subscription.start();
        subscription
    }

    /// Returns `true` while the dispatcher thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Returns the number of callback invocations waiting to be dispatched.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.queue.len()
    }

    /// Stops the dispatcher thread.
    ///
    /// Also happens on drop; exposed for callers that want an explicit
    /// shutdown point. Subscriptions keep their workers and must be stopped
    /// separately, but nothing they enqueue afterwards is dispatched.
    pub fn shutdown(&self) -> bool {
        self.dispatcher.stop()
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("dispatcher", &self.dispatcher)
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    struct CountingFetcher {
        calls: AtomicU32,
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, id: &str, _timeout: Duration) -> std::result::Result<Payload, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Payload::new(format!("m-{n}"), json!({ "id": id, "n": n })))
        }
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn core_starts_and_shuts_down_dispatcher() {
        let core = Core::new(Arc::new(CountingFetcher {
            calls: AtomicU32::new(0),
        }));
        assert!(core.is_running());
        assert!(core.shutdown());
        assert!(!core.is_running());
        assert!(!core.shutdown());
    }

    #[test]
    fn get_returns_snapshot() {
        let core = Core::new(Arc::new(CountingFetcher {
            calls: AtomicU32::new(0),
        }));
        let payload = core.get("entity-9", Duration::from_millis(10)).unwrap();
        assert_eq!(payload.data()["id"], "entity-9");
    }

    #[test]
    fn subscribe_delivers_data_to_callback() {
        let core = Core::new(Arc::new(CountingFetcher {
            calls: AtomicU32::new(0),
        }));
        let delivered = Arc::new(AtomicU32::new(0));
        let delivered_clone = Arc::clone(&delivered);

        let sub = core.subscribe("entity-1", move |_data| {
            delivered_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_running());

        assert!(wait_until(Duration::from_secs(2), || {
            delivered.load(Ordering::SeqCst) >= 3
        }));
        sub.stop();
    }
}
