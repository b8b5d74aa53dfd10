// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-entity subscription workers.
//!
//! A [`Subscription`] owns one background thread bound to one entity id. The
//! thread polls the endpoint on a fixed cadence, discards snapshots it has
//! already seen (by message id, not by payload equality, since a cache-backed
//! endpoint returns the same snapshot many times), and hands new data to the
//! shared dispatch queue. It stops itself after too many consecutive fetch
//! failures, or when the owner asks it to.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ConfigError;
use crate::failure::FailureTracker;
use crate::fetch::Fetcher;
use crate::queue::{Callback, CallbackEnvelope, DeliveryGate, DispatchQueue};
use crate::signal::StopSignal;

/// Lifecycle state shared by subscriptions and the dispatcher.
///
/// `Stopped` is terminal: a stopped worker is never restarted. To resume
/// receiving data for an entity, create a fresh [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Created, worker not yet started.
    Idle,
    /// Worker thread is running.
    Running,
    /// Worker thread has exited. Terminal.
    Stopped,
}

impl RunState {
    /// Returns `true` for the `Running` state.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Why a subscription stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The owner requested the stop.
    Cancelled,
    /// The worker hit the consecutive-failure threshold and gave up.
    GaveUp,
}

/// Per-subscription timing and failure configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use iort_client::SubscriptionOptions;
///
/// let options = SubscriptionOptions::new()
///     .with_timeout(Duration::from_millis(500))
///     .with_max_failures(5)
///     .with_rate(20.0)
///     .unwrap(); // 20 Hz -> 50 ms cadence
///
/// assert_eq!(options.cadence(), Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct SubscriptionOptions {
    cadence: Duration,
    timeout: Duration,
    max_failures: u32,
}

impl SubscriptionOptions {
    /// Default minimum interval between polls.
    pub const DEFAULT_CADENCE: Duration = Duration::from_millis(1);
    /// Default per-fetch timeout budget.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);
    /// Default consecutive-failure threshold.
    pub const DEFAULT_MAX_FAILURES: u32 = 10;

    /// Creates options with the default cadence, timeout and threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cadence: Self::DEFAULT_CADENCE,
            timeout: Self::DEFAULT_TIMEOUT,
            max_failures: Self::DEFAULT_MAX_FAILURES,
        }
    }

    /// Sets the minimum interval between polls.
    #[must_use]
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Sets the cadence from a poll rate in Hz.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRate`] when `hz` is not positive and
    /// finite.
    pub fn with_rate(mut self, hz: f64) -> Result<Self, ConfigError> {
        if !(hz.is_finite() && hz > 0.0) {
            return Err(ConfigError::InvalidRate(hz));
        }
        self.cadence = Duration::from_secs_f64(1.0 / hz);
        Ok(self)
    }

    /// Sets the per-fetch timeout budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many consecutive failures the worker tolerates before
    /// giving up.
    #[must_use]
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Returns the minimum interval between polls.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Returns the per-fetch timeout budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the consecutive-failure threshold.
    #[must_use]
    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A background worker tracking one entity's data stream.
///
/// Normally created through [`crate::Core::subscribe`], which starts the
/// worker immediately. The worker keeps its deduplication state and failure
/// counter private to its own thread; the owner observes liveness through
/// [`is_running`](Self::is_running) and [`stop_cause`](Self::stop_cause).
///
/// Dropping a subscription stops it.
pub struct Subscription {
    id: String,
    callback: Callback,
    fetcher: Arc<dyn Fetcher>,
    queue: Arc<DispatchQueue>,
    options: SubscriptionOptions,
    stop: StopSignal,
    /// Gate carried by every envelope this subscription enqueues. Closed on
    /// explicit stop so nothing is delivered after `stop()` returns; left
    /// open on give-up.
    gate: DeliveryGate,
    state: Arc<Mutex<RunState>>,
    cause: Arc<Mutex<Option<StopCause>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    /// Creates an idle subscription bound to `id`.
    ///
    /// The worker is not started; call [`start`](Self::start).
    #[must_use]
    pub fn new<F>(
        id: impl Into<String>,
        callback: F,
        fetcher: Arc<dyn Fetcher>,
        queue: Arc<DispatchQueue>,
        options: SubscriptionOptions,
    ) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            callback: Arc::new(callback),
            fetcher,
            queue,
            options,
            stop: StopSignal::new(),
            gate: DeliveryGate::new(),
            state: Arc::new(Mutex::new(RunState::Idle)),
            cause: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    /// Returns the entity id this subscription tracks.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the configured options.
    #[must_use]
    pub fn options(&self) -> &SubscriptionOptions {
        &self.options
    }

    /// Returns `true` while the worker thread is running.
    ///
    /// Becomes `false` after [`stop`](Self::stop) and also when the worker
    /// gives up on its own; poll this (or [`stop_cause`](Self::stop_cause))
    /// to observe liveness. A subscription never signals give-up any other
    /// way.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().is_running()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        *self.state.lock()
    }

    /// Returns why the subscription stopped, or `None` while it has not.
    #[must_use]
    pub fn stop_cause(&self) -> Option<StopCause> {
        *self.cause.lock()
    }

    /// Spawns the worker thread.
    ///
    /// Valid only from `Idle`; returns `false` (and spawns nothing) when the
    /// subscription is already running or has stopped.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        {
            let mut state = self.state.lock();
            if *state != RunState::Idle {
                tracing::debug!(id = %self.id, state = ?*state, "subscription start ignored");
                return false;
            }
            *state = RunState::Running;
        }

        let ctx = WorkerContext {
            id: self.id.clone(),
            callback: Arc::clone(&self.callback),
            fetcher: Arc::clone(&self.fetcher),
            queue: Arc::clone(&self.queue),
            options: self.options.clone(),
            stop: self.stop.clone(),
            gate: self.gate.clone(),
            state: Arc::clone(&self.state),
            cause: Arc::clone(&self.cause),
        };

        *worker = Some(std::thread::spawn(move || run(&ctx)));
        tracing::debug!(id = %self.id, "subscription started");
        true
    }

    /// Stops the worker and waits for its thread to exit.
    ///
    /// Join semantics: when this returns, the worker no longer touches any
    /// subscription state, and no callback from this subscription will run
    /// afterwards. Envelopes already queued are gated off, and a callback
    /// the dispatcher has already begun is waited out before this returns.
    /// For that reason `stop` must not be called from inside this
    /// subscription's own callback; the call would deadlock on the delivery
    /// gate. Returns `true` when this call performed the
    /// `Running → Stopped` transition; stopping an idle or already-stopped
    /// subscription is a no-op returning `false`.
    pub fn stop(&self) -> bool {
        // Read and transition under one hold of the state lock so exactly
        // one of any concurrent callers observes Running.
        let was_running = {
            let mut state = self.state.lock();
            if *state == RunState::Idle {
                tracing::debug!(id = %self.id, "subscription stop ignored: not started");
                return false;
            }
            let was_running = *state == RunState::Running;
            *state = RunState::Stopped;
            was_running
        };

        self.stop.raise();
        // The worker lock is held across the join so every caller, winner or
        // not, returns only after the thread has exited.
        {
            let mut worker = self.worker.lock();
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
        // Closing blocks until a delivery already holding the gate finishes.
        self.gate.close();
        tracing::debug!(id = %self.id, was_running, "subscription stopped");
        was_running
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("state", &*self.state.lock())
            .field("cause", &*self.cause.lock())
            .finish_non_exhaustive()
    }
}

/// Everything the worker thread owns or shares with its `Subscription`.
struct WorkerContext {
    id: String,
    callback: Callback,
    fetcher: Arc<dyn Fetcher>,
    queue: Arc<DispatchQueue>,
    options: SubscriptionOptions,
    stop: StopSignal,
    gate: DeliveryGate,
    state: Arc<Mutex<RunState>>,
    cause: Arc<Mutex<Option<StopCause>>>,
}

/// Worker loop. Deduplication state and the failure counter live on this
/// thread's stack and are never touched by anyone else.
fn run(ctx: &WorkerContext) {
    let mut last_msg_id: Option<String> = None;
    let mut failures = FailureTracker::new(ctx.options.max_failures());

    let cause = loop {
        // The cadence wait doubles as the cancellation checkpoint.
        if ctx.stop.wait_timeout(ctx.options.cadence()) {
            break StopCause::Cancelled;
        }

        match ctx.fetcher.fetch(&ctx.id, ctx.options.timeout()) {
            Err(err) => {
                tracing::debug!(id = %ctx.id, error = %err, "fetch failed");
                if failures.record_failure() {
                    tracing::warn!(
                        id = %ctx.id,
                        failures = failures.consecutive(),
                        "giving up after consecutive fetch failures"
                    );
                    break StopCause::GaveUp;
                }
            }
            Ok(payload) => {
                failures.record_success();
                if last_msg_id.as_deref() == Some(payload.msg_id()) {
                    tracing::trace!(id = %ctx.id, msg_id = payload.msg_id(), "duplicate snapshot");
                    continue;
                }
                tracing::trace!(id = %ctx.id, msg_id = payload.msg_id(), "new snapshot accepted");
                last_msg_id = Some(payload.msg_id().to_owned());
                ctx.queue.enqueue(CallbackEnvelope::new(
                    Arc::clone(&ctx.callback),
                    payload.into_data(),
                    ctx.gate.clone(),
                ));
            }
        }
    };

    *ctx.cause.lock() = Some(cause);
    *ctx.state.lock() = RunState::Stopped;
    tracing::debug!(id = %ctx.id, ?cause, "subscription worker exited");
}
