// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single callback-dispatching thread.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::queue::DispatchQueue;
use crate::signal::StopSignal;
use crate::subscription::RunState;

/// Drains the shared [`DispatchQueue`] and invokes callbacks one at a time.
///
/// Exactly one dispatcher owns a queue's consuming end; callbacks therefore
/// execute strictly serialized on the dispatcher thread, never concurrently
/// with each other. A slow callback delays everything queued behind it:
/// at most one dispatch is ever in flight.
///
/// Lifecycle is `Idle → Running → Stopped`, terminal at `Stopped`; the same
/// discipline as [`crate::Subscription`]. A process normally creates one
/// dispatcher (via [`crate::Core`]) at startup and stops it at shutdown.
pub struct Dispatcher {
    queue: Arc<DispatchQueue>,
    poll_interval: Duration,
    stop: StopSignal,
    state: Arc<Mutex<RunState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Default wait between queue polls when the queue is empty.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Creates an idle dispatcher for `queue`.
    #[must_use]
    pub fn new(queue: Arc<DispatchQueue>) -> Self {
        Self::with_poll_interval(queue, Self::DEFAULT_POLL_INTERVAL)
    }

    /// Creates an idle dispatcher with a custom idle-poll interval.
    #[must_use]
    pub fn with_poll_interval(queue: Arc<DispatchQueue>, poll_interval: Duration) -> Self {
        Self {
            queue,
            poll_interval,
            stop: StopSignal::new(),
            state: Arc::new(Mutex::new(RunState::Idle)),
            worker: Mutex::new(None),
        }
    }

    /// Returns `true` while the dispatching thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.state.lock() == RunState::Running
    }

    /// Spawns the dispatching thread.
    ///
    /// Valid only from `Idle`; returns `false` (and does nothing) when the
    /// dispatcher is already running or has been stopped.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        {
            let mut state = self.state.lock();
            if *state != RunState::Idle {
                tracing::debug!(state = ?*state, "dispatcher start ignored");
                return false;
            }
            *state = RunState::Running;
        }

        let queue = Arc::clone(&self.queue);
        let stop = self.stop.clone();
        let state = Arc::clone(&self.state);
        let poll_interval = self.poll_interval;

        *worker = Some(std::thread::spawn(move || {
            tracing::debug!("dispatcher thread started");
            run(&queue, &stop, poll_interval);
            *state.lock() = RunState::Stopped;
            tracing::debug!("dispatcher thread exited");
        }));
        true
    }

    /// Stops the dispatching thread and waits for it to exit.
    ///
    /// Returns `true` when this call performed the `Running → Stopped`
    /// transition; calling it again, or on an idle dispatcher, is a no-op
    /// returning `false`. Envelopes still queued are left undelivered.
    pub fn stop(&self) -> bool {
        // Read and transition under one hold of the state lock so exactly
        // one of any concurrent callers observes Running.
        let was_running = {
            let mut state = self.state.lock();
            if *state == RunState::Idle {
                tracing::debug!("dispatcher stop ignored: not started");
                return false;
            }
            let was_running = *state == RunState::Running;
            *state = RunState::Stopped;
            was_running
        };

        self.stop.raise();
        // The worker lock is held across the join so every caller, winner or
        // not, returns only after the thread has exited.
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }
        was_running
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &*self.state.lock())
            .field("pending", &self.queue.len())
            .finish()
    }
}

/// Dispatch loop: invoke whatever is queued, sleep briefly when idle, exit
/// when the stop signal is observed.
fn run(queue: &DispatchQueue, stop: &StopSignal, poll_interval: Duration) {
    loop {
        if stop.is_raised() {
            break;
        }
        match queue.try_dequeue() {
            Some(envelope) => {
                if envelope.deliver() {
                    tracing::trace!("callback dispatched");
                } else {
                    tracing::trace!("dropping envelope from stopped subscription");
                }
            }
            None => {
                if stop.wait_timeout(poll_interval) {
                    break;
                }
            }
        }
    }
}
