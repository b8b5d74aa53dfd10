// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-shot cancellation signal for worker threads.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A one-shot stop signal shared between an owner and its worker thread.
///
/// Cloning produces another handle to the same signal. Once raised it stays
/// raised; raising it again is a no-op. Workers observe it cooperatively by
/// using [`wait_timeout`](Self::wait_timeout) as their bounded sleep, so a
/// stop request interrupts the wait instead of letting it run out.
#[derive(Clone, Default)]
pub(crate) struct StopSignal {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    raised: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    /// Creates a new, unraised signal.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Raises the signal, waking all current and future waiters. Idempotent.
    pub(crate) fn raise(&self) {
        let mut raised = self.inner.raised.lock();
        *raised = true;
        self.inner.condvar.notify_all();
    }

    /// Returns `true` if the signal has been raised.
    pub(crate) fn is_raised(&self) -> bool {
        *self.inner.raised.lock()
    }

    /// Waits up to `timeout` for the signal.
    ///
    /// Returns `true` if the signal was raised (possibly before the call),
    /// `false` if the timeout elapsed first.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut raised = self.inner.raised.lock();
        if *raised {
            return true;
        }
        self.inner
            .condvar
            .wait_while_for(&mut raised, |raised| !*raised, timeout);
        *raised
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("raised", &self.is_raised())
            .finish()
    }
}
