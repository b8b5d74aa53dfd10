// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FIFO hand-off between subscription workers and the dispatcher.
//!
//! Many subscription workers append; exactly one dispatcher drains. The lock
//! is held only for the O(1) queue operation itself, never across a fetch or
//! a callback invocation, so enqueueing never couples one subscription's
//! timing to another's.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Type alias for user-supplied data callbacks.
pub type Callback = Arc<dyn Fn(Value) + Send + Sync>;

/// Delivery gate shared between a subscription and the envelopes it
/// enqueues.
///
/// The dispatcher invokes a callback while holding the gate's lock, and
/// [`close`](Self::close) takes that same lock to flip the gate. Closing
/// therefore waits out a delivery already in flight; once `close` returns,
/// no callback gated on this gate runs again.
#[derive(Clone, Debug)]
pub struct DeliveryGate {
    open: Arc<Mutex<bool>>,
}

impl DeliveryGate {
    /// Creates an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Arc::new(Mutex::new(true)),
        }
    }

    /// Returns `true` while delivery is still wanted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Closes the gate, blocking while a delivery through it is in flight.
    ///
    /// Must not be called from inside a callback gated on this gate; the
    /// dispatcher already holds the lock there and the call would deadlock.
    pub fn close(&self) {
        *self.open.lock() = false;
    }
}

impl Default for DeliveryGate {
    fn default() -> Self {
        Self::new()
    }
}

/// A queued callback invocation: one callback, one data value.
///
/// Envelopes are immutable once enqueued; ownership moves into the queue on
/// enqueue and out to the dispatcher on dequeue. The gate belongs to the
/// subscription that produced the envelope: stopping the subscription closes
/// it, and the dispatcher drops envelopes whose gate is closed instead of
/// invoking them.
pub struct CallbackEnvelope {
    callback: Callback,
    payload: Value,
    gate: DeliveryGate,
}

impl CallbackEnvelope {
    /// Creates an envelope gated on `gate`.
    #[must_use]
    pub fn new(callback: Callback, payload: Value, gate: DeliveryGate) -> Self {
        Self {
            callback,
            payload,
            gate,
        }
    }

    /// Invokes the callback with the payload, consuming the envelope.
    ///
    /// The gate is checked and the callback invoked under one hold of the
    /// gate's lock, so [`DeliveryGate::close`] cannot slip in between the
    /// check and the invocation. Returns `false` without invoking anything
    /// when the gate is already closed.
    pub fn deliver(self) -> bool {
        let Self {
            callback,
            payload,
            gate,
        } = self;
        let open = gate.open.lock();
        if !*open {
            return false;
        }
        callback(payload);
        true
    }
}

impl std::fmt::Debug for CallbackEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackEnvelope")
            .field("gate_open", &self.gate.is_open())
            .finish_non_exhaustive()
    }
}

/// Unbounded FIFO of pending callback invocations.
///
/// Insertion order is dispatch order. There is no capacity limit and
/// therefore no backpressure signal to producers; the queue is bounded only
/// by process memory.
#[derive(Default)]
pub struct DispatchQueue {
    items: Mutex<VecDeque<CallbackEnvelope>>,
}

impl DispatchQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an envelope. Never fails, never blocks beyond the lock.
    pub fn enqueue(&self, envelope: CallbackEnvelope) {
        self.items.lock().push_back(envelope);
    }

    /// Removes and returns the oldest envelope, or `None` when empty.
    /// Never blocks beyond the lock.
    #[must_use]
    pub fn try_dequeue(&self) -> Option<CallbackEnvelope> {
        self.items.lock().pop_front()
    }

    /// Returns the number of pending envelopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if no envelopes are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    fn envelope(payload: Value) -> CallbackEnvelope {
        CallbackEnvelope::new(Arc::new(|_| {}), payload, DeliveryGate::new())
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
    fn new_queue_is_empty() {
        let queue = DispatchQueue::new();
        assert!(queue.is_empty());
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn fifo_order() {
        let queue = DispatchQueue::new();
        queue.enqueue(envelope(json!(1)));
        queue.enqueue(envelope(json!(2)));
        queue.enqueue(envelope(json!(3)));

        let seen = Arc::new(Mutex::new(Vec::new()));
        while let Some(env) = queue.try_dequeue() {
            let seen = seen.clone();
            let env = CallbackEnvelope::new(
                Arc::new(move |v| seen.lock().push(v)),
                env.payload,
                env.gate,
            );
            env.deliver();
        }

        assert_eq!(*seen.lock(), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn deliver_passes_payload() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        let env = CallbackEnvelope::new(
            Arc::new(move |v| {
                assert_eq!(v, json!({"x": 1}));
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
            json!({"x": 1}),
            DeliveryGate::new(),
        );

        assert!(env.deliver());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_gate_suppresses_delivery() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        let gate = DeliveryGate::new();
        let env = CallbackEnvelope::new(
            Arc::new(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
            json!(null),
            gate.clone(),
        );

        assert!(gate.is_open());
        gate.close();
        assert!(!gate.is_open());
        assert!(!env.deliver());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn closing_the_gate_waits_for_the_delivery_in_flight() {
        let gate = DeliveryGate::new();
        let entered = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let entered_clone = Arc::clone(&entered);
        let finished_clone = Arc::clone(&finished);
        let env = CallbackEnvelope::new(
            Arc::new(move |_| {
                entered_clone.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                finished_clone.store(true, Ordering::SeqCst);
            }),
            json!(null),
            gate.clone(),
        );

        let delivery = std::thread::spawn(move || env.deliver());
        assert!(wait_until(Duration::from_secs(2), || {
            entered.load(Ordering::SeqCst)
        }));

        // The callback is mid-invocation; close() may only return after it
        // has completed.
        gate.close();
        assert!(finished.load(Ordering::SeqCst));
        assert!(delivery.join().unwrap());
    }

    #[test]
    fn concurrent_producers_preserve_their_own_order() {
        let queue = Arc::new(DispatchQueue::new());

        let handles: Vec<_> = (0..4)
            .map(|producer| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for seq in 0..100 {
                        queue.enqueue(envelope(json!([producer, seq])));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 400);

        // Per-producer sequence numbers must come out ascending.
        let mut next_seq = [0i64; 4];
        while let Some(env) = queue.try_dequeue() {
            let pair = env.payload;
            let producer = pair[0].as_u64().unwrap() as usize;
            let seq = pair[1].as_i64().unwrap();
            assert_eq!(seq, next_seq[producer]);
            next_seq[producer] += 1;
        }
        assert_eq!(next_seq, [100, 100, 100, 100]);
    }
}
