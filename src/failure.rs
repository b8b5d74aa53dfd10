// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consecutive-failure accounting for subscription workers.

/// Tracks consecutive fetch failures against a give-up threshold.
///
/// Any successful fetch resets the count to zero, including one that turns
/// out to be a duplicate snapshot; the tracker measures transport health,
/// not data novelty. There is no backoff: the poll cadence stays fixed and
/// only the decision to keep trying changes.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive: u32,
    max: u32,
}

impl FailureTracker {
    /// Creates a tracker that gives up after `max` consecutive failures.
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self {
            consecutive: 0,
            max,
        }
    }

    /// Records one failure.
    ///
    /// Returns `true` when the consecutive count has reached the threshold
    /// and the caller should give up.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive >= self.max
    }

    /// Records a success, resetting the consecutive count.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Returns the current consecutive-failure count.
    #[must_use]
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Returns the configured give-up threshold.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }
}
