// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracked timeouts on the tokio timer.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::continuation::Outcome;
use crate::leg::{LegId, LegOptions};
use crate::tracker::Tracker;

/// Schedules callbacks after a delay, attributing them to the current leg.
#[derive(Debug, Clone)]
pub struct Timers {
    tracker: Tracker,
}

/// A scheduled timeout. Pass it to [`Timers::clear_timeout`] to cancel.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
    leg: Option<LegId>,
}

impl TimerHandle {
    /// Abort id of the timeout's leg, if it was scheduled inside an operation.
    pub fn leg_id(&self) -> Option<LegId> {
        self.leg
    }

    /// Whether the timeout has fired or been cleared.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Outcome for TimerHandle {
    fn is_success(&self) -> bool {
        true
    }
}

impl Timers {
    pub fn new(tracker: Tracker) -> Self {
        Self { tracker }
    }

    /// Run `f` after `delay`. Must be called within a tokio runtime.
    pub fn set_timeout<F, R>(&self, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce() -> R + Send + 'static,
        R: Outcome + 'static,
    {
        self.set_timeout_with(LegOptions::new(), delay, f)
    }

    /// Like [`Timers::set_timeout`], with an explicit label. The cause is
    /// always `timeout`.
    pub fn set_timeout_with<F, R>(&self, options: LegOptions, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce() -> R + Send + 'static,
        R: Outcome + 'static,
    {
        let continuation = self.tracker.wrap(options.cause("timeout"), f);
        let leg = continuation.leg_id();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            continuation.run();
        });

        TimerHandle { task, leg }
    }

    /// Cancel a timeout. Returns true if it had not fired yet and its leg
    /// was removed from its operation.
    pub fn clear_timeout(&self, handle: TimerHandle) -> bool {
        handle.task.abort();
        match handle.leg {
            Some(leg) => self.tracker.abort(leg),
            None => false,
        }
    }
}
