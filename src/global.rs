// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide default tracker.
//!
//! Libraries that cannot thread a [`Tracker`] through their call graph can
//! use these free functions, which all act on one lazily created tracker.
//! Everything here is a thin forward to the same-named [`Tracker`] method.

use once_cell::sync::Lazy;
use tokio::sync::mpsc;

use crate::continuation::{Continuation, Outcome};
use crate::leg::{LegId, LegOptions};
use crate::operation::Operation;
use crate::tracker::{Fork, Tracker};

static GLOBAL_TRACKER: Lazy<Tracker> = Lazy::new(Tracker::default);

/// The process-wide tracker.
pub fn global() -> &'static Tracker {
    &GLOBAL_TRACKER
}

pub fn on_operation_complete<F>(listener: F)
where
    F: Fn(&Operation) + Send + Sync + 'static,
{
    global().on_operation_complete(listener)
}

pub fn subscribe() -> mpsc::UnboundedReceiver<Operation> {
    global().subscribe()
}

pub fn track<R, F>(name: impl Into<String>, body: F) -> R
where
    F: FnOnce() -> R,
    R: Outcome,
{
    global().track(name, body)
}

pub fn track_with<R, F, C>(name: impl Into<String>, is_success: C, body: F) -> R
where
    F: FnOnce() -> R,
    C: FnOnce(&R) -> bool,
{
    global().track_with(name, is_success, body)
}

pub fn tracked<A, R, F>(name: impl Into<String>, f: F) -> impl Fn(A) -> R
where
    F: Fn(A) -> R,
    R: Outcome,
{
    global().tracked(name, f)
}

pub fn wrap<F>(options: LegOptions, f: F) -> Continuation<F> {
    global().wrap(options, f)
}

pub fn fork<T>(body: impl FnOnce(&Fork<'_>) -> T) -> T {
    global().fork(body)
}

pub fn abort(id: LegId) -> bool {
    global().abort(id)
}

pub fn ignore<T>(body: impl FnOnce() -> T) -> T {
    global().ignore(body)
}

pub fn rename_current(name: impl Into<String>) -> bool {
    global().rename_current(name)
}

pub fn current_name() -> Option<String> {
    global().current_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test touching the global tracker; others use their own.
    #[test]
    fn test_global_facade() {
        let mut done = subscribe();

        let add = tracked("add", |(a, b): (i32, i32)| {
            assert_eq!(current_name().as_deref(), Some("add"));
            a + b
        });
        assert_eq!(add((2, 3)), 5);

        let op = done.try_recv().unwrap();
        assert_eq!(op.name(), "add");
        assert!(op.success());

        let pending = track("renamed", || {
            rename_current("checkout");
            ignore(|| assert!(!wrap(LegOptions::default(), || ()).is_tracked()));
            fork(|fork| fork.wrap(LegOptions::default(), || ()))
        });
        assert!(done.try_recv().is_err());

        assert!(abort(pending.leg_id().unwrap()));
        let op = done.try_recv().unwrap();
        assert_eq!(op.name(), "checkout");
        assert!(op.calls().is_empty());
        assert!(!rename_current("outside"));
    }
}
