// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The tracker: builds causal trees and reports them when they complete.
//!
//! An operation starts when a tracked body runs ([`Tracker::track`]). Every
//! continuation wrapped while it executes ([`Tracker::wrap`],
//! [`Tracker::fork`]) becomes a child leg of whatever leg is current, and
//! running that continuation makes its own leg current in turn. After each
//! leg finishes, and after each abort, the tree is checked; the first time
//! every linked leg has finished the operation is retired and delivered to
//! listeners exactly once.
//!
//! # Locking
//!
//! All trees and the abort registry sit behind one mutex. The mutex is never
//! held while user code runs (tracked bodies, continuations, listeners), and
//! every check runs to completion before the lock is released, so a tree is
//! never observed half-mutated.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn, Span};

use crate::abort::AbortRegistry;
use crate::completion::{CompletionListener, CompletionNotifier};
use crate::config::TrackerConfig;
use crate::context::{Context, ContextStack};
use crate::continuation::{Continuation, Outcome, Target};
use crate::leg::{LegId, LegOptions};
use crate::operation::{GroupId, LegSlot, Operation, OperationId, OperationState};
use crate::telemetry::{leg_span, MetricsSnapshot, TrackerMetrics};

#[derive(Default)]
struct TreeState {
    active: HashMap<OperationId, OperationState>,
    aborts: AbortRegistry,
}

struct Inner {
    config: TrackerConfig,
    contexts: ContextStack,
    trees: Mutex<TreeState>,
    completion: CompletionNotifier,
    metrics: TrackerMetrics,
}

/// Handle to a causality tracker. Clones share the same state.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("label", &self.inner.config.label)
            .field("active", &self.active_count())
            .finish()
    }
}

impl Tracker {
    /// Create an independent tracker.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                contexts: ContextStack::new(),
                trees: Mutex::new(TreeState::default()),
                completion: CompletionNotifier::default(),
                metrics: TrackerMetrics::new(),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Snapshot of this tracker's counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    fn trees(&self) -> MutexGuard<'_, TreeState> {
        self.inner.trees.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Completion listeners
    // ------------------------------------------------------------------

    /// Register the listener invoked with every completed operation,
    /// replacing any previous one.
    ///
    /// A panicking listener is caught and ignored.
    pub fn on_operation_complete<F>(&self, listener: F)
    where
        F: Fn(&Operation) + Send + Sync + 'static,
    {
        let listener: CompletionListener = Arc::new(listener);
        self.inner.completion.set_listener(Some(listener));
    }

    /// Remove the completion listener.
    pub fn clear_listener(&self) {
        self.inner.completion.set_listener(None);
    }

    /// Receive every operation completed from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Operation> {
        self.inner.completion.subscribe()
    }

    // ------------------------------------------------------------------
    // Tree building
    // ------------------------------------------------------------------

    /// Run `body` as the root leg of a new operation.
    ///
    /// Panics in `body` are recorded as a failed root and then resumed, and
    /// `Err` results are returned unchanged, so the caller sees exactly what
    /// an untracked call would produce.
    pub fn track<R, F>(&self, name: impl Into<String>, body: F) -> R
    where
        F: FnOnce() -> R,
        R: Outcome,
    {
        self.track_with(name, |value: &R| value.is_success(), body)
    }

    /// Like [`Tracker::track`] for return types without an [`Outcome`]
    /// impl: `is_success` classifies the returned value.
    pub fn track_with<R, F, C>(&self, name: impl Into<String>, is_success: C, body: F) -> R
    where
        F: FnOnce() -> R,
        C: FnOnce(&R) -> bool,
    {
        let state = OperationState::new(OperationId::new(), name);
        let operation = state.id;
        debug!(
            tracker = %self.inner.config.label,
            operation = %operation.short(),
            name = %state.name(),
            "operation started"
        );

        let open = {
            let mut trees = self.trees();
            trees.active.insert(operation, state);
            trees.active.len()
        };
        self.inner.metrics.record_operation_started();

        if let Some(threshold) = self.inner.config.leak_warning_threshold {
            if open > threshold {
                warn!(
                    tracker = %self.inner.config.label,
                    open,
                    threshold,
                    "active operations above threshold; continuations may be lost without abort"
                );
            }
        }

        let root = Context {
            operation,
            leg: LegSlot::ROOT,
        };
        self.run_leg(root, None, body, is_success)
    }

    /// Decorate `f` so every call becomes a new tracked operation.
    ///
    /// Several arguments are passed as a tuple.
    pub fn tracked<A, R, F>(&self, name: impl Into<String>, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
        R: Outcome,
    {
        let tracker = self.clone();
        let name = name.into();
        move |arg| tracker.track(name.clone(), || f(arg))
    }

    /// Like [`Tracker::tracked`], classifying every result with
    /// `is_success`.
    pub fn tracked_with<A, R, F, C>(
        &self,
        name: impl Into<String>,
        is_success: C,
        f: F,
    ) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
        C: Fn(&R) -> bool,
    {
        let tracker = self.clone();
        let name = name.into();
        move |arg| tracker.track_with(name.clone(), &is_success, || f(arg))
    }

    /// Wrap a callback about to be handed to a scheduler.
    ///
    /// Inside an operation this links a new pending leg under the current
    /// leg. Outside any operation the callback passes through untracked.
    pub fn wrap<F>(&self, options: LegOptions, f: F) -> Continuation<F> {
        self.wrap_in(self.inner.contexts.current(), None, options, f)
    }

    /// Wrap several callbacks registered by one scheduling call.
    ///
    /// Legs wrapped through the same [`Fork`] are siblings for sticky
    /// cleanup: when a non-sticky one runs, the other pending non-sticky
    /// ones are pruned.
    pub fn fork<T>(&self, body: impl FnOnce(&Fork<'_>) -> T) -> T {
        let fork = Fork {
            tracker: self,
            context: self.inner.contexts.current(),
            group: GroupId::next(),
        };
        body(&fork)
    }

    fn wrap_in<F>(
        &self,
        context: Option<Context>,
        group: Option<GroupId>,
        options: LegOptions,
        f: F,
    ) -> Continuation<F> {
        let Some(context) = context else {
            self.inner.metrics.record_untracked_wrap();
            return Continuation::untracked(f);
        };

        let id = LegId::next();
        let leg = {
            let mut trees = self.trees();
            let TreeState { active, aborts } = &mut *trees;
            let Some(state) = active.get_mut(&context.operation) else {
                self.inner.metrics.record_untracked_wrap();
                return Continuation::untracked(f);
            };
            let slot = state.add_child(context.leg, id, options, group);
            let leg = Context {
                operation: context.operation,
                leg: slot,
            };
            aborts.register(id, leg);
            leg
        };

        self.inner.metrics.record_leg_scheduled();
        trace!(
            operation = %context.operation.short(),
            leg = %id,
            "leg scheduled"
        );

        Continuation::tracked(
            f,
            Target {
                tracker: self.clone(),
                context: leg,
                id,
            },
        )
    }

    /// Execute a leg's body inside its context and record the outcome.
    pub(crate) fn run_leg<R, F, C>(
        &self,
        context: Context,
        id: Option<LegId>,
        body: F,
        is_success: C,
    ) -> R
    where
        F: FnOnce() -> R,
        C: FnOnce(&R) -> bool,
    {
        let labels = {
            let mut trees = self.trees();
            if let Some(id) = id {
                trees.aborts.forget(id);
            }
            match trees.active.get_mut(&context.operation) {
                Some(state) => {
                    state.mark_started(context.leg);
                    let leg = state.leg(context.leg);
                    self.inner
                        .config
                        .leg_spans
                        .then(|| (leg.name.clone(), leg.cause.clone()))
                }
                None => None,
            }
        };

        let span = match &labels {
            Some((name, cause)) => leg_span(
                &self.inner.config.label,
                context.operation,
                id,
                name,
                cause.as_deref(),
            ),
            None => Span::none(),
        };

        let started = Instant::now();
        let result = {
            let _span = span.enter();
            let _context = self.inner.contexts.enter(context);
            panic::catch_unwind(AssertUnwindSafe(body))
        };
        let elapsed = started.elapsed();

        let success = match &result {
            Ok(value) => is_success(value),
            Err(_) => false,
        };
        self.finish_leg(context, elapsed, success);

        match result {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn finish_leg(&self, context: Context, elapsed: std::time::Duration, success: bool) {
        let pruned = {
            let mut trees = self.trees();
            let TreeState { active, aborts } = &mut *trees;
            let Some(state) = active.get_mut(&context.operation) else {
                return;
            };
            state.mark_finished(context.leg, elapsed, success);
            let pruned = state.prune_siblings(context.leg);
            for id in &pruned {
                aborts.forget(*id);
            }
            pruned
        };

        if !pruned.is_empty() {
            self.inner.metrics.record_legs_pruned(pruned.len());
            trace!(
                operation = %context.operation.short(),
                pruned = ?pruned,
                "pruned mutually exclusive siblings"
            );
        }

        self.check_done(context.operation);
    }

    // ------------------------------------------------------------------
    // Completion detection
    // ------------------------------------------------------------------

    /// Retire and deliver `operation` if every linked leg has finished.
    ///
    /// Returns true only for the call that retired it; later calls are
    /// no-ops.
    pub fn check_done(&self, operation: OperationId) -> bool {
        let state = {
            let mut trees = self.trees();
            let complete = trees
                .active
                .get(&operation)
                .is_some_and(OperationState::is_complete);
            if !complete {
                return false;
            }
            trees.aborts.forget_operation(operation);
            match trees.active.remove(&operation) {
                Some(state) => state,
                None => return false,
            }
        };

        let report = state.into_report();
        self.inner
            .metrics
            .record_operation_completed(report.total_duration, report.success());

        if self.inner.config.log_completions {
            debug!(
                tracker = %self.inner.config.label,
                operation = %report.id.short(),
                name = %report.name(),
                success = report.success(),
                legs = report.leg_count(),
                total_ms = report.total_duration.as_secs_f64() * 1000.0,
                "operation complete"
            );
        }

        if !self.inner.completion.notify(&report) {
            self.inner.metrics.record_listener_failure();
        }
        true
    }

    // ------------------------------------------------------------------
    // Abort
    // ------------------------------------------------------------------

    /// Report that a wrapped continuation will never run.
    ///
    /// Removes its leg from the tree and may complete the operation. Unknown
    /// ids, and legs that already started or were pruned, are ignored.
    /// Returns true if a pending leg was removed.
    pub fn abort(&self, id: LegId) -> bool {
        let leg = {
            let mut trees = self.trees();
            let Some(leg) = trees.aborts.take(id) else {
                return false;
            };
            if let Some(state) = trees.active.get_mut(&leg.operation) {
                state.detach(leg.leg);
            }
            leg
        };

        self.inner.metrics.record_leg_aborted();
        trace!(operation = %leg.operation.short(), leg = %id, "leg aborted");

        self.check_done(leg.operation);
        true
    }

    // ------------------------------------------------------------------
    // Scope guard and current-leg access
    // ------------------------------------------------------------------

    /// Run `body` with tracking suspended: callbacks it wraps are untracked.
    /// The previous context is restored on every exit path.
    pub fn ignore<T>(&self, body: impl FnOnce() -> T) -> T {
        let _suspended = self.inner.contexts.suspend();
        body()
    }

    /// Rename the currently executing leg. Returns false outside an
    /// operation.
    pub fn rename_current(&self, name: impl Into<String>) -> bool {
        let Some(context) = self.inner.contexts.current() else {
            return false;
        };
        let mut trees = self.trees();
        match trees.active.get_mut(&context.operation) {
            Some(state) => {
                state.leg_mut(context.leg).name = name.into();
                true
            }
            None => false,
        }
    }

    /// Name of the currently executing leg, or `None` outside an operation.
    pub fn current_name(&self) -> Option<String> {
        let context = self.inner.contexts.current()?;
        let trees = self.trees();
        trees
            .active
            .get(&context.operation)
            .map(|state| state.leg(context.leg).name.clone())
    }

    /// Operation the current thread is executing, if any.
    pub fn current_operation(&self) -> Option<OperationId> {
        self.inner.contexts.current().map(|context| context.operation)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Number of operations not yet complete.
    pub fn active_count(&self) -> usize {
        self.trees().active.len()
    }

    /// Ids and names of operations not yet complete, with their leg counts.
    pub fn active_operations(&self) -> Vec<(OperationId, String, usize)> {
        self.trees()
            .active
            .values()
            .map(|state| (state.id, state.name().to_string(), state.leg_count()))
            .collect()
    }

    /// Number of wrapped legs that can still be aborted.
    pub fn pending_aborts(&self) -> usize {
        self.trees().aborts.len()
    }
}

/// A `wrap` bound to the context current when [`Tracker::fork`] was called.
pub struct Fork<'a> {
    tracker: &'a Tracker,
    context: Option<Context>,
    group: GroupId,
}

impl Fork<'_> {
    /// Wrap one of the callbacks of this scheduling call.
    pub fn wrap<F>(&self, options: LegOptions, f: F) -> Continuation<F> {
        self.tracker
            .wrap_in(self.context, Some(self.group), options, f)
    }

    /// Whether wraps through this fork create legs.
    pub fn is_tracked(&self) -> bool {
        self.context.is_some()
    }
}
