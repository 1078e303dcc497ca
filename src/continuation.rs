// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wrapped continuations and success classification.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::context::Context;
use crate::leg::LegId;
use crate::tracker::Tracker;

/// Classifies the value returned by a tracked body as success or failure.
///
/// A body that panics always counts as failed. Otherwise its return value
/// decides: `Err` fails, everything else succeeds. Types without an impl
/// can still be tracked through the `*_with` entry points, which take the
/// classification as a closure.
pub trait Outcome {
    fn is_success(&self) -> bool;
}

impl Outcome for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T, E> Outcome for Result<T, E> {
    fn is_success(&self) -> bool {
        self.is_ok()
    }
}

impl<T> Outcome for Option<T> {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T> Outcome for Vec<T> {
    fn is_success(&self) -> bool {
        true
    }
}

impl Outcome for str {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T: Outcome + ?Sized> Outcome for &T {
    fn is_success(&self) -> bool {
        (**self).is_success()
    }
}

impl<T: Outcome + ?Sized> Outcome for Box<T> {
    fn is_success(&self) -> bool {
        (**self).is_success()
    }
}

impl<T: Outcome + ?Sized> Outcome for Arc<T> {
    fn is_success(&self) -> bool {
        (**self).is_success()
    }
}

impl<T: Outcome + ?Sized> Outcome for Rc<T> {
    fn is_success(&self) -> bool {
        (**self).is_success()
    }
}

// Collections are plain data; their contents are not inspected.
impl<T> Outcome for [T] {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T> Outcome for VecDeque<T> {
    fn is_success(&self) -> bool {
        true
    }
}

impl<K, V, S> Outcome for HashMap<K, V, S> {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T, S> Outcome for HashSet<T, S> {
    fn is_success(&self) -> bool {
        true
    }
}

impl<K, V> Outcome for BTreeMap<K, V> {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T> Outcome for BTreeSet<T> {
    fn is_success(&self) -> bool {
        true
    }
}

impl Outcome for serde_json::Value {
    fn is_success(&self) -> bool {
        true
    }
}

macro_rules! always_successful {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Outcome for $ty {
                fn is_success(&self) -> bool {
                    true
                }
            }
        )*
    };
}

always_successful!(
    bool, char, String, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64
);

macro_rules! tuple_outcome {
    ($($name:ident $value:ident),+) => {
        impl<$($name: Outcome),+> Outcome for ($($name,)+) {
            fn is_success(&self) -> bool {
                let ($($value,)+) = self;
                true $(&& $value.is_success())+
            }
        }
    };
}

tuple_outcome!(A a);
tuple_outcome!(A a, B b);
tuple_outcome!(A a, B b, C c);
tuple_outcome!(A a, B b, C c, D d);

// Bodies often hand back the continuations they scheduled.
impl<F> Outcome for Continuation<F> {
    fn is_success(&self) -> bool {
        true
    }
}

pub(crate) struct Target {
    pub tracker: Tracker,
    pub context: Context,
    pub id: LegId,
}

/// A callback handed to an external scheduler.
///
/// When created inside a tracked operation it owns a pending leg: running it
/// re-enters that leg's context and records timing and success. Created
/// outside any operation it is a plain pass-through.
///
/// Dropping a tracked continuation without running or cancelling it leaves
/// its operation open forever.
#[must_use = "a tracked continuation keeps its operation open until it runs or is cancelled"]
pub struct Continuation<F> {
    f: F,
    target: Option<Target>,
}

impl<F> Continuation<F> {
    pub(crate) fn tracked(f: F, target: Target) -> Self {
        Self {
            f,
            target: Some(target),
        }
    }

    pub(crate) fn untracked(f: F) -> Self {
        Self { f, target: None }
    }

    /// Abort id of the pending leg, or `None` when untracked.
    pub fn leg_id(&self) -> Option<LegId> {
        self.target.as_ref().map(|target| target.id)
    }

    /// Whether this continuation belongs to an operation.
    pub fn is_tracked(&self) -> bool {
        self.target.is_some()
    }

    /// Report that this continuation will never run and hand back the
    /// original callback.
    pub fn cancel(self) -> F {
        if let Some(target) = self.target {
            target.tracker.abort(target.id);
        }
        self.f
    }

    /// Report that this continuation will never run and drop the callback.
    /// Returns true if a pending leg was removed from its operation.
    pub fn abort(self) -> bool {
        match self.target {
            Some(target) => target.tracker.abort(target.id),
            None => false,
        }
    }

    /// Run a zero-argument continuation.
    pub fn run<R>(self) -> R
    where
        F: FnOnce() -> R,
        R: Outcome,
    {
        self.run_with(|value: &R| value.is_success())
    }

    /// Run a zero-argument continuation, classifying its return value with
    /// `is_success` instead of [`Outcome`].
    pub fn run_with<R>(self, is_success: impl FnOnce(&R) -> bool) -> R
    where
        F: FnOnce() -> R,
    {
        let Continuation { f, target } = self;
        match target {
            Some(target) => target
                .tracker
                .run_leg(target.context, Some(target.id), f, is_success),
            None => f(),
        }
    }

    /// Run a continuation taking one argument. Pass a tuple for several.
    pub fn call<A, R>(self, arg: A) -> R
    where
        F: FnOnce(A) -> R,
        R: Outcome,
    {
        self.call_with(arg, |value: &R| value.is_success())
    }

    /// Like [`Continuation::call`], with an explicit success classifier.
    pub fn call_with<A, R>(self, arg: A, is_success: impl FnOnce(&R) -> bool) -> R
    where
        F: FnOnce(A) -> R,
    {
        let Continuation { f, target } = self;
        match target {
            Some(target) => target.tracker.run_leg(
                target.context,
                Some(target.id),
                move || f(arg),
                is_success,
            ),
            None => f(arg),
        }
    }
}

impl<F> fmt::Debug for Continuation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("leg_id", &self.leg_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert!(().is_success());
        assert!(5i32.is_success());
        assert!(false.is_success());
        assert!(String::from("x").is_success());
        assert!(None::<u8>.is_success());
        assert!(Ok::<(), ()>(()).is_success());
        assert!(!Err::<(), _>("bad").is_success());
        assert!((1u8, "a").is_success());
        assert!(!(1u8, Err::<(), ()>(())).is_success());
    }

    #[test]
    fn test_outcome_for_containers_and_pointers() {
        assert!(HashMap::<u8, u8>::new().is_success());
        assert!(BTreeMap::<u8, u8>::new().is_success());
        assert!(HashSet::<u8>::new().is_success());
        assert!(serde_json::json!({"a": 1}).is_success());
        assert!(Box::new(1u8).is_success());
        assert!(Arc::new("shared").is_success());
        assert!(Rc::new(vec![1u8]).is_success());
        assert!((&[1u8, 2][..]).is_success());
        assert!(!Box::new(Err::<(), _>("boxed")).is_success());
        assert!(!Arc::new(Err::<(), _>("shared")).is_success());
        let failed: Result<(), ()> = Err(());
        assert!(!(&failed).is_success());
    }

    #[test]
    fn test_untracked_run_with_skips_classifier() {
        let continuation = Continuation::untracked(|| 5u8);
        assert_eq!(continuation.run_with(|_: &u8| panic!("not consulted")), 5);
    }

    #[test]
    fn test_untracked_abort() {
        assert!(!Continuation::untracked(|| ()).abort());
    }

    #[test]
    fn test_untracked_passthrough() {
        let continuation = Continuation::untracked(|(a, b): (i32, i32)| a * b);
        assert!(!continuation.is_tracked());
        assert!(continuation.leg_id().is_none());
        assert_eq!(continuation.call((6, 7)), 42);
    }

    #[test]
    fn test_untracked_cancel_returns_callback() {
        let continuation = Continuation::untracked(|| 3u8);
        let f = continuation.cancel();
        assert_eq!(f(), 3);
    }

    #[test]
    fn test_debug_hides_callback() {
        let continuation = Continuation::untracked(|| ());
        assert!(format!("{:?}", continuation).starts_with("Continuation"));
    }
}
