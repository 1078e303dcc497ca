// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracked request/response callbacks.
//!
//! A request registers up to three callbacks in one scheduling call:
//! `on_success` and `on_failure` are mutually exclusive, `on_complete` fires
//! after either. They are wrapped through one fork so that whichever of the
//! exclusive pair fires prunes the other; `on_complete` is sticky.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use tokio::task::JoinHandle;

use crate::continuation::Outcome;
use crate::leg::LegOptions;
use crate::tracker::Tracker;

type Callback<T> = Box<dyn FnOnce(&T) + Send>;

/// Callbacks for one request, all optional.
pub struct RequestCallbacks<T, E> {
    on_success: Option<Callback<T>>,
    on_failure: Option<Callback<E>>,
    on_complete: Option<Callback<Result<T, E>>>,
}

impl<T, E> Default for RequestCallbacks<T, E> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_failure: None,
            on_complete: None,
        }
    }
}

impl<T, E> RequestCallbacks<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(&E) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnOnce(&Result<T, E>) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

// Tracked bodies may hand back the request task.
impl<T> Outcome for JoinHandle<T> {
    fn is_success(&self) -> bool {
        true
    }
}

/// Drive `request` on tokio and deliver its outcome to `callbacks`.
///
/// Legs are caused by `network:<resource>`. The callback that cannot fire
/// for the actual outcome is aborted, so a request with only `on_success`
/// that fails still lets its operation complete. `on_complete` runs even
/// when the outcome callback panics; the panic is then resumed and surfaces
/// through the returned handle.
pub fn dispatch<T, E, Fut>(
    tracker: &Tracker,
    resource: &str,
    request: Fut,
    callbacks: RequestCallbacks<T, E>,
) -> JoinHandle<Result<T, E>>
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let cause = format!("network:{}", resource);
    let RequestCallbacks {
        on_success,
        on_failure,
        on_complete,
    } = callbacks;

    let (on_success, on_failure, on_complete) = tracker.fork(|fork| {
        let options = |name: &str| LegOptions::new().name(name).cause(cause.clone());
        (
            on_success.map(|f| fork.wrap(options("onSuccess"), f)),
            on_failure.map(|f| fork.wrap(options("onFailure"), f)),
            on_complete.map(|f| fork.wrap(options("onComplete").sticky(true), f)),
        )
    });

    tokio::spawn(async move {
        let result = request.await;

        // The exclusive callback that cannot fire is aborted first; a panic
        // in the one that does fire must not stop on_complete from running.
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| match &result {
            Ok(value) => {
                if let Some(callback) = on_failure {
                    callback.abort();
                }
                if let Some(callback) = on_success {
                    callback.call(value);
                }
            }
            Err(error) => {
                if let Some(callback) = on_success {
                    callback.abort();
                }
                if let Some(callback) = on_failure {
                    callback.call(error);
                }
            }
        }));

        if let Some(callback) = on_complete {
            callback.call(&result);
        }

        if let Err(payload) = delivered {
            panic::resume_unwind(payload);
        }
        result
    })
}
