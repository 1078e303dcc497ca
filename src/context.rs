// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The context stack: which operation and leg are executing right now.
//!
//! The current context is kept per OS thread, mirroring the dynamic call
//! stack. Entering a context returns a guard that restores the previous one
//! when dropped, so nesting unwinds correctly on every exit path, panics
//! included.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::operation::{LegSlot, OperationId};

/// The (operation, leg) pair currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Context {
    pub operation: OperationId,
    pub leg: LegSlot,
}

#[derive(Debug, Default)]
pub(crate) struct ContextStack {
    current: Mutex<HashMap<ThreadId, Context>>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ThreadId, Context>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The context of the calling thread, if any.
    pub fn current(&self) -> Option<Context> {
        self.slots().get(&thread::current().id()).copied()
    }

    fn replace(&self, context: Option<Context>) -> Option<Context> {
        let id = thread::current().id();
        let mut slots = self.slots();
        match context {
            Some(context) => slots.insert(id, context),
            None => slots.remove(&id),
        }
    }

    /// Make `context` current until the returned guard is dropped.
    pub fn enter(&self, context: Context) -> ContextGuard<'_> {
        let previous = self.replace(Some(context));
        ContextGuard { stack: self, previous }
    }

    /// Clear the current context until the returned guard is dropped.
    pub fn suspend(&self) -> ContextGuard<'_> {
        let previous = self.replace(None);
        ContextGuard { stack: self, previous }
    }
}

/// Restores the previously current context on drop.
#[must_use = "the context is restored as soon as the guard is dropped"]
pub(crate) struct ContextGuard<'a> {
    stack: &'a ContextStack,
    previous: Option<Context>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.stack.replace(self.previous.take());
    }
}
