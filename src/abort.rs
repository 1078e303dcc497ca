// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Abort registry: pending legs that an integration may still cancel.
//!
//! A leg is registered when it is wrapped and forgotten as soon as it starts
//! running, is pruned, or its operation retires. Taking an entry is the only
//! way to abort, so a leg can be aborted at most once and never after it ran.

use std::collections::HashMap;

use crate::context::Context;
use crate::leg::LegId;
use crate::operation::OperationId;

#[derive(Debug, Default)]
pub(crate) struct AbortRegistry {
    pending: HashMap<LegId, Context>,
}

impl AbortRegistry {
    pub fn register(&mut self, id: LegId, leg: Context) {
        self.pending.insert(id, leg);
    }

    /// Remove and return the entry for `id`, if it is still abortable.
    pub fn take(&mut self, id: LegId) -> Option<Context> {
        self.pending.remove(&id)
    }

    pub fn forget(&mut self, id: LegId) {
        self.pending.remove(&id);
    }

    /// Drop every entry belonging to a retired operation.
    pub fn forget_operation(&mut self, operation: OperationId) {
        self.pending.retain(|_, leg| leg.operation != operation);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
