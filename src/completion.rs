// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delivery of completed operations.
//!
//! Completion itself is decided by the tracker (see
//! [`crate::Tracker::check_done`]); this module only hands the frozen tree to
//! the registered listener and to subscribers. A panicking listener is
//! contained here and never reaches tracker state or unrelated code.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::operation::Operation;

/// Callback invoked with every completed operation.
pub type CompletionListener = Arc<dyn Fn(&Operation) + Send + Sync>;

#[derive(Default)]
pub(crate) struct CompletionNotifier {
    listener: RwLock<Option<CompletionListener>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Operation>>>,
}

impl CompletionNotifier {
    pub fn set_listener(&self, listener: Option<CompletionListener>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Operation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `operation`. Returns false if the listener panicked.
    pub fn notify(&self, operation: &Operation) -> bool {
        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let delivered = match listener {
            Some(listener) => panic::catch_unwind(AssertUnwindSafe(|| listener(operation))).is_ok(),
            None => true,
        };

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(operation.clone()).is_ok());

        delivered
    }
}
