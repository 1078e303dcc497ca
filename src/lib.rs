// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Dials - causality tracking for asynchronous work.
//!
//! Given a root operation that schedules timers, network callbacks or other
//! deferred continuations, dials builds a tree recording which callback
//! caused which, when each was queued and started, how long it ran, whether
//! it succeeded, and when the whole tree is finished.
//!
//! # Architecture
//!
//! - [`tracker`] - tree building, completion detection, abort, ignore scopes
//! - [`continuation`] - wrapped callbacks and success classification
//! - [`leg`] / [`operation`] - the tree and its serialized report
//! - [`global`] - process-wide default tracker and free functions
//! - [`integrations`] - reference adapters for tokio timers and requests
//! - [`config`] - tracker configuration and file loading
//! - [`telemetry`] - tracing setup and tracker metrics
//! - [`error`] - error types
//!
//! Integrations talk to the engine through three points: wrap a callback
//! when handing it to a scheduler, run the wrapped callback when the
//! scheduler fires, and abort it when the scheduler drops it.
//!
//! # Example
//!
//! ```rust,ignore
//! use dials::{LegOptions, Tracker};
//!
//! let tracker = Tracker::default();
//! tracker.on_operation_complete(|op| println!("{}", serde_json::to_string(op).unwrap()));
//!
//! let later = tracker.track("checkout", || {
//!     tracker.wrap(LegOptions::new().name("charge").cause("timeout"), || ())
//! });
//! later.run(); // operation completes here
//! ```

mod abort;
mod completion;
pub mod config;
mod context;
pub mod continuation;
pub mod error;
pub mod global;
#[cfg(feature = "integrations")]
pub mod integrations;
pub mod leg;
pub mod operation;
pub mod telemetry;
pub mod tracker;

pub use completion::CompletionListener;
pub use config::TrackerConfig;
pub use continuation::{Continuation, Outcome};
pub use error::{ConfigError, TelemetryError};
pub use global::global;
pub use leg::{Leg, LegId, LegOptions};
pub use operation::{Operation, OperationId};
pub use tracker::{Fork, Tracker};

/// Dials version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let tracker = Tracker::new(TrackerConfig::default());
        let _options = LegOptions::new().cause("timeout");
        assert_eq!(tracker.active_count(), 0);
    }
}
