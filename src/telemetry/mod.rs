// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging and metrics around the tracker.
//!
//! - **Tracing**: structured events for operation lifecycle, optional `leg`
//!   spans around every continuation body
//! - **Metrics**: per-tracker counters and a total-duration histogram
//!
//! Initialize a subscriber at application startup:
//!
//! ```rust,ignore
//! use dials::telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::development())?;
//! ```

mod init;
pub mod metrics;
mod spans;

pub use init::{init_telemetry, LogFormat, TelemetryConfig};
pub use metrics::{Histogram, MetricsSnapshot, TrackerMetrics};
pub(crate) use spans::leg_span;
