// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reference adapters between schedulers and the tracker.
//!
//! The tracker never reaches into a scheduler. Instead each adapter calls
//! [`crate::Tracker::wrap`] or [`crate::Tracker::fork`] where it hands a
//! callback over, and [`crate::Tracker::abort`] when it learns the callback
//! will never run. These adapters cover tokio timers and one-shot
//! request/response callbacks; other schedulers follow the same pattern.

pub mod request;
pub mod timer;

pub use request::{dispatch, RequestCallbacks};
pub use timer::{TimerHandle, Timers};
