// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing spans around leg execution.

use tracing::{debug_span, Span};

use crate::leg::LegId;
use crate::operation::OperationId;

/// Span wrapping one execution of a leg's body.
///
/// The root leg has no abort id and is reported as leg `0`.
pub(crate) fn leg_span(
    label: &str,
    operation: OperationId,
    leg: Option<LegId>,
    name: &str,
    cause: Option<&str>,
) -> Span {
    debug_span!(
        "leg",
        tracker = %label,
        operation = %operation.short(),
        leg = leg.map(|id| id.as_u64()).unwrap_or(0),
        name = %name,
        cause = cause.unwrap_or(""),
    )
}
