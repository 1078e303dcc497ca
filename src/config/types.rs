// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Every field is optional in a config file; missing fields take the
//! defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Configuration for a [`crate::Tracker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Label attached to the tracker's log events.
    pub label: String,

    /// Run every continuation body inside a `leg` tracing span.
    pub leg_spans: bool,

    /// Emit a debug event when an operation completes.
    pub log_completions: bool,

    /// Warn when more than this many operations are open at once.
    /// Operations whose legs are lost never complete, so a steadily
    /// growing active set usually means an integration forgot to abort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leak_warning_threshold: Option<usize>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            label: "dials".to_string(),
            leg_spans: false,
            log_completions: true,
            leak_warning_threshold: None,
        }
    }
}

impl TrackerConfig {
    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Enable or disable per-leg tracing spans.
    pub fn with_leg_spans(mut self, enabled: bool) -> Self {
        self.leg_spans = enabled;
        self
    }

    /// Enable or disable completion events.
    pub fn with_log_completions(mut self, enabled: bool) -> Self {
        self.log_completions = enabled;
        self
    }

    /// Set the leak warning threshold.
    pub fn with_leak_warning_threshold(mut self, threshold: usize) -> Self {
        self.leak_warning_threshold = Some(threshold);
        self
    }

    /// Check field values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "label".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.leak_warning_threshold == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "leakWarningThreshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
