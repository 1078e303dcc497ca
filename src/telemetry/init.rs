// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Subscriber setup for applications embedding a tracker.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::TelemetryError;

/// Output layout of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event, span fields inline.
    Compact,
    /// Multi-line events with the full span stack.
    Full,
}

/// How [`init_telemetry`] builds the global subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset, or always when
    /// `override_env` is true.
    pub directive: String,

    /// Ignore `RUST_LOG`.
    pub override_env: bool,

    pub format: LogFormat,

    /// Log when each `leg` span closes, with its busy and idle time.
    /// Only useful with [`crate::TrackerConfig::leg_spans`] on.
    pub leg_span_events: bool,

    /// Include source file and line.
    pub location: bool,

    pub ansi: bool,

    /// Write through the libtest capture instead of stdout.
    pub test_writer: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            directive: "info".to_string(),
            override_env: false,
            format: LogFormat::Compact,
            leg_span_events: false,
            location: false,
            ansi: true,
            test_writer: false,
        }
    }
}

impl TelemetryConfig {
    /// Tracker lifecycle at debug, leg spans reported on close.
    pub fn development() -> Self {
        Self {
            directive: "info,dials=debug".to_string(),
            format: LogFormat::Full,
            leg_span_events: true,
            location: true,
            ..Self::default()
        }
    }

    /// Warnings only (e.g. the leak threshold).
    pub fn production() -> Self {
        Self {
            directive: "warn".to_string(),
            ansi: false,
            ..Self::default()
        }
    }

    /// Everything dials emits, captured per test.
    pub fn testing() -> Self {
        Self {
            directive: "dials=trace".to_string(),
            override_env: true,
            format: LogFormat::Full,
            leg_span_events: true,
            location: true,
            ansi: false,
            test_writer: true,
        }
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self.override_env = true;
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        if !self.override_env {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        EnvFilter::try_new(&self.directive).map_err(|e| TelemetryError::InvalidFilter(e.to_string()))
    }
}

/// Install the global tracing subscriber.
///
/// Fails with [`TelemetryError::AlreadyInitialized`] if one is installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = config.env_filter()?;

    let span_events = if config.leg_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_ansi(config.ansi)
        .with_file(config.location)
        .with_line_number(config.location)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match (config.format, config.test_writer) {
        (LogFormat::Compact, false) => registry.with(layer.compact()).try_init(),
        (LogFormat::Compact, true) => registry.with(layer.compact().with_test_writer()).try_init(),
        (LogFormat::Full, false) => registry.with(layer).try_init(),
        (LogFormat::Full, true) => registry.with(layer.with_test_writer()).try_init(),
    };

    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}
