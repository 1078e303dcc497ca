// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Legs: the nodes of an operation's causal tree.
//!
//! A leg is one scheduled-and-executed continuation. While an operation is
//! live its legs sit in an arena owned by the operation (see
//! [`crate::operation`]); once the operation completes they are materialized
//! into the owned [`Leg`] tree defined here and handed to listeners.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

static NEXT_LEG_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local identifier of a wrapped (not yet invoked) leg.
///
/// Integrations keep this id to report cancellation through
/// [`crate::Tracker::abort`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegId(u64);

impl LegId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LEG_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LegId({})", self.0)
    }
}

/// Options supplied by an integration when it wraps a continuation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegOptions {
    /// Human-readable label for the continuation.
    pub name: Option<String>,

    /// Why the continuation was scheduled ("timeout", "network:<resource>").
    pub cause: Option<String>,

    /// Exempt from sibling pruning when another callback of the same fork fires.
    pub sticky: bool,
}

impl LegOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the cause.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Mark the continuation as sticky.
    pub fn sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }
}

/// A finished leg of a completed operation.
///
/// All offsets are relative to the operation's `t0`. Every leg reachable from
/// a completed operation has run, so timing and status are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    /// Label of the leg; empty when none was supplied.
    pub name: String,

    /// Why the leg was scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,

    /// When the leg was scheduled.
    #[serde(with = "millis")]
    pub queued: Duration,

    /// When the leg's body began executing.
    #[serde(with = "millis")]
    pub started: Duration,

    /// How long the leg's synchronous body ran.
    #[serde(with = "millis")]
    pub duration: Duration,

    /// False when the body panicked or returned a failing outcome.
    pub success: bool,

    /// Continuations scheduled by this leg, in scheduling order.
    #[serde(default)]
    pub calls: Vec<Leg>,
}

impl Leg {
    /// Offset at which this leg finished.
    pub fn finished(&self) -> Duration {
        self.started + self.duration
    }

    /// Number of legs in this subtree, including this one.
    pub fn leg_count(&self) -> usize {
        1 + self.calls.iter().map(Leg::leg_count).sum::<usize>()
    }

    /// Depth-first search for the first leg with the given name.
    pub fn find(&self, name: &str) -> Option<&Leg> {
        if self.name == name {
            return Some(self);
        }
        self.calls.iter().find_map(|call| call.find(name))
    }
}

/// Serde helper writing a [`Duration`] as fractional milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "expected a non-negative millisecond offset, got {}",
                ms
            )));
        }
        Ok(Duration::from_secs_f64(ms / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(name: &str, calls: Vec<Leg>) -> Leg {
        Leg {
            name: name.to_string(),
            cause: None,
            queued: Duration::from_millis(1),
            started: Duration::from_millis(2),
            duration: Duration::from_millis(3),
            success: true,
            calls,
        }
    }

    #[test]
    fn test_leg_ids_are_unique() {
        let a = LegId::next();
        let b = LegId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_leg_options_builder() {
        let options = LegOptions::new().name("onSuccess").cause("network:/a").sticky(true);
        assert_eq!(options.name.as_deref(), Some("onSuccess"));
        assert_eq!(options.cause.as_deref(), Some("network:/a"));
        assert!(options.sticky);
        assert!(!LegOptions::default().sticky);
    }

    #[test]
    fn test_leg_count_and_find() {
        let tree = leg("root", vec![leg("a", vec![leg("c", vec![])]), leg("b", vec![])]);
        assert_eq!(tree.leg_count(), 4);
        assert_eq!(tree.find("c").map(|l| l.name.as_str()), Some("c"));
        assert!(tree.find("missing").is_none());
        assert_eq!(tree.finished(), Duration::from_millis(5));
    }

    #[test]
    fn test_serialized_shape() {
        let mut tree = leg("thing2", vec![]);
        tree.cause = Some("timeout".to_string());
        let json = serde_json::to_value(&tree).unwrap();

        assert_eq!(json["name"], "thing2");
        assert_eq!(json["cause"], "timeout");
        assert_eq!(json["queued"], 1.0);
        assert_eq!(json["started"], 2.0);
        assert_eq!(json["duration"], 3.0);
        assert_eq!(json["success"], true);
        assert!(json["calls"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_cause_omitted_when_absent() {
        let json = serde_json::to_value(leg("a", vec![])).unwrap();
        assert!(json.get("cause").is_none());
    }

    #[test]
    fn test_negative_offset_rejected() {
        let json = r#"{"name":"a","queued":-1,"started":0,"duration":0,"success":true}"#;
        assert!(serde_json::from_str::<Leg>(json).is_err());
    }
}
