// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Operations: a root leg plus the bookkeeping of its whole causal tree.
//!
//! A live operation keeps its legs in an index arena. Wrapped continuations
//! refer to their leg by slot, so linking, pruning and timing updates never
//! need shared ownership of tree nodes. Pruned legs stay in the arena but are
//! unreachable from the root, which is all completion detection looks at.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::leg::{millis, Leg, LegId, LegOptions};

/// A unique identifier for one tracked operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generate a new random operation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Get a short representation (first 8 characters).
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.short())
    }
}

impl From<Uuid> for OperationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Serialize for OperationId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OperationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Uuid::deserialize(deserializer).map(Self)
    }
}

/// A completed operation, handed to completion listeners.
///
/// Serializes as the root leg's fields plus `id`, `t0` and `totalDuration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,

    /// Wall-clock creation time; every leg offset is relative to it.
    pub t0: DateTime<Utc>,

    /// Elapsed time from `t0` until the last leg finished.
    #[serde(with = "millis")]
    pub total_duration: Duration,

    #[serde(flatten)]
    pub root: Leg,
}

impl Operation {
    /// Name of the root leg.
    pub fn name(&self) -> &str {
        &self.root.name
    }

    /// Whether the root leg succeeded.
    pub fn success(&self) -> bool {
        self.root.success
    }

    /// Legs scheduled directly by the root.
    pub fn calls(&self) -> &[Leg] {
        &self.root.calls
    }

    /// `t0` as milliseconds since the Unix epoch.
    pub fn t0_millis(&self) -> i64 {
        self.t0.timestamp_millis()
    }

    /// Number of legs in the tree, including the root.
    pub fn leg_count(&self) -> usize {
        self.root.leg_count()
    }
}

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies the legs wrapped through one fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GroupId(u64);

impl GroupId {
    pub(crate) fn next() -> Self {
        Self(NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a leg inside its operation's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LegSlot(usize);

impl LegSlot {
    pub(crate) const ROOT: LegSlot = LegSlot(0);
}

#[derive(Debug)]
pub(crate) struct LegNode {
    pub id: Option<LegId>,
    pub name: String,
    pub cause: Option<String>,
    pub queued: Duration,
    pub started: Option<Duration>,
    pub duration: Option<Duration>,
    pub success: bool,
    pub parent: Option<LegSlot>,
    pub children: Vec<LegSlot>,
    pub group: Option<GroupId>,
    pub sticky: bool,
}

/// Mutable state of an operation that has not completed yet.
#[derive(Debug)]
pub(crate) struct OperationState {
    pub id: OperationId,
    pub t0: DateTime<Utc>,
    origin: Instant,
    total_duration: Duration,
    legs: Vec<LegNode>,
}

impl OperationState {
    pub fn new(id: OperationId, name: impl Into<String>) -> Self {
        let root = LegNode {
            id: None,
            name: name.into(),
            cause: None,
            queued: Duration::ZERO,
            started: Some(Duration::ZERO),
            duration: None,
            success: false,
            parent: None,
            children: Vec::new(),
            group: None,
            sticky: false,
        };

        Self {
            id,
            t0: Utc::now(),
            origin: Instant::now(),
            total_duration: Duration::ZERO,
            legs: vec![root],
        }
    }

    /// Time elapsed since `t0`.
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }

    pub fn leg(&self, slot: LegSlot) -> &LegNode {
        &self.legs[slot.0]
    }

    pub fn leg_mut(&mut self, slot: LegSlot) -> &mut LegNode {
        &mut self.legs[slot.0]
    }

    pub fn name(&self) -> &str {
        &self.leg(LegSlot::ROOT).name
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    /// Link a new pending leg under `parent`, after its existing children.
    pub fn add_child(
        &mut self,
        parent: LegSlot,
        id: LegId,
        options: LegOptions,
        group: Option<GroupId>,
    ) -> LegSlot {
        let slot = LegSlot(self.legs.len());
        let queued = self.elapsed();
        self.legs.push(LegNode {
            id: Some(id),
            name: options.name.unwrap_or_default(),
            cause: options.cause,
            queued,
            started: None,
            duration: None,
            success: false,
            parent: Some(parent),
            children: Vec::new(),
            group,
            sticky: options.sticky,
        });
        self.legs[parent.0].children.push(slot);
        slot
    }

    /// Remove a leg from its parent's children. Returns false if it was
    /// already detached.
    pub fn detach(&mut self, slot: LegSlot) -> bool {
        let Some(parent) = self.legs[slot.0].parent else {
            return false;
        };
        let children = &mut self.legs[parent.0].children;
        match children.iter().position(|&child| child == slot) {
            Some(index) => {
                children.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn mark_started(&mut self, slot: LegSlot) {
        let now = self.elapsed();
        let leg = &mut self.legs[slot.0];
        if leg.started.is_none() {
            leg.started = Some(now.max(leg.queued));
        }
    }

    /// Record the outcome of a leg's body. The first outcome wins.
    pub fn mark_finished(&mut self, slot: LegSlot, duration: Duration, success: bool) {
        let now = self.elapsed();
        let leg = &mut self.legs[slot.0];
        if leg.duration.is_some() {
            return;
        }
        leg.duration = Some(duration);
        leg.success = success;
        self.total_duration = self.total_duration.max(now);
    }

    /// Detach every other pending, non-sticky leg wrapped by the same fork
    /// as `slot`. Returns the ids of the pruned legs.
    pub fn prune_siblings(&mut self, slot: LegSlot) -> Vec<LegId> {
        let leg = &self.legs[slot.0];
        let (Some(group), Some(parent)) = (leg.group, leg.parent) else {
            return Vec::new();
        };
        if leg.sticky {
            return Vec::new();
        }

        let doomed: Vec<LegSlot> = self.legs[parent.0]
            .children
            .iter()
            .copied()
            .filter(|&sibling| {
                let node = &self.legs[sibling.0];
                sibling != slot && node.group == Some(group) && !node.sticky && node.started.is_none()
            })
            .collect();

        doomed
            .into_iter()
            .filter_map(|sibling| {
                self.detach(sibling);
                self.legs[sibling.0].id
            })
            .collect()
    }

    /// Whether the leg at `slot` and everything still linked below it finished.
    pub fn is_leg_complete(&self, slot: LegSlot) -> bool {
        let mut stack = vec![slot];
        while let Some(current) = stack.pop() {
            let leg = &self.legs[current.0];
            if leg.duration.is_none() {
                return false;
            }
            stack.extend(leg.children.iter().copied());
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        self.is_leg_complete(LegSlot::ROOT)
    }

    /// Freeze the tree into its reported form.
    pub fn into_report(self) -> Operation {
        let root = self.build_leg(LegSlot::ROOT);
        Operation {
            id: self.id,
            t0: self.t0,
            total_duration: self.total_duration,
            root,
        }
    }

    fn build_leg(&self, slot: LegSlot) -> Leg {
        let node = &self.legs[slot.0];
        Leg {
            name: node.name.clone(),
            cause: node.cause.clone(),
            queued: node.queued,
            started: node.started.unwrap_or(node.queued),
            duration: node.duration.unwrap_or_default(),
            success: node.success,
            calls: node.children.iter().map(|&child| self.build_leg(child)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> OperationState {
        OperationState::new(OperationId::new(), "root")
    }

    fn child(state: &mut OperationState, parent: LegSlot, options: LegOptions) -> LegSlot {
        state.add_child(parent, LegId::next(), options, None)
    }

    #[test]
    fn test_operation_id_short() {
        let id = OperationId::new();
        assert_eq!(id.short().len(), 8);
        assert!(format!("{:?}", id).starts_with("OperationId("));
    }

    #[test]
    fn test_operation_id_serde() {
        let id = OperationId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: OperationId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_root_starts_at_zero() {
        let state = state();
        let root = state.leg(LegSlot::ROOT);
        assert_eq!(root.queued, Duration::ZERO);
        assert_eq!(root.started, Some(Duration::ZERO));
        assert!(root.duration.is_none());
        assert!(!state.is_complete());
    }

    #[test]
    fn test_complete_requires_every_linked_leg() {
        let mut state = state();
        let a = child(&mut state, LegSlot::ROOT, LegOptions::new().name("a"));
        let b = child(&mut state, a, LegOptions::new().name("b"));

        state.mark_finished(LegSlot::ROOT, Duration::ZERO, true);
        assert!(!state.is_complete());

        state.mark_started(a);
        state.mark_finished(a, Duration::ZERO, true);
        assert!(!state.is_complete());

        state.mark_started(b);
        state.mark_finished(b, Duration::ZERO, true);
        assert!(state.is_complete());
    }

    #[test]
    fn test_detach_unblocks_completion() {
        let mut state = state();
        let a = child(&mut state, LegSlot::ROOT, LegOptions::default());
        state.mark_finished(LegSlot::ROOT, Duration::ZERO, true);
        assert!(!state.is_complete());

        assert!(state.detach(a));
        assert!(!state.detach(a));
        assert!(state.is_complete());
    }

    #[test]
    fn test_duration_set_once() {
        let mut state = state();
        state.mark_finished(LegSlot::ROOT, Duration::from_millis(3), false);
        state.mark_finished(LegSlot::ROOT, Duration::from_millis(9), true);

        let root = state.leg(LegSlot::ROOT);
        assert_eq!(root.duration, Some(Duration::from_millis(3)));
        assert!(!root.success);
    }

    #[test]
    fn test_prune_siblings_spares_sticky_and_started() {
        let mut state = state();
        let group = Some(GroupId::next());
        let success = state.add_child(LegSlot::ROOT, LegId::next(), LegOptions::new().name("ok"), group);
        let failure_id = LegId::next();
        let failure = state.add_child(LegSlot::ROOT, failure_id, LegOptions::new().name("err"), group);
        let complete = state.add_child(
            LegSlot::ROOT,
            LegId::next(),
            LegOptions::new().name("done").sticky(true),
            group,
        );
        let other = child(&mut state, LegSlot::ROOT, LegOptions::new().name("other"));

        state.mark_started(success);
        let pruned = state.prune_siblings(success);

        assert_eq!(pruned, vec![failure_id]);
        let children = &state.leg(LegSlot::ROOT).children;
        assert_eq!(children, &vec![success, complete, other]);
        assert!(!children.contains(&failure));
    }

    #[test]
    fn test_sticky_leg_does_not_prune() {
        let mut state = state();
        let group = Some(GroupId::next());
        state.add_child(LegSlot::ROOT, LegId::next(), LegOptions::default(), group);
        let sticky = state.add_child(LegSlot::ROOT, LegId::next(), LegOptions::new().sticky(true), group);

        assert!(state.prune_siblings(sticky).is_empty());
        assert_eq!(state.leg(LegSlot::ROOT).children.len(), 2);
    }

    #[test]
    fn test_report_preserves_order_and_shape() {
        let mut state = state();
        let a = child(&mut state, LegSlot::ROOT, LegOptions::new().name("a").cause("timeout"));
        let b = child(&mut state, LegSlot::ROOT, LegOptions::new().name("b"));
        for slot in [LegSlot::ROOT, a, b] {
            state.mark_started(slot);
            state.mark_finished(slot, Duration::ZERO, true);
        }

        let report = state.into_report();
        assert_eq!(report.name(), "root");
        assert_eq!(report.calls().len(), 2);
        assert_eq!(report.calls()[0].name, "a");
        assert_eq!(report.calls()[0].cause.as_deref(), Some("timeout"));
        assert_eq!(report.calls()[1].name, "b");

        let json = serde_json::to_value(&report).unwrap();
        for key in ["id", "name", "t0", "queued", "started", "duration", "totalDuration", "success", "calls"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json["calls"][0].get("t0").is_none());
    }
}
