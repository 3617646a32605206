//! Planned changes

use crate::state::State;
use dashmap::DashMap;
use infragraph_addrs::{InstanceAddress, ProviderAddr, Target};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// What apply will do to one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Nothing
    NoOp,
    /// Create a new object
    Create,
    /// Update in place
    Update,
    /// Destroy the old object, then create its replacement
    DeleteThenCreate,
    /// Create the replacement, then destroy the old object
    CreateThenDelete,
    /// Destroy
    Delete,
}

impl Action {
    /// Check if this replaces an object
    #[inline]
    #[must_use]
    pub fn is_replace(self) -> bool {
        matches!(self, Self::DeleteThenCreate | Self::CreateThenDelete)
    }

    /// Check if apply creates an object
    #[inline]
    #[must_use]
    pub fn creates(self) -> bool {
        matches!(self, Self::Create) || self.is_replace()
    }

    /// Check if apply destroys an object
    #[inline]
    #[must_use]
    pub fn deletes(self) -> bool {
        matches!(self, Self::Delete) || self.is_replace()
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Update => "update",
            Self::DeleteThenCreate => "replace (destroy then create)",
            Self::CreateThenDelete => "replace (create then destroy)",
            Self::Delete => "delete",
        })
    }
}

/// Planned change to one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedChange {
    /// Instance address
    pub addr: InstanceAddress,
    /// Action to take
    pub action: Action,
    /// Provider that performs it
    pub provider: ProviderAddr,
    /// Recorded object before the change
    #[serde(default)]
    pub before: Option<Value>,
    /// Planned object after the change
    #[serde(default)]
    pub after: Option<Value>,
    /// The change destroys a deposed object rather than the live one
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deposed: bool,
}

/// Concurrent collector for changes planned during a walk
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: DashMap<(InstanceAddress, bool), PlannedChange>,
}

impl ChangeSet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, replacing any earlier one for the same object
    pub fn record(&self, change: PlannedChange) {
        self.changes.insert((change.addr.clone(), change.deposed), change);
    }

    /// Look up the change to the live object
    #[must_use]
    pub fn get(&self, addr: &InstanceAddress) -> Option<PlannedChange> {
        self.changes.get(&(addr.clone(), false)).map(|c| c.value().clone())
    }

    /// Number of recorded changes
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// All changes ordered by address, the live object's change first
    #[must_use]
    pub fn sorted(&self) -> Vec<PlannedChange> {
        let mut out: Vec<PlannedChange> = self.changes.iter().map(|c| c.value().clone()).collect();
        out.sort_by(|a, b| a.addr.cmp(&b.addr).then(a.deposed.cmp(&b.deposed)));
        out
    }
}

/// Result of planning, input to apply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Changes ordered by address
    pub changes: Vec<PlannedChange>,
    /// State apply starts from
    pub prior_state: State,
    /// Targets the plan was restricted to
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Plan {
    /// Changes that need work during apply
    pub fn actionable(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action != Action::NoOp)
    }

    /// Look up the change to the live object
    #[must_use]
    pub fn change(&self, addr: &InstanceAddress) -> Option<&PlannedChange> {
        self.changes.iter().find(|c| &c.addr == addr && !c.deposed)
    }

    /// Look up the destruction of a deposed object
    #[must_use]
    pub fn deposed_change(&self, addr: &InstanceAddress) -> Option<&PlannedChange> {
        self.changes.iter().find(|c| &c.addr == addr && c.deposed)
    }

    /// Count changes per action
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.changes {
            if change.action.creates() {
                summary.add += 1;
            }
            if change.action == Action::Update {
                summary.change += 1;
            }
            if change.action.deletes() {
                summary.destroy += 1;
            }
        }
        summary
    }
}

/// Counts of planned work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Objects to create
    pub add: usize,
    /// Objects to update in place
    pub change: usize,
    /// Objects to destroy
    pub destroy: usize,
}

impl Display for PlanSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} to add, {} to change, {} to destroy", self.add, self.change, self.destroy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(addr: &str, action: Action) -> PlannedChange {
        PlannedChange {
            addr: addr.parse().unwrap(),
            action,
            provider: ProviderAddr::legacy("null"),
            before: None,
            after: None,
            deposed: false,
        }
    }

    #[test]
    fn replacements_count_as_add_and_destroy() {
        let plan = Plan {
            changes: vec![
                change("null_resource.a", Action::CreateThenDelete),
                change("null_resource.b", Action::Update),
                change("null_resource.c", Action::NoOp),
            ],
            ..Plan::default()
        };
        assert_eq!(plan.summary().to_string(), "1 to add, 1 to change, 1 to destroy");
        assert_eq!(plan.actionable().count(), 2);
    }

    #[test]
    fn change_set_sorts_by_address() {
        let set = ChangeSet::new();
        set.record(change(r#"null_resource.a["y"]"#, Action::Create));
        set.record(change(r#"null_resource.a["x"]"#, Action::Create));
        set.record(change(r#"null_resource.a["x"]"#, Action::Update));
        let sorted = set.sorted();
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].addr.to_string(), r#"null_resource.a["x"]"#);
        assert_eq!(sorted[0].action, Action::Update);
    }

    #[test]
    fn deposed_change_is_kept_beside_live_change() {
        let set = ChangeSet::new();
        set.record(change("null_resource.a", Action::NoOp));
        set.record(PlannedChange {
            deposed: true,
            ..change("null_resource.a", Action::Delete)
        });
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&"null_resource.a".parse().unwrap()).unwrap().action, Action::NoOp);

        let plan = Plan {
            changes: set.sorted(),
            ..Plan::default()
        };
        let addr = "null_resource.a".parse().unwrap();
        assert_eq!(plan.change(&addr).unwrap().action, Action::NoOp);
        assert!(plan.deposed_change(&addr).unwrap().deposed);
        assert_eq!(plan.summary().destroy, 1);
    }
}
