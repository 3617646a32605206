//! Walk state of a single node
//!
//! ```text
//! Pending -> Ready -> Running -> Done
//!    |                  |
//!    +-----> Failed <---+
//! ```
//!
//! A pending node fails without running when one of its dependencies
//! failed. `Done` and `Failed` are terminal.

use serde::{Deserialize, Serialize};

/// Node walk state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Waiting on dependencies
    Pending,
    /// All dependencies done, not yet started
    Ready,
    /// Evaluating
    Running,
    /// Finished successfully
    Done,
    /// Evaluation failed, or skipped because a dependency failed
    Failed,
}

impl NodeState {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Legal successors of a state
#[must_use]
pub fn allowed_transitions(from: NodeState) -> &'static [NodeState] {
    use NodeState::{Done, Failed, Pending, Ready, Running};
    match from {
        Pending => &[Ready, Failed],
        Ready => &[Running],
        Running => &[Done, Failed],
        Done | Failed => &[],
    }
}

/// Check a transition
///
/// Returns `false` for an illegal transition. With the `strict-debug`
/// feature an illegal transition panics instead.
#[must_use]
pub fn validate_transition(from: NodeState, to: NodeState) -> bool {
    let ok = allowed_transitions(from).contains(&to);
    #[cfg(feature = "strict-debug")]
    assert!(ok, "illegal node transition {from:?} -> {to:?}");
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        assert!(validate_transition(NodeState::Pending, NodeState::Ready));
        assert!(validate_transition(NodeState::Ready, NodeState::Running));
        assert!(validate_transition(NodeState::Running, NodeState::Done));
    }

    #[test]
    fn skip_is_pending_to_failed() {
        assert!(validate_transition(NodeState::Pending, NodeState::Failed));
    }

    #[cfg(not(feature = "strict-debug"))]
    #[test]
    fn terminal_states_are_final() {
        for to in [NodeState::Pending, NodeState::Ready, NodeState::Running, NodeState::Done] {
            assert!(!validate_transition(NodeState::Done, to));
            assert!(!validate_transition(NodeState::Failed, to));
        }
        assert!(!validate_transition(NodeState::Ready, NodeState::Failed));
        assert!(NodeState::Failed.is_terminal());
    }
}
