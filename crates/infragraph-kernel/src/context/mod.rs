//! Shared context of one walk

use crate::config::Evaluator;
use crate::expander::InstanceExpander;
use crate::plan::ChangeSet;
use crate::plugin::{PluginRegistry, Schemas};
use crate::state::SyncState;
use infragraph_addrs::Target;
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Which walk is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkOperation {
    /// Compute changes
    Plan,
    /// Carry out planned changes
    Apply,
}

/// Everything a node may touch while it is evaluated or expanded
///
/// The state store is the only mutable shared resource; the expander and
/// change set synchronize internally.
pub struct WalkContext {
    /// Running walk
    pub operation: WalkOperation,
    /// Working state
    pub state: SyncState,
    /// Module and resource expansions
    pub expander: InstanceExpander,
    /// Expression evaluator
    pub evaluator: Arc<dyn Evaluator>,
    /// Provisioners and providers
    pub plugins: Arc<PluginRegistry>,
    /// Providers resolved with schemas
    pub schemas: Schemas,
    /// Changes planned so far
    pub changes: ChangeSet,
    /// Targets restricting the walk
    pub targets: Vec<Target>,
    /// Parent span of every node span
    pub span: Span,
}

impl fmt::Debug for WalkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkContext")
            .field("operation", &self.operation)
            .field("targets", &self.targets)
            .field("changes", &self.changes.len())
            .finish_non_exhaustive()
    }
}
