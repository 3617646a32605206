//! Top-level graph builders
//!
//! [`PlanGraphBuilder`] produces the phase-1 graph of unexpanded resources;
//! instance nodes appear later through dynamic expansion.
//! [`ApplyGraphBuilder`] produces a flat graph straight from a plan.

use crate::config::Config;
use crate::dag::Graph;
use crate::error::GraphError;
use crate::expander::InstanceExpander;
use crate::plan::Plan;
use crate::plugin::Schemas;
use crate::state::State;
use crate::transform::{
    ApplyChangesTransformer, AttachStateTransformer, BasicGraphBuilder, ConfigTransformer, DestroyEdgeTransformer,
    ForcedCbdTransformer, GraphTransformer, OrphanResourceTransformer, ReferenceTransformer, RootTransformer,
    TargetsTransformer,
};
use infragraph_addrs::Target;

/// Builds the plan graph
#[derive(Debug)]
pub struct PlanGraphBuilder<'a> {
    /// Configuration
    pub config: &'a Config,
    /// Prior state
    pub state: &'a State,
    /// Expander with module expansions registered
    pub expander: &'a InstanceExpander,
    /// Targets
    pub targets: &'a [Target],
}

impl PlanGraphBuilder<'_> {
    /// Build
    ///
    /// # Errors
    /// Structural problems such as reference cycles.
    pub fn build(&self) -> Result<Graph, GraphError> {
        let steps: Vec<Box<dyn GraphTransformer + '_>> = vec![
            Box::new(ConfigTransformer::new(self.config)),
            Box::new(OrphanResourceTransformer::new(self.config, self.state, self.expander)),
            Box::new(ReferenceTransformer),
            Box::new(ForcedCbdTransformer),
            Box::new(TargetsTransformer::new(self.targets)),
            Box::new(RootTransformer),
        ];
        BasicGraphBuilder::new("plan", steps).build()
    }
}

/// Builds the apply graph
#[derive(Debug)]
pub struct ApplyGraphBuilder<'a> {
    /// Configuration
    pub config: &'a Config,
    /// Plan to carry out
    pub plan: &'a Plan,
    /// Providers resolved for the walk
    pub schemas: &'a Schemas,
}

impl ApplyGraphBuilder<'_> {
    /// Build
    ///
    /// # Errors
    /// Structural problems such as dependency cycles between changes.
    pub fn build(&self) -> Result<Graph, GraphError> {
        let steps: Vec<Box<dyn GraphTransformer + '_>> = vec![
            Box::new(ApplyChangesTransformer::new(self.config, self.plan, self.schemas)),
            Box::new(AttachStateTransformer::new(&self.plan.prior_state)),
            Box::new(ReferenceTransformer),
            Box::new(DestroyEdgeTransformer),
            Box::new(TargetsTransformer::new(&self.plan.targets)),
            Box::new(RootTransformer),
        ];
        BasicGraphBuilder::new("apply", steps).build()
    }
}
