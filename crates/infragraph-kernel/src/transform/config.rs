//! Top-level plan nodes from configuration and state

use super::GraphTransformer;
use crate::config::Config;
use crate::dag::Graph;
use crate::error::GraphError;
use crate::expander::InstanceExpander;
use crate::node::{AbstractResource, ExpandableResource, GraphNode, PlannableResource};
use crate::state::State;
use tracing::debug;

/// Adds one expandable node per configured resource
pub struct ConfigTransformer<'a> {
    config: &'a Config,
}

impl<'a> ConfigTransformer<'a> {
    /// Read resources from `config`
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }
}

impl GraphTransformer for ConfigTransformer<'_> {
    fn name(&self) -> &'static str {
        "ConfigTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        for (module, resource) in self.config.resources() {
            let addr = resource.addr().in_module(module);
            graph.add(GraphNode::ExpandableResource(ExpandableResource::new(AbstractResource::new(
                addr,
                Some(resource.clone()),
            ))));
        }
        Ok(())
    }
}

/// Adds a configuration-less resource node for each recorded resource that
/// configuration no longer produces
///
/// A resource is orphaned when its block is gone or when its module
/// instance is no longer part of the expansion. Module expansions must be
/// registered before this runs.
pub struct OrphanResourceTransformer<'a> {
    config: &'a Config,
    state: &'a State,
    expander: &'a InstanceExpander,
}

impl<'a> OrphanResourceTransformer<'a> {
    /// Compare `state` against `config`
    #[must_use]
    pub fn new(config: &'a Config, state: &'a State, expander: &'a InstanceExpander) -> Self {
        Self {
            config,
            state,
            expander,
        }
    }
}

impl GraphTransformer for OrphanResourceTransformer<'_> {
    fn name(&self) -> &'static str {
        "OrphanResourceTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        for recorded in self.state.resources() {
            let addr = recorded.addr.config();
            let orphaned = match self.config.resource(&addr) {
                None => true,
                Some(_) => !self.expander.expand_module(&addr.module).contains(&recorded.addr.module),
            };
            if !orphaned {
                continue;
            }
            debug!(resource = %recorded.addr, "resource orphaned");
            graph.add(GraphNode::PlannableResource(PlannableResource::new(
                AbstractResource::new(addr, None),
                recorded.addr.clone(),
                None,
            )));
        }
        Ok(())
    }
}
