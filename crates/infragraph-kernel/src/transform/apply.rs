//! Apply-graph nodes from a plan

use super::GraphTransformer;
use crate::config::Config;
use crate::dag::{Graph, NodeIndex};
use crate::error::GraphError;
use crate::node::{AbstractResource, ApplyableResource, DestroyInstance, GraphNode, ResourceInstance};
use crate::plan::{Action, Plan};
use crate::plugin::Schemas;
use infragraph_addrs::{ConfigResource, InstanceAddress, ResourceAddress};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

/// Adds the nodes that carry out each actionable change
///
/// Creates and updates get a live instance node behind a resource-level
/// node. Deletes get a destroy node. A replacement gets both halves, ordered
/// destroy-first or, under create-before-destroy, create-first with the
/// destroy acting on the deposed object. A leftover deposed object is
/// destroyed before a create-before-destroy replacement of the same
/// instance needs the deposed slot.
pub struct ApplyChangesTransformer<'a> {
    config: &'a Config,
    plan: &'a Plan,
    schemas: &'a Schemas,
}

impl<'a> ApplyChangesTransformer<'a> {
    /// Nodes for `plan`
    #[must_use]
    pub fn new(config: &'a Config, plan: &'a Plan, schemas: &'a Schemas) -> Self {
        Self { config, plan, schemas }
    }
}

impl GraphTransformer for ApplyChangesTransformer<'_> {
    fn name(&self) -> &'static str {
        "ApplyChangesTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        let mut shared: HashMap<ConfigResource, Arc<AbstractResource>> = HashMap::new();
        let mut prepare: BTreeMap<ResourceAddress, NodeIndex> = BTreeMap::new();
        let mut deposing: HashMap<InstanceAddress, NodeIndex> = HashMap::new();
        let mut leftovers: Vec<(InstanceAddress, NodeIndex)> = Vec::new();

        for change in self.plan.actionable() {
            let provider = match self.schemas.resolve(&change.provider) {
                Ok(provider) => Some(provider),
                Err(_) => {
                    warn!(address = %change.addr, provider = %change.provider, "provider unavailable for planned change");
                    None
                }
            };

            if change.deposed {
                let destroy =
                    graph.add(GraphNode::DestroyInstance(DestroyInstance::new(change.clone(), provider, true)));
                leftovers.push((change.addr.clone(), destroy));
                continue;
            }
            if change.action == Action::Delete {
                graph.add(GraphNode::DestroyInstance(DestroyInstance::new(change.clone(), provider, false)));
                continue;
            }

            let config_addr = change.addr.resource.config();
            let resource = Arc::clone(shared.entry(config_addr.clone()).or_insert_with(|| {
                AbstractResource::new(config_addr.clone(), self.config.resource(&config_addr).cloned())
            }));
            let prepare_idx = *prepare.entry(change.addr.resource.clone()).or_insert_with(|| {
                graph.add(GraphNode::ApplyableResource(ApplyableResource::new(
                    Arc::clone(&resource),
                    change.addr.resource.clone(),
                )))
            });

            let create_before_destroy =
                change.action == Action::CreateThenDelete || resource.configured_create_before_destroy();
            let create = graph.add(GraphNode::ResourceInstance(
                ResourceInstance::new(change.addr.clone(), resource, provider.clone(), create_before_destroy)
                    .with_change(change.clone()),
            ));
            graph.connect(prepare_idx, create)?;

            match change.action {
                Action::DeleteThenCreate => {
                    let destroy =
                        graph.add(GraphNode::DestroyInstance(DestroyInstance::new(change.clone(), provider, false)));
                    graph.connect(destroy, create)?;
                }
                Action::CreateThenDelete => {
                    let destroy =
                        graph.add(GraphNode::DestroyInstance(DestroyInstance::new(change.clone(), provider, true)));
                    graph.connect(create, destroy)?;
                    deposing.insert(change.addr.clone(), create);
                }
                _ => {}
            }
        }

        for (addr, leftover) in leftovers {
            if let Some(create) = deposing.get(&addr) {
                graph.connect(leftover, *create)?;
            }
        }
        Ok(())
    }
}

/// Orders destroys so dependents go before what they depend on
///
/// Dependencies come from the prior objects, so destroy nodes must have
/// state attached first.
#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyEdgeTransformer;

impl GraphTransformer for DestroyEdgeTransformer {
    fn name(&self) -> &'static str {
        "DestroyEdgeTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        let destroys: Vec<(NodeIndex, InstanceAddress, Vec<ConfigResource>)> = graph
            .nodes()
            .filter_map(|(idx, node)| match node {
                GraphNode::DestroyInstance(d) => Some((
                    idx,
                    d.addr.clone(),
                    d.prior.as_ref().map(|p| p.dependencies.clone()).unwrap_or_default(),
                )),
                _ => None,
            })
            .collect();

        for (dependent, _, dependencies) in &destroys {
            for (dependency, addr, _) in &destroys {
                if dependent != dependency && dependencies.contains(&addr.resource.config()) {
                    graph.connect(*dependent, *dependency)?;
                }
            }
        }
        Ok(())
    }
}
