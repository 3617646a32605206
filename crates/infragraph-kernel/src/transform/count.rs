//! Instance expansion inside a resource subgraph

use super::GraphTransformer;
use crate::dag::Graph;
use crate::error::GraphError;
use crate::node::GraphNode;
use crate::state::State;
use infragraph_addrs::{InstanceAddress, InstanceKey, ResourceAddress};
use std::collections::HashSet;
use tracing::debug;

/// Builds a node for one instance address
pub type NodeFactory<'a> = &'a dyn Fn(InstanceAddress) -> GraphNode;

/// Adds one live node per instance address
pub struct ResourceCountTransformer<'a> {
    instances: &'a [InstanceAddress],
    factory: NodeFactory<'a>,
}

impl<'a> ResourceCountTransformer<'a> {
    /// Create
    #[must_use]
    pub fn new(instances: &'a [InstanceAddress], factory: NodeFactory<'a>) -> Self {
        Self { instances, factory }
    }
}

impl GraphTransformer for ResourceCountTransformer<'_> {
    fn name(&self) -> &'static str {
        "ResourceCountTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        for addr in self.instances {
            graph.add((self.factory)(addr.clone()));
        }
        Ok(())
    }
}

/// Adds an orphan node for every recorded instance outside the instance set
pub struct OrphanResourceCountTransformer<'a> {
    addr: &'a ResourceAddress,
    instances: &'a [InstanceAddress],
    state: &'a State,
    factory: NodeFactory<'a>,
}

impl<'a> OrphanResourceCountTransformer<'a> {
    /// Create
    #[must_use]
    pub fn new(
        addr: &'a ResourceAddress,
        instances: &'a [InstanceAddress],
        state: &'a State,
        factory: NodeFactory<'a>,
    ) -> Self {
        Self {
            addr,
            instances,
            state,
            factory,
        }
    }
}

impl GraphTransformer for OrphanResourceCountTransformer<'_> {
    fn name(&self) -> &'static str {
        "OrphanResourceCountTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        let Some(recorded) = self.state.resource(self.addr) else {
            return Ok(());
        };
        let live: HashSet<&InstanceKey> = self.instances.iter().map(|a| &a.key).collect();
        for (key, record) in &recorded.instances {
            if live.contains(key) || record.current.is_none() {
                continue;
            }
            let addr = self.addr.instance(key.clone());
            debug!(address = %addr, "orphaned instance");
            graph.add((self.factory)(addr));
        }
        Ok(())
    }
}

/// Adds a node for every deposed object recorded under a resource
///
/// Deposed objects are left behind when a create-before-destroy replacement
/// fails to destroy the old object. They are planned for destruction whether
/// or not their instance is still configured.
pub struct DeposedObjectTransformer<'a> {
    addr: &'a ResourceAddress,
    state: &'a State,
    factory: NodeFactory<'a>,
}

impl<'a> DeposedObjectTransformer<'a> {
    /// Create
    #[must_use]
    pub fn new(addr: &'a ResourceAddress, state: &'a State, factory: NodeFactory<'a>) -> Self {
        Self { addr, state, factory }
    }
}

impl GraphTransformer for DeposedObjectTransformer<'_> {
    fn name(&self) -> &'static str {
        "DeposedObjectTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        let Some(recorded) = self.state.resource(self.addr) else {
            return Ok(());
        };
        for (key, record) in &recorded.instances {
            if record.deposed.is_none() {
                continue;
            }
            let addr = self.addr.instance(key.clone());
            debug!(address = %addr, "deposed object");
            graph.add((self.factory)(addr));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{AbstractResource, OrphanInstance, ResourceInstance};
    use crate::state::ObjectState;
    use infragraph_addrs::{ModuleInstance, Resource};
    use serde_json::json;
    use std::collections::BTreeSet;

    fn res() -> ResourceAddress {
        Resource::new("null_resource", "a").absolute(ModuleInstance::root())
    }

    #[test]
    fn live_and_orphan_sets_are_disjoint() {
        let addr = res();
        let mut state = State::new();
        for key in ["x", "y"] {
            state.set_current(&addr.instance(key.into()), Some(ObjectState::new(json!({"k": key}))));
        }
        let instances = vec![addr.instance("x".into())];
        let abs = AbstractResource::new(addr.config(), None);
        let live = |a: InstanceAddress| GraphNode::ResourceInstance(ResourceInstance::new(a, abs.clone(), None, false));
        let orphan = |a: InstanceAddress| GraphNode::OrphanInstance(OrphanInstance::new(a, None));

        let mut g = Graph::new();
        ResourceCountTransformer::new(&instances, &live).transform(&mut g).unwrap();
        OrphanResourceCountTransformer::new(&addr, &instances, &state, &orphan)
            .transform(&mut g)
            .unwrap();

        let names: Vec<String> = g.nodes().map(|(_, n)| n.name()).collect();
        assert_eq!(names, [r#"null_resource.a["x"]"#, r#"null_resource.a["y"] (orphan)"#]);
    }

    #[test]
    fn deposed_objects_get_their_own_nodes() {
        let addr = res();
        let mut state = State::new();
        let x = addr.instance("x".into());
        let y = addr.instance("y".into());
        state.set_current(&x, Some(ObjectState::new(json!("new"))));
        state.set_deposed(&x, Some(ObjectState::new(json!("old"))));
        state.set_deposed(&y, Some(ObjectState::new(json!("gone"))));
        let instances = vec![x];
        let abs = AbstractResource::new(addr.config(), None);
        let live = |a: InstanceAddress| GraphNode::ResourceInstance(ResourceInstance::new(a, abs.clone(), None, false));
        let orphan = |a: InstanceAddress| GraphNode::OrphanInstance(OrphanInstance::new(a, None));
        let deposed = |a: InstanceAddress| GraphNode::OrphanInstance(OrphanInstance::deposed(a, None));

        let mut g = Graph::new();
        ResourceCountTransformer::new(&instances, &live).transform(&mut g).unwrap();
        OrphanResourceCountTransformer::new(&addr, &instances, &state, &orphan)
            .transform(&mut g)
            .unwrap();
        DeposedObjectTransformer::new(&addr, &state, &deposed)
            .transform(&mut g)
            .unwrap();

        let names: Vec<String> = g.nodes().map(|(_, n)| n.name()).collect();
        assert_eq!(
            names,
            [
                r#"null_resource.a["x"]"#,
                r#"null_resource.a["x"] (deposed)"#,
                r#"null_resource.a["y"] (deposed)"#,
            ]
        );
        let keys: BTreeSet<_> = g.nodes().filter_map(|(_, n)| n.unique_key()).collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn no_record_means_no_orphans() {
        let addr = res();
        let state = State::new();
        let orphan = |a: InstanceAddress| GraphNode::OrphanInstance(OrphanInstance::new(a, None));
        let mut g = Graph::new();
        OrphanResourceCountTransformer::new(&addr, &[], &state, &orphan)
            .transform(&mut g)
            .unwrap();
        assert!(g.is_empty());
    }
}
