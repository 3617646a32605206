use super::GraphTransformer;
use crate::dag::{Graph, NodeIndex};
use crate::error::GraphError;
use std::collections::BTreeSet;
use tracing::debug;

/// Forces create-before-destroy onto dependents of create-before-destroy nodes
///
/// A node that destroys first while something it depends on creates first
/// would need its replacement ordered both ways, so the policy propagates
/// down the graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedCbdTransformer;

impl GraphTransformer for ForcedCbdTransformer {
    fn name(&self) -> &'static str {
        "ForcedCbdTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        let cbd: BTreeSet<NodeIndex> = graph
            .nodes()
            .filter(|(_, n)| n.as_create_before_destroy().is_some_and(|c| c.create_before_destroy()))
            .map(|(i, _)| i)
            .collect();
        if cbd.is_empty() {
            return Ok(());
        }

        let forced: Vec<NodeIndex> = graph
            .nodes()
            .filter(|(i, n)| {
                n.as_create_before_destroy().is_some_and(|c| !c.create_before_destroy())
                    && graph.ancestors(*i).iter().any(|a| cbd.contains(a))
            })
            .map(|(i, _)| i)
            .collect();
        for idx in forced {
            if let Some(node) = graph.node_mut(idx) {
                debug!(node = %node.name(), "forcing create_before_destroy");
                if let Some(c) = node.as_create_before_destroy_mut() {
                    c.modify_create_before_destroy(true);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::node::{AbstractResource, ExpandableResource, GraphNode};
    use infragraph_addrs::ModulePath;

    fn expandable(g: &mut Graph, name: &str, cbd: bool) -> NodeIndex {
        let mut config = ResourceConfig::new("null_resource", name);
        config.lifecycle.create_before_destroy = cbd;
        let addr = config.addr().in_module(ModulePath::root());
        g.add(GraphNode::ExpandableResource(ExpandableResource::new(AbstractResource::new(
            addr,
            Some(config),
        ))))
    }

    fn is_cbd(g: &Graph, idx: NodeIndex) -> bool {
        g.node(idx)
            .and_then(|n| n.as_create_before_destroy())
            .is_some_and(|c| c.create_before_destroy())
    }

    #[test]
    fn dependents_inherit_policy() {
        let mut g = Graph::new();
        let a = expandable(&mut g, "a", true);
        let b = expandable(&mut g, "b", false);
        let c = expandable(&mut g, "c", false);
        let unrelated = expandable(&mut g, "d", false);
        g.connect(a, b).unwrap();
        g.connect(b, c).unwrap();

        ForcedCbdTransformer.transform(&mut g).unwrap();
        assert!(is_cbd(&g, b));
        assert!(is_cbd(&g, c));
        assert!(!is_cbd(&g, unrelated));
    }

    #[test]
    fn dependencies_are_not_forced() {
        let mut g = Graph::new();
        let a = expandable(&mut g, "a", false);
        let b = expandable(&mut g, "b", true);
        g.connect(a, b).unwrap();
        ForcedCbdTransformer.transform(&mut g).unwrap();
        assert!(!is_cbd(&g, a));
    }
}
