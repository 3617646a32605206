use super::GraphTransformer;
use crate::dag::{Graph, NodeIndex};
use crate::error::GraphError;
use infragraph_addrs::Target;
use std::collections::BTreeSet;
use tracing::debug;

/// Restricts the graph to targeted nodes and everything they depend on
///
/// A no-op without targets. Synthetic roots are always kept.
pub struct TargetsTransformer<'a> {
    targets: &'a [Target],
}

impl<'a> TargetsTransformer<'a> {
    /// Restrict to `targets`
    #[must_use]
    pub fn new(targets: &'a [Target]) -> Self {
        Self { targets }
    }
}

impl GraphTransformer for TargetsTransformer<'_> {
    fn name(&self) -> &'static str {
        "TargetsTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        if self.targets.is_empty() {
            return Ok(());
        }

        let mut keep: BTreeSet<NodeIndex> = BTreeSet::new();
        for (idx, node) in graph.nodes() {
            if node.is_root() {
                keep.insert(idx);
            } else if node.is_targeted(self.targets) {
                keep.insert(idx);
                keep.extend(graph.ancestors(idx));
            }
        }

        let dropped: Vec<NodeIndex> = graph.indices().into_iter().filter(|i| !keep.contains(i)).collect();
        for idx in dropped {
            if let Some(node) = graph.remove(idx) {
                debug!(node = %node.name(), "excluded by targets");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{AbstractResource, ExpandableResource, GraphNode};
    use infragraph_addrs::{ModulePath, Resource};

    fn expandable(g: &mut Graph, name: &str) -> NodeIndex {
        let addr = Resource::new("null_resource", name).in_module(ModulePath::root());
        g.add(GraphNode::ExpandableResource(ExpandableResource::new(AbstractResource::new(addr, None))))
    }

    #[test]
    fn keeps_targets_and_their_dependencies() {
        let mut g = Graph::new();
        let a = expandable(&mut g, "a");
        let b = expandable(&mut g, "b");
        let c = expandable(&mut g, "c");
        g.connect(a, b).unwrap();
        g.connect(b, c).unwrap();

        let targets = vec!["null_resource.b".parse::<Target>().unwrap()];
        TargetsTransformer::new(&targets).transform(&mut g).unwrap();

        assert!(g.node(a).is_some());
        assert!(g.node(b).is_some());
        assert!(g.node(c).is_none());
    }

    #[test]
    fn empty_targets_keep_everything() {
        let mut g = Graph::new();
        expandable(&mut g, "a");
        expandable(&mut g, "b");
        TargetsTransformer::new(&[]).transform(&mut g).unwrap();
        assert_eq!(g.node_count(), 2);
    }
}
