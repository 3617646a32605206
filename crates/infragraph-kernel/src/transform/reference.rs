use super::GraphTransformer;
use crate::dag::{Graph, NodeIndex};
use crate::error::GraphError;
use indexmap::IndexMap;
use infragraph_addrs::Reference;
use tracing::trace;

/// Connects every referencer to the nodes its references resolve to
///
/// References resolve within the referencer's scope. A reference to one
/// instance falls back to the whole resource when no node publishes the
/// instance itself. Edges from a node to itself are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceTransformer;

impl GraphTransformer for ReferenceTransformer {
    fn name(&self) -> &'static str {
        "ReferenceTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        let mut published: IndexMap<(String, Reference), Vec<NodeIndex>> = IndexMap::new();
        for (idx, node) in graph.nodes() {
            let Some(referenceable) = node.as_referenceable() else {
                continue;
            };
            let scope = node.reference_scope();
            for reference in referenceable.referenceable_addrs() {
                published.entry((scope.clone(), reference)).or_default().push(idx);
            }
        }

        let mut edges = Vec::new();
        for (idx, node) in graph.nodes() {
            let Some(referencer) = node.as_referencer() else {
                continue;
            };
            let scope = node.reference_scope();
            for reference in referencer.references() {
                let targets = published.get(&(scope.clone(), reference.clone())).or_else(|| {
                    reference
                        .containing_resource()
                        .and_then(|whole| published.get(&(scope.clone(), whole)))
                });
                let Some(targets) = targets else {
                    trace!(node = %node.name(), %reference, "reference has no target in graph");
                    continue;
                };
                edges.extend(targets.iter().filter(|t| **t != idx).map(|t| (*t, idx)));
            }
        }

        for (from, to) in edges {
            graph.connect(from, to)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::node::{AbstractResource, ExpandableResource, GraphNode, ResourceInstance};
    use infragraph_addrs::{InstanceKey, ModuleInstance, ModulePath, Resource};

    fn expandable(g: &mut Graph, name: &str, refs: &[&str]) -> NodeIndex {
        let mut config = ResourceConfig::new("null_resource", name);
        config.references = refs.iter().map(|r| r.parse().unwrap()).collect();
        let addr = config.addr().in_module(ModulePath::root());
        g.add(GraphNode::ExpandableResource(ExpandableResource::new(AbstractResource::new(
            addr,
            Some(config),
        ))))
    }

    #[test]
    fn edge_runs_from_referenced_to_referencer() {
        let mut g = Graph::new();
        let a = expandable(&mut g, "a", &[]);
        let b = expandable(&mut g, "b", &["null_resource.a"]);
        ReferenceTransformer.transform(&mut g).unwrap();
        assert!(g.has_edge(a, b));
        assert!(!g.has_edge(b, a));
    }

    #[test]
    fn instance_reference_falls_back_to_resource() {
        let mut g = Graph::new();
        let a = expandable(&mut g, "a", &[]);
        let b = expandable(&mut g, "b", &["null_resource.a[0]"]);
        ReferenceTransformer.transform(&mut g).unwrap();
        assert!(g.has_edge(a, b));
    }

    #[test]
    fn self_reference_is_skipped() {
        let mut g = Graph::new();
        expandable(&mut g, "a", &["null_resource.a"]);
        ReferenceTransformer.transform(&mut g).unwrap();
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn instance_reference_picks_one_instance() {
        let mut g = Graph::new();
        let res = Resource::new("null_resource", "a").absolute(ModuleInstance::root());
        let abs = AbstractResource::new(res.config(), None);
        let a0 = g.add(GraphNode::ResourceInstance(ResourceInstance::new(
            res.instance(InstanceKey::Int(0)),
            abs.clone(),
            None,
            false,
        )));
        let a1 = g.add(GraphNode::ResourceInstance(ResourceInstance::new(
            res.instance(InstanceKey::Int(1)),
            abs,
            None,
            false,
        )));

        let mut config = ResourceConfig::new("null_resource", "b");
        config.references = vec!["null_resource.a[1]".parse().unwrap()];
        let b_res = config.addr().absolute(ModuleInstance::root());
        let b = g.add(GraphNode::ResourceInstance(ResourceInstance::new(
            b_res.instance(Default::default()),
            AbstractResource::new(b_res.config(), Some(config)),
            None,
            false,
        )));

        ReferenceTransformer.transform(&mut g).unwrap();
        assert!(g.has_edge(a1, b));
        assert!(!g.has_edge(a0, b));
    }

    #[test]
    fn scopes_do_not_leak() {
        let mut g = Graph::new();
        let a = expandable(&mut g, "a", &[]);
        let mut config = ResourceConfig::new("null_resource", "b");
        config.references = vec!["null_resource.a".parse().unwrap()];
        let addr = config.addr().in_module(ModulePath::root().child("child"));
        let b = g.add(GraphNode::ExpandableResource(ExpandableResource::new(AbstractResource::new(
            addr,
            Some(config),
        ))));
        ReferenceTransformer.transform(&mut g).unwrap();
        assert!(!g.has_edge(a, b));
    }
}
