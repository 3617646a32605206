use super::GraphTransformer;
use crate::dag::Graph;
use crate::error::GraphError;
use crate::node::GraphNode;

/// Ensures the graph has exactly one sink
///
/// A synthetic root is added, with every existing sink pointing at it,
/// whenever the sink count is not one. An empty graph gets a lone root so
/// the walker always has something to finish on.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootTransformer;

impl GraphTransformer for RootTransformer {
    fn name(&self) -> &'static str {
        "RootTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        let sinks = graph.sinks();
        if sinks.len() == 1 {
            return Ok(());
        }
        let root = graph.add(GraphNode::Root);
        for sink in sinks {
            graph.connect(sink, root)?;
        }
        Ok(())
    }
}
