use super::GraphTransformer;
use crate::dag::Graph;
use crate::error::GraphError;
use crate::state::State;

/// Hands each state-aware node its recorded objects
pub struct AttachStateTransformer<'a> {
    state: &'a State,
}

impl<'a> AttachStateTransformer<'a> {
    /// Read records from `state`
    #[must_use]
    pub fn new(state: &'a State) -> Self {
        Self { state }
    }
}

impl GraphTransformer for AttachStateTransformer<'_> {
    fn name(&self) -> &'static str {
        "AttachStateTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError> {
        for idx in graph.indices() {
            let Some(node) = graph.node_mut(idx).and_then(|n| n.as_attach_state_mut()) else {
                continue;
            };
            let addr = node.state_address().clone();
            node.attach_state(self.state.instance(&addr));
        }
        Ok(())
    }
}
