//! Graph transformers
//!
//! A graph is built by running an ordered list of [`GraphTransformer`]s
//! over it. The graph must stay acyclic after every step; the builder
//! checks this and fails fast with the cycle's members.

mod apply;
mod attach;
mod cbd;
mod config;
mod count;
mod reference;
mod root;
mod targets;

pub use apply::{ApplyChangesTransformer, DestroyEdgeTransformer};
pub use attach::AttachStateTransformer;
pub use cbd::ForcedCbdTransformer;
pub use config::{ConfigTransformer, OrphanResourceTransformer};
pub use count::{DeposedObjectTransformer, NodeFactory, OrphanResourceCountTransformer, ResourceCountTransformer};
pub use reference::ReferenceTransformer;
pub use root::RootTransformer;
pub use targets::TargetsTransformer;

use crate::dag::Graph;
use crate::error::GraphError;
use tracing::debug;

/// One step of graph construction
pub trait GraphTransformer {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Mutate the graph
    ///
    /// # Errors
    /// Structural problems; construction stops at the first one.
    fn transform(&self, graph: &mut Graph) -> Result<(), GraphError>;
}

/// Runs transformers in order, then validates the result
pub struct BasicGraphBuilder<'a> {
    name: &'static str,
    steps: Vec<Box<dyn GraphTransformer + 'a>>,
    validate: bool,
}

impl<'a> BasicGraphBuilder<'a> {
    /// Builder that validates the finished graph
    #[must_use]
    pub fn new(name: &'static str, steps: Vec<Box<dyn GraphTransformer + 'a>>) -> Self {
        Self {
            name,
            steps,
            validate: true,
        }
    }

    /// Skip final validation; acyclicity is still checked per step
    #[must_use]
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Build from an empty graph
    ///
    /// # Errors
    /// The first structural error; no partial graph is returned.
    pub fn build(self) -> Result<Graph, GraphError> {
        self.build_from(Graph::new())
    }

    /// Build on top of an existing graph
    ///
    /// # Errors
    /// The first structural error; no partial graph is returned.
    pub fn build_from(self, mut graph: Graph) -> Result<Graph, GraphError> {
        for step in &self.steps {
            step.transform(&mut graph)?;
            debug!(
                builder = self.name,
                step = step.name(),
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "transform complete"
            );
            graph.check_acyclic()?;
        }
        if self.validate {
            graph.validate()?;
        }
        Ok(graph)
    }
}
