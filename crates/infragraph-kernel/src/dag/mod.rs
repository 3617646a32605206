//! Dependency graph
//!
//! An arena of [`GraphNode`]s over a petgraph `StableDiGraph`. An edge
//! `a -> b` means `a` must finish before `b` starts: edges run from
//! dependency to dependent. Indices stay valid across removals, which the
//! targeting transformer relies on.

use crate::error::GraphError;
use crate::node::GraphNode;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

pub use petgraph::stable_graph::NodeIndex;

/// Dependency graph of walk nodes
#[derive(Debug, Default)]
pub struct Graph {
    inner: StableDiGraph<GraphNode, ()>,
}

impl Graph {
    /// Empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node
    pub fn add(&mut self, node: GraphNode) -> NodeIndex {
        self.inner.add_node(node)
    }

    /// Remove a node and its edges
    pub fn remove(&mut self, idx: NodeIndex) -> Option<GraphNode> {
        self.inner.remove_node(idx)
    }

    /// Add an edge making `to` depend on `from`; duplicate edges collapse
    ///
    /// # Errors
    /// [`GraphError::SelfLoop`] when `from == to`, [`GraphError::NodeNotFound`]
    /// for unknown indices.
    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex) -> Result<(), GraphError> {
        if !self.inner.contains_node(from) || !self.inner.contains_node(to) {
            return Err(GraphError::NodeNotFound);
        }
        if from == to {
            return Err(GraphError::SelfLoop(self.inner[from].name()));
        }
        self.inner.update_edge(from, to, ());
        Ok(())
    }

    /// Node at `idx`
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> Option<&GraphNode> {
        self.inner.node_weight(idx)
    }

    /// Mutable node at `idx`
    pub fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut GraphNode> {
        self.inner.node_weight_mut(idx)
    }

    /// Indices of all nodes
    #[must_use]
    pub fn indices(&self) -> Vec<NodeIndex> {
        self.inner.node_indices().collect()
    }

    /// All nodes with their indices
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> {
        self.inner.node_indices().map(move |i| (i, &self.inner[i]))
    }

    /// First node matching `pred`
    pub fn find<F>(&self, pred: F) -> Option<NodeIndex>
    where
        F: Fn(&GraphNode) -> bool,
    {
        self.nodes().find(|(_, n)| pred(n)).map(|(i, _)| i)
    }

    /// Number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Number of edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Check if the graph has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    /// Check for the edge `from -> to`
    #[must_use]
    pub fn has_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.inner.contains_edge(from, to)
    }

    /// Direct dependencies of `idx`
    #[must_use]
    pub fn dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.inner.neighbors_directed(idx, Direction::Incoming).collect()
    }

    /// Direct dependents of `idx`
    #[must_use]
    pub fn dependents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.inner.neighbors_directed(idx, Direction::Outgoing).collect()
    }

    /// Transitive dependencies of `idx`, excluding itself
    #[must_use]
    pub fn ancestors(&self, idx: NodeIndex) -> BTreeSet<NodeIndex> {
        let mut seen = BTreeSet::new();
        let mut stack = self.dependencies(idx);
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.inner.neighbors_directed(next, Direction::Incoming));
            }
        }
        seen
    }

    /// Nodes without dependencies
    #[must_use]
    pub fn sources(&self) -> Vec<NodeIndex> {
        self.inner
            .node_indices()
            .filter(|n| self.inner.neighbors_directed(*n, Direction::Incoming).next().is_none())
            .collect()
    }

    /// Nodes without dependents
    #[must_use]
    pub fn sinks(&self) -> Vec<NodeIndex> {
        self.inner
            .node_indices()
            .filter(|n| self.inner.neighbors_directed(*n, Direction::Outgoing).next().is_none())
            .collect()
    }

    /// The single sink
    ///
    /// # Errors
    /// [`GraphError::NoRoot`] or [`GraphError::MultipleRoots`].
    pub fn root(&self) -> Result<NodeIndex, GraphError> {
        match self.sinks().as_slice() {
            [] => Err(GraphError::NoRoot),
            [root] => Ok(*root),
            many => Err(GraphError::MultipleRoots(
                many.iter().map(|i| self.inner[*i].name()).collect(),
            )),
        }
    }

    /// Fail if the graph has a cycle, naming its members
    ///
    /// # Errors
    /// [`GraphError::CycleDetected`].
    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        if !is_cyclic_directed(&self.inner) {
            return Ok(());
        }
        let component = tarjan_scc(&self.inner)
            .into_iter()
            .find(|c| c.len() > 1)
            .unwrap_or_default();
        let mut path: Vec<String> = component.iter().map(|i| self.inner[*i].name()).collect();
        path.sort();
        if let Some(first) = path.first().cloned() {
            path.push(first);
        }
        Err(GraphError::CycleDetected { path })
    }

    /// Full structural validation: acyclic, unique instance addresses and a
    /// single root
    ///
    /// # Errors
    /// The first structural problem found.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.check_acyclic()?;

        let mut seen = BTreeSet::new();
        for (_, node) in self.nodes() {
            if let Some(key) = node.unique_key() {
                if !seen.insert(key.clone()) {
                    return Err(GraphError::DuplicateAddress(node.name()));
                }
            }
        }

        if !self.is_empty() {
            self.root()?;
        }
        Ok(())
    }

    /// Consume into densely-indexed nodes and `(from, to)` edges
    #[must_use]
    pub fn into_parts(self) -> (Vec<GraphNode>, Vec<(usize, usize)>) {
        let mut dense = HashMap::new();
        for (i, idx) in self.inner.node_indices().enumerate() {
            dense.insert(idx, i);
        }
        let edges = self
            .inner
            .edge_references()
            .map(|e| (dense[&e.source()], dense[&e.target()]))
            .collect();
        let mut graph = self.inner;
        let order: Vec<NodeIndex> = graph.node_indices().collect();
        let nodes = order.into_iter().filter_map(|i| graph.remove_node(i)).collect();
        (nodes, edges)
    }
}
