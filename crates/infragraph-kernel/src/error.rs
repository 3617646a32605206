//! Error types for the kernel
//!
//! Only failures that abort an entire build step or walk live here.
//! Everything scoped to a single node is reported as a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) instead.

use crate::state_machine::NodeState;
use std::path::PathBuf;

/// Structural graph errors
///
/// These are fatal to the graph-build step that produced them; no partial
/// graph is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The graph contains a cycle
    #[error("cycle detected: {}", path.join(" -> "))]
    CycleDetected {
        /// Names of the nodes forming the cycle
        path: Vec<String>,
    },

    /// An edge from a node to itself was requested
    #[error("self-referential edge on {0}")]
    SelfLoop(String),

    /// Two nodes claim the same instance address
    #[error("duplicate instance address {0}")]
    DuplicateAddress(String),

    /// A graph with nodes had no sink
    #[error("graph has no root")]
    NoRoot,

    /// More than one sink remained after the root transformer
    #[error("graph has multiple roots: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    /// Node index not present
    #[error("node not found")]
    NodeNotFound,
}

/// Errors that abort a whole walk
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    /// The top-level graph could not be built
    #[error("building the {name} graph failed: {source}")]
    Graph {
        /// Builder name
        name: &'static str,
        /// Underlying structural error
        #[source]
        source: GraphError,
    },

    /// A node task was cancelled
    #[error("node task aborted: {0}")]
    Join(String),

    /// The walker attempted an illegal node state transition
    #[error("illegal node transition {from:?} -> {to:?} for {node}")]
    IllegalTransition {
        /// Node name
        node: String,
        /// Current state
        from: NodeState,
        /// Requested state
        to: NodeState,
    },
}

/// Errors loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or shape error
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Extension was neither `.toml` nor `.json`
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Errors reported by provider and provisioner plugins
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// The plugin has been stopped
    #[error("plugin stopped")]
    Stopped,

    /// Plugin-side failure
    #[error("plugin failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_joins_path() {
        let err = GraphError::CycleDetected {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cycle detected: a -> b -> a");
    }

    #[test]
    fn walk_error_wraps_graph_error() {
        let err = WalkError::Graph {
            name: "plan",
            source: GraphError::NoRoot,
        };
        assert!(err.to_string().contains("plan graph failed"));
    }
}
