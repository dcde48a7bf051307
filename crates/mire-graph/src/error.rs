//! Error types for graph state mutation.

use mire_core::NodeId;
use std::error::Error;
use std::fmt;

use crate::edge::EdgeKey;

/// Errors from constructing or mutating a [`GraphState`](crate::GraphState).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphError {
    /// A graph must have at least one node.
    ZeroNodes,
    /// A node ID referenced a node outside the graph.
    NodeOutOfRange {
        /// The offending node.
        node: NodeId,
        /// Number of nodes in the graph.
        node_count: u32,
    },
    /// An edge may not connect a node to itself.
    SelfLoop {
        /// The node at both endpoints.
        node: NodeId,
    },
    /// The edge to be added already exists.
    DuplicateEdge {
        /// The contested edge.
        key: EdgeKey,
    },
    /// The referenced edge does not exist.
    MissingEdge {
        /// The absent edge.
        key: EdgeKey,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroNodes => write!(f, "graph must have at least one node"),
            Self::NodeOutOfRange { node, node_count } => {
                write!(f, "node {node} out of range (graph has {node_count} nodes)")
            }
            Self::SelfLoop { node } => write!(f, "self-loop on node {node} is not allowed"),
            Self::DuplicateEdge { key } => write!(f, "edge {key} already exists"),
            Self::MissingEdge { key } => write!(f, "edge {key} does not exist"),
        }
    }
}

impl Error for GraphError {}
