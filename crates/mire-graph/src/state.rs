//! The mutable simulation state: nodes, edges, and scalar fields.

use indexmap::IndexMap;
use mire_core::NodeId;
use num_complex::Complex64;
use smallvec::SmallVec;

use crate::edge::{Edge, EdgeKey};
use crate::error::GraphError;

/// The shared state object every module reads and mutates each tick.
///
/// The node set is fixed at construction; topology mutation happens at
/// the edge level. The edge table iterates in insertion order, which —
/// together with order-preserving removal — keeps trajectories
/// reproducible for a fixed seed.
///
/// # Topology version
///
/// Every successful [`add_edge`](GraphState::add_edge) or
/// [`remove_edge`](GraphState::remove_edge) bumps
/// [`topology_version`](GraphState::topology_version). Owners of
/// buffers sized by node/edge count compare versions between ticks to
/// decide when reallocation is due.
#[derive(Clone, Debug)]
pub struct GraphState {
    node_count: u32,
    matter: Vec<f64>,
    edges: IndexMap<EdgeKey, Edge>,
    adjacency: Vec<SmallVec<[NodeId; 8]>>,
    topology_version: u64,
}

impl GraphState {
    /// Create a graph with `node_count` isolated nodes and zero matter.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ZeroNodes`] for an empty node set.
    pub fn new(node_count: u32) -> Result<Self, GraphError> {
        if node_count == 0 {
            return Err(GraphError::ZeroNodes);
        }
        Ok(Self {
            node_count,
            matter: vec![0.0; node_count as usize],
            edges: IndexMap::new(),
            adjacency: vec![SmallVec::new(); node_count as usize],
            topology_version: 0,
        })
    }

    // ── Topology queries ───────────────────────────────────────

    /// Number of nodes (fixed for the lifetime of the graph).
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of distinct node pairs the graph could connect.
    pub fn possible_edge_count(&self) -> usize {
        let n = self.node_count as usize;
        n * (n - 1) / 2
    }

    /// Number of node pairs currently unconnected.
    pub fn missing_edge_count(&self) -> usize {
        self.possible_edge_count() - self.edge_count()
    }

    /// Whether the given edge exists.
    pub fn contains_edge(&self, key: EdgeKey) -> bool {
        self.edges.contains_key(&key)
    }

    /// The edge payload, if the edge exists.
    pub fn edge(&self, key: EdgeKey) -> Option<&Edge> {
        self.edges.get(&key)
    }

    /// The edge at a given position in insertion order.
    ///
    /// Used by samplers to pick a uniformly random existing edge.
    pub fn edge_at(&self, index: usize) -> Option<(EdgeKey, &Edge)> {
        self.edges.get_index(index).map(|(k, e)| (*k, e))
    }

    /// Iterate over all edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &Edge)> {
        self.edges.iter().map(|(k, e)| (*k, e))
    }

    /// Neighbours of a node over live edges.
    pub fn neighbours(&self, node: NodeId) -> &[NodeId] {
        match self.adjacency.get(node.index()) {
            Some(adj) => adj,
            None => &[],
        }
    }

    /// Monotone counter bumped on every add/remove.
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    // ── Topology mutation ──────────────────────────────────────

    /// Add an edge with the given payload.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeOutOfRange`] for endpoints outside the
    /// node set and [`GraphError::DuplicateEdge`] if the edge exists.
    pub fn add_edge(&mut self, key: EdgeKey, edge: Edge) -> Result<(), GraphError> {
        self.check_node(key.lo())?;
        self.check_node(key.hi())?;
        if self.edges.contains_key(&key) {
            return Err(GraphError::DuplicateEdge { key });
        }
        self.edges.insert(key, edge);
        self.adjacency[key.lo().index()].push(key.hi());
        self.adjacency[key.hi().index()].push(key.lo());
        self.topology_version += 1;
        Ok(())
    }

    /// Remove an edge, returning its payload.
    ///
    /// Removal preserves the insertion order of the remaining edges so
    /// index-based random selection stays reproducible.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MissingEdge`] if the edge does not exist.
    pub fn remove_edge(&mut self, key: EdgeKey) -> Result<Edge, GraphError> {
        let edge = self
            .edges
            .shift_remove(&key)
            .ok_or(GraphError::MissingEdge { key })?;
        self.adjacency[key.lo().index()].retain(|n| *n != key.hi());
        self.adjacency[key.hi().index()].retain(|n| *n != key.lo());
        self.topology_version += 1;
        Ok(edge)
    }

    // ── Field mutation ─────────────────────────────────────────

    /// Overwrite an edge's weight.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MissingEdge`] if the edge does not exist.
    pub fn set_weight(&mut self, key: EdgeKey, weight: f64) -> Result<(), GraphError> {
        match self.edges.get_mut(&key) {
            Some(edge) => {
                edge.weight = weight;
                Ok(())
            }
            None => Err(GraphError::MissingEdge { key }),
        }
    }

    /// Overwrite an edge's amplitude.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MissingEdge`] if the edge does not exist.
    pub fn set_amplitude(&mut self, key: EdgeKey, amplitude: Complex64) -> Result<(), GraphError> {
        match self.edges.get_mut(&key) {
            Some(edge) => {
                edge.amplitude = amplitude;
                Ok(())
            }
            None => Err(GraphError::MissingEdge { key }),
        }
    }

    /// Overwrite an edge's full payload.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MissingEdge`] if the edge does not exist.
    pub fn set_edge(&mut self, key: EdgeKey, payload: Edge) -> Result<(), GraphError> {
        match self.edges.get_mut(&key) {
            Some(edge) => {
                *edge = payload;
                Ok(())
            }
            None => Err(GraphError::MissingEdge { key }),
        }
    }

    /// Matter value at a node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeOutOfRange`] for nodes outside the set.
    pub fn matter(&self, node: NodeId) -> Result<f64, GraphError> {
        self.check_node(node)?;
        Ok(self.matter[node.index()])
    }

    /// Overwrite the matter value at a node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeOutOfRange`] for nodes outside the set.
    pub fn set_matter(&mut self, node: NodeId, value: f64) -> Result<(), GraphError> {
        self.check_node(node)?;
        self.matter[node.index()] = value;
        Ok(())
    }

    /// The dense per-node matter field.
    pub fn matter_slice(&self) -> &[f64] {
        &self.matter
    }

    /// Mutable access to the dense per-node matter field.
    pub fn matter_slice_mut(&mut self) -> &mut [f64] {
        &mut self.matter
    }

    // ── Measurements ───────────────────────────────────────────

    /// Sum of the matter field over all nodes.
    pub fn total_matter(&self) -> f64 {
        self.matter.iter().sum()
    }

    /// Field energy: Σ over edges of `weight · |amplitude|²`.
    pub fn total_field_energy(&self) -> f64 {
        self.edges
            .values()
            .map(|e| e.weight * e.amplitude_sq())
            .sum()
    }

    /// Smallest edge weight, if any edges exist.
    pub fn min_weight(&self) -> Option<f64> {
        self.edges.values().map(|e| e.weight).reduce(f64::min)
    }

    /// Whether any matter value, weight, or amplitude is NaN/infinite.
    pub fn has_non_finite(&self) -> bool {
        self.matter.iter().any(|v| !v.is_finite())
            || self.edges.values().any(|e| {
                !e.weight.is_finite()
                    || !e.amplitude.re.is_finite()
                    || !e.amplitude.im.is_finite()
            })
    }

    /// Whether every node is reachable from node 0 over live edges.
    ///
    /// A single-node graph is connected; a multi-node graph with an
    /// isolated node is not.
    pub fn is_connected(&self) -> bool {
        if self.node_count == 1 {
            return true;
        }
        let n = self.node_count as usize;
        let mut seen = vec![false; n];
        let mut queue: Vec<usize> = vec![0];
        seen[0] = true;
        let mut visited = 1usize;
        while let Some(idx) = queue.pop() {
            for nb in &self.adjacency[idx] {
                let j = nb.index();
                if !seen[j] {
                    seen[j] = true;
                    visited += 1;
                    queue.push(j);
                }
            }
        }
        visited == n
    }

    fn check_node(&self, node: NodeId) -> Result<(), GraphError> {
        if node.0 >= self.node_count {
            return Err(GraphError::NodeOutOfRange {
                node,
                node_count: self.node_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(a: u32, b: u32) -> EdgeKey {
        EdgeKey::new(NodeId(a), NodeId(b)).unwrap()
    }

    fn triangle() -> GraphState {
        let mut g = GraphState::new(3).unwrap();
        g.add_edge(key(0, 1), Edge::with_weight(1.0)).unwrap();
        g.add_edge(key(1, 2), Edge::with_weight(2.0)).unwrap();
        g.add_edge(key(0, 2), Edge::with_weight(3.0)).unwrap();
        g
    }

    #[test]
    fn zero_nodes_rejected() {
        assert_eq!(GraphState::new(0).unwrap_err(), GraphError::ZeroNodes);
    }

    #[test]
    fn add_and_remove_edges() {
        let mut g = GraphState::new(4).unwrap();
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.possible_edge_count(), 6);
        assert_eq!(g.missing_edge_count(), 6);

        g.add_edge(key(0, 1), Edge::with_weight(0.5)).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert!(g.contains_edge(key(1, 0)));
        assert_eq!(g.neighbours(NodeId(0)), &[NodeId(1)]);

        let removed = g.remove_edge(key(0, 1)).unwrap();
        assert_eq!(removed.weight, 0.5);
        assert_eq!(g.edge_count(), 0);
        assert!(g.neighbours(NodeId(0)).is_empty());
    }

    #[test]
    fn duplicate_and_missing_edges_rejected() {
        let mut g = GraphState::new(3).unwrap();
        g.add_edge(key(0, 1), Edge::default()).unwrap();
        assert!(matches!(
            g.add_edge(key(1, 0), Edge::default()),
            Err(GraphError::DuplicateEdge { .. })
        ));
        assert!(matches!(
            g.remove_edge(key(1, 2)),
            Err(GraphError::MissingEdge { .. })
        ));
    }

    #[test]
    fn out_of_range_node_rejected() {
        let mut g = GraphState::new(2).unwrap();
        assert!(matches!(
            g.add_edge(key(0, 5), Edge::default()),
            Err(GraphError::NodeOutOfRange { .. })
        ));
        assert!(matches!(
            g.set_matter(NodeId(9), 1.0),
            Err(GraphError::NodeOutOfRange { .. })
        ));
    }

    #[test]
    fn topology_version_bumps_only_on_topology_change() {
        let mut g = GraphState::new(3).unwrap();
        assert_eq!(g.topology_version(), 0);
        g.add_edge(key(0, 1), Edge::default()).unwrap();
        assert_eq!(g.topology_version(), 1);
        g.set_weight(key(0, 1), 4.0).unwrap();
        assert_eq!(g.topology_version(), 1);
        g.remove_edge(key(0, 1)).unwrap();
        assert_eq!(g.topology_version(), 2);
    }

    #[test]
    fn removal_preserves_insertion_order() {
        let mut g = triangle();
        g.remove_edge(key(1, 2)).unwrap();
        let order: Vec<EdgeKey> = g.edges().map(|(k, _)| k).collect();
        assert_eq!(order, vec![key(0, 1), key(0, 2)]);
        assert_eq!(g.edge_at(1).unwrap().0, key(0, 2));
    }

    #[test]
    fn measurements() {
        let mut g = triangle();
        g.set_matter(NodeId(0), 1.5).unwrap();
        g.set_matter(NodeId(2), 0.5).unwrap();
        assert_eq!(g.total_matter(), 2.0);

        g.set_amplitude(key(0, 1), Complex64::new(0.0, 2.0)).unwrap();
        // field energy = 1.0 * |2i|^2 = 4.0, other edges have zero amplitude
        assert_eq!(g.total_field_energy(), 4.0);
        assert_eq!(g.min_weight(), Some(1.0));
    }

    #[test]
    fn non_finite_detection() {
        let mut g = triangle();
        assert!(!g.has_non_finite());
        g.set_weight(key(0, 1), f64::NAN).unwrap();
        assert!(g.has_non_finite());
        g.set_weight(key(0, 1), 1.0).unwrap();
        g.set_matter(NodeId(1), f64::INFINITY).unwrap();
        assert!(g.has_non_finite());
    }

    #[test]
    fn connectivity() {
        let single = GraphState::new(1).unwrap();
        assert!(single.is_connected());

        let mut g = GraphState::new(4).unwrap();
        assert!(!g.is_connected());
        g.add_edge(key(0, 1), Edge::default()).unwrap();
        g.add_edge(key(1, 2), Edge::default()).unwrap();
        assert!(!g.is_connected()); // node 3 isolated
        g.add_edge(key(2, 3), Edge::default()).unwrap();
        assert!(g.is_connected());
        g.remove_edge(key(1, 2)).unwrap();
        assert!(!g.is_connected());
    }
}
