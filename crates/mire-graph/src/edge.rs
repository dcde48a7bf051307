//! Edge identity and payload types.

use mire_core::NodeId;
use num_complex::Complex64;
use std::fmt;

use crate::error::GraphError;

/// Canonically-ordered, undirected edge identity.
///
/// The lower node ID is always stored first, so `(3, 7)` and `(7, 3)`
/// name the same edge. Self-loops are rejected at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    a: NodeId,
    b: NodeId,
}

impl EdgeKey {
    /// Build a canonical edge key from two endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::SelfLoop`] if both endpoints are the same
    /// node.
    pub fn new(a: NodeId, b: NodeId) -> Result<Self, GraphError> {
        if a == b {
            return Err(GraphError::SelfLoop { node: a });
        }
        if a < b {
            Ok(Self { a, b })
        } else {
            Ok(Self { a: b, b: a })
        }
    }

    /// The lower-ID endpoint.
    pub fn lo(&self) -> NodeId {
        self.a
    }

    /// The higher-ID endpoint.
    pub fn hi(&self) -> NodeId {
        self.b
    }

    /// Given one endpoint, the other. `None` if `node` is not an
    /// endpoint of this edge.
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.a {
            Some(self.b)
        } else if node == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.a, self.b)
    }
}

/// Per-edge payload: a scalar weight and a complex amplitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    /// Scalar coupling weight.
    pub weight: f64,
    /// Complex amplitude attached to the edge.
    pub amplitude: Complex64,
}

impl Edge {
    /// An edge with the given weight and zero amplitude.
    pub fn with_weight(weight: f64) -> Self {
        Self {
            weight,
            amplitude: Complex64::new(0.0, 0.0),
        }
    }

    /// Squared modulus of the amplitude.
    pub fn amplitude_sq(&self) -> f64 {
        self.amplitude.norm_sqr()
    }
}

impl Default for Edge {
    fn default() -> Self {
        Self::with_weight(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_canonical_ordering() {
        let fwd = EdgeKey::new(NodeId(3), NodeId(7)).unwrap();
        let rev = EdgeKey::new(NodeId(7), NodeId(3)).unwrap();
        assert_eq!(fwd, rev);
        assert_eq!(fwd.lo(), NodeId(3));
        assert_eq!(fwd.hi(), NodeId(7));
    }

    #[test]
    fn edge_key_rejects_self_loop() {
        match EdgeKey::new(NodeId(4), NodeId(4)) {
            Err(GraphError::SelfLoop { node }) => assert_eq!(node, NodeId(4)),
            other => panic!("expected SelfLoop, got {other:?}"),
        }
    }

    #[test]
    fn edge_key_other_endpoint() {
        let key = EdgeKey::new(NodeId(1), NodeId(5)).unwrap();
        assert_eq!(key.other(NodeId(1)), Some(NodeId(5)));
        assert_eq!(key.other(NodeId(5)), Some(NodeId(1)));
        assert_eq!(key.other(NodeId(2)), None);
    }

    #[test]
    fn edge_defaults_to_unit_weight_zero_amplitude() {
        let e = Edge::default();
        assert_eq!(e.weight, 1.0);
        assert_eq!(e.amplitude_sq(), 0.0);
    }

    #[test]
    fn amplitude_sq_is_norm_squared() {
        let e = Edge {
            weight: 2.0,
            amplitude: Complex64::new(3.0, 4.0),
        };
        assert_eq!(e.amplitude_sq(), 25.0);
    }
}
