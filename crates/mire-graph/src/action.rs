//! The action functional seam.
//!
//! Concrete physics is deliberately opaque to the rest of the engine:
//! the sampler measures a global action through [`ActionFunctional`]
//! and never sees a formula. [`EdgeAction`] is the reference
//! implementation used by tests and the module library.

use crate::state::GraphState;

/// A global action (energy) functional over the graph state.
///
/// Implementations must be deterministic and side-effect free: the
/// sampler calls `action()` twice per proposal (before and after a
/// trial mutation) and relies on the difference being exact for
/// identical states.
pub trait ActionFunctional: Send {
    /// Evaluate the action of the given state.
    fn action(&self, state: &GraphState) -> f64;
}

/// Reference quadratic edge action.
///
/// ```text
/// S = Σ_edges [ kappa · (w − target_weight)² + coupling · w · |amp|² ]
///     + chemical_potential · edge_count
/// ```
///
/// The stiffness term pulls weights toward `target_weight`, the
/// coupling term prices amplitude carried on heavy edges, and the
/// chemical potential prices topology itself (positive values favour
/// sparser graphs).
#[derive(Clone, Copy, Debug)]
pub struct EdgeAction {
    /// Weight stiffness `kappa`.
    pub kappa: f64,
    /// Preferred edge weight.
    pub target_weight: f64,
    /// Amplitude-weight coupling strength.
    pub coupling: f64,
    /// Per-edge chemical potential.
    pub chemical_potential: f64,
}

impl Default for EdgeAction {
    fn default() -> Self {
        Self {
            kappa: 1.0,
            target_weight: 1.0,
            coupling: 0.5,
            chemical_potential: 0.1,
        }
    }
}

impl ActionFunctional for EdgeAction {
    fn action(&self, state: &GraphState) -> f64 {
        let mut s = self.chemical_potential * state.edge_count() as f64;
        for (_, edge) in state.edges() {
            let dw = edge.weight - self.target_weight;
            s += self.kappa * dw * dw + self.coupling * edge.weight * edge.amplitude_sq();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{Edge, EdgeKey};
    use mire_core::NodeId;
    use num_complex::Complex64;

    fn key(a: u32, b: u32) -> EdgeKey {
        EdgeKey::new(NodeId(a), NodeId(b)).unwrap()
    }

    #[test]
    fn empty_graph_has_zero_action() {
        let g = GraphState::new(3).unwrap();
        let action = EdgeAction::default();
        assert_eq!(action.action(&g), 0.0);
    }

    #[test]
    fn action_matches_hand_computation() {
        let mut g = GraphState::new(3).unwrap();
        g.add_edge(key(0, 1), Edge::with_weight(2.0)).unwrap();
        g.set_amplitude(key(0, 1), Complex64::new(1.0, 0.0)).unwrap();

        let action = EdgeAction {
            kappa: 2.0,
            target_weight: 1.0,
            coupling: 0.5,
            chemical_potential: 0.25,
        };
        // kappa*(2-1)^2 + coupling*2*1 + mu*1 = 2.0 + 1.0 + 0.25
        assert!((action.action(&g) - 3.25).abs() < 1e-12);
    }

    #[test]
    fn action_is_deterministic() {
        let mut g = GraphState::new(4).unwrap();
        g.add_edge(key(0, 1), Edge::with_weight(1.3)).unwrap();
        g.add_edge(key(2, 3), Edge::with_weight(0.7)).unwrap();
        let action = EdgeAction::default();
        assert_eq!(action.action(&g), action.action(&g));
    }
}
