//! Proposed topology mutations as value command objects.
//!
//! A [`ProposedMove`] carries everything needed to apply or revert a
//! mutation without recomputation: the target edge key and snapshots
//! of the payload before and after. No captured closures, no hidden
//! mutable state — applying and reverting are pure writes of recorded
//! values, which keeps proposals testable in isolation.

use mire_graph::{Edge, EdgeKey, GraphError, GraphState};

/// The kind of local mutation a proposal performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKind {
    /// Create a currently-missing edge.
    Add,
    /// Delete a currently-existing edge.
    Remove,
    /// Perturb an existing edge's weight (symmetric kernel).
    PerturbWeight,
}

/// A fully-evaluated proposal, consumed within the same sampling step.
///
/// `existing_count` and `missing_count` are measured **before** the
/// move — the Hastings ratio depends on the forward kernel's pool
/// sizes, not the post-move ones. Proposals are never persisted across
/// ticks.
#[derive(Clone, Debug)]
pub struct ProposedMove {
    /// What kind of mutation this is.
    pub kind: MoveKind,
    /// The targeted edge.
    pub key: EdgeKey,
    /// Action delta of applying the move (after minus before).
    pub delta_action: f64,
    /// Live edge count before the move.
    pub existing_count: usize,
    /// Missing (possible-but-absent) edge count before the move.
    pub missing_count: usize,
    before: Option<Edge>,
    after: Option<Edge>,
}

impl ProposedMove {
    /// Build a proposal from before/after payload snapshots.
    ///
    /// `before = None` encodes "edge absent before" (an add);
    /// `after = None` encodes "edge absent after" (a remove).
    pub fn new(
        kind: MoveKind,
        key: EdgeKey,
        before: Option<Edge>,
        after: Option<Edge>,
        existing_count: usize,
        missing_count: usize,
    ) -> Self {
        Self {
            kind,
            key,
            delta_action: 0.0,
            existing_count,
            missing_count,
            before,
            after,
        }
    }

    /// The payload before the move, if the edge existed.
    pub fn before(&self) -> Option<&Edge> {
        self.before.as_ref()
    }

    /// The payload after the move, if the edge survives it.
    pub fn after(&self) -> Option<&Edge> {
        self.after.as_ref()
    }

    /// The Hastings correction for this proposal's kernel asymmetry.
    ///
    /// - Add: `missing / (existing + 1)` — many candidate slots map
    ///   onto one more removable edge.
    /// - Remove: `existing / (missing + 1)` — the reciprocal pattern.
    /// - Weight perturbation: `1` (symmetric kernel).
    pub fn hastings_ratio(&self) -> f64 {
        match self.kind {
            MoveKind::Add => self.missing_count as f64 / (self.existing_count as f64 + 1.0),
            MoveKind::Remove => self.existing_count as f64 / (self.missing_count as f64 + 1.0),
            MoveKind::PerturbWeight => 1.0,
        }
    }

    /// Write the recorded post-move payload into the state.
    ///
    /// # Errors
    ///
    /// Propagates [`GraphError`] if the state no longer matches the
    /// recorded pre-move shape (a misuse: proposals must be consumed
    /// against the state they were evaluated on).
    pub fn apply(&self, state: &mut GraphState) -> Result<(), GraphError> {
        match (&self.before, &self.after) {
            (None, Some(edge)) => state.add_edge(self.key, *edge),
            (Some(_), None) => state.remove_edge(self.key).map(|_| ()),
            (Some(_), Some(edge)) => state.set_edge(self.key, *edge),
            (None, None) => Ok(()),
        }
    }

    /// Write the recorded pre-move payload into the state.
    ///
    /// # Errors
    ///
    /// Propagates [`GraphError`] on shape mismatch, as with
    /// [`apply`](ProposedMove::apply).
    pub fn revert(&self, state: &mut GraphState) -> Result<(), GraphError> {
        match (&self.before, &self.after) {
            (None, Some(_)) => state.remove_edge(self.key).map(|_| ()),
            (Some(edge), None) => state.add_edge(self.key, *edge),
            (Some(edge), Some(_)) => state.set_edge(self.key, *edge),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mire_core::NodeId;

    fn key(a: u32, b: u32) -> EdgeKey {
        EdgeKey::new(NodeId(a), NodeId(b)).unwrap()
    }

    #[test]
    fn hastings_ratio_add() {
        // existing=0, missing=10 -> 10 / 1 = 10.0
        let m = ProposedMove::new(MoveKind::Add, key(0, 1), None, Some(Edge::default()), 0, 10);
        assert_eq!(m.hastings_ratio(), 10.0);
    }

    #[test]
    fn hastings_ratio_remove_is_reciprocal_pattern() {
        // existing=10, missing=0 -> 10 / 1 = 10.0
        let m = ProposedMove::new(
            MoveKind::Remove,
            key(0, 1),
            Some(Edge::default()),
            None,
            10,
            0,
        );
        assert_eq!(m.hastings_ratio(), 10.0);

        // existing=2, missing=5 -> 2 / 6
        let m = ProposedMove::new(
            MoveKind::Remove,
            key(0, 1),
            Some(Edge::default()),
            None,
            2,
            5,
        );
        assert!((m.hastings_ratio() - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn hastings_ratio_perturb_is_one() {
        let e = Edge::default();
        let m = ProposedMove::new(MoveKind::PerturbWeight, key(0, 1), Some(e), Some(e), 3, 4);
        assert_eq!(m.hastings_ratio(), 1.0);
    }

    #[test]
    fn apply_then_revert_add_restores_state() {
        let mut g = GraphState::new(3).unwrap();
        let m = ProposedMove::new(
            MoveKind::Add,
            key(0, 1),
            None,
            Some(Edge::with_weight(2.0)),
            0,
            3,
        );
        m.apply(&mut g).unwrap();
        assert_eq!(g.edge(key(0, 1)).unwrap().weight, 2.0);
        m.revert(&mut g).unwrap();
        assert!(!g.contains_edge(key(0, 1)));
    }

    #[test]
    fn apply_then_revert_remove_restores_payload() {
        let mut g = GraphState::new(3).unwrap();
        g.add_edge(key(0, 1), Edge::with_weight(7.0)).unwrap();

        let before = *g.edge(key(0, 1)).unwrap();
        let m = ProposedMove::new(MoveKind::Remove, key(0, 1), Some(before), None, 1, 2);
        m.apply(&mut g).unwrap();
        assert!(!g.contains_edge(key(0, 1)));
        m.revert(&mut g).unwrap();
        assert_eq!(g.edge(key(0, 1)).unwrap().weight, 7.0);
    }

    #[test]
    fn apply_then_revert_perturb_restores_weight() {
        let mut g = GraphState::new(3).unwrap();
        g.add_edge(key(0, 1), Edge::with_weight(1.0)).unwrap();

        let before = *g.edge(key(0, 1)).unwrap();
        let mut after = before;
        after.weight = 1.5;
        let m = ProposedMove::new(
            MoveKind::PerturbWeight,
            key(0, 1),
            Some(before),
            Some(after),
            1,
            2,
        );
        m.apply(&mut g).unwrap();
        assert_eq!(g.edge(key(0, 1)).unwrap().weight, 1.5);
        m.revert(&mut g).unwrap();
        assert_eq!(g.edge(key(0, 1)).unwrap().weight, 1.0);
    }

    #[test]
    fn apply_against_mismatched_state_errors() {
        let mut g = GraphState::new(3).unwrap();
        // Proposal says the edge was absent, but it exists.
        g.add_edge(key(0, 1), Edge::default()).unwrap();
        let m = ProposedMove::new(MoveKind::Add, key(0, 1), None, Some(Edge::default()), 0, 3);
        assert!(m.apply(&mut g).is_err());
    }
}
