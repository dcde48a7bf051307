//! Phase rotation and damping of edge amplitudes.
//!
//! Each tick every edge amplitude is rotated by `omega·dt` and damped
//! by `exp(-damping·dt)`:
//!
//! ```text
//! amp' = amp · exp(i·omega·dt − damping·dt)
//! ```
//!
//! Deterministic in dt; no randomness involved.

use mire_core::ModuleError;
use mire_graph::{EdgeKey, GraphState};
use mire_module::{Module, ModuleDescriptor, Stage, StepContext};
use num_complex::Complex64;

/// An amplitude evolution module (Integration stage, CPU).
#[derive(Debug)]
pub struct AmplitudeEvolution {
    descriptor: ModuleDescriptor,
    omega: f64,
    damping: f64,
}

impl AmplitudeEvolution {
    /// Build an amplitude evolution module.
    ///
    /// `omega` is the angular phase velocity, `damping` the
    /// exponential decay rate.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `omega` is not finite or `damping` is
    /// negative or not finite.
    pub fn new(omega: f64, damping: f64) -> Result<Self, String> {
        if !omega.is_finite() {
            return Err(format!("omega must be finite, got {omega}"));
        }
        if !damping.is_finite() || damping < 0.0 {
            return Err(format!("damping must be finite and >= 0, got {damping}"));
        }
        Ok(Self {
            descriptor: ModuleDescriptor::new("amplitude_evolution", Stage::Integration)
                .with_category("dynamics"),
            omega,
            damping,
        })
    }
}

impl Module for AmplitudeEvolution {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn execute_step(
        &mut self,
        state: &mut GraphState,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        let dt = ctx.dt();
        let factor = Complex64::from_polar((-self.damping * dt).exp(), self.omega * dt);

        let updates: Vec<(EdgeKey, Complex64)> = state
            .edges()
            .map(|(k, e)| (k, e.amplitude * factor))
            .collect();
        for (key, amplitude) in updates {
            state
                .set_amplitude(key, amplitude)
                .map_err(|e| ModuleError::ExecutionFailed {
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mire_core::{NodeId, TickId};
    use mire_graph::Edge;
    use mire_ledger::{ConservationLedger, LedgerConfig};

    fn key(a: u32, b: u32) -> EdgeKey {
        EdgeKey::new(NodeId(a), NodeId(b)).unwrap()
    }

    fn step(module: &mut AmplitudeEvolution, state: &mut GraphState, dt: f64) {
        let mut ledger = ConservationLedger::new(LedgerConfig::default()).unwrap();
        ledger.initialize_energy(10.0).unwrap();
        let mut ctx = StepContext::new(TickId(1), dt, &mut ledger, None);
        module.execute_step(state, &mut ctx).unwrap();
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(AmplitudeEvolution::new(f64::NAN, 0.0).is_err());
        assert!(AmplitudeEvolution::new(1.0, -0.5).is_err());
        assert!(AmplitudeEvolution::new(1.0, 0.0).is_ok());
    }

    #[test]
    fn pure_rotation_preserves_modulus() {
        let mut g = GraphState::new(3).unwrap();
        g.add_edge(key(0, 1), Edge::with_weight(1.0)).unwrap();
        g.set_amplitude(key(0, 1), Complex64::new(3.0, 4.0)).unwrap();

        let mut m = AmplitudeEvolution::new(2.0, 0.0).unwrap();
        step(&mut m, &mut g, 0.1);

        let amp = g.edge(key(0, 1)).unwrap().amplitude;
        assert!((amp.norm() - 5.0).abs() < 1e-12);
        // Phase advanced by omega*dt.
        let expected_phase = Complex64::new(3.0, 4.0).arg() + 0.2;
        assert!((amp.arg() - expected_phase).abs() < 1e-12);
    }

    #[test]
    fn damping_shrinks_modulus_exponentially() {
        let mut g = GraphState::new(3).unwrap();
        g.add_edge(key(0, 1), Edge::with_weight(1.0)).unwrap();
        g.set_amplitude(key(0, 1), Complex64::new(1.0, 0.0)).unwrap();

        let mut m = AmplitudeEvolution::new(0.0, 2.0).unwrap();
        step(&mut m, &mut g, 0.5);

        let amp = g.edge(key(0, 1)).unwrap().amplitude;
        assert!((amp.norm() - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn zero_amplitude_stays_zero() {
        let mut g = GraphState::new(3).unwrap();
        g.add_edge(key(0, 1), Edge::with_weight(1.0)).unwrap();

        let mut m = AmplitudeEvolution::new(1.0, 1.0).unwrap();
        step(&mut m, &mut g, 0.1);
        assert_eq!(g.edge(key(0, 1)).unwrap().amplitude_sq(), 0.0);
    }
}
