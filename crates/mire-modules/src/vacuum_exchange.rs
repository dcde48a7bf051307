//! Ledger-disciplined energy exchange.
//!
//! Demonstrates the three flavours of ledger interaction a module can
//! have:
//!
//! - **drive**: external energy entering the tracked system, recorded
//!   as injection;
//! - **radiation**: energy leaving the system, debited with
//!   `try_spend` (refusal when the vacuum pool cannot cover it is a
//!   normal outcome, not an error);
//! - **condensation**: an internal vacuum → matter transfer, applied
//!   to the node field and accounted with `update_matter_energy` so
//!   the three-way total is invariant by construction.

use mire_core::ModuleError;
use mire_graph::GraphState;
use mire_module::{Module, ModuleDescriptor, Stage, StepContext};

/// A boundary-flow and condensation module (Forces stage, CPU).
#[derive(Debug)]
pub struct VacuumExchange {
    descriptor: ModuleDescriptor,
    drive_rate: f64,
    radiate_rate: f64,
    condense_rate: f64,
}

impl VacuumExchange {
    /// Build a vacuum exchange module.
    ///
    /// All rates are per unit time and must be finite and >= 0.
    ///
    /// # Errors
    ///
    /// Returns `Err` on invalid rates.
    pub fn new(drive_rate: f64, radiate_rate: f64, condense_rate: f64) -> Result<Self, String> {
        for (name, rate) in [
            ("drive_rate", drive_rate),
            ("radiate_rate", radiate_rate),
            ("condense_rate", condense_rate),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(format!("{name} must be finite and >= 0, got {rate}"));
            }
        }
        Ok(Self {
            descriptor: ModuleDescriptor::new("vacuum_exchange", Stage::Forces)
                .with_priority(10)
                .with_category("energy"),
            drive_rate,
            radiate_rate,
            condense_rate,
        })
    }
}

impl Module for VacuumExchange {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn execute_step(
        &mut self,
        state: &mut GraphState,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        let dt = ctx.dt();
        let wrap = |reason: String| ModuleError::ExecutionFailed { reason };

        // Drive: external injection into the vacuum pool.
        let drive = self.drive_rate * dt;
        if drive > 0.0 {
            ctx.ledger()
                .record_injection(drive)
                .map_err(|e| wrap(e.to_string()))?;
        }

        // Radiation: energy leaves the system if the pool covers it.
        let radiate = self.radiate_rate * dt;
        if radiate > 0.0 {
            let _ = ctx
                .ledger()
                .try_spend(radiate)
                .map_err(|e| wrap(e.to_string()))?;
        }

        // Condensation: vacuum -> matter, only when affordable.
        let condense = self.condense_rate * dt;
        if condense > 0.0 && ctx.ledger_ref().vacuum_pool() >= condense {
            let per_node = condense / f64::from(state.node_count());
            for i in 0..state.node_count() {
                let node = i.into();
                let current = state.matter(node).map_err(|e| wrap(e.to_string()))?;
                state
                    .set_matter(node, current + per_node)
                    .map_err(|e| wrap(e.to_string()))?;
            }
            let measured = state.total_matter();
            ctx.ledger()
                .update_matter_energy(measured)
                .map_err(|e| wrap(e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mire_core::TickId;
    use mire_ledger::{ConservationLedger, LedgerConfig};

    fn ledger() -> ConservationLedger {
        let mut ledger = ConservationLedger::new(LedgerConfig::default()).unwrap();
        ledger.initialize_energy(100.0).unwrap(); // vacuum = 50
        ledger
    }

    #[test]
    fn invalid_rates_rejected() {
        assert!(VacuumExchange::new(-1.0, 0.0, 0.0).is_err());
        assert!(VacuumExchange::new(0.0, f64::NAN, 0.0).is_err());
        assert!(VacuumExchange::new(1.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn drive_and_radiation_move_energy_across_the_boundary() {
        let mut g = GraphState::new(4).unwrap();
        let mut l = ledger();
        let mut m = VacuumExchange::new(3.0, 1.0, 0.0).unwrap();

        let mut ctx = StepContext::new(TickId(1), 1.0, &mut l, None);
        m.execute_step(&mut g, &mut ctx).unwrap();

        // +3 injected, -1 radiated.
        assert!((l.vacuum_pool() - 52.0).abs() < 1e-12);
        assert!((l.total_injection() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn condensation_transfers_vacuum_into_matter() {
        let mut g = GraphState::new(4).unwrap();
        let mut l = ledger();
        let total_before = l.total_tracked();
        let mut m = VacuumExchange::new(0.0, 0.0, 8.0).unwrap();

        let mut ctx = StepContext::new(TickId(1), 1.0, &mut l, None);
        m.execute_step(&mut g, &mut ctx).unwrap();

        assert!((g.total_matter() - 8.0).abs() < 1e-12);
        assert!((l.matter_energy() - 8.0).abs() < 1e-12);
        assert!((l.vacuum_pool() - 42.0).abs() < 1e-12);
        // Internal transfer: the tracked total is untouched.
        assert!((l.total_tracked() - total_before).abs() < 1e-12);
    }

    #[test]
    fn unaffordable_condensation_is_skipped() {
        let mut g = GraphState::new(4).unwrap();
        let mut l = ledger();
        let mut m = VacuumExchange::new(0.0, 0.0, 1000.0).unwrap();

        let mut ctx = StepContext::new(TickId(1), 1.0, &mut l, None);
        m.execute_step(&mut g, &mut ctx).unwrap();

        assert_eq!(g.total_matter(), 0.0);
        assert_eq!(l.vacuum_pool(), 50.0);
    }

    #[test]
    fn unaffordable_radiation_is_a_refusal_not_an_error() {
        let mut g = GraphState::new(4).unwrap();
        let mut l = ledger();
        let mut m = VacuumExchange::new(0.0, 1e9, 0.0).unwrap();

        let mut ctx = StepContext::new(TickId(1), 1.0, &mut l, None);
        m.execute_step(&mut g, &mut ctx).unwrap();
        assert_eq!(l.vacuum_pool(), 50.0);
    }
}
