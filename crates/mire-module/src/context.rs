//! Execution context passed to modules during frame execution.

use mire_core::TickId;
use mire_device::DeviceContext;
use mire_ledger::ConservationLedger;

/// Per-step context handed to each module's `execute_step`.
///
/// Carries the tick clock, the timestep, mutable access to the
/// conservation ledger, and an optional borrow of the shared device
/// context. The graph state is passed separately so the module can
/// hold `&mut GraphState` and `&mut StepContext` at the same time.
pub struct StepContext<'a> {
    tick: TickId,
    dt: f64,
    ledger: &'a mut ConservationLedger,
    device: Option<&'a DeviceContext>,
}

impl<'a> StepContext<'a> {
    /// Construct a step context. Typically called by the pipeline.
    pub fn new(
        tick: TickId,
        dt: f64,
        ledger: &'a mut ConservationLedger,
        device: Option<&'a DeviceContext>,
    ) -> Self {
        Self {
            tick,
            dt,
            ledger,
            device,
        }
    }

    /// Current tick ID.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// Configured timestep in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// The conservation ledger, for modules that create or destroy
    /// energy.
    pub fn ledger(&mut self) -> &mut ConservationLedger {
        self.ledger
    }

    /// Read-only view of the ledger.
    pub fn ledger_ref(&self) -> &ConservationLedger {
        self.ledger
    }

    /// The shared device context, if the host created one.
    pub fn device(&self) -> Option<&DeviceContext> {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mire_ledger::LedgerConfig;

    #[test]
    fn context_exposes_clock_ledger_and_device() {
        let mut ledger = ConservationLedger::new(LedgerConfig::default()).unwrap();
        ledger.initialize_energy(10.0).unwrap();

        let mut ctx = StepContext::new(TickId(3), 0.25, &mut ledger, None);
        assert_eq!(ctx.tick(), TickId(3));
        assert_eq!(ctx.dt(), 0.25);
        assert!(ctx.device().is_none());

        assert!(ctx.ledger().try_spend(2.0).unwrap());
        assert_eq!(ctx.ledger_ref().vacuum_pool(), 3.0);
    }
}
