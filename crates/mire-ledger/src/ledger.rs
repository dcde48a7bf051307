//! The conservation ledger.

use crate::error::LedgerError;

/// Configuration for a [`ConservationLedger`].
#[derive(Clone, Copy, Debug)]
pub struct LedgerConfig {
    /// Fraction of the total energy placed in the vacuum pool by
    /// [`ConservationLedger::initialize_energy`]. Must be in `[0, 1]`.
    pub vacuum_fraction: f64,
    /// Reconciliation tolerance: drift at or below this magnitude is
    /// left alone; drift above it is absorbed into the vacuum pool.
    pub tolerance: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            vacuum_fraction: 0.5,
            tolerance: 1e-6,
        }
    }
}

impl LedgerConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidConfig`] for non-finite or
    /// out-of-range values.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if !self.vacuum_fraction.is_finite() || !(0.0..=1.0).contains(&self.vacuum_fraction) {
            return Err(LedgerError::InvalidConfig {
                reason: format!(
                    "vacuum_fraction must be in [0, 1], got {}",
                    self.vacuum_fraction
                ),
            });
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(LedgerError::InvalidConfig {
                reason: format!("tolerance must be finite and >= 0, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}

/// Outcome of a per-tick reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconcileReport {
    /// Measured-minus-ledger drift in the tracked total.
    pub drift: f64,
    /// Whether the drift exceeded tolerance and was absorbed.
    pub corrected: bool,
}

/// Tracks a partitioned additive invariant across module mutations.
///
/// The tracked total is `vacuum_pool + matter_energy + field_energy`.
/// It changes only through [`try_spend`](ConservationLedger::try_spend)
/// / [`earn`](ConservationLedger::earn) pairs that net to zero against
/// external work, recorded external injection, or reconciliation
/// corrections — anything else is a conservation violation.
///
/// Constructed uninitialized; every operation except initialization
/// and [`reset`](ConservationLedger::reset) fails until one of the
/// `initialize_*` methods has run.
#[derive(Clone, Debug)]
pub struct ConservationLedger {
    config: LedgerConfig,
    initialized: bool,
    vacuum_pool: f64,
    matter_energy: f64,
    field_energy: f64,
    total_external_injection: f64,
    corrections: u64,
}

impl ConservationLedger {
    /// Create an uninitialized ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidConfig`] if the configuration
    /// fails validation.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            config,
            initialized: false,
            vacuum_pool: 0.0,
            matter_energy: 0.0,
            field_energy: 0.0,
            total_external_injection: 0.0,
            corrections: 0,
        })
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Initialize from a total energy budget.
    ///
    /// The vacuum pool receives `total * vacuum_fraction`; matter and
    /// field start at zero. The remainder of `total` is outside the
    /// tracked quantity until modules earn it in as external injection.
    ///
    /// # Errors
    ///
    /// Fails on re-initialization, negative, or non-finite totals.
    pub fn initialize_energy(&mut self, total: f64) -> Result<(), LedgerError> {
        self.check_amount(total)?;
        if self.initialized {
            return Err(LedgerError::AlreadyInitialized);
        }
        self.vacuum_pool = total * self.config.vacuum_fraction;
        self.matter_energy = 0.0;
        self.field_energy = 0.0;
        self.initialized = true;
        Ok(())
    }

    /// Initialize each partition explicitly.
    ///
    /// # Errors
    ///
    /// Fails on re-initialization, negative, or non-finite parts.
    pub fn initialize_parts(
        &mut self,
        vacuum: f64,
        matter: f64,
        field: f64,
    ) -> Result<(), LedgerError> {
        self.check_amount(vacuum)?;
        self.check_amount(matter)?;
        self.check_amount(field)?;
        if self.initialized {
            return Err(LedgerError::AlreadyInitialized);
        }
        self.vacuum_pool = vacuum;
        self.matter_energy = matter;
        self.field_energy = field;
        self.initialized = true;
        Ok(())
    }

    /// Clear the ledger back to its uninitialized state.
    pub fn reset(&mut self) {
        self.initialized = false;
        self.vacuum_pool = 0.0;
        self.matter_energy = 0.0;
        self.field_energy = 0.0;
        self.total_external_injection = 0.0;
        self.corrections = 0;
    }

    // ── Spend / earn discipline ────────────────────────────────

    /// Debit the vacuum pool if it holds at least `amount`.
    ///
    /// Returns `Ok(true)` and debits on success; `Ok(false)` and
    /// leaves the pool unchanged when funds are insufficient.
    ///
    /// # Errors
    ///
    /// Fails before initialization and on negative or non-finite
    /// amounts.
    pub fn try_spend(&mut self, amount: f64) -> Result<bool, LedgerError> {
        self.check_ready(amount)?;
        if self.vacuum_pool >= amount {
            self.vacuum_pool -= amount;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Credit the vacuum pool.
    ///
    /// # Errors
    ///
    /// Fails before initialization and on negative or non-finite
    /// amounts.
    pub fn earn(&mut self, amount: f64) -> Result<(), LedgerError> {
        self.check_ready(amount)?;
        self.vacuum_pool += amount;
        Ok(())
    }

    /// Absorb a signed energy delta into the vacuum pool.
    ///
    /// Positive deltas always credit and return `Ok(true)`. Negative
    /// deltas debit only when the pool can cover them; otherwise the
    /// ledger is unchanged and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// Fails before initialization and on non-finite deltas.
    pub fn try_absorb_deficit(&mut self, delta: f64) -> Result<bool, LedgerError> {
        if !delta.is_finite() {
            return Err(LedgerError::NonFiniteAmount { amount: delta });
        }
        if !self.initialized {
            return Err(LedgerError::NotInitialized);
        }
        if delta >= 0.0 {
            self.vacuum_pool += delta;
            Ok(true)
        } else if self.vacuum_pool >= -delta {
            self.vacuum_pool += delta;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Set the matter partition, transferring the signed difference
    /// from the vacuum pool.
    ///
    /// The three-way total is invariant by construction; the vacuum
    /// pool may go negative here, which the next reconciliation or
    /// spend attempt will surface.
    ///
    /// # Errors
    ///
    /// Fails before initialization and on non-finite values.
    pub fn update_matter_energy(&mut self, new_value: f64) -> Result<(), LedgerError> {
        if !new_value.is_finite() {
            return Err(LedgerError::NonFiniteAmount { amount: new_value });
        }
        if !self.initialized {
            return Err(LedgerError::NotInitialized);
        }
        let diff = new_value - self.matter_energy;
        self.vacuum_pool -= diff;
        self.matter_energy = new_value;
        Ok(())
    }

    /// Set the field partition, transferring the signed difference
    /// from the vacuum pool. See
    /// [`update_matter_energy`](ConservationLedger::update_matter_energy).
    ///
    /// # Errors
    ///
    /// Fails before initialization and on non-finite values.
    pub fn update_field_energy(&mut self, new_value: f64) -> Result<(), LedgerError> {
        if !new_value.is_finite() {
            return Err(LedgerError::NonFiniteAmount { amount: new_value });
        }
        if !self.initialized {
            return Err(LedgerError::NotInitialized);
        }
        let diff = new_value - self.field_energy;
        self.vacuum_pool -= diff;
        self.field_energy = new_value;
        Ok(())
    }

    /// Record energy injected from outside the tracked system.
    ///
    /// The injection credits the vacuum pool and accumulates in the
    /// injection total so conservation checks can discount it.
    ///
    /// # Errors
    ///
    /// Fails before initialization and on non-finite amounts.
    pub fn record_injection(&mut self, amount: f64) -> Result<(), LedgerError> {
        if !amount.is_finite() {
            return Err(LedgerError::NonFiniteAmount { amount });
        }
        if !self.initialized {
            return Err(LedgerError::NotInitialized);
        }
        self.vacuum_pool += amount;
        self.total_external_injection += amount;
        Ok(())
    }

    // ── Reconciliation ─────────────────────────────────────────

    /// Reconcile the ledger against independently measured partitions.
    ///
    /// `measured_matter`/`measured_field` come from a direct scan of
    /// the simulation state. Drift is the difference between the
    /// measured and recorded partitions; when its magnitude exceeds
    /// the configured tolerance, the measured values are adopted and
    /// the vacuum pool compensates so the tracked total is unchanged.
    /// Folding drift into the vacuum pool is deliberate policy (not
    /// obviously physics); every correction is counted and reported so
    /// consumers can treat the counter as a data-quality signal.
    ///
    /// # Errors
    ///
    /// Fails before initialization and on non-finite measurements.
    pub fn reconcile(
        &mut self,
        measured_matter: f64,
        measured_field: f64,
    ) -> Result<ReconcileReport, LedgerError> {
        if !measured_matter.is_finite() {
            return Err(LedgerError::NonFiniteAmount {
                amount: measured_matter,
            });
        }
        if !measured_field.is_finite() {
            return Err(LedgerError::NonFiniteAmount {
                amount: measured_field,
            });
        }
        if !self.initialized {
            return Err(LedgerError::NotInitialized);
        }

        let drift =
            (measured_matter + measured_field) - (self.matter_energy + self.field_energy);
        if drift.abs() <= self.config.tolerance {
            return Ok(ReconcileReport {
                drift,
                corrected: false,
            });
        }

        log::warn!(
            "conservation drift {drift:.3e} exceeds tolerance {:.1e}; absorbing into vacuum pool",
            self.config.tolerance
        );
        self.matter_energy = measured_matter;
        self.field_energy = measured_field;
        self.vacuum_pool -= drift;
        self.corrections += 1;
        Ok(ReconcileReport {
            drift,
            corrected: true,
        })
    }

    // ── Accessors ──────────────────────────────────────────────

    /// Whether `initialize_*` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current vacuum pool balance.
    pub fn vacuum_pool(&self) -> f64 {
        self.vacuum_pool
    }

    /// Current matter partition.
    pub fn matter_energy(&self) -> f64 {
        self.matter_energy
    }

    /// Current field partition.
    pub fn field_energy(&self) -> f64 {
        self.field_energy
    }

    /// Cumulative recorded external injection.
    pub fn total_injection(&self) -> f64 {
        self.total_external_injection
    }

    /// The tracked total: vacuum + matter + field.
    pub fn total_tracked(&self) -> f64 {
        self.vacuum_pool + self.matter_energy + self.field_energy
    }

    /// Number of reconciliation corrections applied so far.
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    // ── Helpers ────────────────────────────────────────────────

    fn check_amount(&self, amount: f64) -> Result<(), LedgerError> {
        if !amount.is_finite() {
            return Err(LedgerError::NonFiniteAmount { amount });
        }
        if amount < 0.0 {
            return Err(LedgerError::NegativeAmount { amount });
        }
        Ok(())
    }

    fn check_ready(&self, amount: f64) -> Result<(), LedgerError> {
        self.check_amount(amount)?;
        if !self.initialized {
            return Err(LedgerError::NotInitialized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ready_ledger() -> ConservationLedger {
        let mut ledger = ConservationLedger::new(LedgerConfig::default()).unwrap();
        ledger.initialize_energy(100.0).unwrap();
        ledger
    }

    #[test]
    fn operations_before_initialize_rejected() {
        let mut ledger = ConservationLedger::new(LedgerConfig::default()).unwrap();
        assert_eq!(ledger.try_spend(1.0), Err(LedgerError::NotInitialized));
        assert_eq!(ledger.earn(1.0), Err(LedgerError::NotInitialized));
        assert_eq!(
            ledger.try_absorb_deficit(1.0),
            Err(LedgerError::NotInitialized)
        );
        assert_eq!(
            ledger.update_matter_energy(1.0),
            Err(LedgerError::NotInitialized)
        );
        assert_eq!(
            ledger.update_field_energy(1.0),
            Err(LedgerError::NotInitialized)
        );
        assert_eq!(
            ledger.reconcile(0.0, 0.0),
            Err(LedgerError::NotInitialized)
        );
    }

    #[test]
    fn initialize_energy_scenario() {
        // vacuum_fraction 0.5: 100 total -> 50 vacuum, 0 matter, 0 field.
        let ledger = ready_ledger();
        assert_eq!(ledger.vacuum_pool(), 50.0);
        assert_eq!(ledger.matter_energy(), 0.0);
        assert_eq!(ledger.field_energy(), 0.0);
        assert_eq!(ledger.total_tracked(), 50.0);
    }

    #[test]
    fn spend_scenario() {
        let mut ledger = ready_ledger();
        assert_eq!(ledger.try_spend(20.0), Ok(true));
        assert_eq!(ledger.vacuum_pool(), 30.0);
        assert_eq!(ledger.try_spend(1000.0), Ok(false));
        assert_eq!(ledger.vacuum_pool(), 30.0);
    }

    #[test]
    fn double_initialize_rejected() {
        let mut ledger = ready_ledger();
        assert_eq!(
            ledger.initialize_energy(1.0),
            Err(LedgerError::AlreadyInitialized)
        );
        assert_eq!(
            ledger.initialize_parts(1.0, 1.0, 1.0),
            Err(LedgerError::AlreadyInitialized)
        );
    }

    #[test]
    fn negative_amounts_rejected() {
        let mut ledger = ready_ledger();
        assert!(matches!(
            ledger.try_spend(-1.0),
            Err(LedgerError::NegativeAmount { .. })
        ));
        assert!(matches!(
            ledger.earn(-1.0),
            Err(LedgerError::NegativeAmount { .. })
        ));
        assert_eq!(ledger.vacuum_pool(), 50.0);
    }

    #[test]
    fn non_finite_amounts_rejected() {
        let mut ledger = ready_ledger();
        assert!(matches!(
            ledger.earn(f64::NAN),
            Err(LedgerError::NonFiniteAmount { .. })
        ));
        assert!(matches!(
            ledger.try_absorb_deficit(f64::INFINITY),
            Err(LedgerError::NonFiniteAmount { .. })
        ));
    }

    #[test]
    fn absorb_deficit_semantics() {
        let mut ledger = ready_ledger();
        // Positive delta always credits.
        assert_eq!(ledger.try_absorb_deficit(5.0), Ok(true));
        assert_eq!(ledger.vacuum_pool(), 55.0);
        // Covered negative delta debits.
        assert_eq!(ledger.try_absorb_deficit(-55.0), Ok(true));
        assert_eq!(ledger.vacuum_pool(), 0.0);
        // Uncovered negative delta leaves state unchanged.
        assert_eq!(ledger.try_absorb_deficit(-0.5), Ok(false));
        assert_eq!(ledger.vacuum_pool(), 0.0);
    }

    #[test]
    fn update_partitions_preserve_total() {
        let mut ledger = ready_ledger();
        let total = ledger.total_tracked();
        ledger.update_matter_energy(12.0).unwrap();
        assert_eq!(ledger.matter_energy(), 12.0);
        assert!((ledger.total_tracked() - total).abs() < 1e-12);
        ledger.update_field_energy(7.5).unwrap();
        assert_eq!(ledger.field_energy(), 7.5);
        assert!((ledger.total_tracked() - total).abs() < 1e-12);
    }

    #[test]
    fn injection_credits_vacuum_and_accumulates() {
        let mut ledger = ready_ledger();
        ledger.record_injection(10.0).unwrap();
        ledger.record_injection(-4.0).unwrap();
        assert_eq!(ledger.vacuum_pool(), 56.0);
        assert_eq!(ledger.total_injection(), 6.0);
    }

    #[test]
    fn reconcile_below_tolerance_untouched() {
        let mut ledger = ready_ledger();
        ledger.update_matter_energy(10.0).unwrap();
        let report = ledger.reconcile(10.0 + 1e-9, 0.0).unwrap();
        assert!(!report.corrected);
        assert_eq!(ledger.corrections(), 0);
        assert_eq!(ledger.matter_energy(), 10.0);
    }

    #[test]
    fn reconcile_above_tolerance_absorbed_into_vacuum() {
        let mut ledger = ready_ledger();
        ledger.update_matter_energy(10.0).unwrap();
        let total = ledger.total_tracked();

        let report = ledger.reconcile(10.5, 0.25).unwrap();
        assert!(report.corrected);
        assert!((report.drift - 0.75).abs() < 1e-12);
        assert_eq!(ledger.matter_energy(), 10.5);
        assert_eq!(ledger.field_energy(), 0.25);
        assert_eq!(ledger.corrections(), 1);
        // Tracked total unchanged: the vacuum pool compensated.
        assert!((ledger.total_tracked() - total).abs() < 1e-12);
    }

    #[test]
    fn reset_returns_to_uninitialized() {
        let mut ledger = ready_ledger();
        ledger.try_spend(5.0).unwrap();
        ledger.reset();
        assert!(!ledger.is_initialized());
        assert_eq!(ledger.vacuum_pool(), 0.0);
        assert_eq!(ledger.try_spend(1.0), Err(LedgerError::NotInitialized));
    }

    #[test]
    fn invalid_configs_rejected() {
        assert!(ConservationLedger::new(LedgerConfig {
            vacuum_fraction: 1.5,
            tolerance: 1e-6,
        })
        .is_err());
        assert!(ConservationLedger::new(LedgerConfig {
            vacuum_fraction: 0.5,
            tolerance: -1.0,
        })
        .is_err());
        assert!(ConservationLedger::new(LedgerConfig {
            vacuum_fraction: f64::NAN,
            tolerance: 1e-6,
        })
        .is_err());
    }

    proptest! {
        /// Replaying any spend/earn sequence analytically matches the
        /// ledger within 1e-6.
        #[test]
        fn spend_earn_matches_analytic_replay(
            ops in prop::collection::vec((prop::bool::ANY, 0.0f64..100.0), 0..64)
        ) {
            let mut ledger = ready_ledger();
            let mut expected_vacuum = 50.0f64;

            for (is_earn, amount) in &ops {
                if *is_earn {
                    ledger.earn(*amount).unwrap();
                    expected_vacuum += amount;
                } else {
                    let accepted = ledger.try_spend(*amount).unwrap();
                    if expected_vacuum >= *amount {
                        prop_assert!(accepted);
                        expected_vacuum -= amount;
                    } else {
                        prop_assert!(!accepted);
                    }
                }
            }

            prop_assert!((ledger.vacuum_pool() - expected_vacuum).abs() < 1e-6);
            prop_assert!(
                (ledger.total_tracked()
                    - (expected_vacuum + ledger.matter_energy() + ledger.field_energy()))
                .abs() < 1e-6
            );
        }
    }
}
