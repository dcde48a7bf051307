//! Engine configuration and validation.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use mire_ledger::{LedgerConfig, LedgerError};
use mire_mc::{ControllerConfig, ControllerError};
use mire_monitor::{MonitorConfig, MonitorError};

/// How the engine treats module-reported non-finite values.
///
/// A constructor parameter, not a process-wide flag: two engines in
/// one process may run different policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NumericalPolicy {
    /// Route NaN reports through the monitor's normal grace period.
    #[default]
    Relaxed,
    /// A module-reported NaN is terminal on sight.
    Strict,
}

/// Complete configuration for constructing a [`SimulationEngine`].
///
/// [`SimulationEngine`]: crate::SimulationEngine
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Simulation timestep in seconds.
    pub dt: f64,
    /// Base RNG seed recorded for the run (modules derive their own).
    pub seed: u64,
    /// Total energy budget handed to the ledger at initialization.
    pub initial_energy: f64,
    /// Conservation ledger configuration.
    pub ledger: LedgerConfig,
    /// Adaptive controller configuration.
    pub controller: ControllerConfig,
    /// Terminal-state monitor configuration.
    pub monitor: MonitorConfig,
    /// Directory the diagnostic snapshot writer owns.
    pub snapshot_dir: PathBuf,
    /// Strict or relaxed handling of module-reported NaNs.
    pub numerical_policy: NumericalPolicy,
    /// Capacity of the bounded event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            seed: 0,
            initial_energy: 100.0,
            ledger: LedgerConfig::default(),
            controller: ControllerConfig::default(),
            monitor: MonitorConfig::default(),
            snapshot_dir: PathBuf::from("mire-snapshots"),
            numerical_policy: NumericalPolicy::default(),
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Validate all structural invariants, delegating to each
    /// subsystem's own validation.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::InvalidDt { value: self.dt });
        }
        if !self.initial_energy.is_finite() || self.initial_energy < 0.0 {
            return Err(ConfigError::InvalidInitialEnergy {
                value: self.initial_energy,
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::EventCapacityZero);
        }
        self.ledger.validate()?;
        self.controller.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}

/// Errors detected during [`EngineConfig::validate()`] or engine
/// construction.
#[derive(Debug)]
pub enum ConfigError {
    /// dt is NaN, infinite, zero, or negative.
    InvalidDt {
        /// The invalid value.
        value: f64,
    },
    /// Initial energy is NaN, infinite, or negative.
    InvalidInitialEnergy {
        /// The invalid value.
        value: f64,
    },
    /// Event channel capacity is zero.
    EventCapacityZero,
    /// Ledger configuration is invalid.
    Ledger(LedgerError),
    /// Controller configuration is invalid.
    Controller(ControllerError),
    /// Monitor configuration is invalid.
    Monitor(MonitorError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDt { value } => {
                write!(f, "dt must be finite and positive, got {value}")
            }
            Self::InvalidInitialEnergy { value } => {
                write!(f, "initial_energy must be finite and >= 0, got {value}")
            }
            Self::EventCapacityZero => write!(f, "event_capacity must be at least 1"),
            Self::Ledger(e) => write!(f, "ledger: {e}"),
            Self::Controller(e) => write!(f, "controller: {e}"),
            Self::Monitor(e) => write!(f, "monitor: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ledger(e) => Some(e),
            Self::Controller(e) => Some(e),
            Self::Monitor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerError> for ConfigError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl From<ControllerError> for ConfigError {
    fn from(e: ControllerError) -> Self {
        Self::Controller(e)
    }
}

impl From<MonitorError> for ConfigError {
    fn from(e: MonitorError) -> Self {
        Self::Monitor(e)
    }
}
