//! The terminal-state finite-state detector.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use mire_core::TickId;
use mire_graph::GraphState;

use crate::snapshot::{
    collect_offending, DiagnosticSnapshot, HistoryEntry, SnapshotError, SnapshotWriter,
};

/// How many offending values a snapshot carries at most.
const OFFENDING_LIMIT: usize = 32;

/// The classified condition kinds, in escalation-severity order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionKind {
    /// NaN or infinity somewhere in the tracked fields.
    Numerical,
    /// Total field flux crossed the horizon threshold.
    Horizon,
    /// Weights collapsing onto the element-removal boundary.
    Curvature,
    /// Loss of global connectivity.
    Topological,
}

impl ConditionKind {
    /// All kinds, in severity order (most severe first).
    pub const ALL: [ConditionKind; 4] = [
        ConditionKind::Numerical,
        ConditionKind::Horizon,
        ConditionKind::Curvature,
        ConditionKind::Topological,
    ];

    /// Short lowercase name used in events and snapshot file names.
    pub fn name(self) -> &'static str {
        match self {
            ConditionKind::Numerical => "numerical",
            ConditionKind::Horizon => "horizon",
            ConditionKind::Curvature => "curvature",
            ConditionKind::Topological => "topological",
        }
    }

    fn index(self) -> usize {
        match self {
            ConditionKind::Numerical => 0,
            ConditionKind::Horizon => 1,
            ConditionKind::Curvature => 2,
            ConditionKind::Topological => 3,
        }
    }
}

/// Configuration for a [`TerminalStateMonitor`].
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Consecutive detections before a Numerical condition escalates.
    pub numerical_grace: u32,
    /// Consecutive detections before a Horizon condition escalates.
    pub horizon_grace: u32,
    /// Consecutive detections before a Curvature condition escalates.
    pub curvature_grace: u32,
    /// Consecutive detections before a Topological condition escalates.
    pub topological_grace: u32,
    /// Weights at or below this floor count as collapsed.
    pub weight_floor: f64,
    /// Fraction of collapsed weights that raises the Curvature
    /// condition. Must be in `(0, 1]`.
    pub collapse_fraction: f64,
    /// Total field energy at or above this raises the Horizon
    /// condition.
    pub horizon_flux_threshold: f64,
    /// Depth of the recent-history ring exported with snapshots.
    pub history_depth: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            numerical_grace: 3,
            horizon_grace: 4,
            curvature_grace: 5,
            topological_grace: 5,
            weight_floor: 1e-3,
            collapse_fraction: 0.5,
            horizon_flux_threshold: 1e4,
            history_depth: 32,
        }
    }
}

impl MonitorConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] for zero grace periods
    /// or out-of-range thresholds.
    pub fn validate(&self) -> Result<(), MonitorError> {
        for (name, grace) in [
            ("numerical_grace", self.numerical_grace),
            ("horizon_grace", self.horizon_grace),
            ("curvature_grace", self.curvature_grace),
            ("topological_grace", self.topological_grace),
        ] {
            if grace == 0 {
                return Err(MonitorError::InvalidConfig {
                    reason: format!("{name} must be at least 1"),
                });
            }
        }
        if !self.weight_floor.is_finite() || self.weight_floor < 0.0 {
            return Err(MonitorError::InvalidConfig {
                reason: format!(
                    "weight_floor must be finite and >= 0, got {}",
                    self.weight_floor
                ),
            });
        }
        if !self.collapse_fraction.is_finite()
            || self.collapse_fraction <= 0.0
            || self.collapse_fraction > 1.0
        {
            return Err(MonitorError::InvalidConfig {
                reason: format!(
                    "collapse_fraction must be in (0, 1], got {}",
                    self.collapse_fraction
                ),
            });
        }
        if !self.horizon_flux_threshold.is_finite() || self.horizon_flux_threshold <= 0.0 {
            return Err(MonitorError::InvalidConfig {
                reason: format!(
                    "horizon_flux_threshold must be finite and > 0, got {}",
                    self.horizon_flux_threshold
                ),
            });
        }
        if self.history_depth == 0 {
            return Err(MonitorError::InvalidConfig {
                reason: "history_depth must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn grace(&self, kind: ConditionKind) -> u32 {
        match kind {
            ConditionKind::Numerical => self.numerical_grace,
            ConditionKind::Horizon => self.horizon_grace,
            ConditionKind::Curvature => self.curvature_grace,
            ConditionKind::Topological => self.topological_grace,
        }
    }
}

/// Errors from monitor construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorError {
    /// The monitor configuration is invalid.
    InvalidConfig {
        /// Description of which invariant was violated.
        reason: String,
    },
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid monitor config: {reason}"),
        }
    }
}

impl Error for MonitorError {}

/// The monitor's classification of the live state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    /// No condition present.
    Running,
    /// A condition is present but within its grace period.
    Forming {
        /// The most severe present condition.
        kind: ConditionKind,
        /// Consecutive ticks it has been present.
        consecutive: u32,
    },
    /// A condition outlasted its grace period; the run should stop.
    Terminal {
        /// The escalated condition.
        kind: ConditionKind,
    },
}

/// What the owning loop learns from one check.
#[derive(Clone, Debug)]
pub struct MonitorVerdict {
    /// Whether the pipeline should keep advancing.
    pub continue_running: bool,
    /// The monitor's state after this check.
    pub state: MonitorState,
    /// Path of the exported snapshot, once terminal.
    pub snapshot_path: Option<PathBuf>,
}

/// Finite-state detector distinguishing recoverable noise from
/// legitimate terminal configurations.
///
/// Each condition kind keeps a consecutive-detection counter; a
/// condition that clears before its grace period elapses resets its
/// counter. On escalation the monitor exports a diagnostic snapshot
/// exactly once and latches `Terminal` — further checks report "do not
/// continue" without re-exporting.
pub struct TerminalStateMonitor {
    config: MonitorConfig,
    writer: SnapshotWriter,
    counters: [u32; 4],
    state: MonitorState,
    history: VecDeque<HistoryEntry>,
    snapshot_path: Option<PathBuf>,
    termination_reason: Option<String>,
}

impl TerminalStateMonitor {
    /// Build a monitor from a validated configuration and a snapshot
    /// writer (which owns export paths and naming).
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] when validation fails.
    pub fn new(config: MonitorConfig, writer: SnapshotWriter) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            config,
            writer,
            counters: [0; 4],
            state: MonitorState::Running,
            history: VecDeque::new(),
            snapshot_path: None,
            termination_reason: None,
        })
    }

    /// Inspect the state after a tick and decide whether to continue.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] only when a terminal transition's
    /// snapshot export fails; detection itself never errors.
    pub fn check_and_handle(
        &mut self,
        state: &GraphState,
        tick: TickId,
    ) -> Result<MonitorVerdict, SnapshotError> {
        if let MonitorState::Terminal { .. } = self.state {
            return Ok(self.halted_verdict());
        }

        self.record_history(tick, state);
        let detected = self.detect(state);

        // Advance or reset each kind's consecutive counter.
        for kind in ConditionKind::ALL {
            match detected.iter().find(|(k, _)| *k == kind) {
                Some(_) => self.counters[kind.index()] += 1,
                None => self.counters[kind.index()] = 0,
            }
        }

        // Escalate the most severe kind whose grace period is spent.
        for (kind, description) in &detected {
            if self.counters[kind.index()] >= self.config.grace(*kind) {
                return self.escalate(*kind, description.clone(), state, tick);
            }
        }

        // Otherwise report the most severe forming condition, if any.
        self.state = match detected.first() {
            Some((kind, _)) => MonitorState::Forming {
                kind: *kind,
                consecutive: self.counters[kind.index()],
            },
            None => MonitorState::Running,
        };
        Ok(MonitorVerdict {
            continue_running: true,
            state: self.state,
            snapshot_path: None,
        })
    }

    /// Escalate immediately, bypassing the grace period.
    ///
    /// Used by hosts running a strict numerical policy, where a
    /// module-reported NaN is terminal on sight.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the snapshot export fails.
    pub fn trip(
        &mut self,
        kind: ConditionKind,
        description: String,
        state: &GraphState,
        tick: TickId,
    ) -> Result<MonitorVerdict, SnapshotError> {
        if let MonitorState::Terminal { .. } = self.state {
            return Ok(self.halted_verdict());
        }
        self.record_history(tick, state);
        self.escalate(kind, description, state, tick)
    }

    /// Clear counters, state, and history for a restart.
    pub fn reset_state(&mut self) {
        self.counters = [0; 4];
        self.state = MonitorState::Running;
        self.history.clear();
        self.snapshot_path = None;
        self.termination_reason = None;
    }

    /// The monitor's current state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Human-readable reason for the terminal transition, if any.
    pub fn termination_reason(&self) -> Option<&str> {
        self.termination_reason.as_deref()
    }

    /// Path of the exported snapshot, if terminal.
    pub fn snapshot_path(&self) -> Option<&std::path::Path> {
        self.snapshot_path.as_deref()
    }

    // ── Internals ──────────────────────────────────────────────

    /// Evaluate all condition detectors. Returned in severity order.
    fn detect(&self, state: &GraphState) -> Vec<(ConditionKind, String)> {
        let mut found = Vec::new();

        if state.has_non_finite() {
            found.push((
                ConditionKind::Numerical,
                "non-finite value in tracked fields".to_string(),
            ));
        }

        let flux = state.total_field_energy();
        if flux.is_finite() && flux >= self.config.horizon_flux_threshold {
            found.push((
                ConditionKind::Horizon,
                format!(
                    "field flux {flux:.3e} crossed threshold {:.3e}",
                    self.config.horizon_flux_threshold
                ),
            ));
        }

        let edge_count = state.edge_count();
        if edge_count > 0 {
            let collapsed = state
                .edges()
                .filter(|(_, e)| e.weight <= self.config.weight_floor)
                .count();
            let fraction = collapsed as f64 / edge_count as f64;
            if fraction >= self.config.collapse_fraction {
                found.push((
                    ConditionKind::Curvature,
                    format!(
                        "{collapsed}/{edge_count} weights at or below floor {}",
                        self.config.weight_floor
                    ),
                ));
            }
        }

        if !state.is_connected() {
            found.push((
                ConditionKind::Topological,
                "graph lost global connectivity".to_string(),
            ));
        }

        found
    }

    fn record_history(&mut self, tick: TickId, state: &GraphState) {
        if self.history.len() == self.config.history_depth {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry::capture(tick.0, state));
    }

    fn escalate(
        &mut self,
        kind: ConditionKind,
        description: String,
        state: &GraphState,
        tick: TickId,
    ) -> Result<MonitorVerdict, SnapshotError> {
        let snapshot = DiagnosticSnapshot {
            tick: tick.0,
            condition: kind.name().to_string(),
            description: description.clone(),
            node_count: state.node_count(),
            edge_count: state.edge_count(),
            total_matter: state.total_matter(),
            total_field_energy: state.total_field_energy(),
            offending: collect_offending(state, OFFENDING_LIMIT),
            recent_history: self.history.iter().cloned().collect(),
        };
        let path = self.writer.write(&snapshot)?;
        log::warn!(
            "terminal state ({}) at tick {tick}: {description}; snapshot at {}",
            kind.name(),
            path.display()
        );

        self.state = MonitorState::Terminal { kind };
        self.snapshot_path = Some(path);
        self.termination_reason = Some(description);
        Ok(self.halted_verdict())
    }

    fn halted_verdict(&self) -> MonitorVerdict {
        MonitorVerdict {
            continue_running: false,
            state: self.state,
            snapshot_path: self.snapshot_path.clone(),
        }
    }
}
