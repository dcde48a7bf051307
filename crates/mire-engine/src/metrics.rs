//! Per-tick metrics for the simulation engine.
//!
//! [`FrameMetrics`] captures timing, failure, and conservation data
//! for a single frame, enabling telemetry and adaptive decisions.

use mire_module::Stage;

/// Timing and bookkeeping metrics collected during a single frame.
///
/// Durations are in microseconds. Cumulative fields
/// (`conservation_corrections`, `events_dropped`) carry run totals so
/// a consumer sampling any frame sees the full picture.
#[derive(Clone, Debug, Default)]
pub struct FrameMetrics {
    /// Wall-clock time for the entire frame, in microseconds.
    pub total_us: u64,
    /// Per-module execution times: `(name, microseconds)`.
    pub module_us: Vec<(String, u64)>,
    /// Number of isolated module failures this frame.
    pub module_failures: u32,
    /// Signed conservation drift measured at reconciliation.
    pub reconciliation_drift: f64,
    /// Whether this frame's drift exceeded tolerance and was absorbed.
    pub reconciliation_corrected: bool,
    /// Cumulative reconciliation corrections over the run.
    pub conservation_corrections: u64,
    /// Cumulative events dropped on the full event channel.
    pub events_dropped: u64,
    /// Stages skipped by interval gating this frame.
    pub skipped_stages: Vec<Stage>,
    /// Interval of the topology-mutating stage after retuning.
    pub integration_interval: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = FrameMetrics::default();
        assert_eq!(m.total_us, 0);
        assert!(m.module_us.is_empty());
        assert_eq!(m.module_failures, 0);
        assert_eq!(m.reconciliation_drift, 0.0);
        assert!(!m.reconciliation_corrected);
        assert_eq!(m.conservation_corrections, 0);
        assert_eq!(m.events_dropped, 0);
        assert!(m.skipped_stages.is_empty());
        assert_eq!(m.integration_interval, 0);
    }
}
