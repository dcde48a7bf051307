//! The simulation engine: a single-threaded coordinator driving ticks.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use mire_core::{ModuleError, TickId};
use mire_device::DeviceContext;
use mire_graph::GraphState;
use mire_ledger::{ConservationLedger, LedgerError};
use mire_mc::AdaptiveController;
use mire_module::{ModulePipeline, PipelineError, Stage, StageFilter};
use mire_monitor::{
    ConditionKind, MonitorState, MonitorVerdict, SnapshotError, SnapshotWriter,
    TerminalStateMonitor,
};

use crate::config::{ConfigError, EngineConfig, NumericalPolicy};
use crate::events::{EngineEvent, EventBus, Severity};
use crate::metrics::FrameMetrics;

// ── Errors ─────────────────────────────────────────────────────────

/// Errors from engine lifecycle and frame execution.
#[derive(Debug)]
pub enum EngineError {
    /// `execute_frame` was called before `initialize`.
    NotInitialized,
    /// `initialize` was called twice.
    AlreadyInitialized,
    /// The monitor has latched terminal; the run is over.
    Halted {
        /// Human-readable termination reason.
        reason: String,
    },
    /// A structural pipeline error (host misuse, not module failure).
    Pipeline(PipelineError),
    /// Ledger initialization failed.
    Ledger(LedgerError),
    /// Diagnostic snapshot export failed.
    Snapshot(SnapshotError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "engine not initialized"),
            Self::AlreadyInitialized => write!(f, "engine already initialized"),
            Self::Halted { reason } => write!(f, "engine halted: {reason}"),
            Self::Pipeline(e) => write!(f, "pipeline: {e}"),
            Self::Ledger(e) => write!(f, "ledger: {e}"),
            Self::Snapshot(e) => write!(f, "snapshot: {e}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pipeline(e) => Some(e),
            Self::Ledger(e) => Some(e),
            Self::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for EngineError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl From<SnapshotError> for EngineError {
    fn from(e: SnapshotError) -> Self {
        Self::Snapshot(e)
    }
}

// ── Cancellation ───────────────────────────────────────────────────

/// Cooperative cancellation flag, observed between ticks.
///
/// In-flight work always completes: a cancelled token stops the next
/// `execute_frame` from starting, never a running one — shared device
/// buffers are never left mid-write.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ── Results ────────────────────────────────────────────────────────

/// Result of a successful frame execution.
#[derive(Clone, Debug)]
pub struct FrameResult {
    /// Whether the owner should keep ticking.
    pub continue_running: bool,
    /// Metrics for this frame.
    pub metrics: FrameMetrics,
    /// The monitor's classification after this frame.
    pub monitor_state: MonitorState,
}

// ── Engine ─────────────────────────────────────────────────────────

/// Single-threaded simulation engine.
///
/// Owns the graph state, the module pipeline, the conservation
/// ledger, the adaptive controller, the terminal-state monitor, and
/// (optionally) the device context. Each `execute_frame()` call runs
/// one tick: active stages execute in order, the ledger reconciles,
/// the controller retunes the topology-stage interval, and the
/// monitor decides whether the run continues.
pub struct SimulationEngine {
    config: EngineConfig,
    state: GraphState,
    pipeline: ModulePipeline,
    ledger: ConservationLedger,
    controller: AdaptiveController,
    monitor: TerminalStateMonitor,
    device: Option<DeviceContext>,
    events: EventBus,
    tick: TickId,
    initialized: bool,
    halted: Option<String>,
    integration_interval: u32,
    last_topology_version: u64,
    last_metrics: FrameMetrics,
}

impl SimulationEngine {
    /// Construct an engine from validated configuration, the initial
    /// state, a registered (not yet initialized) pipeline, and an
    /// optional device context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any configuration fails
    /// validation.
    pub fn new(
        config: EngineConfig,
        state: GraphState,
        pipeline: ModulePipeline,
        device: Option<DeviceContext>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let ledger = ConservationLedger::new(config.ledger)?;
        let controller = AdaptiveController::new(config.controller)?;
        let monitor = TerminalStateMonitor::new(
            config.monitor.clone(),
            SnapshotWriter::new(config.snapshot_dir.clone()),
        )?;
        let events = EventBus::new(config.event_capacity);
        let integration_interval = controller.fallback_interval();
        let last_topology_version = state.topology_version();

        Ok(Self {
            config,
            state,
            pipeline,
            ledger,
            controller,
            monitor,
            device,
            events,
            tick: TickId(0),
            initialized: false,
            halted: None,
            integration_interval,
            last_topology_version,
            last_metrics: FrameMetrics::default(),
        })
    }

    /// Initialize the run: fund the ledger, size device buffers, and
    /// initialize every module in execution order.
    ///
    /// Module initialization failures disable the failing module and
    /// are published as error events; they do not abort the run. After
    /// module setup the ledger partitions are synced to the measured
    /// state, funded out of the vacuum pool.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyInitialized`] on a second call
    /// and propagates ledger/pipeline lifecycle errors.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.initialized {
            return Err(EngineError::AlreadyInitialized);
        }

        self.ledger.initialize_energy(self.config.initial_energy)?;

        if let Some(device) = &mut self.device {
            device.ensure_capacity(
                self.state.node_count() as usize,
                self.state.edge_count(),
            );
        }

        let failures = self
            .pipeline
            .initialize_all(&mut self.state, self.device.as_ref())?;
        for failure in &failures {
            self.events.publish(EngineEvent {
                tick: TickId(0),
                module: Some(failure.module.clone()),
                stage: Some(failure.stage),
                severity: Severity::Error,
                message: format!("disabled after initialize failure: {}", failure.error),
            });
        }

        // Account for whatever structure modules seeded: the measured
        // partitions are funded from the vacuum pool so the tracked
        // total stays at the configured budget.
        let matter = self.state.total_matter();
        let field = self.state.total_field_energy();
        if matter.is_finite() {
            self.ledger.update_matter_energy(matter)?;
        }
        if field.is_finite() {
            self.ledger.update_field_energy(field)?;
        }

        self.last_topology_version = self.state.topology_version();
        self.initialized = true;
        Ok(())
    }

    /// Execute one tick.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Halted`] once the monitor has latched
    /// terminal, [`EngineError::NotInitialized`] before
    /// [`initialize`](SimulationEngine::initialize), and
    /// [`EngineError::Snapshot`] if a terminal transition cannot
    /// export its diagnostic snapshot.
    pub fn execute_frame(&mut self) -> Result<FrameResult, EngineError> {
        let frame_start = Instant::now();

        if let Some(reason) = &self.halted {
            return Err(EngineError::Halted {
                reason: reason.clone(),
            });
        }
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }

        let tick = self.tick;

        // 1. Stage gating: the Integration stage (topology mutation)
        //    runs on its controller-tuned interval; other stages run
        //    every tick.
        let integration_due = tick.0 % u64::from(self.integration_interval) == 0;
        let filter = StageFilter::all().with_stage(Stage::Integration, integration_due);

        // 2. Run the pipeline; failures are isolated per-module.
        let report = self.pipeline.execute_frame(
            &mut self.state,
            tick,
            self.config.dt,
            &mut self.ledger,
            self.device.as_ref(),
            filter,
        )?;
        let mut strict_nan: Option<String> = None;
        for failure in &report.failures {
            if let ModuleError::NonFinite { .. } = failure.error {
                if self.config.numerical_policy == NumericalPolicy::Strict
                    && strict_nan.is_none()
                {
                    strict_nan = Some(format!("{failure}"));
                }
            }
            self.events.publish(EngineEvent {
                tick,
                module: Some(failure.module.clone()),
                stage: Some(failure.stage),
                severity: Severity::Error,
                message: failure.error.to_string(),
            });
        }

        // 3. Refresh device buffers when topology changed. Stale
        //    buffers are released inside ensure_capacity.
        if self.state.topology_version() != self.last_topology_version {
            if let Some(device) = &mut self.device {
                device.ensure_capacity(
                    self.state.node_count() as usize,
                    self.state.edge_count(),
                );
            }
            self.last_topology_version = self.state.topology_version();
        }

        // 4. Reconcile the ledger against an independent measurement.
        //    Non-finite measurements are the monitor's business, not a
        //    reconciliation failure.
        let mut drift = 0.0;
        let mut corrected = false;
        let matter = self.state.total_matter();
        let field = self.state.total_field_energy();
        if matter.is_finite() && field.is_finite() {
            if let Ok(outcome) = self.ledger.reconcile(matter, field) {
                drift = outcome.drift;
                corrected = outcome.corrected;
                if outcome.corrected {
                    self.events.publish(EngineEvent {
                        tick,
                        module: None,
                        stage: None,
                        severity: Severity::Warning,
                        message: format!(
                            "conservation drift {:.3e} absorbed into vacuum pool",
                            outcome.drift
                        ),
                    });
                }
            }
        }

        // 5. Retune the topology-stage interval from live statistics.
        let system_size = self.state.node_count() as usize + self.state.edge_count();
        self.integration_interval = self
            .controller
            .compute_interval(system_size, self.ledger.total_tracked());

        // 6. Terminal-state check. Under the strict policy a
        //    module-reported NaN escalates immediately.
        let verdict = match strict_nan {
            Some(description) => {
                self.monitor
                    .trip(ConditionKind::Numerical, description, &self.state, tick)?
            }
            None => self.monitor.check_and_handle(&self.state, tick)?,
        };
        self.note_verdict(tick, &verdict);

        // 7. Advance the clock and assemble metrics.
        self.tick = tick.next();
        let metrics = FrameMetrics {
            total_us: frame_start.elapsed().as_micros() as u64,
            module_us: report.module_timings,
            module_failures: report.failures.len() as u32,
            reconciliation_drift: drift,
            reconciliation_corrected: corrected,
            conservation_corrections: self.ledger.corrections(),
            events_dropped: self.events.dropped(),
            skipped_stages: report.skipped_stages,
            integration_interval: self.integration_interval,
        };
        self.last_metrics = metrics.clone();

        Ok(FrameResult {
            continue_running: verdict.continue_running,
            metrics,
            monitor_state: verdict.state,
        })
    }

    /// Tick until the monitor halts the run, the token is cancelled,
    /// or `max_ticks` frames have executed. Returns the number of
    /// frames executed.
    ///
    /// Cancellation is observed between ticks only; a frame in
    /// progress always completes.
    ///
    /// # Errors
    ///
    /// Propagates the first [`EngineError`] from `execute_frame`.
    pub fn run_until_halt(
        &mut self,
        max_ticks: u64,
        cancel: &CancelToken,
    ) -> Result<u64, EngineError> {
        let mut executed = 0;
        while executed < max_ticks {
            if cancel.is_cancelled() {
                break;
            }
            let result = self.execute_frame()?;
            executed += 1;
            if !result.continue_running {
                break;
            }
        }
        Ok(executed)
    }

    /// Clean up every module and release device buffers.
    ///
    /// Idempotent: calling twice in a row performs no second release.
    /// Cleanup-time module errors are logged and published, never
    /// propagated — cleanup commonly runs during failure unwinding.
    pub fn cleanup(&mut self) {
        let failures = self.pipeline.cleanup_all();
        for failure in &failures {
            log::warn!("cleanup error in module '{}': {}", failure.module, failure.error);
            self.events.publish(EngineEvent {
                tick: self.tick,
                module: Some(failure.module.clone()),
                stage: Some(failure.stage),
                severity: Severity::Warning,
                message: format!("cleanup error: {}", failure.error),
            });
        }
        if let Some(device) = &mut self.device {
            device.release_buffers();
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    /// Current tick (number of frames executed).
    pub fn current_tick(&self) -> TickId {
        self.tick
    }

    /// Whether the monitor has halted the run.
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// The termination reason, once halted.
    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// The monitor's current classification.
    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    /// Path of the exported diagnostic snapshot, once terminal.
    pub fn snapshot_path(&self) -> Option<&std::path::Path> {
        self.monitor.snapshot_path()
    }

    /// The simulated state.
    pub fn state(&self) -> &GraphState {
        &self.state
    }

    /// The conservation ledger.
    pub fn ledger(&self) -> &ConservationLedger {
        &self.ledger
    }

    /// Subscribe to the engine's event stream.
    pub fn subscribe_events(&self) -> crossbeam_channel::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Metrics from the most recent frame.
    pub fn last_metrics(&self) -> &FrameMetrics {
        &self.last_metrics
    }

    /// The controller-tuned interval of the Integration stage.
    pub fn integration_interval(&self) -> u32 {
        self.integration_interval
    }

    // ── Internals ──────────────────────────────────────────────

    fn note_verdict(&mut self, tick: TickId, verdict: &MonitorVerdict) {
        if verdict.continue_running {
            return;
        }
        let reason = self
            .monitor
            .termination_reason()
            .unwrap_or("terminal state")
            .to_string();
        let path = verdict
            .snapshot_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string());
        self.events.publish(EngineEvent {
            tick,
            module: None,
            stage: None,
            severity: Severity::Error,
            message: format!("terminal: {reason} (snapshot: {path})"),
        });
        self.halted = Some(reason);
    }
}

impl fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("tick", &self.tick)
            .field("initialized", &self.initialized)
            .field("halted", &self.halted)
            .field("modules", &self.pipeline.len())
            .field("nodes", &self.state.node_count())
            .field("edges", &self.state.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mire_test_utils::{ring_graph, ConstWeightModule, FailingModule};

    fn test_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("mire-engine-{tag}-{}", std::process::id()))
    }

    fn test_config(tag: &str) -> EngineConfig {
        EngineConfig {
            snapshot_dir: test_dir(tag),
            ..EngineConfig::default()
        }
    }

    fn simple_engine(tag: &str) -> SimulationEngine {
        let mut pipeline = ModulePipeline::new();
        pipeline
            .register(Box::new(ConstWeightModule::new(
                "const",
                Stage::Forces,
                1.0,
            )))
            .unwrap();
        SimulationEngine::new(test_config(tag), ring_graph(6), pipeline, None).unwrap()
    }

    #[test]
    fn frame_before_initialize_rejected() {
        let mut engine = simple_engine("uninit");
        assert!(matches!(
            engine.execute_frame(),
            Err(EngineError::NotInitialized)
        ));
    }

    #[test]
    fn double_initialize_rejected() {
        let mut engine = simple_engine("double-init");
        engine.initialize().unwrap();
        assert!(matches!(
            engine.initialize(),
            Err(EngineError::AlreadyInitialized)
        ));
    }

    #[test]
    fn frames_advance_the_clock() {
        let mut engine = simple_engine("clock");
        engine.initialize().unwrap();
        for expected in 1..=5u64 {
            let result = engine.execute_frame().unwrap();
            assert!(result.continue_running);
            assert_eq!(engine.current_tick(), TickId(expected));
        }
    }

    #[test]
    fn module_failures_surface_as_events_not_errors() {
        let mut pipeline = ModulePipeline::new();
        pipeline
            .register(Box::new(FailingModule::new("bad", Stage::Forces, 0)))
            .unwrap();
        pipeline
            .register(Box::new(ConstWeightModule::new(
                "good",
                Stage::PostProcess,
                1.0,
            )))
            .unwrap();
        let mut engine =
            SimulationEngine::new(test_config("fail-events"), ring_graph(6), pipeline, None)
                .unwrap();
        engine.initialize().unwrap();
        let events = engine.subscribe_events();

        let result = engine.execute_frame().unwrap();
        assert!(result.continue_running);
        assert_eq!(result.metrics.module_failures, 1);

        let event = events.try_recv().unwrap();
        assert_eq!(event.module.as_deref(), Some("bad"));
        assert_eq!(event.severity, Severity::Error);
    }

    #[test]
    fn ledger_funds_initial_structure_from_vacuum() {
        let mut engine = simple_engine("ledger-init");
        engine.initialize().unwrap();
        // ring_graph(6) carries no matter and zero amplitudes: the
        // ledger partitions stay at the configured split.
        assert_eq!(engine.ledger().vacuum_pool(), 50.0);
        assert!((engine.ledger().total_tracked() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn run_until_halt_respects_cancellation() {
        let mut engine = simple_engine("cancel");
        engine.initialize().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let executed = engine.run_until_halt(100, &token).unwrap();
        assert_eq!(executed, 0);
        assert_eq!(engine.current_tick(), TickId(0));
    }

    #[test]
    fn run_until_halt_stops_at_max_ticks() {
        let mut engine = simple_engine("max-ticks");
        engine.initialize().unwrap();
        let executed = engine.run_until_halt(7, &CancelToken::new()).unwrap();
        assert_eq!(executed, 7);
        assert_eq!(engine.current_tick(), TickId(7));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let mut engine = simple_engine("cleanup");
        engine.initialize().unwrap();
        engine.execute_frame().unwrap();
        engine.cleanup();
        engine.cleanup();
    }

    #[test]
    fn integration_interval_is_retuned() {
        let mut engine = simple_engine("interval");
        engine.initialize().unwrap();
        engine.execute_frame().unwrap();
        let interval = engine.integration_interval();
        assert!((1..=100).contains(&interval));
        assert_eq!(engine.last_metrics().integration_interval, interval);
    }
}
