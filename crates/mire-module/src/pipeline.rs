//! The staged module pipeline: ordering, lifecycle, failure isolation.
//!
//! [`ModulePipeline`] holds registered modules grouped by stage and
//! runs them in `(stage, priority, registration order)` sequence each
//! frame. A module raising an error is isolated — reported in the
//! [`FrameReport`] with module and stage context — and the frame
//! continues with the next module.

use std::error::Error;
use std::fmt;
use std::time::Instant;

use mire_core::{ModuleError, TickId};
use mire_device::DeviceContext;
use mire_graph::GraphState;
use mire_ledger::ConservationLedger;

use crate::context::StepContext;
use crate::module::{Module, Stage};

// ── Errors ─────────────────────────────────────────────────────────

/// Errors from pipeline registration and lifecycle misuse.
///
/// These are structural host errors, distinct from the per-module
/// [`ModuleError`]s that frame execution isolates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// A module with the same name is already registered.
    DuplicateModule {
        /// The contested name.
        name: String,
    },
    /// A module descriptor carried an empty name.
    EmptyName,
    /// `initialize_all` was called twice, or `register`/`clear` after
    /// the run started.
    AlreadyInitialized,
    /// `execute_frame` was called before `initialize_all`.
    NotInitialized,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateModule { name } => {
                write!(f, "module '{name}' is already registered")
            }
            Self::EmptyName => write!(f, "module name must not be empty"),
            Self::AlreadyInitialized => write!(f, "pipeline already initialized"),
            Self::NotInitialized => write!(f, "pipeline not initialized"),
        }
    }
}

impl Error for PipelineError {}

// ── Reports ────────────────────────────────────────────────────────

/// A single isolated module failure with its context.
#[derive(Clone, Debug)]
pub struct ModuleFailure {
    /// Name of the failing module.
    pub module: String,
    /// Stage the module was running in.
    pub stage: Stage,
    /// The underlying error.
    pub error: ModuleError,
}

impl fmt::Display for ModuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "module '{}' failed in {} stage: {}",
            self.module,
            self.stage.name(),
            self.error
        )
    }
}

/// Outcome of one `execute_frame` call.
#[derive(Clone, Debug, Default)]
pub struct FrameReport {
    /// Per-module execution times in microseconds, in execution order.
    pub module_timings: Vec<(String, u64)>,
    /// Isolated failures, in the order they occurred.
    pub failures: Vec<ModuleFailure>,
    /// Stages skipped by the frame's [`StageFilter`].
    pub skipped_stages: Vec<Stage>,
}

impl FrameReport {
    /// Number of modules that ran (successfully or not).
    pub fn executed(&self) -> usize {
        self.module_timings.len()
    }
}

// ── Stage filtering ────────────────────────────────────────────────

/// Which stages run in a given frame.
///
/// The host derives this from per-stage intervals; the pipeline just
/// honours it.
#[derive(Clone, Copy, Debug)]
pub struct StageFilter {
    active: [bool; 4],
}

impl StageFilter {
    /// Every stage runs.
    pub fn all() -> Self {
        Self { active: [true; 4] }
    }

    /// No stage runs.
    pub fn none() -> Self {
        Self { active: [false; 4] }
    }

    /// Enable or disable a stage (builder-style).
    pub fn with_stage(mut self, stage: Stage, active: bool) -> Self {
        self.active[stage.index()] = active;
        self
    }

    /// Whether a stage runs under this filter.
    pub fn runs(&self, stage: Stage) -> bool {
        self.active[stage.index()]
    }
}

impl Default for StageFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

struct Registered {
    module: Box<dyn Module>,
    registration: usize,
    /// Set when `initialize` failed; the module is skipped thereafter.
    init_failed: bool,
}

/// Ordered collection of modules grouped into fixed stages.
///
/// Lifecycle: `register` (and `clear`) before the run;
/// `initialize_all` exactly once; `execute_frame` per tick;
/// `cleanup_all` at the end (idempotent). Ordering is immutable during
/// a run.
#[derive(Default)]
pub struct ModulePipeline {
    entries: Vec<Registered>,
    next_registration: usize,
    initialized: bool,
    cleaned: bool,
}

impl ModulePipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Ordering is recomputed lazily at
    /// `sort_by_priority` / `initialize_all`.
    ///
    /// # Errors
    ///
    /// Rejects empty or duplicate names, and registration after
    /// `initialize_all`.
    pub fn register(&mut self, module: Box<dyn Module>) -> Result<(), PipelineError> {
        if self.initialized {
            return Err(PipelineError::AlreadyInitialized);
        }
        let name = module.descriptor().name.clone();
        if name.is_empty() {
            return Err(PipelineError::EmptyName);
        }
        if self.entries.iter().any(|e| e.module.descriptor().name == name) {
            return Err(PipelineError::DuplicateModule { name });
        }
        self.entries.push(Registered {
            module,
            registration: self.next_registration,
            init_failed: false,
        });
        self.next_registration += 1;
        Ok(())
    }

    /// Drop every registered module.
    ///
    /// # Errors
    ///
    /// Rejected once the run has started.
    pub fn clear(&mut self) -> Result<(), PipelineError> {
        if self.initialized {
            return Err(PipelineError::AlreadyInitialized);
        }
        self.entries.clear();
        Ok(())
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pipeline has no modules.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered module names in current order.
    pub fn module_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.module.descriptor().name.clone())
            .collect()
    }

    /// Stable-sort modules by `(stage, priority, registration order)`.
    ///
    /// Within a stage, execution order is a strict total order: lower
    /// priority first, registration order breaking ties.
    pub fn sort_by_priority(&mut self) {
        self.entries.sort_by_key(|e| {
            let d = e.module.descriptor();
            (d.stage.index(), d.priority, e.registration)
        });
    }

    /// Bind the device context and initialize every enabled module, in
    /// execution order.
    ///
    /// A module whose `initialize` fails is disabled for the run and
    /// reported in the returned list; initialization continues with
    /// the remaining modules.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyInitialized`] on a second call.
    pub fn initialize_all(
        &mut self,
        state: &mut GraphState,
        device: Option<&DeviceContext>,
    ) -> Result<Vec<ModuleFailure>, PipelineError> {
        if self.initialized {
            return Err(PipelineError::AlreadyInitialized);
        }
        self.sort_by_priority();

        let mut failures = Vec::new();
        for entry in &mut self.entries {
            if !entry.module.descriptor().enabled {
                continue;
            }
            entry.module.bind_device(device);
            if let Err(error) = entry.module.initialize(state) {
                let d = entry.module.descriptor();
                failures.push(ModuleFailure {
                    module: d.name.clone(),
                    stage: d.stage,
                    error,
                });
                entry.init_failed = true;
            }
        }
        self.initialized = true;
        self.cleaned = false;
        Ok(failures)
    }

    /// Execute one frame over the active stages.
    ///
    /// Every enabled module of every active stage runs exactly once,
    /// in sorted order, against the same `dt`. Failures are isolated
    /// into the report; the failing module's mutation for this tick is
    /// simply whatever it completed before erroring, and unrelated
    /// modules still run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotInitialized`] before
    /// `initialize_all`.
    pub fn execute_frame(
        &mut self,
        state: &mut GraphState,
        tick: TickId,
        dt: f64,
        ledger: &mut ConservationLedger,
        device: Option<&DeviceContext>,
        filter: StageFilter,
    ) -> Result<FrameReport, PipelineError> {
        if !self.initialized {
            return Err(PipelineError::NotInitialized);
        }

        let mut report = FrameReport::default();
        for stage in Stage::ALL {
            if !filter.runs(stage) {
                report.skipped_stages.push(stage);
                continue;
            }
            for entry in &mut self.entries {
                let d = entry.module.descriptor();
                if d.stage != stage || !d.enabled || entry.init_failed {
                    continue;
                }
                let name = d.name.clone();

                let started = Instant::now();
                let mut ctx = StepContext::new(tick, dt, ledger, device);
                let result = entry.module.execute_step(state, &mut ctx);
                report
                    .module_timings
                    .push((name.clone(), started.elapsed().as_micros() as u64));

                if let Err(error) = result {
                    report.failures.push(ModuleFailure {
                        module: name,
                        stage,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Invoke `cleanup` on every module, swallowing errors.
    ///
    /// Cleanup commonly runs during failure unwinding, so errors are
    /// returned for logging rather than propagated, and calling this
    /// twice in a row is a no-op — resources are never double-released.
    pub fn cleanup_all(&mut self) -> Vec<ModuleFailure> {
        if self.cleaned {
            return Vec::new();
        }
        self.cleaned = true;

        let mut failures = Vec::new();
        for entry in &mut self.entries {
            if let Err(error) = entry.module.cleanup() {
                let d = entry.module.descriptor();
                failures.push(ModuleFailure {
                    module: d.name.clone(),
                    stage: d.stage,
                    error,
                });
            }
        }
        failures
    }

    /// Whether `initialize_all` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl fmt::Debug for ModulePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModulePipeline")
            .field("modules", &self.module_names())
            .field("initialized", &self.initialized)
            .finish()
    }
}
