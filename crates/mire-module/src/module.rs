//! The [`Module`] trait and its descriptor types.

use mire_core::ModuleError;
use mire_device::DeviceContext;
use mire_graph::GraphState;

use crate::context::StepContext;

/// A fixed phase of a tick. Stages execute in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Buffer refresh, cached statistics, anything later stages read.
    Preparation,
    /// Force-like field updates and energy exchange.
    Forces,
    /// State advancement: integrators and topology mutation.
    Integration,
    /// Normalization, clamping, and bookkeeping after advancement.
    PostProcess,
}

impl Stage {
    /// All stages, in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::Preparation,
        Stage::Forces,
        Stage::Integration,
        Stage::PostProcess,
    ];

    /// Position of this stage in execution order.
    pub fn index(self) -> usize {
        match self {
            Stage::Preparation => 0,
            Stage::Forces => 1,
            Stage::Integration => 2,
            Stage::PostProcess => 3,
        }
    }

    /// Short lowercase name for event messages and snapshots.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Preparation => "preparation",
            Stage::Forces => "forces",
            Stage::Integration => "integration",
            Stage::PostProcess => "post-process",
        }
    }
}

/// Which execution backend a module's hot path targets.
///
/// `Gpu` is a preference, not a requirement: a GPU-backed module must
/// fall back to an equivalent CPU path when the device context is
/// disabled or lacks the needed capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Pure CPU execution.
    Cpu,
    /// GPU execution with a mandatory CPU fallback.
    Gpu,
}

/// Descriptive metadata for a registered module.
#[derive(Clone, Debug)]
pub struct ModuleDescriptor {
    /// Unique human-readable name, used in events and reports.
    pub name: String,
    /// Free-form grouping label (e.g. `"dynamics"`, `"sampling"`).
    pub category: String,
    /// Stage this module runs in.
    pub stage: Stage,
    /// Ordering within the stage: lower runs earlier. Ties break by
    /// registration order.
    pub priority: i32,
    /// Preferred execution backend.
    pub backend: Backend,
    /// Disabled modules stay registered but are skipped.
    pub enabled: bool,
}

impl ModuleDescriptor {
    /// A CPU module descriptor with default category and priority 0.
    pub fn new(name: impl Into<String>, stage: Stage) -> Self {
        Self {
            name: name.into(),
            category: "general".to_string(),
            stage,
            priority: 0,
            backend: Backend::Cpu,
            enabled: true,
        }
    }

    /// Set the priority (builder-style).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the backend (builder-style).
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the category (builder-style).
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// A pluggable unit of computation, executed once per tick within its
/// assigned stage.
///
/// # Contract
///
/// - [`bind_device`](Module::bind_device) is called exactly once,
///   before [`initialize`](Module::initialize), and never again for
///   the run's duration. GPU-backed modules inspect the context's
///   cached capabilities here and commit to a CPU or GPU code path;
///   they must not store the reference.
/// - [`initialize`](Module::initialize) runs once before the first
///   frame, in stage/priority order. A failure disables the module
///   for the run; it does not abort the pipeline.
/// - [`execute_step`](Module::execute_step) mutates the shared state
///   directly. An error is isolated: it is reported with module and
///   stage context and the frame continues with the next module.
/// - [`cleanup`](Module::cleanup) may run during failure unwinding;
///   errors are logged and swallowed, and repeated cleanup must be
///   safe.
///
/// # Object safety
///
/// The trait is object-safe; pipelines store `Box<dyn Module>`.
pub trait Module: Send {
    /// Descriptive metadata. Stable for the module's lifetime.
    fn descriptor(&self) -> &ModuleDescriptor;

    /// Receive the shared device context before initialization.
    ///
    /// `None` means the host runs without a device context at all.
    /// A disabled context is passed as `Some` so modules can log the
    /// adapter situation themselves; check
    /// [`DeviceContext::is_initialized`] before committing to GPU.
    fn bind_device(&mut self, device: Option<&DeviceContext>) {
        let _ = device;
    }

    /// One-time setup before the first frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ModuleError`] to disable this module for the run.
    fn initialize(&mut self, state: &mut GraphState) -> Result<(), ModuleError> {
        let _ = state;
        Ok(())
    }

    /// Execute one tick of this module's computation.
    ///
    /// # Errors
    ///
    /// Returns a [`ModuleError`] to report failure for this tick; the
    /// pipeline continues with the next module.
    fn execute_step(
        &mut self,
        state: &mut GraphState,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError>;

    /// Release module-held resources.
    ///
    /// # Errors
    ///
    /// Returns a [`ModuleError`]; the pipeline logs and swallows it.
    fn cleanup(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        let indices: Vec<usize> = Stage::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(Stage::Preparation.name(), "preparation");
        assert_eq!(Stage::PostProcess.name(), "post-process");
    }

    #[test]
    fn descriptor_builder_defaults() {
        let d = ModuleDescriptor::new("relax", Stage::Forces);
        assert_eq!(d.name, "relax");
        assert_eq!(d.priority, 0);
        assert_eq!(d.backend, Backend::Cpu);
        assert!(d.enabled);

        let d = d.with_priority(-5).with_backend(Backend::Gpu).with_category("dynamics");
        assert_eq!(d.priority, -5);
        assert_eq!(d.backend, Backend::Gpu);
        assert_eq!(d.category, "dynamics");
    }
}
