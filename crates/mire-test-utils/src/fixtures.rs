//! Reusable module and graph fixtures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mire_core::{ModuleError, NodeId};
use mire_graph::{Edge, EdgeKey, GraphState};
use mire_module::{Module, ModuleDescriptor, Stage, StepContext};

/// Overwrites every edge weight with a constant value.
///
/// Useful for verifying that a module actually ran and that later
/// stages see its writes.
pub struct ConstWeightModule {
    descriptor: ModuleDescriptor,
    value: f64,
}

impl ConstWeightModule {
    /// A module named `name` running in `stage`, writing `value`.
    pub fn new(name: impl Into<String>, stage: Stage, value: f64) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(name, stage),
            value,
        }
    }
}

impl Module for ConstWeightModule {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn execute_step(
        &mut self,
        state: &mut GraphState,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        let keys: Vec<EdgeKey> = state.edges().map(|(k, _)| k).collect();
        for key in keys {
            state
                .set_weight(key, self.value)
                .map_err(|e| ModuleError::ExecutionFailed {
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

/// Fails deterministically after a configurable number of successful
/// calls.
///
/// Uses `AtomicUsize` for the call counter so it satisfies `Send`.
pub struct FailingModule {
    descriptor: ModuleDescriptor,
    succeed_count: usize,
    calls: AtomicUsize,
}

impl FailingModule {
    /// Succeeds `succeed_count` times, then fails every call.
    pub fn new(name: impl Into<String>, stage: Stage, succeed_count: usize) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(name, stage),
            succeed_count,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `execute_step` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Module for FailingModule {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn execute_step(
        &mut self,
        _state: &mut GraphState,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(ModuleError::ExecutionFailed {
                reason: format!("deliberate failure after {} successful calls", self.succeed_count),
            });
        }
        Ok(())
    }
}

/// Appends `step:<name>` to a shared trace on every step.
///
/// The trace makes execution order observable across modules.
pub struct RecordingModule {
    descriptor: ModuleDescriptor,
    trace: Arc<Mutex<Vec<String>>>,
}

impl RecordingModule {
    /// A recording module with explicit stage and priority.
    pub fn new(
        name: impl Into<String>,
        stage: Stage,
        priority: i32,
        trace: &Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(name, stage).with_priority(priority),
            trace: Arc::clone(trace),
        }
    }
}

impl Module for RecordingModule {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn execute_step(
        &mut self,
        _state: &mut GraphState,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        self.trace
            .lock()
            .map_err(|_| ModuleError::ExecutionFailed {
                reason: "trace mutex poisoned".to_string(),
            })?
            .push(format!("step:{}", self.descriptor.name));
        Ok(())
    }
}

/// Writes NaN into `matter[0]` once a configurable number of healthy
/// calls have elapsed.
///
/// The module itself reports success; the poisoned state is for the
/// terminal-state monitor to find.
pub struct NanInjectorModule {
    descriptor: ModuleDescriptor,
    healthy_calls: usize,
    calls: AtomicUsize,
}

impl NanInjectorModule {
    /// Behaves healthily for `healthy_calls` steps, then poisons.
    pub fn new(name: impl Into<String>, stage: Stage, healthy_calls: usize) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(name, stage),
            healthy_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Module for NanInjectorModule {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn execute_step(
        &mut self,
        state: &mut GraphState,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n >= self.healthy_calls {
            state
                .set_matter(NodeId(0), f64::NAN)
                .map_err(|e| ModuleError::ExecutionFailed {
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

/// A cycle of `n` nodes with unit-weight edges.
///
/// # Panics
///
/// Panics if `n < 3`; test fixtures want a real cycle.
pub fn ring_graph(n: u32) -> GraphState {
    assert!(n >= 3, "ring_graph needs at least 3 nodes");
    let mut g = GraphState::new(n).expect("n >= 3");
    for i in 0..n {
        let key = EdgeKey::new(NodeId(i), NodeId((i + 1) % n)).expect("distinct nodes");
        g.add_edge(key, Edge::with_weight(1.0)).expect("fresh edge");
    }
    g
}

/// The complete graph on `n` nodes with unit-weight edges.
///
/// # Panics
///
/// Panics if `n < 2`.
pub fn complete_graph(n: u32) -> GraphState {
    assert!(n >= 2, "complete_graph needs at least 2 nodes");
    let mut g = GraphState::new(n).expect("n >= 2");
    for a in 0..n {
        for b in (a + 1)..n {
            let key = EdgeKey::new(NodeId(a), NodeId(b)).expect("distinct nodes");
            g.add_edge(key, Edge::with_weight(1.0)).expect("fresh edge");
        }
    }
    g
}
