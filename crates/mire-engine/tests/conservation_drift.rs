//! Integration test: unaccounted energy drift is detected,
//! absorbed into the vacuum pool, and reported — never fatal.

use mire_core::{ModuleError, NodeId};
use mire_engine::{EngineConfig, Severity, SimulationEngine};
use mire_graph::GraphState;
use mire_module::{Module, ModuleDescriptor, ModulePipeline, Stage, StepContext};
use mire_test_utils::ring_graph;

fn test_dir(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("mire-drift-{tag}-{}", std::process::id()))
}

/// Adds matter every tick without telling the ledger — a module with
/// buggy (or merely lazy) energy accounting.
struct LeakyModule {
    descriptor: ModuleDescriptor,
    leak: f64,
}

impl LeakyModule {
    fn new(leak: f64) -> Self {
        Self {
            descriptor: ModuleDescriptor::new("leaky", Stage::Forces),
            leak,
        }
    }
}

impl Module for LeakyModule {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }
    fn execute_step(
        &mut self,
        state: &mut GraphState,
        _ctx: &mut StepContext<'_>,
    ) -> Result<(), ModuleError> {
        let current = state
            .matter(NodeId(0))
            .map_err(|e| ModuleError::ExecutionFailed {
                reason: e.to_string(),
            })?;
        state
            .set_matter(NodeId(0), current + self.leak)
            .map_err(|e| ModuleError::ExecutionFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[test]
fn drift_is_absorbed_into_vacuum_and_counted() {
    let mut pipeline = ModulePipeline::new();
    pipeline.register(Box::new(LeakyModule::new(1.0))).unwrap();

    let cfg = EngineConfig {
        snapshot_dir: test_dir("absorb"),
        ..EngineConfig::default()
    };
    let mut engine = SimulationEngine::new(cfg, ring_graph(5), pipeline, None).unwrap();
    engine.initialize().unwrap();
    let events = engine.subscribe_events();

    let total_before = engine.ledger().total_tracked();

    for tick in 1..=5u64 {
        let result = engine.execute_frame().unwrap();
        assert!(result.continue_running);
        assert!(result.metrics.reconciliation_corrected);
        assert!((result.metrics.reconciliation_drift - 1.0).abs() < 1e-9);
        assert_eq!(result.metrics.conservation_corrections, tick);
    }

    // Every leaked unit was pulled out of the vacuum pool; the
    // tracked total is unchanged.
    let ledger = engine.ledger();
    assert!((ledger.matter_energy() - 5.0).abs() < 1e-9);
    assert!((ledger.vacuum_pool() - 45.0).abs() < 1e-9);
    assert!((ledger.total_tracked() - total_before).abs() < 1e-9);
    assert_eq!(ledger.corrections(), 5);

    // Corrections surface as warning events, not errors.
    let mut warnings = 0;
    while let Ok(event) = events.try_recv() {
        if event.severity == Severity::Warning && event.message.contains("drift") {
            warnings += 1;
        }
    }
    assert_eq!(warnings, 5);

    std::fs::remove_dir_all(test_dir("absorb")).ok();
}

#[test]
fn sub_tolerance_drift_is_left_alone() {
    let mut pipeline = ModulePipeline::new();
    pipeline
        .register(Box::new(LeakyModule::new(1e-9)))
        .unwrap();

    let cfg = EngineConfig {
        snapshot_dir: test_dir("tolerate"),
        ..EngineConfig::default()
    };
    let mut engine = SimulationEngine::new(cfg, ring_graph(5), pipeline, None).unwrap();
    engine.initialize().unwrap();

    let result = engine.execute_frame().unwrap();
    assert!(!result.metrics.reconciliation_corrected);
    assert_eq!(result.metrics.conservation_corrections, 0);

    std::fs::remove_dir_all(test_dir("tolerate")).ok();
}
