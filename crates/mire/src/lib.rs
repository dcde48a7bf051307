//! Mire: an extensible staged-module simulation engine for discrete
//! graph dynamics.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Mire sub-crates. For most users, adding `mire` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use mire::prelude::*;
//!
//! // A minimal module that doubles every edge weight.
//! struct DoubleWeights {
//!     descriptor: ModuleDescriptor,
//! }
//! impl DoubleWeights {
//!     fn new() -> Self {
//!         Self {
//!             descriptor: ModuleDescriptor::new("double_weights", Stage::Forces),
//!         }
//!     }
//! }
//! impl Module for DoubleWeights {
//!     fn descriptor(&self) -> &ModuleDescriptor { &self.descriptor }
//!     fn execute_step(
//!         &mut self,
//!         state: &mut GraphState,
//!         _ctx: &mut StepContext<'_>,
//!     ) -> Result<(), ModuleError> {
//!         let keys: Vec<_> = state.edges().map(|(k, _)| k).collect();
//!         for key in keys {
//!             let w = state.edge(key).map(|e| e.weight).unwrap_or(0.0);
//!             state.set_weight(key, 2.0 * w).ok();
//!         }
//!         Ok(())
//!     }
//! }
//!
//! // A 4-node graph with one edge.
//! let mut state = GraphState::new(4).unwrap();
//! let key = EdgeKey::new(NodeId(0), NodeId(1)).unwrap();
//! state.add_edge(key, Edge::with_weight(1.0)).unwrap();
//!
//! let mut pipeline = ModulePipeline::new();
//! pipeline.register(Box::new(DoubleWeights::new())).unwrap();
//!
//! let config = EngineConfig {
//!     snapshot_dir: std::env::temp_dir().join("mire-doc"),
//!     ..EngineConfig::default()
//! };
//! let mut engine = SimulationEngine::new(config, state, pipeline, None).unwrap();
//! engine.initialize().unwrap();
//! let result = engine.execute_frame().unwrap();
//! assert!(result.continue_running);
//! assert_eq!(engine.state().edge(key).unwrap().weight, 2.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `mire-core` | IDs and the module error type |
//! | [`graph`] | `mire-graph` | Graph state, edges, action functionals |
//! | [`module`] | `mire-module` | Module trait, descriptors, pipeline |
//! | [`device`] | `mire-device` | GPU device context and buffers |
//! | [`ledger`] | `mire-ledger` | Conservation ledger |
//! | [`mc`] | `mire-mc` | Metropolis-Hastings sampler, controller |
//! | [`monitor`] | `mire-monitor` | Terminal-state monitor, snapshots |
//! | [`engine`] | `mire-engine` | The simulation engine and events |
//! | [`modules`] | `mire-modules` | Reference module library |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core IDs and the module error type (`mire-core`).
pub use mire_core as types;

/// Graph state, edge types, and action functionals (`mire-graph`).
pub use mire_graph as graph;

/// Module contract, step context, and pipeline (`mire-module`).
///
/// The [`module::Module`] trait is the main extension point for
/// user-defined simulation logic.
pub use mire_module as module;

/// GPU device context and shared buffers (`mire-device`).
pub use mire_device as device;

/// Conservation ledger (`mire-ledger`).
pub use mire_ledger as ledger;

/// Metropolis-Hastings sampler and adaptive controller (`mire-mc`).
pub use mire_mc as mc;

/// Terminal-state monitoring and diagnostic snapshots
/// (`mire-monitor`).
pub use mire_monitor as monitor;

/// The simulation engine, events, and metrics (`mire-engine`).
pub use mire_engine as engine;

/// Reference module implementations (`mire-modules`).
///
/// Includes [`modules::WeightDiffusion`], [`modules::TopologySampler`],
/// and [`modules::FieldNormalize`].
pub use mire_modules as modules;

/// Common imports for typical Mire usage.
///
/// ```rust
/// use mire::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use mire_core::{ModuleError, NodeId, TickId};

    // Graph state
    pub use mire_graph::{ActionFunctional, Edge, EdgeAction, EdgeKey, GraphError, GraphState};

    // Module contract and pipeline
    pub use mire_module::{
        Backend, Module, ModuleDescriptor, ModulePipeline, PipelineError, Stage, StageFilter,
        StepContext,
    };

    // Device
    pub use mire_device::{BufferKind, DeviceConfig, DeviceContext, DeviceError};

    // Ledger
    pub use mire_ledger::{ConservationLedger, LedgerConfig, LedgerError};

    // Sampling
    pub use mire_mc::{
        AdaptiveController, ControllerConfig, MetropolisSampler, MoveKind, SampleOutcome,
        SamplerConfig,
    };

    // Monitoring
    pub use mire_monitor::{ConditionKind, MonitorConfig, MonitorState, TerminalStateMonitor};

    // Engine
    pub use mire_engine::{
        CancelToken, EngineConfig, EngineError, EngineEvent, FrameMetrics, FrameResult,
        NumericalPolicy, Severity, SimulationEngine,
    };
}
