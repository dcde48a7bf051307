//! Simulation engine orchestrating Mire module pipelines.
//!
//! [`SimulationEngine`] drives the tick loop: staged module execution
//! with per-module failure isolation, conservation-ledger
//! reconciliation, controller-tuned stage intervals, device buffer
//! refresh on topology change, terminal-state monitoring with
//! graceful halt, and a bounded event channel for log/error
//! consumers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod events;
pub mod frame;
pub mod metrics;

pub use config::{ConfigError, EngineConfig, NumericalPolicy};
pub use events::{EngineEvent, EventBus, Severity};
pub use frame::{CancelToken, EngineError, FrameResult, SimulationEngine};
pub use metrics::FrameMetrics;
