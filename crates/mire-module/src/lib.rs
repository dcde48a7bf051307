//! Module contract, step context, and staged pipeline for Mire.
//!
//! Modules are pluggable units of computation executed in a fixed
//! stage order each tick. The pipeline owns no simulation state — it
//! operates on a [`GraphState`](mire_graph::GraphState) passed in at
//! invocation time — and it isolates each module's failure so one bad
//! plugin cannot corrupt the tick for the others.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod module;
pub mod pipeline;

pub use context::StepContext;
pub use module::{Backend, Module, ModuleDescriptor, Stage};
pub use pipeline::{FrameReport, ModuleFailure, ModulePipeline, PipelineError, StageFilter};
