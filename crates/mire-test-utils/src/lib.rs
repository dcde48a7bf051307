//! Test utilities and mock modules for Mire development.
//!
//! Standard fixtures for pipeline and engine testing:
//!
//! - [`ConstWeightModule`] — overwrites every edge weight with a
//!   constant.
//! - [`FailingModule`] — fails deterministically after N calls.
//! - [`RecordingModule`] — appends its name to a shared trace on each
//!   step.
//! - [`NanInjectorModule`] — poisons the matter field after N calls.
//! - [`ring_graph`] / [`complete_graph`] — small topology builders.

pub mod fixtures;

pub use fixtures::{
    complete_graph, ring_graph, ConstWeightModule, FailingModule, NanInjectorModule,
    RecordingModule,
};
