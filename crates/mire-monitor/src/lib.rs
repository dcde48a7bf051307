//! Terminal-state detection and diagnostic snapshot export.
//!
//! [`TerminalStateMonitor`] classifies the live state each tick:
//! `Running`, `Forming` (a condition is present but within its grace
//! period), or `Terminal`. Terminal configurations are valid
//! scientific outcomes, not bugs — on escalation the monitor exports a
//! JSON diagnostic snapshot and thereafter tells the owning loop to
//! stop advancing, gracefully.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod monitor;
pub mod snapshot;

pub use monitor::{
    ConditionKind, MonitorConfig, MonitorError, MonitorState, MonitorVerdict,
    TerminalStateMonitor,
};
pub use snapshot::{DiagnosticSnapshot, HistoryEntry, OffendingValue, SnapshotError, SnapshotWriter};
