//! Conservation ledger enforcing the partitioned energy invariant.
//!
//! The tracked quantity is partitioned three ways — vacuum pool,
//! matter, field — and may only change through the explicit operations
//! on [`ConservationLedger`]. Drift beyond a configured tolerance is
//! detected at reconciliation time and folded back into the vacuum
//! pool, so floating-point error never compounds silently.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::{ConservationLedger, LedgerConfig, ReconcileReport};
