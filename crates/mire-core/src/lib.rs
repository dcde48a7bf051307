//! Core types and errors for the Mire simulation framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the strongly-typed identifiers and the module-level error type used
//! throughout the Mire workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;

pub use error::ModuleError;
pub use id::{NodeId, TickId};
