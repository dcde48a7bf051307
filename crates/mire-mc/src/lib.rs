//! Metropolis-Hastings sampling and adaptive scheduling for Mire.
//!
//! [`MetropolisSampler`] proposes local topology mutations, evaluates
//! the action delta through the
//! [`ActionFunctional`](mire_graph::ActionFunctional) seam, and applies
//! a Metropolis acceptance test corrected by a Hastings ratio for the
//! asymmetry between add and remove proposal kernels.
//!
//! [`AdaptiveController`] retunes how often the topology-mutating
//! stage runs from live system statistics, and supplies the coherence
//! check that protects strongly-amplituded edges from routine churn.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod controller;
pub mod error;
pub mod proposal;
pub mod sampler;

pub use controller::{AdaptiveController, ControllerConfig};
pub use error::{ControllerError, SamplerError};
pub use proposal::{MoveKind, ProposedMove};
pub use sampler::{MetropolisSampler, SampleOutcome, SamplerConfig};
