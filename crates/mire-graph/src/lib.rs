//! Weighted-graph state and action functionals for Mire simulations.
//!
//! [`GraphState`] is the single mutable state object passed to every
//! module each tick: a fixed set of nodes carrying a scalar matter
//! field, connected by edges carrying a scalar weight and a complex
//! amplitude. Topology mutation (adding and removing edges) bumps a
//! version counter so device buffers sized by edge count can be
//! refreshed by their owner.
//!
//! [`ActionFunctional`] is the seam behind which the physics lives:
//! the sampler and any module measuring a global action depend on the
//! trait, never on a concrete formula.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod edge;
pub mod error;
pub mod state;

pub use action::{ActionFunctional, EdgeAction};
pub use edge::{Edge, EdgeKey};
pub use error::GraphError;
pub use state::GraphState;
