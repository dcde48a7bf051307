//! Reference modules for the Mire simulation framework.
//!
//! A small library of ready-made modules covering the common stage
//! roles:
//!
//! - [`WeightDiffusion`] (Forces) — relaxes edge weights toward their
//!   neighbourhood mean.
//! - [`AmplitudeEvolution`] (Integration) — rotates and damps edge
//!   amplitudes.
//! - [`VacuumExchange`] (Forces) — ledger client pumping energy
//!   across the system boundary and condensing vacuum into matter.
//! - [`TopologySampler`] (Integration) — Metropolis-Hastings topology
//!   mutation with coherence protection.
//! - [`FieldNormalize`] (PostProcess) — GPU-backed matter rescaling
//!   with a CPU fallback.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod amplitude_evolution;
pub mod field_normalize;
pub mod topology_sampler;
pub mod vacuum_exchange;
pub mod weight_diffusion;

pub use amplitude_evolution::AmplitudeEvolution;
pub use field_normalize::FieldNormalize;
pub use topology_sampler::TopologySampler;
pub use vacuum_exchange::VacuumExchange;
pub use weight_diffusion::WeightDiffusion;
