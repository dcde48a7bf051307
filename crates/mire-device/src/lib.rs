//! GPU device context and shared buffer management for Mire simulations.
//!
//! [`DeviceContext`] owns the lifetime of a wgpu device and the buffers
//! shared across GPU-backed modules. There is exactly one owner — the
//! pipeline host — and it is the only party that may create or
//! reallocate shared buffers (reallocation requires `&mut self`, which
//! modules never hold). Modules borrow the context immutably to upload
//! data and dispatch kernels.
//!
//! GPU availability is a soft capability: when no usable adapter
//! exists, [`DeviceContext::disabled()`] yields an inert context and
//! every GPU-backed module falls back to its CPU path. Capability
//! probing happens exactly once, at initialization, and the result is
//! cached in [`DeviceCaps`] — there is deliberately no re-probe API.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod probe;

pub use context::{BufferKind, DeviceConfig, DeviceContext};
pub use error::DeviceError;
pub use probe::DeviceCaps;
