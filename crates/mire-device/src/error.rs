//! Error types for the device layer.

use std::error::Error;
use std::fmt;

use crate::context::BufferKind;

/// Errors from device initialization and buffer operations.
#[derive(Debug)]
pub enum DeviceError {
    /// No GPU adapter was found.
    NoAdapter,
    /// Adapter was found but device creation failed.
    DeviceCreation(String),
    /// Operation requires a live device but the context is disabled.
    Disabled,
    /// The requested shared buffer has not been allocated.
    MissingBuffer {
        /// Which buffer was requested.
        kind: BufferKind,
    },
    /// An upload or readback exceeded the buffer's allocated capacity.
    Capacity {
        /// Which buffer overflowed.
        kind: BufferKind,
        /// Number of f64 elements requested.
        requested: usize,
        /// Number of f64 elements allocated.
        allocated: usize,
    },
    /// Mapping a staging buffer for readback failed.
    Readback(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "no GPU adapter found"),
            Self::DeviceCreation(reason) => write!(f, "device creation failed: {reason}"),
            Self::Disabled => write!(f, "device context is disabled"),
            Self::MissingBuffer { kind } => write!(f, "shared buffer {kind:?} not allocated"),
            Self::Capacity {
                kind,
                requested,
                allocated,
            } => write!(
                f,
                "buffer {kind:?} capacity exceeded: requested {requested} elements, \
                 allocated {allocated}"
            ),
            Self::Readback(reason) => write!(f, "buffer readback failed: {reason}"),
        }
    }
}

impl Error for DeviceError {}
