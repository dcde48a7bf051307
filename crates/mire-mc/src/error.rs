//! Error types for the sampling subsystem.

use std::error::Error;
use std::fmt;

/// Errors from sampler construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SamplerError {
    /// The sampler configuration is invalid.
    InvalidConfig {
        /// Description of which invariant was violated.
        reason: String,
    },
}

impl fmt::Display for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid sampler config: {reason}"),
        }
    }
}

impl Error for SamplerError {}

/// Errors from controller construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerError {
    /// The controller configuration is invalid.
    InvalidConfig {
        /// Description of which invariant was violated.
        reason: String,
    },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid controller config: {reason}"),
        }
    }
}

impl Error for ControllerError {}
