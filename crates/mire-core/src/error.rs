//! Error types shared across the Mire workspace.
//!
//! Each subsystem defines its own error enum; this crate holds only the
//! error returned by individual module execution, which every layer
//! above the module contract needs to name.

use std::error::Error;
use std::fmt;

/// Errors from individual module execution.
///
/// Returned by `Module::initialize()` and `Module::execute_step()` and
/// wrapped with module/stage context by the pipeline. A module error
/// never aborts the frame for unrelated modules; the pipeline isolates
/// it and reports it through the event channel.
#[derive(Clone, Debug, PartialEq)]
pub enum ModuleError {
    /// The module's step function failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A non-finite value (NaN or infinity) was produced or observed.
    NonFinite {
        /// Which quantity went non-finite (e.g. `"edge weight"`).
        quantity: String,
        /// Index of the offending element, if known.
        index: Option<usize>,
    },
    /// A module-declared constraint was violated.
    ConstraintViolation {
        /// Description of the violated constraint.
        constraint: String,
    },
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::NonFinite { quantity, index } => {
                write!(f, "non-finite value in {quantity}")?;
                if let Some(idx) = index {
                    write!(f, " at index {idx}")?;
                }
                Ok(())
            }
            Self::ConstraintViolation { constraint } => {
                write!(f, "constraint violation: {constraint}")
            }
        }
    }
}

impl Error for ModuleError {}
