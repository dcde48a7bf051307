//! Error types for ledger usage.

use std::error::Error;
use std::fmt;

/// Errors from invalid ledger usage.
///
/// Every ledger operation other than initialization and reset fails
/// with [`LedgerError::NotInitialized`] before `initialize_*` has been
/// called — misuse is reported, never silently coerced.
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerError {
    /// An operation was called before `initialize_*`.
    NotInitialized,
    /// `initialize_*` was called on an already-initialized ledger.
    AlreadyInitialized,
    /// An amount that must be non-negative was negative.
    NegativeAmount {
        /// The offending amount.
        amount: f64,
    },
    /// An amount was NaN or infinite.
    NonFiniteAmount {
        /// The offending amount.
        amount: f64,
    },
    /// The ledger configuration is invalid.
    InvalidConfig {
        /// Description of which invariant was violated.
        reason: String,
    },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "ledger not initialized"),
            Self::AlreadyInitialized => write!(f, "ledger already initialized"),
            Self::NegativeAmount { amount } => {
                write!(f, "amount must be non-negative, got {amount}")
            }
            Self::NonFiniteAmount { amount } => {
                write!(f, "amount must be finite, got {amount}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid ledger config: {reason}"),
        }
    }
}

impl Error for LedgerError {}
