//! Balance ledger errors.

use loyalty_shared::{ErrorKind, Points};
use thiserror::Error;

/// Errors that can occur when changing a balance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    /// Credits and debits must be strictly positive.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Points),

    /// The spendable balance does not cover the debit.
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Spendable balance at the time of the request.
        available: Points,
        /// Requested debit.
        requested: Points,
    },

    /// The resulting total does not fit the decimal range.
    #[error("Balance overflow adding {0}")]
    Overflow(Points),
}

impl BalanceError {
    /// Returns the error kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::BusinessRule
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Overflow(_) => "BALANCE_OVERFLOW",
        }
    }
}
