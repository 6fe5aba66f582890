//! Errors surfaced by the core to its callers.
//!
//! Storage and domain errors are folded into [`LoyaltyError`] at the service
//! boundary, so a transport layer only matches on a closed set of outcomes.

use loyalty_shared::{ErrorKind, Points, UserId};
use thiserror::Error;

use crate::ledger::BalanceError;
use crate::order::{OrderError, OrderNumber};
use crate::retry::RetryError;
use crate::store::StoreError;

/// Errors returned by the loyalty service operations.
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // ========== Rejections ==========
    /// The order number is not a Luhn-valid digit string.
    #[error("Invalid order number: {0}")]
    InvalidOrderNumber(OrderError),

    /// Amounts must be strictly positive.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Points),

    /// The balance does not cover the withdrawal.
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Spendable balance at the time of the request.
        available: Points,
        /// Requested amount.
        requested: Points,
    },

    /// No such user.
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    // ========== Conflicts ==========
    /// The order number belongs to another user.
    #[error("Order {0} was already submitted by another user")]
    OrderConflict(OrderNumber),

    /// The withdrawal number was already used.
    #[error("Withdrawal {0} already exists")]
    WithdrawalConflict(OrderNumber),

    /// The login is already registered.
    #[error("Login {0:?} is already taken")]
    LoginTaken(String),

    // ========== Storage ==========
    /// Storage kept failing transiently until the retry budget ran out.
    #[error("Storage unavailable after {attempts} attempts: {source}")]
    StorageExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The last storage error.
        source: StoreError,
    },

    /// Any other storage failure.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

impl LoyaltyError {
    /// Returns the error kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidOrderNumber(_)
            | Self::NonPositiveAmount(_)
            | Self::InsufficientFunds { .. }
            | Self::UnknownUser(_) => ErrorKind::BusinessRule,
            Self::OrderConflict(_) | Self::WithdrawalConflict(_) | Self::LoginTaken(_) => {
                ErrorKind::ConstraintViolation
            }
            Self::StorageExhausted { .. } => ErrorKind::TransientStorage,
            Self::Storage(err) => err.kind(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::UnknownUser(_) => "UNKNOWN_USER",
            Self::OrderConflict(_) => "ORDER_CONFLICT",
            Self::WithdrawalConflict(_) => "WITHDRAWAL_CONFLICT",
            Self::LoginTaken(_) => "LOGIN_TAKEN",
            Self::StorageExhausted { .. } => "STORAGE_UNAVAILABLE",
            Self::Storage(err) => err.kind().code(),
        }
    }
}

impl From<StoreError> for LoyaltyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderExists {
                number,
                same_owner: false,
            } => Self::OrderConflict(number),
            StoreError::WithdrawalExists(number) => Self::WithdrawalConflict(number),
            StoreError::LoginTaken(login) => Self::LoginTaken(login),
            StoreError::UserNotFound(user) => Self::UnknownUser(user),
            StoreError::Balance(BalanceError::NonPositiveAmount(amount)) => {
                Self::NonPositiveAmount(amount)
            }
            StoreError::Balance(BalanceError::InsufficientFunds {
                available,
                requested,
            }) => Self::InsufficientFunds {
                available,
                requested,
            },
            other => Self::Storage(other),
        }
    }
}

impl From<RetryError<StoreError>> for LoyaltyError {
    fn from(err: RetryError<StoreError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, source } => Self::StorageExhausted { attempts, source },
            RetryError::Permanent(source) => source.into(),
        }
    }
}
