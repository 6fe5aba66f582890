//! Order error types for format validation and status transitions.

use loyalty_shared::{ErrorKind, Points};
use thiserror::Error;

use super::status::OrderStatus;

/// Errors that can occur while validating or advancing an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    // ========== Format Errors ==========
    /// The order number is empty.
    #[error("Order number must not be empty")]
    Empty,

    /// The order number contains something other than decimal digits.
    #[error("Order number must contain only decimal digits: {0:?}")]
    NonDigit(String),

    /// The order number fails the Luhn checksum.
    #[error("Order number {0} fails the Luhn checksum")]
    ChecksumMismatch(String),

    // ========== State Errors ==========
    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: OrderStatus,
        /// The attempted target status.
        to: OrderStatus,
    },

    /// The accrual authority reported a negative accrual.
    #[error("Accrual cannot be negative: {0}")]
    NegativeAccrual(Points),

    /// A stored or reported status string is not recognised.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

impl OrderError {
    /// Returns true if this is a format problem with a caller-supplied number.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::NonDigit(_) | Self::ChecksumMismatch(_)
        )
    }

    /// Returns the error kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownStatus(_) => ErrorKind::Internal,
            _ => ErrorKind::BusinessRule,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Empty | Self::NonDigit(_) | Self::ChecksumMismatch(_) => "INVALID_ORDER_NUMBER",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::NegativeAccrual(_) => "NEGATIVE_ACCRUAL",
            Self::UnknownStatus(_) => "UNKNOWN_ORDER_STATUS",
        }
    }
}
