//! Accrual authority wire types and errors.

use std::time::Duration;

use loyalty_shared::{ErrorKind, Points};
use serde::Deserialize;
use thiserror::Error;

use crate::order::OrderStatus;

/// Status of an order as reported by the accrual authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// Known to the authority, computation not started.
    #[serde(alias = "REGISTERED")]
    New,
    /// Computation in progress.
    Processing,
    /// The authority will not award points for this order.
    Invalid,
    /// Computation finished.
    Processed,
}

impl AccrualStatus {
    /// Maps the authority's status onto the local order lifecycle.
    ///
    /// Once the authority knows an order, it is processing from our side.
    #[must_use]
    pub const fn order_status(self) -> OrderStatus {
        match self {
            Self::New | Self::Processing => OrderStatus::Processing,
            Self::Invalid => OrderStatus::Invalid,
            Self::Processed => OrderStatus::Processed,
        }
    }
}

/// One answer from the accrual authority.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccrualReport {
    /// The order number the answer is about.
    pub order: String,
    /// Reported status.
    pub status: AccrualStatus,
    /// Points awarded, present once processed.
    #[serde(default)]
    pub accrual: Option<Points>,
}

/// Failures while querying the accrual authority.
#[derive(Debug, Error)]
pub enum AccrualError {
    /// Connection, timeout or body read failure.
    #[error("Accrual request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The authority does not know the order yet.
    #[error("Order is not registered with the accrual service")]
    NotRegistered,

    /// Too many requests; wait before asking again.
    #[error("Accrual service rate limit hit")]
    RateLimited {
        /// Wait requested through `Retry-After`, if any.
        retry_after: Option<Duration>,
    },

    /// Any status the protocol does not define.
    #[error("Accrual service answered with unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The body could not be decoded or violates the protocol.
    #[error("Malformed accrual response: {0}")]
    Decode(String),

    /// The answer is about a different order.
    #[error("Accrual response for order {actual}, expected {expected}")]
    OrderMismatch {
        /// Number that was queried.
        expected: String,
        /// Number in the response.
        actual: String,
    },
}

impl AccrualError {
    /// Returns the error kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::ExternalService
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("NEW", AccrualStatus::New)]
    #[case("REGISTERED", AccrualStatus::New)]
    #[case("PROCESSING", AccrualStatus::Processing)]
    #[case("INVALID", AccrualStatus::Invalid)]
    #[case("PROCESSED", AccrualStatus::Processed)]
    fn test_status_decoding(#[case] raw: &str, #[case] expected: AccrualStatus) {
        let status: AccrualStatus = serde_json::from_str(&format!("\"{raw}\"")).unwrap();
        assert_eq!(status, expected);
    }

    #[rstest]
    #[case(AccrualStatus::New, OrderStatus::Processing)]
    #[case(AccrualStatus::Processing, OrderStatus::Processing)]
    #[case(AccrualStatus::Invalid, OrderStatus::Invalid)]
    #[case(AccrualStatus::Processed, OrderStatus::Processed)]
    fn test_order_status_mapping(#[case] reported: AccrualStatus, #[case] local: OrderStatus) {
        assert_eq!(reported.order_status(), local);
    }

    #[test]
    fn test_report_without_accrual() {
        let report: AccrualReport =
            serde_json::from_str(r#"{"order":"79927398713","status":"PROCESSING"}"#).unwrap();
        assert_eq!(report.accrual, None);
    }

    #[test]
    fn test_report_with_fractional_accrual() {
        let report: AccrualReport = serde_json::from_str(
            r#"{"order":"79927398713","status":"PROCESSED","accrual":729.98}"#,
        )
        .unwrap();
        assert_eq!(report.accrual, Some(Points::new(dec!(729.98))));
    }
}
