//! Application-wide error taxonomy.
//!
//! Every layer keeps its own `thiserror` enum, but each variant maps to exactly
//! one [`ErrorKind`] so callers can decide how to react without matching on
//! messages.

use serde::{Deserialize, Serialize};

/// Closed classification of every failure the backend can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Storage failure expected to resolve on retry (connection drop, admin shutdown).
    TransientStorage,
    /// Uniqueness or referential constraint hit (duplicate order or withdrawal number).
    ConstraintViolation,
    /// Typed rejection of the request (bad Luhn format, insufficient balance).
    BusinessRule,
    /// The accrual authority could not be reached or answered garbage.
    ExternalService,
    /// Anything else: a bug or an unclassified backend failure.
    Internal,
}

impl ErrorKind {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::TransientStorage => "TRANSIENT_STORAGE_ERROR",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Self::BusinessRule => "BUSINESS_RULE_VIOLATION",
            Self::ExternalService => "EXTERNAL_SERVICE_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the same request may succeed when repeated later.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::TransientStorage | Self::ExternalService)
    }
}

/// Class of transient storage faults a retry policy is asked to absorb.
///
/// Mirrors the SQLSTATE classes a PostgreSQL backend reports: class `08`
/// (connection exception) and class `57` (operator intervention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    /// Connection lost, refused, or pool exhausted.
    ConnectionException,
    /// Server shutting down, query cancelled by an administrator.
    OperatorIntervention,
}

impl FaultClass {
    /// Returns the SQLSTATE class prefix for this fault class.
    #[must_use]
    pub const fn sqlstate_class(self) -> &'static str {
        match self {
            Self::ConnectionException => "08",
            Self::OperatorIntervention => "57",
        }
    }

    /// Classifies a five-character SQLSTATE code.
    #[must_use]
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        [Self::ConnectionException, Self::OperatorIntervention]
            .into_iter()
            .find(|class| code.starts_with(class.sqlstate_class()))
    }
}

impl std::fmt::Display for FaultClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionException => write!(f, "connection-exception"),
            Self::OperatorIntervention => write!(f, "operator-intervention"),
        }
    }
}
