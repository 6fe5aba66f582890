//! Order status state machine.
//!
//! Orders start in [`OrderStatus::New`] and are driven by the accrual
//! authority towards one of the terminal statuses:
//! - New → Processing (authority accepted the order)
//! - New | Processing → Invalid (authority rejected the order)
//! - New | Processing → Processed (accrual resolved)
//!
//! Terminal statuses absorb every later report without effect, which is what
//! makes repeated terminal reports safe to apply.

use std::fmt;

use loyalty_shared::Points;
use serde::{Deserialize, Serialize};

use super::error::OrderError;

/// Lifecycle status of a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Registered, not yet picked up by the accrual authority.
    New,
    /// The authority is computing the accrual.
    Processing,
    /// The authority rejected the order; no points will be awarded.
    Invalid,
    /// The accrual is final.
    Processed,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::New, Self::Processing, Self::Invalid, Self::Processed];

    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }

    /// Parses a status from a string, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::UnknownStatus` for anything else.
    pub fn parse(s: &str) -> Result<Self, OrderError> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            _ => Err(OrderError::UnknownStatus(s.to_string())),
        }
    }

    /// Returns true once no further reconciliation will happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// Validates a move from `self` to `next`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` when a processing order is
    /// reported as new again.
    pub fn transition_to(self, next: Self) -> Result<Transition, OrderError> {
        if self.is_terminal() {
            return Ok(Transition::AlreadyFinal);
        }
        match (self, next) {
            (from, to) if from == to => Ok(Transition::Unchanged),
            (Self::Processing, Self::New) => Err(OrderError::InvalidTransition {
                from: self,
                to: next,
            }),
            _ => Ok(Transition::Advance),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The order moves to a new status.
    Advance,
    /// The reported status equals the stored one.
    Unchanged,
    /// The order is terminal; the report is ignored.
    AlreadyFinal,
}

/// What a storage backend must write for one accrual report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualPlan {
    /// Nothing changes.
    Skip(Transition),
    /// Store `status` and `accrual`, and credit the owner when `credit` is set.
    Write {
        /// The new status.
        status: OrderStatus,
        /// The accrual to store; zero unless processed.
        accrual: Points,
        /// Amount to add to the owner's balance in the same transaction.
        credit: Option<Points>,
    },
}

impl AccrualPlan {
    /// Returns the credit this plan applies, if any.
    #[must_use]
    pub const fn credit(&self) -> Option<Points> {
        match self {
            Self::Skip(_) => None,
            Self::Write { credit, .. } => *credit,
        }
    }
}

/// Stateless planner for accrual reports.
///
/// Storage backends call [`OrderWorkflow::plan`] while holding the order's
/// row lock, so the decision and the write happen against the same state.
pub struct OrderWorkflow;

impl OrderWorkflow {
    /// Plans the effect of the authority reporting `next` with `accrual` for
    /// an order currently in `current`.
    ///
    /// # Returns
    /// * `Ok(AccrualPlan::Skip)` for unchanged or already-terminal orders
    /// * `Ok(AccrualPlan::Write)` otherwise; a positive accrual on
    ///   `Processed` becomes a credit
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NegativeAccrual` for negative amounts and
    /// `OrderError::InvalidTransition` for a processing order reported as new.
    pub fn plan(
        current: OrderStatus,
        next: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<AccrualPlan, OrderError> {
        if let Some(amount) = accrual
            && amount.is_negative()
        {
            return Err(OrderError::NegativeAccrual(amount));
        }

        match current.transition_to(next)? {
            Transition::Advance => {
                let accrual = match next {
                    OrderStatus::Processed => accrual.unwrap_or(Points::ZERO),
                    _ => Points::ZERO,
                };
                let credit = accrual.is_positive().then_some(accrual);
                Ok(AccrualPlan::Write {
                    status: next,
                    accrual,
                    credit,
                })
            }
            skipped => Ok(AccrualPlan::Skip(skipped)),
        }
    }
}
