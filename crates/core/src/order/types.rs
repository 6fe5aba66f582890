//! Order domain types.

use chrono::{DateTime, Utc};
use loyalty_shared::{OrderId, Points, UserId};
use serde::{Deserialize, Serialize};

use super::number::OrderNumber;
use super::status::OrderStatus;

/// A submitted purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Storage identity.
    pub id: OrderId,
    /// The user who submitted the number. Never changes.
    pub owner: UserId,
    /// The purchase-order number, unique across all users.
    pub number: OrderNumber,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Points awarded; zero unless the order is processed.
    pub accrual: Points,
    /// When the order was submitted.
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    /// Creates a freshly submitted order in status `NEW`.
    #[must_use]
    pub fn submitted(owner: UserId, number: OrderNumber, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            owner,
            number,
            status: OrderStatus::New,
            accrual: Points::ZERO,
            uploaded_at,
        }
    }

    /// Returns the accrual when it is meaningful, i.e. once processed.
    #[must_use]
    pub fn awarded(&self) -> Option<Points> {
        (self.status == OrderStatus::Processed).then_some(self.accrual)
    }
}

/// Result of a submission that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The order was registered and reconciliation has started.
    Accepted(Order),
    /// The caller already submitted this number; nothing changed.
    AlreadySubmitted,
}

/// Result of applying one accrual report to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    /// The order's owner.
    pub owner: UserId,
    /// Status before the report was applied.
    pub previous: OrderStatus,
    /// Status after the report was applied.
    pub current: OrderStatus,
    /// Amount credited to the owner by this report, if any.
    pub credited: Option<Points>,
}

impl StatusUpdate {
    /// Returns true if the order is terminal after this update.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.current.is_terminal()
    }
}
