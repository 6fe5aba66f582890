//! Withdrawal ledger entries.

use chrono::{DateTime, Utc};
use loyalty_shared::{Points, UserId, WithdrawalId};
use serde::{Deserialize, Serialize};

use crate::order::OrderNumber;

/// An append-only record of points spent against an order number.
///
/// Withdrawal numbers share the Luhn format with orders but live in their
/// own namespace: a number may be used once as an order and once as a
/// withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Storage identity.
    pub id: WithdrawalId,
    /// The user whose balance was debited.
    pub owner: UserId,
    /// The order number the points were spent on.
    pub number: OrderNumber,
    /// Points debited.
    pub amount: Points,
    /// When the debit committed.
    pub processed_at: DateTime<Utc>,
}

impl Withdrawal {
    /// Creates a new withdrawal record.
    #[must_use]
    pub fn new(
        owner: UserId,
        number: OrderNumber,
        amount: Points,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WithdrawalId::new(),
            owner,
            number,
            amount,
            processed_at,
        }
    }
}
