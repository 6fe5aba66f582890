//! Store-backed Order Registry.

use std::sync::Arc;

use chrono::Utc;
use loyalty_shared::{Points, UserId};
use tracing::{debug, info};

use super::number::OrderNumber;
use super::status::OrderStatus;
use super::types::{Order, StatusUpdate, SubmitOutcome};
use crate::error::LoyaltyError;
use crate::retry::{RetryError, RetryPolicy};
use crate::store::{LoyaltyStore, StoreError};

/// Owns order registration, status updates and listing.
///
/// Every storage call runs under the retry policy.
#[derive(Clone)]
pub struct OrderRegistry {
    store: Arc<dyn LoyaltyStore>,
    retry: RetryPolicy,
}

impl OrderRegistry {
    /// Creates a registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LoyaltyStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Registers `number` for `owner` in status `NEW`.
    ///
    /// # Returns
    /// * `Ok(SubmitOutcome::Accepted)` with the new order
    /// * `Ok(SubmitOutcome::AlreadySubmitted)` if `owner` already holds it
    ///
    /// # Errors
    ///
    /// Returns `LoyaltyError::OrderConflict` if another user holds the number.
    pub async fn submit(
        &self,
        owner: UserId,
        number: &OrderNumber,
    ) -> Result<SubmitOutcome, LoyaltyError> {
        let uploaded_at = Utc::now();
        match self
            .retry
            .call(|| self.store.create_order(owner, number, uploaded_at))
            .await
        {
            Ok(order) => {
                info!(user = %owner, order = %number, "Order registered");
                Ok(SubmitOutcome::Accepted(order))
            }
            Err(RetryError::Permanent(StoreError::OrderExists {
                same_owner: true, ..
            })) => {
                debug!(user = %owner, order = %number, "Order already submitted by this user");
                Ok(SubmitOutcome::AlreadySubmitted)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Applies a status report from the accrual authority.
    ///
    /// Idempotent: re-applying a terminal report changes nothing and credits
    /// nothing. A `PROCESSED` report with positive accrual credits the owner
    /// in the same storage transaction.
    pub async fn update_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<StatusUpdate, LoyaltyError> {
        let update = self
            .retry
            .call(|| self.store.apply_accrual(number, status, accrual))
            .await?;

        if update.previous != update.current {
            info!(
                order = %number,
                from = %update.previous,
                to = %update.current,
                credited = ?update.credited.map(|p| p.to_string()),
                "Order status changed"
            );
        }
        Ok(update)
    }

    /// Lists `owner`'s orders, newest first.
    pub async fn list_for_user(&self, owner: UserId) -> Result<Vec<Order>, LoyaltyError> {
        Ok(self.retry.call(|| self.store.list_orders(owner)).await?)
    }

    /// Lists every order still awaiting a terminal status.
    pub async fn unresolved(&self) -> Result<Vec<Order>, LoyaltyError> {
        Ok(self.retry.call(|| self.store.list_unresolved_orders()).await?)
    }
}
