//! Balance Ledger and Withdrawal Processor.
//!
//! Both are thin coordinators: validation happens before any storage access,
//! and the atomic read-modify-write is delegated to the [`LoyaltyStore`]
//! under the retry policy.

use std::sync::Arc;

use chrono::Utc;
use loyalty_shared::{Points, UserId};
use tracing::info;

use super::balance::Balance;
use super::withdrawal::Withdrawal;
use crate::error::LoyaltyError;
use crate::order::OrderNumber;
use crate::retry::RetryPolicy;
use crate::store::LoyaltyStore;

/// Reads and credits per-user balances.
#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn LoyaltyStore>,
    retry: RetryPolicy,
}

impl BalanceLedger {
    /// Creates a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LoyaltyStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Returns `{current, withdrawn}` for `user`.
    pub async fn read(&self, user: UserId) -> Result<Balance, LoyaltyError> {
        Ok(self.retry.call(|| self.store.read_balance(user)).await?)
    }

    /// Credits `amount` to `user` outside of any order resolution.
    ///
    /// Accrual credits never come through here; they commit together with
    /// the order's status change.
    pub async fn credit(&self, user: UserId, amount: Points) -> Result<Balance, LoyaltyError> {
        if !amount.is_positive() {
            return Err(LoyaltyError::NonPositiveAmount(amount));
        }
        let balance = self
            .retry
            .call(|| self.store.credit_balance(user, amount))
            .await?;
        info!(user = %user, amount = %amount, current = %balance.current, "Balance credited");
        Ok(balance)
    }
}

/// Spends points against caller-supplied order numbers.
#[derive(Clone)]
pub struct WithdrawalProcessor {
    store: Arc<dyn LoyaltyStore>,
    retry: RetryPolicy,
}

impl WithdrawalProcessor {
    /// Creates a processor over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LoyaltyStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Debits `amount` from `user` and records the withdrawal.
    ///
    /// # Errors
    ///
    /// * `LoyaltyError::NonPositiveAmount` before any storage access
    /// * `LoyaltyError::InsufficientFunds` with no effect on the balance
    /// * `LoyaltyError::WithdrawalConflict` if `number` was already used
    pub async fn withdraw(
        &self,
        user: UserId,
        number: &OrderNumber,
        amount: Points,
    ) -> Result<Withdrawal, LoyaltyError> {
        if !amount.is_positive() {
            return Err(LoyaltyError::NonPositiveAmount(amount));
        }

        let processed_at = Utc::now();
        let withdrawal = self
            .retry
            .call(|| {
                self.store
                    .debit_and_record_withdrawal(user, number, amount, processed_at)
            })
            .await?;

        info!(
            user = %user,
            order = %number,
            amount = %amount,
            "Withdrawal processed"
        );
        Ok(withdrawal)
    }

    /// Lists `user`'s withdrawals, oldest first.
    pub async fn list(&self, user: UserId) -> Result<Vec<Withdrawal>, LoyaltyError> {
        Ok(self.retry.call(|| self.store.list_withdrawals(user)).await?)
    }
}
