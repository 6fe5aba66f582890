//! Withdrawal repository.

use chrono::{DateTime, Utc};
use loyalty_core::StoreError;
use loyalty_core::ledger::Withdrawal;
use loyalty_core::order::OrderNumber;
use loyalty_shared::{Points, UserId, WithdrawalId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::debug;

use super::user::{UserRepository, to_balance};
use crate::entities::withdrawals;
use crate::error::{classify, is_unique_violation};

/// Withdrawal repository: debits and the withdrawal ledger.
#[derive(Debug, Clone)]
pub struct WithdrawalRepository {
    db: DatabaseConnection,
}

impl WithdrawalRepository {
    /// Creates a new withdrawal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Debits the user's balance and inserts the withdrawal in one transaction.
    ///
    /// # Errors
    ///
    /// * `StoreError::WithdrawalExists` if `number` was already used
    /// * a wrapped `BalanceError::InsufficientFunds` with nothing written
    /// * `StoreError::UserNotFound` for unknown users
    pub async fn debit_and_record(
        &self,
        user: UserId,
        number: &OrderNumber,
        amount: Points,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, StoreError> {
        let txn = self.db.begin().await.map_err(classify)?;

        let row = UserRepository::lock(&txn, user).await?;

        let used = withdrawals::Entity::find()
            .filter(withdrawals::Column::Number.eq(number.as_str()))
            .one(&txn)
            .await
            .map_err(classify)?;
        if used.is_some() {
            return Err(StoreError::WithdrawalExists(number.clone()));
        }

        let mut balance = to_balance(&row);
        balance.debit(amount)?;
        UserRepository::save_balance(&txn, row, balance).await?;

        let withdrawal = withdrawals::ActiveModel {
            id: Set(WithdrawalId::new().into_inner()),
            user_id: Set(user.into_inner()),
            number: Set(number.to_string()),
            amount: Set(amount.amount()),
            processed_at: Set(processed_at.into()),
        }
        .insert(&txn)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::WithdrawalExists(number.clone())
            } else {
                classify(err)
            }
        })?;

        txn.commit().await.map_err(classify)?;
        debug!(user = %user, order = %number, amount = %amount, "Withdrawal recorded");

        to_withdrawal(withdrawal)
    }

    /// Lists a user's withdrawals, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a classified database error.
    pub async fn list_by_user(&self, user: UserId) -> Result<Vec<Withdrawal>, StoreError> {
        withdrawals::Entity::find()
            .filter(withdrawals::Column::UserId.eq(user.into_inner()))
            .order_by_asc(withdrawals::Column::ProcessedAt)
            .order_by_asc(withdrawals::Column::Id)
            .all(&self.db)
            .await
            .map_err(classify)?
            .into_iter()
            .map(to_withdrawal)
            .collect()
    }
}

fn to_withdrawal(model: withdrawals::Model) -> Result<Withdrawal, StoreError> {
    let number = OrderNumber::parse(&model.number).map_err(|err| {
        StoreError::Backend(format!("stored withdrawal number {:?}: {err}", model.number))
    })?;
    Ok(Withdrawal {
        id: WithdrawalId::from_uuid(model.id),
        owner: UserId::from_uuid(model.user_id),
        number,
        amount: Points::new(model.amount),
        processed_at: model.processed_at.with_timezone(&Utc),
    })
}
