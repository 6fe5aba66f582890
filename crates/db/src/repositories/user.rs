//! User repository: registration and balances.

use chrono::Utc;
use loyalty_core::StoreError;
use loyalty_core::ledger::Balance;
use loyalty_shared::{Points, UserId};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QuerySelect, Set,
    TransactionTrait,
};
use tracing::debug;

use crate::entities::users;
use crate::error::{classify, is_unique_violation};

/// User repository for registration and balance operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a user with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LoginTaken` if the login is registered, or a
    /// classified database error.
    pub async fn create(&self, login: &str) -> Result<UserId, StoreError> {
        let id = UserId::new();
        let user = users::ActiveModel {
            id: Set(id.into_inner()),
            login: Set(login.to_string()),
            current_balance: Set(Decimal::ZERO),
            withdrawn_total: Set(Decimal::ZERO),
            created_at: Set(Utc::now().into()),
        };

        match user.insert(&self.db).await {
            Ok(_) => Ok(id),
            Err(err) if is_unique_violation(&err) => Err(StoreError::LoginTaken(login.to_string())),
            Err(err) => Err(classify(err)),
        }
    }

    /// Reads a user's balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UserNotFound` or a classified database error.
    pub async fn balance(&self, user: UserId) -> Result<Balance, StoreError> {
        let row = users::Entity::find_by_id(user.into_inner())
            .one(&self.db)
            .await
            .map_err(classify)?
            .ok_or(StoreError::UserNotFound(user))?;
        Ok(to_balance(&row))
    }

    /// Adds `amount` to a user's spendable balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UserNotFound`, a wrapped `BalanceError` for
    /// non-positive amounts, or a classified database error.
    pub async fn credit(&self, user: UserId, amount: Points) -> Result<Balance, StoreError> {
        let txn = self.db.begin().await.map_err(classify)?;

        let row = Self::lock(&txn, user).await?;
        let mut balance = to_balance(&row);
        balance.credit(amount)?;
        Self::save_balance(&txn, row, balance).await?;

        txn.commit().await.map_err(classify)?;
        debug!(user = %user, amount = %amount, "Balance credited");
        Ok(balance)
    }

    /// Loads a user row with `SELECT ... FOR UPDATE`.
    ///
    /// Every balance change goes through this lock, which serializes credits
    /// and debits per user.
    pub(crate) async fn lock<C: ConnectionTrait>(
        conn: &C,
        user: UserId,
    ) -> Result<users::Model, StoreError> {
        users::Entity::find_by_id(user.into_inner())
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(classify)?
            .ok_or(StoreError::UserNotFound(user))
    }

    /// Writes `balance` back to a locked user row.
    pub(crate) async fn save_balance<C: ConnectionTrait>(
        conn: &C,
        row: users::Model,
        balance: Balance,
    ) -> Result<(), StoreError> {
        let mut active: users::ActiveModel = row.into();
        active.current_balance = Set(balance.current.amount());
        active.withdrawn_total = Set(balance.withdrawn.amount());
        active.update(conn).await.map_err(classify)?;
        Ok(())
    }
}

pub(crate) fn to_balance(row: &users::Model) -> Balance {
    Balance::new(
        Points::new(row.current_balance),
        Points::new(row.withdrawn_total),
    )
}
