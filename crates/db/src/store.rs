//! `LoyaltyStore` backed by PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loyalty_core::ledger::{Balance, Withdrawal};
use loyalty_core::order::{Order, OrderNumber, OrderStatus, StatusUpdate};
use loyalty_core::{LoyaltyStore, StoreError};
use loyalty_shared::{Points, UserId};
use sea_orm::DatabaseConnection;
use tracing::instrument;

use crate::repositories::{OrderRepository, UserRepository, WithdrawalRepository};

/// PostgreSQL implementation of [`LoyaltyStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    users: UserRepository,
    orders: OrderRepository,
    withdrawals: WithdrawalRepository,
}

impl PgStore {
    /// Creates a store over an open connection pool.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            orders: OrderRepository::new(db.clone()),
            withdrawals: WithdrawalRepository::new(db),
        }
    }

    /// Order repository, for lookups outside the store trait.
    #[must_use]
    pub const fn orders(&self) -> &OrderRepository {
        &self.orders
    }
}

#[async_trait]
impl LoyaltyStore for PgStore {
    #[instrument(skip(self))]
    async fn create_user(&self, login: &str) -> Result<UserId, StoreError> {
        self.users.create(login).await
    }

    #[instrument(skip(self, number, uploaded_at), fields(number = %number))]
    async fn create_order(
        &self,
        owner: UserId,
        number: &OrderNumber,
        uploaded_at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        self.orders.create(owner, number, uploaded_at).await
    }

    #[instrument(skip(self, number, accrual), fields(number = %number))]
    async fn apply_accrual(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<StatusUpdate, StoreError> {
        self.orders.apply_accrual(number, status, accrual).await
    }

    #[instrument(skip(self))]
    async fn credit_balance(&self, user: UserId, amount: Points) -> Result<Balance, StoreError> {
        self.users.credit(user, amount).await
    }

    #[instrument(skip(self))]
    async fn read_balance(&self, user: UserId) -> Result<Balance, StoreError> {
        self.users.balance(user).await
    }

    #[instrument(skip(self, number, processed_at), fields(number = %number))]
    async fn debit_and_record_withdrawal(
        &self,
        user: UserId,
        number: &OrderNumber,
        amount: Points,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, StoreError> {
        self.withdrawals
            .debit_and_record(user, number, amount, processed_at)
            .await
    }

    #[instrument(skip(self))]
    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        self.orders.list_by_user(user).await
    }

    #[instrument(skip(self))]
    async fn list_withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>, StoreError> {
        self.withdrawals.list_by_user(user).await
    }

    #[instrument(skip(self))]
    async fn list_unresolved_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.orders.list_unresolved().await
    }
}
