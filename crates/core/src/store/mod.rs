//! Storage collaborator contract.
//!
//! The core never talks to a database directly. Every persistent effect goes
//! through [`LoyaltyStore`], whose implementations must make each mutating
//! call a single atomic unit and serialize conflicting updates per order and
//! per user.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loyalty_shared::{ErrorKind, FaultClass, Points, UserId};
use thiserror::Error;

use crate::ledger::{Balance, BalanceError, Withdrawal};
use crate::order::{Order, OrderError, OrderNumber, OrderStatus, StatusUpdate};
use crate::retry::TransientFault;

pub use memory::MemoryStore;

/// Closed set of failures a storage backend can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    // ========== Transient ==========
    /// Connection lost, refused, or pool exhausted.
    #[error("Storage connection failure: {0}")]
    Connection(String),

    /// The server is shutting down or cancelled the statement.
    #[error("Storage operator intervention: {0}")]
    OperatorIntervention(String),

    // ========== Constraints ==========
    /// The order number is already registered.
    #[error("Order {number} already exists")]
    OrderExists {
        /// The duplicate number.
        number: OrderNumber,
        /// True if the existing order belongs to the caller.
        same_owner: bool,
    },

    /// The withdrawal number has already been used.
    #[error("Withdrawal {0} already exists")]
    WithdrawalExists(OrderNumber),

    /// The login is already registered.
    #[error("Login {0:?} is already taken")]
    LoginTaken(String),

    // ========== Lookups ==========
    /// No such user.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// No such order.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderNumber),

    // ========== Domain ==========
    /// An order rule rejected the update.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// A balance rule rejected the update.
    #[error(transparent)]
    Balance(#[from] BalanceError),

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns the error kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) | Self::OperatorIntervention(_) => ErrorKind::TransientStorage,
            Self::OrderExists { .. } | Self::WithdrawalExists(_) | Self::LoginTaken(_) => {
                ErrorKind::ConstraintViolation
            }
            Self::UserNotFound(_) | Self::Balance(_) => ErrorKind::BusinessRule,
            Self::Order(err) => err.kind(),
            Self::OrderNotFound(_) | Self::Backend(_) => ErrorKind::Internal,
        }
    }
}

impl TransientFault for StoreError {
    fn fault_class(&self) -> Option<FaultClass> {
        match self {
            Self::Connection(_) => Some(FaultClass::ConnectionException),
            Self::OperatorIntervention(_) => Some(FaultClass::OperatorIntervention),
            _ => None,
        }
    }
}

/// Persistence operations the core depends on.
#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    /// Registers a user with zero balance.
    async fn create_user(&self, login: &str) -> Result<UserId, StoreError>;

    /// Inserts an order in status `NEW`.
    ///
    /// Fails with `StoreError::OrderExists` if the number is taken by anyone.
    async fn create_order(
        &self,
        owner: UserId,
        number: &OrderNumber,
        uploaded_at: DateTime<Utc>,
    ) -> Result<Order, StoreError>;

    /// Applies one accrual report to an order.
    ///
    /// The status change and any resulting balance credit commit together.
    /// Reports against a terminal order change nothing.
    async fn apply_accrual(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<StatusUpdate, StoreError>;

    /// Adds a positive amount to a user's spendable balance.
    async fn credit_balance(&self, user: UserId, amount: Points) -> Result<Balance, StoreError>;

    /// Reads a user's balance.
    async fn read_balance(&self, user: UserId) -> Result<Balance, StoreError>;

    /// Debits the balance and records the withdrawal in one atomic unit.
    ///
    /// Fails with `BalanceError::InsufficientFunds` (wrapped) without any
    /// effect when the balance is too low, or with
    /// `StoreError::WithdrawalExists` when the number was already used.
    async fn debit_and_record_withdrawal(
        &self,
        user: UserId,
        number: &OrderNumber,
        amount: Points,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, StoreError>;

    /// Lists a user's orders, newest first.
    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, StoreError>;

    /// Lists a user's withdrawals, oldest first.
    async fn list_withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>, StoreError>;

    /// Lists every order not yet in a terminal status, oldest first.
    async fn list_unresolved_orders(&self) -> Result<Vec<Order>, StoreError>;
}
