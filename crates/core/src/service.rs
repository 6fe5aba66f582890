//! Service facade over the loyalty core.
//!
//! [`LoyaltyService`] is the single entry point a transport layer calls. It is
//! built from explicitly passed collaborators; nothing is global.

use std::sync::Arc;

use loyalty_shared::{AppConfig, Points, UserId};
use tracing::info;

use crate::accrual::AccrualAuthority;
use crate::error::LoyaltyError;
use crate::ledger::{Balance, BalanceLedger, Withdrawal, WithdrawalProcessor};
use crate::order::{Order, OrderNumber, OrderRegistry, SubmitOutcome};
use crate::reconcile::{Reconciler, ReconcilerSettings};
use crate::retry::RetryPolicy;
use crate::store::LoyaltyStore;

/// Order submission, balances and withdrawals for authenticated users.
#[derive(Clone)]
pub struct LoyaltyService {
    store: Arc<dyn LoyaltyStore>,
    retry: RetryPolicy,
    registry: OrderRegistry,
    ledger: BalanceLedger,
    withdrawals: WithdrawalProcessor,
    reconciler: Reconciler,
}

impl LoyaltyService {
    /// Wires the core from configuration.
    #[must_use]
    pub fn new(
        store: Arc<dyn LoyaltyStore>,
        authority: Arc<dyn AccrualAuthority>,
        config: &AppConfig,
    ) -> Self {
        Self::with_parts(
            store,
            authority,
            RetryPolicy::from_config(&config.retry),
            ReconcilerSettings::from_config(config),
        )
    }

    /// Wires the core from explicit parts.
    #[must_use]
    pub fn with_parts(
        store: Arc<dyn LoyaltyStore>,
        authority: Arc<dyn AccrualAuthority>,
        retry: RetryPolicy,
        settings: ReconcilerSettings,
    ) -> Self {
        let registry = OrderRegistry::new(Arc::clone(&store), retry.clone());
        let ledger = BalanceLedger::new(Arc::clone(&store), retry.clone());
        let withdrawals = WithdrawalProcessor::new(Arc::clone(&store), retry.clone());
        let reconciler = Reconciler::new(registry.clone(), authority, settings);
        Self {
            store,
            retry,
            registry,
            ledger,
            withdrawals,
            reconciler,
        }
    }

    /// Registers a user with a zero balance.
    pub async fn register_user(&self, login: &str) -> Result<UserId, LoyaltyError> {
        let user = self.retry.call(|| self.store.create_user(login)).await?;
        info!(user = %user, "User registered");
        Ok(user)
    }

    /// Submits an order number and starts reconciling it in the background.
    ///
    /// Returns as soon as the order is stored; the accrual arrives later.
    ///
    /// # Errors
    ///
    /// * `LoyaltyError::InvalidOrderNumber` before any storage access
    /// * `LoyaltyError::OrderConflict` if another user owns the number
    pub async fn submit(&self, user: UserId, raw: &str) -> Result<SubmitOutcome, LoyaltyError> {
        let number = OrderNumber::parse(raw).map_err(LoyaltyError::InvalidOrderNumber)?;
        let outcome = self.registry.submit(user, &number).await?;
        if let SubmitOutcome::Accepted(order) = &outcome {
            self.reconciler.spawn(order.number.clone());
        }
        Ok(outcome)
    }

    /// Lists the user's orders, newest first. Empty if none.
    pub async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, LoyaltyError> {
        self.registry.list_for_user(user).await
    }

    /// Returns the user's spendable and withdrawn totals.
    pub async fn get_balance(&self, user: UserId) -> Result<Balance, LoyaltyError> {
        self.ledger.read(user).await
    }

    /// Spends `amount` points against the order number `raw`.
    ///
    /// # Errors
    ///
    /// * `LoyaltyError::InvalidOrderNumber` or `NonPositiveAmount` before any
    ///   storage access
    /// * `LoyaltyError::InsufficientFunds` with no effect on the balance
    /// * `LoyaltyError::WithdrawalConflict` if the number was already used
    pub async fn withdraw(
        &self,
        user: UserId,
        raw: &str,
        amount: Points,
    ) -> Result<Withdrawal, LoyaltyError> {
        let number = OrderNumber::parse(raw).map_err(LoyaltyError::InvalidOrderNumber)?;
        self.withdrawals.withdraw(user, &number, amount).await
    }

    /// Lists the user's withdrawals, oldest first. Empty if none.
    pub async fn list_withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>, LoyaltyError> {
        self.withdrawals.list(user).await
    }

    /// Resumes reconciliation of every unresolved order.
    pub async fn recover(&self) -> Result<usize, LoyaltyError> {
        self.reconciler.recover().await
    }

    /// Stops reconciliation and waits for running tasks to finish.
    pub async fn shutdown(&self) {
        self.reconciler.shutdown().await;
    }

    /// The balance ledger, for credits outside order resolution.
    #[must_use]
    pub const fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    /// The background reconciler.
    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}
