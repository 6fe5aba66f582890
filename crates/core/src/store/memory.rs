//! In-process implementation of [`LoyaltyStore`].
//!
//! All state sits behind one async mutex, so every call is trivially atomic
//! and serialized. Used by tests and by single-process embeddings.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loyalty_shared::{Points, UserId};
use tokio::sync::Mutex;

use super::{LoyaltyStore, StoreError};
use crate::ledger::{Balance, Withdrawal};
use crate::order::{AccrualPlan, Order, OrderNumber, OrderStatus, OrderWorkflow, StatusUpdate};

#[derive(Debug)]
struct UserRow {
    login: String,
    balance: Balance,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserRow>,
    orders: Vec<Order>,
    order_index: HashMap<OrderNumber, usize>,
    withdrawals: Vec<Withdrawal>,
    withdrawal_numbers: HashSet<OrderNumber>,
}

impl State {
    fn user_mut(&mut self, user: UserId) -> Result<&mut UserRow, StoreError> {
        self.users
            .get_mut(&user)
            .ok_or(StoreError::UserNotFound(user))
    }
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of one order, if present.
    pub async fn order(&self, number: &OrderNumber) -> Option<Order> {
        let state = self.state.lock().await;
        state
            .order_index
            .get(number)
            .map(|&index| state.orders[index].clone())
    }
}

#[async_trait]
impl LoyaltyStore for MemoryStore {
    async fn create_user(&self, login: &str) -> Result<UserId, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|row| row.login == login) {
            return Err(StoreError::LoginTaken(login.to_string()));
        }
        let id = UserId::new();
        state.users.insert(
            id,
            UserRow {
                login: login.to_string(),
                balance: Balance::default(),
            },
        );
        Ok(id)
    }

    async fn create_order(
        &self,
        owner: UserId,
        number: &OrderNumber,
        uploaded_at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&owner) {
            return Err(StoreError::UserNotFound(owner));
        }
        if let Some(&index) = state.order_index.get(number) {
            return Err(StoreError::OrderExists {
                number: number.clone(),
                same_owner: state.orders[index].owner == owner,
            });
        }

        let order = Order::submitted(owner, number.clone(), uploaded_at);
        let index = state.orders.len();
        state.orders.push(order.clone());
        state.order_index.insert(number.clone(), index);
        Ok(order)
    }

    async fn apply_accrual(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<StatusUpdate, StoreError> {
        let mut state = self.state.lock().await;
        let index = *state
            .order_index
            .get(number)
            .ok_or_else(|| StoreError::OrderNotFound(number.clone()))?;
        let (owner, previous) = {
            let order = &state.orders[index];
            (order.owner, order.status)
        };

        let plan = OrderWorkflow::plan(previous, status, accrual)?;
        let AccrualPlan::Write {
            status: next,
            accrual,
            credit,
        } = plan
        else {
            return Ok(StatusUpdate {
                owner,
                previous,
                current: previous,
                credited: None,
            });
        };

        if let Some(amount) = credit {
            state.user_mut(owner)?.balance.credit(amount)?;
        }
        let order = &mut state.orders[index];
        order.status = next;
        order.accrual = accrual;

        Ok(StatusUpdate {
            owner,
            previous,
            current: next,
            credited: credit,
        })
    }

    async fn credit_balance(&self, user: UserId, amount: Points) -> Result<Balance, StoreError> {
        let mut state = self.state.lock().await;
        let row = state.user_mut(user)?;
        row.balance.credit(amount)?;
        Ok(row.balance)
    }

    async fn read_balance(&self, user: UserId) -> Result<Balance, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.user_mut(user)?.balance)
    }

    async fn debit_and_record_withdrawal(
        &self,
        user: UserId,
        number: &OrderNumber,
        amount: Points,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, StoreError> {
        let mut state = self.state.lock().await;
        if state.withdrawal_numbers.contains(number) {
            return Err(StoreError::WithdrawalExists(number.clone()));
        }

        let row = state.user_mut(user)?;
        let mut balance = row.balance;
        balance.debit(amount)?;
        row.balance = balance;

        let withdrawal = Withdrawal::new(user, number.clone(), amount, processed_at);
        state.withdrawal_numbers.insert(number.clone());
        state.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .rev()
            .filter(|order| order.owner == user)
            .cloned()
            .collect();
        // Stable: equal timestamps keep reverse insertion order.
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(orders)
    }

    async fn list_withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>, StoreError> {
        let state = self.state.lock().await;
        let mut withdrawals: Vec<Withdrawal> = state
            .withdrawals
            .iter()
            .filter(|withdrawal| withdrawal.owner == user)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| a.processed_at.cmp(&b.processed_at));
        Ok(withdrawals)
    }

    async fn list_unresolved_orders(&self) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|order| !order.status.is_terminal())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(orders)
    }
}
