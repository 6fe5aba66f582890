//! Test doubles for the storage and accrual collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loyalty_shared::{Points, UserId};

use crate::accrual::{AccrualAuthority, AccrualError, AccrualReport, AccrualStatus};
use crate::ledger::{Balance, Withdrawal};
use crate::order::{Order, OrderNumber, OrderStatus, StatusUpdate};
use crate::store::{LoyaltyStore, MemoryStore, StoreError};

/// One scripted answer of the accrual authority.
#[derive(Debug, Clone)]
pub enum Step {
    Report(AccrualStatus, Option<Points>),
    NotRegistered,
    RateLimited(Option<Duration>),
    Unavailable,
}

impl Step {
    pub fn processed(points: i64) -> Self {
        Self::Report(AccrualStatus::Processed, Some(Points::whole(points)))
    }

    pub const fn processing() -> Self {
        Self::Report(AccrualStatus::Processing, None)
    }

    pub const fn invalid() -> Self {
        Self::Report(AccrualStatus::Invalid, None)
    }
}

/// Authority that plays back a per-order script; the last step repeats.
#[derive(Debug, Default)]
pub struct ScriptedAuthority {
    scripts: Mutex<HashMap<OrderNumber, VecDeque<Step>>>,
    queries: AtomicUsize,
}

impl ScriptedAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, number: &OrderNumber, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(number.clone(), steps.into_iter().collect());
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn next_step(&self, number: &OrderNumber) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(number) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) => steps.front().cloned().unwrap_or(Step::NotRegistered),
            None => Step::NotRegistered,
        }
    }
}

#[async_trait]
impl AccrualAuthority for ScriptedAuthority {
    async fn query(&self, number: &OrderNumber) -> Result<AccrualReport, AccrualError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.next_step(number) {
            Step::Report(status, accrual) => Ok(AccrualReport {
                order: number.to_string(),
                status,
                accrual,
            }),
            Step::NotRegistered => Err(AccrualError::NotRegistered),
            Step::RateLimited(retry_after) => Err(AccrualError::RateLimited { retry_after }),
            Step::Unavailable => Err(AccrualError::UnexpectedStatus(503)),
        }
    }
}

/// Memory store that fails the next queued calls with injected errors.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failures: Mutex<VecDeque<StoreError>>,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: usize, err: &StoreError) {
        let mut failures = self.failures.lock().unwrap();
        failures.extend(std::iter::repeat_n(err.clone(), count));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn trip(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LoyaltyStore for FlakyStore {
    async fn create_user(&self, login: &str) -> Result<UserId, StoreError> {
        self.trip()?;
        self.inner.create_user(login).await
    }

    async fn create_order(
        &self,
        owner: UserId,
        number: &OrderNumber,
        uploaded_at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        self.trip()?;
        self.inner.create_order(owner, number, uploaded_at).await
    }

    async fn apply_accrual(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<StatusUpdate, StoreError> {
        self.trip()?;
        self.inner.apply_accrual(number, status, accrual).await
    }

    async fn credit_balance(&self, user: UserId, amount: Points) -> Result<Balance, StoreError> {
        self.trip()?;
        self.inner.credit_balance(user, amount).await
    }

    async fn read_balance(&self, user: UserId) -> Result<Balance, StoreError> {
        self.trip()?;
        self.inner.read_balance(user).await
    }

    async fn debit_and_record_withdrawal(
        &self,
        user: UserId,
        number: &OrderNumber,
        amount: Points,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, StoreError> {
        self.trip()?;
        self.inner
            .debit_and_record_withdrawal(user, number, amount, processed_at)
            .await
    }

    async fn list_orders(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        self.trip()?;
        self.inner.list_orders(user).await
    }

    async fn list_withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>, StoreError> {
        self.trip()?;
        self.inner.list_withdrawals(user).await
    }

    async fn list_unresolved_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.trip()?;
        self.inner.list_unresolved_orders().await
    }
}

pub fn number(raw: &str) -> OrderNumber {
    OrderNumber::parse(raw).unwrap()
}
