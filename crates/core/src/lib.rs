//! Core business logic for the loyalty-points backend.
//!
//! This crate has ZERO database or web dependencies. Storage and the external
//! accrual authority are reached through the [`LoyaltyStore`] and
//! [`AccrualAuthority`] traits.
//!
//! # Modules
//!
//! - `order` - Order numbers, Luhn validation, the status state machine
//! - `ledger` - Balances and withdrawals
//! - `retry` - Bounded retry of storage calls on transient faults
//! - `accrual` - The accrual authority client
//! - `reconcile` - Background polling of unresolved orders
//! - `store` - The storage contract and an in-memory implementation
//! - `service` - The facade exposed to a transport layer

pub mod accrual;
pub mod error;
pub mod ledger;
pub mod order;
pub mod reconcile;
pub mod retry;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use accrual::{AccrualAuthority, HttpAccrualClient};
pub use error::LoyaltyError;
pub use service::LoyaltyService;
pub use store::{LoyaltyStore, StoreError};
