//! Balance ledger and withdrawals.
//!
//! - [`Balance`]: credit/debit arithmetic that never goes negative
//! - [`Withdrawal`]: append-only spend records
//! - [`BalanceLedger`] and [`WithdrawalProcessor`]: store-backed operations

pub mod balance;
pub mod error;
pub mod service;
pub mod withdrawal;

#[cfg(test)]
mod balance_props;

pub use balance::Balance;
pub use error::BalanceError;
pub use service::{BalanceLedger, WithdrawalProcessor};
pub use withdrawal::Withdrawal;
