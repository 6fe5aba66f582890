//! Per-user balance arithmetic.
//!
//! Storage backends load a [`Balance`], apply [`Balance::credit`] or
//! [`Balance::debit`] while holding the user's row lock, and write it back.
//! Both operations either apply fully or leave the balance untouched.

use loyalty_shared::Points;
use serde::{Deserialize, Serialize};

use super::error::BalanceError;

/// A user's spendable balance and lifetime withdrawn total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Spendable points. Never negative.
    pub current: Points,
    /// Total points ever withdrawn.
    pub withdrawn: Points,
}

impl Balance {
    /// Creates a balance from stored totals.
    #[must_use]
    pub const fn new(current: Points, withdrawn: Points) -> Self {
        Self { current, withdrawn }
    }

    /// Adds `amount` to the spendable balance.
    ///
    /// # Errors
    ///
    /// Returns `BalanceError::NonPositiveAmount` unless `amount > 0`, and
    /// `BalanceError::Overflow` if the total would leave the decimal range.
    pub fn credit(&mut self, amount: Points) -> Result<(), BalanceError> {
        if !amount.is_positive() {
            return Err(BalanceError::NonPositiveAmount(amount));
        }
        self.current = self
            .current
            .checked_add(amount)
            .ok_or(BalanceError::Overflow(amount))?;
        Ok(())
    }

    /// Moves `amount` from the spendable balance to the withdrawn total.
    ///
    /// # Errors
    ///
    /// Returns `BalanceError::NonPositiveAmount` unless `amount > 0`, and
    /// `BalanceError::InsufficientFunds` if `current < amount`, and
    /// `BalanceError::Overflow` if the withdrawn total would overflow.
    pub fn debit(&mut self, amount: Points) -> Result<(), BalanceError> {
        if !amount.is_positive() {
            return Err(BalanceError::NonPositiveAmount(amount));
        }
        let remaining = self
            .current
            .checked_sub(amount)
            .ok_or(BalanceError::InsufficientFunds {
                available: self.current,
                requested: amount,
            })?;
        let withdrawn = self
            .withdrawn
            .checked_add(amount)
            .ok_or(BalanceError::Overflow(amount))?;
        self.current = remaining;
        self.withdrawn = withdrawn;
        Ok(())
    }
}
