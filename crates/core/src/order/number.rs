//! Order numbers and the Luhn checksum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::OrderError;

/// A validated purchase-order number.
///
/// Holds a non-empty string of ASCII digits that passes the Luhn checksum.
/// Leading zeros are significant: the number is never parsed as an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Parses and validates an order number.
    ///
    /// Surrounding whitespace is ignored, as request bodies often carry a
    /// trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains a non-digit, or fails
    /// the Luhn checksum.
    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        let digits = raw.trim();
        if digits.is_empty() {
            return Err(OrderError::Empty);
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderError::NonDigit(digits.to_string()));
        }
        if !luhn_valid(digits) {
            return Err(OrderError::ChecksumMismatch(digits.to_string()));
        }
        Ok(Self(digits.to_string()))
    }

    /// Returns the digits as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Checks a digit string against the Luhn checksum.
///
/// The rightmost digit is the check digit and is not doubled; every second
/// digit moving left from it is doubled, with 9 subtracted from results above
/// 9. The number is valid when the sum is a multiple of 10. Non-digit input is
/// never valid.
#[must_use]
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }

    let mut sum = 0u32;
    for (position, byte) in digits.bytes().rev().enumerate() {
        if !byte.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(byte - b'0');
        if position % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum = (sum + digit) % 10;
    }
    sum == 0
}

impl FromStr for OrderNumber {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
