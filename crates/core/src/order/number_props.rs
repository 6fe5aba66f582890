//! Property-based tests for order number validation.

use proptest::prelude::*;

use super::error::OrderError;
use super::number::{OrderNumber, luhn_valid};

/// Appends the unique digit that makes `payload` Luhn-valid.
fn with_check_digit(payload: &str) -> String {
    (0..10)
        .map(|d| format!("{payload}{d}"))
        .find(|candidate| luhn_valid(candidate))
        .unwrap()
}

proptest! {
    /// Exactly one check digit completes any payload.
    #[test]
    fn test_exactly_one_check_digit(payload in "[0-9]{0,24}") {
        let valid = (0..10)
            .filter(|d| luhn_valid(&format!("{payload}{d}")))
            .count();
        prop_assert_eq!(valid, 1);
    }

    /// A completed number parses and keeps its digits verbatim.
    #[test]
    fn test_completed_numbers_parse(payload in "[0-9]{1,24}") {
        let raw = with_check_digit(&payload);
        let number = OrderNumber::parse(&raw).unwrap();
        prop_assert_eq!(number.as_str(), raw.as_str());
    }

    /// Changing any single digit breaks the checksum.
    #[test]
    fn test_single_digit_error_detected(
        payload in "[0-9]{1,24}",
        position in any::<prop::sample::Index>(),
        delta in 1u8..10,
    ) {
        let raw = with_check_digit(&payload);
        let mut bytes = raw.into_bytes();
        let i = position.index(bytes.len());
        bytes[i] = b'0' + (bytes[i] - b'0' + delta) % 10;
        let corrupted = String::from_utf8(bytes).unwrap();

        prop_assert!(matches!(
            OrderNumber::parse(&corrupted),
            Err(OrderError::ChecksumMismatch(_))
        ));
    }

    /// Anything with a non-digit is rejected before the checksum.
    #[test]
    fn test_non_digits_rejected(raw in "[0-9]{0,8}[a-zA-Z.,-][0-9]{0,8}") {
        prop_assert!(matches!(
            OrderNumber::parse(&raw),
            Err(OrderError::NonDigit(_))
        ));
    }
}
