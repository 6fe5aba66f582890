//! Property-based tests for balance arithmetic.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::balance::Balance;
use super::error::BalanceError;
use loyalty_shared::Points;

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Points> {
    (1i64..1_000_000i64).prop_map(|cents| Points::new(Decimal::new(cents, 2)))
}

#[derive(Debug, Clone)]
enum Op {
    Credit(Points),
    Debit(Points),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        positive_amount().prop_map(Op::Credit),
        positive_amount().prop_map(Op::Debit),
    ]
}

proptest! {
    /// Final current = credits - successful debits, and never negative.
    #[test]
    fn test_interleaved_credit_debit_conserves_points(ops in prop::collection::vec(op(), 0..64)) {
        let mut balance = Balance::default();
        let mut credited = Points::ZERO;
        let mut debited = Points::ZERO;

        for op in ops {
            match op {
                Op::Credit(amount) => {
                    balance.credit(amount).unwrap();
                    credited += amount;
                }
                Op::Debit(amount) => {
                    if balance.debit(amount).is_ok() {
                        debited += amount;
                    }
                }
            }
            prop_assert!(!balance.current.is_negative());
        }

        prop_assert_eq!(balance.current, credited - debited);
        prop_assert_eq!(balance.withdrawn, debited);
    }

    /// A debit above the balance fails without any effect.
    #[test]
    fn test_overdraft_has_no_effect(
        current in positive_amount(),
        extra in positive_amount(),
        withdrawn in positive_amount(),
    ) {
        let mut balance = Balance::new(current, withdrawn);
        let requested = current + extra;

        let result = balance.debit(requested);

        prop_assert_eq!(
            result,
            Err(BalanceError::InsufficientFunds { available: current, requested })
        );
        prop_assert_eq!(balance, Balance::new(current, withdrawn));
    }
}
