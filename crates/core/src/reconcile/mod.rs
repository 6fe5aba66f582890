//! Accrual reconciliation: one supervised task per unresolved order.

pub mod reconciler;

#[cfg(test)]
mod tests;

pub use reconciler::{Reconciler, ReconcilerSettings};
