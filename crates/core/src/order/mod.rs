//! Order registry: order numbers, the status state machine, and submission.

pub mod error;
pub mod number;
pub mod registry;
pub mod status;
pub mod types;

#[cfg(test)]
mod number_props;

pub use error::OrderError;
pub use number::{OrderNumber, luhn_valid};
pub use registry::OrderRegistry;
pub use status::{AccrualPlan, OrderStatus, OrderWorkflow, Transition};
pub use types::{Order, StatusUpdate, SubmitOutcome};
