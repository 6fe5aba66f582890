//! External accrual authority: wire types, errors and the HTTP client.

pub mod client;
pub mod types;

pub use client::{AccrualAuthority, HttpAccrualClient, interpret_response};
pub use types::{AccrualError, AccrualReport, AccrualStatus};
