//! Shared types, errors, and configuration for the loyalty backend.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - The `Points` amount type with decimal precision
//! - The closed error taxonomy shared by every layer
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{ErrorKind, FaultClass};
pub use types::{OrderId, Points, UserId, WithdrawalId};
