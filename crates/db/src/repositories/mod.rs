//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Every method returns the core's `StoreError`, already classified.

pub mod order;
pub mod user;
pub mod withdrawal;

pub use order::OrderRepository;
pub use user::UserRepository;
pub use withdrawal::WithdrawalRepository;
