//! Common types used across the application.

pub mod id;
pub mod points;


pub use id::*;
pub use points::Points;
