//! `SeaORM` entity definitions.

pub mod orders;
pub mod sea_orm_active_enums;
pub mod users;
pub mod withdrawals;
