//! `SeaORM` active enums mapped to PostgreSQL enum types.

use loyalty_core::order::OrderStatus as DomainStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "order_status")]
pub enum OrderStatus {
    #[sea_orm(string_value = "NEW")]
    New,
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "INVALID")]
    Invalid,
    #[sea_orm(string_value = "PROCESSED")]
    Processed,
}

impl From<OrderStatus> for DomainStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::New => Self::New,
            OrderStatus::Processing => Self::Processing,
            OrderStatus::Invalid => Self::Invalid,
            OrderStatus::Processed => Self::Processed,
        }
    }
}

impl From<DomainStatus> for OrderStatus {
    fn from(status: DomainStatus) -> Self {
        match status {
            DomainStatus::New => Self::New,
            DomainStatus::Processing => Self::Processing,
            DomainStatus::Invalid => Self::Invalid,
            DomainStatus::Processed => Self::Processed,
        }
    }
}
