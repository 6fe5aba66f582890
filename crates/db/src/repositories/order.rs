//! Order repository: registration, accrual application and listings.

use chrono::{DateTime, Utc};
use loyalty_core::StoreError;
use loyalty_core::order::{
    AccrualPlan, Order, OrderNumber, OrderStatus, OrderWorkflow, StatusUpdate,
};
use loyalty_shared::{OrderId, Points, UserId};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use super::user::{UserRepository, to_balance};
use crate::entities::{orders, sea_orm_active_enums};
use crate::error::{classify, is_foreign_key_violation, is_unique_violation};

/// Order repository for registration and status updates.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    db: DatabaseConnection,
}

impl OrderRepository {
    /// Creates a new order repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an order in status `NEW`.
    ///
    /// # Errors
    ///
    /// * `StoreError::OrderExists` if the number is taken, telling whether by
    ///   `owner` or by someone else
    /// * `StoreError::UserNotFound` if `owner` does not exist
    pub async fn create(
        &self,
        owner: UserId,
        number: &OrderNumber,
        uploaded_at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let order = orders::ActiveModel {
            id: Set(OrderId::new().into_inner()),
            user_id: Set(owner.into_inner()),
            number: Set(number.to_string()),
            status: Set(sea_orm_active_enums::OrderStatus::New),
            accrual: Set(Decimal::ZERO),
            uploaded_at: Set(uploaded_at.into()),
            updated_at: Set(uploaded_at.into()),
        };

        match order.insert(&self.db).await {
            Ok(model) => to_order(model),
            Err(err) if is_unique_violation(&err) => {
                let existing = self.find_by_number(number).await?;
                match existing {
                    Some(existing) => Err(StoreError::OrderExists {
                        number: number.clone(),
                        same_owner: existing.owner == owner,
                    }),
                    None => Err(classify(err)),
                }
            }
            Err(err) if is_foreign_key_violation(&err) => Err(StoreError::UserNotFound(owner)),
            Err(err) => Err(classify(err)),
        }
    }

    /// Finds an order by number.
    ///
    /// # Errors
    ///
    /// Returns a classified database error.
    pub async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        orders::Entity::find()
            .filter(orders::Column::Number.eq(number.as_str()))
            .one(&self.db)
            .await
            .map_err(classify)?
            .map(to_order)
            .transpose()
    }

    /// Applies one accrual report inside a single transaction.
    ///
    /// The order row is locked first, then the owner's row if a credit is
    /// due. Reports that change nothing roll back without writing.
    ///
    /// # Errors
    ///
    /// * `StoreError::OrderNotFound` for unknown numbers
    /// * a wrapped `OrderError` for rejected transitions or negative accruals
    pub async fn apply_accrual(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Option<Points>,
    ) -> Result<StatusUpdate, StoreError> {
        let txn = self.db.begin().await.map_err(classify)?;

        let order = orders::Entity::find()
            .filter(orders::Column::Number.eq(number.as_str()))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(classify)?
            .ok_or_else(|| StoreError::OrderNotFound(number.clone()))?;
        let owner = UserId::from_uuid(order.user_id);
        let previous: OrderStatus = order.status.into();

        let AccrualPlan::Write {
            status: next,
            accrual,
            credit,
        } = OrderWorkflow::plan(previous, status, accrual)?
        else {
            return Ok(StatusUpdate {
                owner,
                previous,
                current: previous,
                credited: None,
            });
        };

        if let Some(amount) = credit {
            let row = UserRepository::lock(&txn, owner).await?;
            let mut balance = to_balance(&row);
            balance.credit(amount)?;
            UserRepository::save_balance(&txn, row, balance).await?;
        }

        let mut active: orders::ActiveModel = order.into();
        active.status = Set(next.into());
        active.accrual = Set(accrual.amount());
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await.map_err(classify)?;

        txn.commit().await.map_err(classify)?;
        debug!(order = %number, from = %previous, to = %next, "Accrual applied");

        Ok(StatusUpdate {
            owner,
            previous,
            current: next,
            credited: credit,
        })
    }

    /// Lists a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns a classified database error.
    pub async fn list_by_user(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        orders::Entity::find()
            .filter(orders::Column::UserId.eq(user.into_inner()))
            .order_by_desc(orders::Column::UploadedAt)
            .order_by_desc(orders::Column::Id)
            .all(&self.db)
            .await
            .map_err(classify)?
            .into_iter()
            .map(to_order)
            .collect()
    }

    /// Lists orders in `NEW` or `PROCESSING`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a classified database error.
    pub async fn list_unresolved(&self) -> Result<Vec<Order>, StoreError> {
        orders::Entity::find()
            .filter(orders::Column::Status.is_in([
                sea_orm_active_enums::OrderStatus::New,
                sea_orm_active_enums::OrderStatus::Processing,
            ]))
            .order_by_asc(orders::Column::UploadedAt)
            .order_by_asc(orders::Column::Id)
            .all(&self.db)
            .await
            .map_err(classify)?
            .into_iter()
            .map(to_order)
            .collect()
    }
}

fn to_order(model: orders::Model) -> Result<Order, StoreError> {
    let number = OrderNumber::parse(&model.number).map_err(|err| {
        StoreError::Backend(format!("stored order number {:?}: {err}", model.number))
    })?;
    Ok(Order {
        id: OrderId::from_uuid(model.id),
        owner: UserId::from_uuid(model.user_id),
        number,
        status: model.status.into(),
        accrual: Points::new(model.accrual),
        uploaded_at: model.uploaded_at.with_timezone(&Utc),
    })
}
