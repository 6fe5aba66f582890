//! Initial schema: users with balances, orders, withdrawals.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ENUMS_SQL).await?;
        db.execute_unprepared(TABLES_SQL).await?;
        db.execute_unprepared(INDEXES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r"
            DROP TABLE IF EXISTS withdrawals CASCADE;
            DROP TABLE IF EXISTS orders CASCADE;
            DROP TABLE IF EXISTS users CASCADE;
            DROP TYPE IF EXISTS order_status;
            ",
        )
        .await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE order_status AS ENUM ('NEW', 'PROCESSING', 'INVALID', 'PROCESSED');
";

const TABLES_SQL: &str = r"
-- One row per user; the balance lives on the user row so a row lock
-- serializes every credit and debit for that user.
CREATE TABLE users (
    id UUID PRIMARY KEY,
    login VARCHAR(255) NOT NULL,
    current_balance NUMERIC NOT NULL DEFAULT 0,
    withdrawn_total NUMERIC NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_users_login UNIQUE (login),
    CONSTRAINT chk_users_balance_non_negative CHECK (current_balance >= 0),
    CONSTRAINT chk_users_withdrawn_non_negative CHECK (withdrawn_total >= 0)
);

CREATE TABLE orders (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id),
    number VARCHAR(64) NOT NULL,
    status order_status NOT NULL DEFAULT 'NEW',
    accrual NUMERIC NOT NULL DEFAULT 0,
    uploaded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_orders_number UNIQUE (number),
    CONSTRAINT chk_orders_number_digits CHECK (number ~ '^[0-9]+$'),
    CONSTRAINT chk_orders_accrual_non_negative CHECK (accrual >= 0),
    CONSTRAINT chk_orders_accrual_only_processed CHECK (status = 'PROCESSED' OR accrual = 0)
);

-- Withdrawal numbers are unique among withdrawals only.
CREATE TABLE withdrawals (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id),
    number VARCHAR(64) NOT NULL,
    amount NUMERIC NOT NULL,
    processed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_withdrawals_number UNIQUE (number),
    CONSTRAINT chk_withdrawals_number_digits CHECK (number ~ '^[0-9]+$'),
    CONSTRAINT chk_withdrawals_amount_positive CHECK (amount > 0)
);
";

const INDEXES_SQL: &str = r"
-- Listing a user's orders, newest first
CREATE INDEX idx_orders_user_uploaded ON orders(user_id, uploaded_at DESC);

-- Recovery sweep over orders still awaiting accrual
CREATE INDEX idx_orders_unresolved ON orders(uploaded_at)
    WHERE status IN ('NEW', 'PROCESSING');

-- Listing a user's withdrawals, oldest first
CREATE INDEX idx_withdrawals_user_processed ON withdrawals(user_id, processed_at);
";
