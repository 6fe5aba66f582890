//! Loyalty accrual worker.
//!
//! Applies pending migrations, resumes reconciliation of every unresolved
//! order, then sweeps periodically until interrupted.

use std::sync::Arc;

use anyhow::Context;
use sea_orm_migration::MigratorTrait;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loyalty_core::{HttpAccrualClient, LoyaltyService};
use loyalty_db::{Migrator, PgStore, connect};
use loyalty_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loyalty=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect(&config.database).await?;
    info!("Connected to database");
    Migrator::up(&db, None).await?;

    let authority = HttpAccrualClient::new(&config.accrual)?;
    info!(address = %config.accrual.address, "Accrual authority configured");

    let service = LoyaltyService::new(
        Arc::new(PgStore::new(db)),
        Arc::new(authority),
        &config,
    );

    let mut sweep = interval(config.reconciler.sweep_interval());
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = sweep.tick() => match service.recover().await {
                Ok(started) if started > 0 => info!(started, "Resumed unresolved orders"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Recovery sweep failed"),
            },
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    info!("Shutting down, draining reconciliation tasks");
    service.shutdown().await;
    Ok(())
}
