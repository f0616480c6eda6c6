//! Applies (or with `down`, rolls back) the fulfillment schema.
use anyhow::Context;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use stateset_fulfillment::{config, db, migrator::Migrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(&cfg.log_level, cfg.log_json);

    let pool = db::establish_connection_with_config(&db::DbConfig::from(&cfg)).await?;

    match std::env::args().nth(1).as_deref() {
        Some("down") => {
            info!("Rolling back the last migration");
            Migrator::down(&pool, Some(1)).await?;
        }
        Some("status") => {
            Migrator::status(&pool).await?;
        }
        _ => db::run_migrations(&pool).await?,
    }

    info!("Migration completed successfully");
    Ok(())
}
