//! Schema migrations and demo data.

use super::product::{demo_products, product_repository::Product};
use crate::infra::database::DbPool;
use sqlx::migrate::{MigrateError, Migrator};
use tracing::instrument;

/// Migrations embedded from `./migrations`, applied in version order.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// An error from an admin command.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// A migration failed to apply.
    #[error("applying migrations: {0}")]
    Migrate(#[from] MigrateError),
    /// Seed data could not be inserted.
    #[error("applying seed data: {0}")]
    Seed(#[from] sqlx::Error),
}

/// Applies every pending migration.
///
/// Already applied migrations are skipped, so running this twice is a no-op.
#[instrument(skip(db))]
pub async fn migrate(db: &DbPool) -> Result<(), AdminError> {
    MIGRATOR.run(db).await?;
    Ok(())
}

/// Inserts the demo products.
///
/// Rows are upserted by name inside one transaction, so reseeding restores
/// the demo values instead of duplicating them.
#[instrument(skip(db))]
pub async fn seed(db: &DbPool) -> Result<(), AdminError> {
    let mut tx = db.begin().await?;
    for Product {
        name,
        cost,
        quantity,
    } in demo_products()
    {
        tracing::debug!("Seeding {}", name);
        sqlx::query(
            r#"
                INSERT INTO products (name, cost, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (name) DO UPDATE
                SET cost = EXCLUDED.cost, quantity = EXCLUDED.quantity
            "#,
        )
        .bind(name)
        .bind(cost)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}
