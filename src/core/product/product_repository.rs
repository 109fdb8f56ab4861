//! Types and functions for loading products.
//!
//! # Examples
//!
//! ```rust
//! # use garage_sale::core::product::product_repository::{InMemoryProductStore, ProductStore};
//! # tokio_test::block_on(async {
//! let store = InMemoryProductStore::new(garage_sale::core::product::demo_products());
//! let products = store.list_products().await.unwrap();
//! assert_eq!(2, products.len());
//! assert_eq!("Comic Books", products[0].name);
//! # });
//! ```

use crate::infra::{database::DbPool, error::ApiResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, Instrument};

/// Something we sell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    /// The product's name.
    pub name: String,
    /// Price in the smallest currency unit.
    pub cost: i32,
    /// How many are in stock.
    pub quantity: i32,
}

impl Product {
    /// Constructs a new [`Product`].
    pub fn new(name: impl Into<String>, cost: i32, quantity: i32) -> Self {
        Self {
            name: name.into(),
            cost,
            quantity,
        }
    }
}

/// Anything that can list products.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProductStore {
    /// Lists every product, in whatever order the backing store returns them.
    async fn list_products(&self) -> ApiResult<Vec<Product>>;
}

/// A shared handle to some [`ProductStore`].
pub type DynProductStore = Arc<dyn ProductStore + Send + Sync>;

/// A product store backed by PostgreSQL.
#[derive(Clone, Debug)]
pub struct PgProductStore {
    db: DbPool,
}

impl PgProductStore {
    /// Creates a new store.
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl ProductStore for PgProductStore {
    #[instrument(skip(self))]
    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        tracing::debug!("Listing products");
        let products = sqlx::query_as::<_, Product>(
            r#"
                SELECT name, cost, quantity FROM products
            "#,
        )
        .fetch_all(&self.db)
        .instrument(tracing::info_span!("fetch_all"))
        .await?;
        tracing::debug!("Listed {} products", products.len());
        Ok(products)
    }
}

/// A fixed list of products held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryProductStore {
    products: Vec<Product>,
}

impl InMemoryProductStore {
    /// Creates a store that always returns `products`.
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[async_trait::async_trait]
impl ProductStore for InMemoryProductStore {
    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        Ok(self.products.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::error::ApiError;

    #[test]
    fn product_serializes_with_lowercase_fields() {
        let json = serde_json::to_value(Product::new("Comic Books", 75, 50)).unwrap();
        assert_eq!(
            serde_json::json!({"name": "Comic Books", "cost": 75, "quantity": 50}),
            json
        );
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let store = InMemoryProductStore::default();
        assert!(store.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mock_store_surfaces_errors() {
        let mut store = MockProductStore::new();
        store
            .expect_list_products()
            .times(1)
            .returning(|| Err(ApiError::Store(sqlx::Error::PoolClosed)));
        let result = store.list_products().await;
        assert!(matches!(result, Err(ApiError::Store(sqlx::Error::PoolClosed))));
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL instance at DATABASE_URL"]
    async fn lists_every_row(db: DbPool) {
        sqlx::query("INSERT INTO products (name, cost, quantity) VALUES ($1, $2, $3), ($4, $5, $6)")
            .bind("Lamp")
            .bind(40)
            .bind(3)
            .bind("Rug")
            .bind(90)
            .bind(1)
            .execute(&db)
            .await
            .unwrap();

        let mut products = PgProductStore::new(db).list_products().await.unwrap();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(vec![Product::new("Lamp", 40, 3), Product::new("Rug", 90, 1)], products);
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL instance at DATABASE_URL"]
    async fn empty_table_lists_nothing(db: DbPool) {
        let products = PgProductStore::new(db).list_products().await.unwrap();
        assert!(products.is_empty());
    }
}
