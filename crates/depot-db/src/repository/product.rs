//! # Product Repository
//!
//! Catalog products and the default filter set of each machine product.
//!
//! ## Filter Sets
//! ```text
//! products                        product_filters
//! ┌──────────┬─────────┐          ┌────────────┬───────────┬─────┐
//! │ RO-500   │ machine │◄─────────│ machine    │ filter    │ qty │
//! │ FLT-SED  │ filter  │◄────┐    ├────────────┼───────────┼─────┤
//! │ FLT-CTO  │ filter  │◄─┐  └────│ RO-500     │ FLT-SED   │  2  │
//! └──────────┴─────────┘  └───────│ RO-500     │ FLT-CTO   │  1  │
//!                                 └────────────┴───────────┴─────┘
//! ```
//! Completing a sale of one RO-500 installs two sediment and one carbon
//! filter in the new machine.

use std::collections::HashMap;

use chrono::Utc;
use depot_core::machine::MAX_LIFESPAN_DAYS;
use depot_core::validation::{validate_name, validate_price_cents, validate_sku};
use depot_core::{Product, ProductFilter, ProductKind, ValidationError};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::new_id;
use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, sku, name, kind, price_cents, low_stock_threshold, \
     filter_lifespan_days, is_active, created_at, updated_at";

/// Input for a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub price_cents: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub filter_lifespan_days: Option<i64>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// Filters must carry a lifespan; other kinds must not.
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        validate_sku(&input.sku)?;
        validate_name("name", &input.name, 200)?;
        validate_price_cents("price", input.price_cents)?;
        if input.low_stock_threshold < 0 {
            return Err(ValidationError::OutOfRange {
                field: "low_stock_threshold".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        match (input.kind, input.filter_lifespan_days) {
            (ProductKind::Filter, Some(days)) if (1..=MAX_LIFESPAN_DAYS).contains(&days) => {}
            (ProductKind::Filter, _) => {
                return Err(ValidationError::OutOfRange {
                    field: "filter_lifespan_days".to_string(),
                    min: 1,
                    max: MAX_LIFESPAN_DAYS,
                }
                .into())
            }
            (_, Some(_)) => {
                return Err(ValidationError::NotAllowed {
                    field: "filter_lifespan_days".to_string(),
                    allowed: vec!["(empty for non-filter products)".to_string()],
                }
                .into())
            }
            (_, None) => {}
        }

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            kind: input.kind,
            price_cents: input.price_cents,
            low_stock_threshold: input.low_stock_threshold,
            filter_lifespan_days: input.filter_lifespan_days,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, kind = %product.kind, "Inserting product");

        sqlx::query(
            "INSERT INTO products (id, sku, name, kind, price_cents, low_stock_threshold, \
                 filter_lifespan_days, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.kind)
        .bind(product.price_cents)
        .bind(product.low_stock_threshold)
        .bind(product.filter_lifespan_days)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.sku),
            other => other,
        })?;

        Ok(product)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists products, optionally of one kind, ordered by SKU.
    pub async fn list(&self, kind: Option<ProductKind>) -> DbResult<Vec<Product>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        if let Some(kind) = kind {
            query.push(" WHERE kind = ").push_bind(kind);
        }
        query.push(" ORDER BY sku");

        let products = query.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Counts products (used by seeding to avoid duplicates).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Replaces the default filter set of a machine product.
    ///
    /// `filters` are `(filter_product_id, quantity)` pairs.
    pub async fn set_filter_set(&self, machine_product_id: &str, filters: &[(String, i64)]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let machine = fetch_kind(&mut tx, machine_product_id).await?;
        if machine != ProductKind::Machine {
            return Err(ValidationError::NotAllowed {
                field: "machine product kind".to_string(),
                allowed: vec![ProductKind::Machine.to_string()],
            }
            .into());
        }

        sqlx::query("DELETE FROM product_filters WHERE machine_product_id = ?1")
            .bind(machine_product_id)
            .execute(&mut *tx)
            .await?;

        for (filter_product_id, quantity) in filters {
            if *quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "filter quantity".to_string(),
                }
                .into());
            }
            if fetch_kind(&mut tx, filter_product_id).await? != ProductKind::Filter {
                return Err(ValidationError::NotAllowed {
                    field: "filter product kind".to_string(),
                    allowed: vec![ProductKind::Filter.to_string()],
                }
                .into());
            }

            sqlx::query(
                "INSERT INTO product_filters (machine_product_id, filter_product_id, quantity) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(machine_product_id, filter_product_id) \
                 DO UPDATE SET quantity = quantity + excluded.quantity",
            )
            .bind(machine_product_id)
            .bind(filter_product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(machine_product_id = %machine_product_id, filters = filters.len(), "Filter set updated");
        Ok(())
    }

    /// Default filter set of a machine product.
    pub async fn filter_set(&self, machine_product_id: &str) -> DbResult<Vec<ProductFilter>> {
        let mut conn = self.pool.acquire().await?;
        let mut sets = filter_sets(&mut conn, &[machine_product_id.to_string()]).await?;
        Ok(sets.remove(machine_product_id).unwrap_or_default())
    }
}

async fn fetch_kind(conn: &mut SqliteConnection, product_id: &str) -> DbResult<ProductKind> {
    sqlx::query_scalar::<_, ProductKind>("SELECT kind FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))
}

/// Filter sets of several machine products, keyed by machine product id.
pub(crate) async fn filter_sets(
    conn: &mut SqliteConnection,
    machine_product_ids: &[String],
) -> DbResult<HashMap<String, Vec<ProductFilter>>> {
    let mut sets: HashMap<String, Vec<ProductFilter>> = HashMap::new();
    if machine_product_ids.is_empty() {
        return Ok(sets);
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT pf.machine_product_id, pf.filter_product_id, pf.quantity, \
             COALESCE(p.filter_lifespan_days, 0) AS lifespan_days \
         FROM product_filters pf \
         JOIN products p ON p.id = pf.filter_product_id \
         WHERE pf.machine_product_id IN (",
    );
    let mut ids = query.separated(", ");
    for id in machine_product_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(") ORDER BY p.sku");

    let rows = query
        .build_query_as::<ProductFilter>()
        .fetch_all(&mut *conn)
        .await?;

    for row in rows {
        sets.entry(row.machine_product_id.clone()).or_default().push(row);
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::setup;

    #[tokio::test]
    async fn test_filter_set_round_trip() {
        let fx = setup().await;
        let set = fx.db.products().filter_set(&fx.machine).await.unwrap();

        assert_eq!(set.len(), 2);
        let sediment = set.iter().find(|f| f.filter_product_id == fx.sediment).unwrap();
        assert_eq!(sediment.quantity, 2);
        assert_eq!(sediment.lifespan_days, 180);
    }

    #[tokio::test]
    async fn test_filter_set_rejects_wrong_kinds() {
        let fx = setup().await;
        let products = fx.db.products();

        let not_machine = products.set_filter_set(&fx.part, &[(fx.sediment.clone(), 1)]).await;
        assert!(not_machine.is_err());

        let not_filter = products.set_filter_set(&fx.machine, &[(fx.part.clone(), 1)]).await;
        assert!(not_filter.is_err());

        // the failed call left the previous set intact
        assert_eq!(products.filter_set(&fx.machine).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_filter_products_need_lifespan() {
        let fx = setup().await;
        let result = fx
            .db
            .products()
            .create(&NewProduct {
                sku: "FLT-X".into(),
                name: "No lifespan".into(),
                kind: ProductKind::Filter,
                price_cents: 100,
                low_stock_threshold: 0,
                filter_lifespan_days: None,
            })
            .await;
        assert!(matches!(result, Err(DbError::Core(_))));

        assert_eq!(fx.db.products().list(Some(ProductKind::Filter)).await.unwrap().len(), 2);
        assert_eq!(fx.db.products().count().await.unwrap(), 4);
    }
}
