//! # Stock Repository
//!
//! Warehouse balances and the movement ledger.
//!
//! ## The Only Two Ways a Balance Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  increment(conn, product, warehouse, qty, movement)                     │
//! │    INSERT .. ON CONFLICT DO UPDATE quantity = quantity + qty            │
//! │    RETURNING quantity                       ──► stock_movements (+qty)  │
//! │                                                                         │
//! │  decrement(conn, product, warehouse, qty, movement)                     │
//! │    UPDATE .. SET quantity = quantity - qty                              │
//! │    WHERE .. AND quantity >= qty                                         │
//! │    RETURNING quantity                       ──► stock_movements (−qty)  │
//! │      └── no row? ──► CoreError::InsufficientStock, caller rolls back    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both run on the caller's transaction. The availability check and the
//! write are one statement, so two concurrent dispatches can never both
//! take the last unit.

use chrono::{DateTime, Utc};
use depot_core::ledger::{self, MovementType};
use depot_core::{MovementLine, StockLevel, StockMovement, ValidationError, MAX_LINE_QUANTITY};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::new_id;
use crate::error::{DbError, DbResult};

const LEVEL_SELECT: &str = "SELECT s.product_id, p.sku, p.name AS product_name, \
         s.warehouse_id, w.code AS warehouse_code, w.name AS warehouse_name, \
         s.quantity, p.low_stock_threshold \
     FROM stocks s \
     JOIN products p ON p.id = s.product_id \
     JOIN warehouses w ON w.id = s.warehouse_id";

const MOVEMENT_SELECT: &str = "SELECT m.id, m.product_id, m.warehouse_id, m.movement_type, \
         m.quantity, m.balance_after, m.reference_type, m.reference_id, m.note, \
         m.created_by, m.created_at, \
         p.sku, p.name AS product_name, w.code AS warehouse_code \
     FROM stock_movements m \
     JOIN products p ON p.id = m.product_id \
     JOIN warehouses w ON w.id = m.warehouse_id";

// =============================================================================
// Ledger Primitives
// =============================================================================

/// Who and what caused a movement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Movement<'a> {
    pub movement_type: MovementType,
    pub reference_type: Option<&'a str>,
    pub reference_id: Option<&'a str>,
    pub note: Option<&'a str>,
    pub created_by: Option<&'a str>,
}

impl<'a> Movement<'a> {
    pub fn new(movement_type: MovementType) -> Self {
        Movement {
            movement_type,
            reference_type: None,
            reference_id: None,
            note: None,
            created_by: None,
        }
    }

    pub fn reference(mut self, kind: &'a str, id: &'a str) -> Self {
        self.reference_type = Some(kind);
        self.reference_id = Some(id);
        self
    }

    pub fn note(mut self, note: Option<&'a str>) -> Self {
        self.note = note;
        self
    }

    pub fn by(mut self, user: Option<&'a str>) -> Self {
        self.created_by = user;
        self
    }
}

/// Adds `quantity` to a balance, creating the row if needed.
pub(crate) async fn increment(
    conn: &mut SqliteConnection,
    product_id: &str,
    warehouse_id: &str,
    quantity: i64,
    movement: Movement<'_>,
) -> DbResult<StockMovement> {
    let now = Utc::now();

    let balance: i64 = sqlx::query_scalar(
        "INSERT INTO stocks (id, product_id, warehouse_id, quantity, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(product_id, warehouse_id) \
         DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at \
         RETURNING quantity",
    )
    .bind(new_id())
    .bind(product_id)
    .bind(warehouse_id)
    .bind(quantity)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    record(conn, product_id, warehouse_id, quantity, balance, movement, now).await
}

/// Takes `quantity` from a balance, or fails without touching it.
pub(crate) async fn decrement(
    conn: &mut SqliteConnection,
    product_id: &str,
    warehouse_id: &str,
    quantity: i64,
    movement: Movement<'_>,
) -> DbResult<StockMovement> {
    let now = Utc::now();

    let balance: Option<i64> = sqlx::query_scalar(
        "UPDATE stocks SET quantity = quantity - ?1, updated_at = ?2 \
         WHERE product_id = ?3 AND warehouse_id = ?4 AND quantity >= ?1 \
         RETURNING quantity",
    )
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .bind(warehouse_id)
    .fetch_optional(&mut *conn)
    .await?;

    match balance {
        Some(balance) => {
            record(conn, product_id, warehouse_id, -quantity, balance, movement, now).await
        }
        None => {
            let available = balance_on(conn, product_id, warehouse_id).await?;
            let sku: Option<String> = sqlx::query_scalar("SELECT sku FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;
            let sku = sku.ok_or_else(|| DbError::not_found("Product", product_id))?;

            debug!(sku = %sku, available, requested = quantity, "Stock decrement refused");
            ledger::apply_delta(&sku, available, -quantity)?;
            // the conditional update and the re-read disagree; only possible
            // if something outside this transaction wrote the row
            Err(DbError::TransactionFailed(format!(
                "stock for {sku} changed during decrement"
            )))
        }
    }
}

async fn balance_on(conn: &mut SqliteConnection, product_id: &str, warehouse_id: &str) -> DbResult<i64> {
    let quantity: Option<i64> =
        sqlx::query_scalar("SELECT quantity FROM stocks WHERE product_id = ?1 AND warehouse_id = ?2")
            .bind(product_id)
            .bind(warehouse_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(quantity.unwrap_or(0))
}

async fn record(
    conn: &mut SqliteConnection,
    product_id: &str,
    warehouse_id: &str,
    delta: i64,
    balance_after: i64,
    movement: Movement<'_>,
    at: DateTime<Utc>,
) -> DbResult<StockMovement> {
    let row = StockMovement {
        id: new_id(),
        product_id: product_id.to_string(),
        warehouse_id: warehouse_id.to_string(),
        movement_type: movement.movement_type,
        quantity: delta,
        balance_after,
        reference_type: movement.reference_type.map(str::to_string),
        reference_id: movement.reference_id.map(str::to_string),
        note: movement.note.map(str::to_string),
        created_by: movement.created_by.map(str::to_string),
        created_at: at,
    };

    sqlx::query(
        "INSERT INTO stock_movements (id, product_id, warehouse_id, movement_type, quantity, \
             balance_after, reference_type, reference_id, note, created_by, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&row.id)
    .bind(&row.product_id)
    .bind(&row.warehouse_id)
    .bind(row.movement_type)
    .bind(row.quantity)
    .bind(row.balance_after)
    .bind(&row.reference_type)
    .bind(&row.reference_id)
    .bind(&row.note)
    .bind(&row.created_by)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(row)
}

// =============================================================================
// Repository
// =============================================================================

/// Filters for the movement history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub movement_type: Option<MovementType>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    /// Chronological order (reports) instead of newest first (history).
    #[serde(default)]
    pub oldest_first: bool,
}

/// Repository for balances and the movement ledger.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Current balance; 0 when the product was never stocked there.
    pub async fn balance(&self, product_id: &str, warehouse_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        balance_on(&mut conn, product_id, warehouse_id).await
    }

    /// All balances, optionally for one warehouse.
    pub async fn levels(&self, warehouse_id: Option<&str>) -> DbResult<Vec<StockLevel>> {
        let mut query = QueryBuilder::<Sqlite>::new(LEVEL_SELECT);
        if let Some(warehouse_id) = warehouse_id {
            query.push(" WHERE s.warehouse_id = ").push_bind(warehouse_id);
        }
        query.push(" ORDER BY p.sku, w.code");

        let levels = query.build_query_as::<StockLevel>().fetch_all(&self.pool).await?;
        Ok(levels)
    }

    /// Balances at or below their product's low-stock threshold.
    pub async fn low_stock(&self) -> DbResult<Vec<StockLevel>> {
        self.low_stock_for(&[]).await
    }

    /// Low balances of the given products only; empty means all products.
    pub async fn low_stock_for(&self, product_ids: &[String]) -> DbResult<Vec<StockLevel>> {
        let mut query = QueryBuilder::<Sqlite>::new(LEVEL_SELECT);
        query.push(" WHERE p.low_stock_threshold > 0 AND s.quantity <= p.low_stock_threshold");
        if !product_ids.is_empty() {
            query.push(" AND s.product_id IN (");
            let mut ids = query.separated(", ");
            for id in product_ids {
                ids.push_bind(id.as_str());
            }
            ids.push_unseparated(")");
        }
        query.push(" ORDER BY s.quantity, p.sku");

        let levels: Vec<StockLevel> = query.build_query_as().fetch_all(&self.pool).await?;
        debug_assert!(levels.iter().all(StockLevel::is_low));
        Ok(levels)
    }

    /// Manual correction by a signed delta.
    pub async fn adjust(
        &self,
        product_id: &str,
        warehouse_id: &str,
        delta: i64,
        note: Option<&str>,
        user: Option<&str>,
    ) -> DbResult<StockMovement> {
        if delta == 0 {
            return Err(ValidationError::MustBePositive {
                field: "adjustment".to_string(),
            }
            .into());
        }
        if delta.unsigned_abs() > MAX_LINE_QUANTITY.unsigned_abs() {
            return Err(ValidationError::OutOfRange {
                field: "adjustment".to_string(),
                min: -MAX_LINE_QUANTITY,
                max: MAX_LINE_QUANTITY,
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let movement = Movement::new(MovementType::Adjustment).note(note).by(user);
        let row = if delta > 0 {
            increment(&mut tx, product_id, warehouse_id, delta, movement).await?
        } else {
            decrement(&mut tx, product_id, warehouse_id, -delta, movement).await?
        };
        tx.commit().await?;

        info!(
            product_id = %product_id,
            warehouse_id = %warehouse_id,
            delta,
            balance = row.balance_after,
            "Stock adjusted"
        );
        Ok(row)
    }

    /// Movement history with product and warehouse codes.
    pub async fn movements(&self, filter: &MovementFilter) -> DbResult<Vec<MovementLine>> {
        let mut query = QueryBuilder::<Sqlite>::new(MOVEMENT_SELECT);
        query.push(" WHERE 1 = 1");
        if let Some(product_id) = &filter.product_id {
            query.push(" AND m.product_id = ").push_bind(product_id.as_str());
        }
        if let Some(warehouse_id) = &filter.warehouse_id {
            query.push(" AND m.warehouse_id = ").push_bind(warehouse_id.as_str());
        }
        if let Some(movement_type) = filter.movement_type {
            query.push(" AND m.movement_type = ").push_bind(movement_type);
        }
        if let Some(from) = filter.from {
            query.push(" AND m.created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND m.created_at < ").push_bind(to);
        }
        if filter.oldest_first {
            query.push(" ORDER BY m.created_at, m.rowid");
        } else {
            query.push(" ORDER BY m.created_at DESC, m.rowid DESC");
        }
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit.clamp(1, 10_000));
        }

        let rows = query.build_query_as::<MovementLine>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Movements written for one document, oldest first.
    pub async fn movements_for(&self, reference_type: &str, reference_id: &str) -> DbResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            "SELECT id, product_id, warehouse_id, movement_type, quantity, balance_after, \
                 reference_type, reference_id, note, created_by, created_at \
             FROM stock_movements \
             WHERE reference_type = ?1 AND reference_id = ?2 \
             ORDER BY created_at, rowid",
        )
        .bind(reference_type)
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::setup;
    use depot_core::CoreError;

    #[tokio::test]
    async fn test_adjust_up_and_down() {
        let fx = setup().await;
        let stock = fx.db.stock();

        let up = stock.adjust(&fx.part, &fx.main, 10, Some("count"), None).await.unwrap();
        assert_eq!(up.balance_after, 10);

        let down = stock.adjust(&fx.part, &fx.main, -4, None, None).await.unwrap();
        assert_eq!(down.quantity, -4);
        assert_eq!(down.balance_after, 6);
        assert_eq!(stock.balance(&fx.part, &fx.main).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_adjust_out_of_range_is_refused() {
        let fx = setup().await;
        let stock = fx.db.stock();
        stock.adjust(&fx.part, &fx.main, 3, None, None).await.unwrap();

        for delta in [i64::MIN, i64::MAX, -(MAX_LINE_QUANTITY + 1), MAX_LINE_QUANTITY + 1] {
            let err = stock.adjust(&fx.part, &fx.main, delta, None, None).await.unwrap_err();
            assert!(
                matches!(err, DbError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))),
                "delta {delta}: {err:?}"
            );
        }
        assert_eq!(stock.balance(&fx.part, &fx.main).await.unwrap(), 3);

        let max = stock.adjust(&fx.part, &fx.main, MAX_LINE_QUANTITY, None, None).await.unwrap();
        assert_eq!(max.balance_after, MAX_LINE_QUANTITY + 3);
        assert_eq!(stock.movements(&MovementFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_adjust_below_zero_is_refused() {
        let fx = setup().await;
        let stock = fx.db.stock();
        stock.adjust(&fx.part, &fx.main, 3, None, None).await.unwrap();

        let err = stock.adjust(&fx.part, &fx.main, -5, None, None).await.unwrap_err();
        match err {
            DbError::Core(CoreError::InsufficientStock { sku, available, requested }) => {
                assert_eq!(sku, "TAP-01");
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(stock.balance(&fx.part, &fx.main).await.unwrap(), 3);

        let history = stock.movements(&MovementFilter::default()).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_low_stock() {
        let fx = setup().await;
        let stock = fx.db.stock();
        // threshold 5
        stock.adjust(&fx.sediment, &fx.main, 5, None, None).await.unwrap();
        stock.adjust(&fx.sediment, &fx.branch, 6, None, None).await.unwrap();
        // threshold 0: never low
        stock.adjust(&fx.part, &fx.main, 1, None, None).await.unwrap();

        let low = stock.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].warehouse_code, "MAIN");

        assert!(stock.low_stock_for(&[fx.part.clone()]).await.unwrap().is_empty());
        assert_eq!(stock.levels(Some(&fx.main)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_movement_filters() {
        let fx = setup().await;
        let stock = fx.db.stock();
        stock.adjust(&fx.part, &fx.main, 2, None, None).await.unwrap();
        stock.adjust(&fx.sediment, &fx.main, 2, None, None).await.unwrap();
        stock.adjust(&fx.part, &fx.main, 1, None, None).await.unwrap();

        let filter = MovementFilter {
            product_id: Some(fx.part.clone()),
            oldest_first: true,
            ..Default::default()
        };
        let rows = stock.movements(&filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sku, "TAP-01");
        assert_eq!(rows[0].movement.balance_after, 2);
        assert_eq!(rows[1].movement.balance_after, 3);
    }
}
