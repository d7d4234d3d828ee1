//! # Stock-In Repository
//!
//! Goods received into a warehouse.
//!
//! ```text
//!   create()  ──► StockIn { pending } + items
//!   receive() ──► BEGIN
//!                 pending ──► received   (depot-core workflow)
//!                 stock::increment() per product  (movement: stock_in)
//!                 COMMIT
//!   cancel()  ──► pending ──► cancelled   (no stock effect)
//! ```

use chrono::Utc;
use depot_core::ledger::{self, MovementType, StockLine};
use depot_core::validation::{validate_line_count, validate_price_cents};
use depot_core::{StockIn, StockInItem, StockInStatus, Workflow};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::stock::{self, Movement};
use super::{lock_row, new_id, next_document_number};
use crate::error::{DbError, DbResult};

const REFERENCE_TYPE: &str = "stock_in";

const HEADER_COLUMNS: &str =
    "id, reference_no, warehouse_id, supplier, status, notes, created_by, created_at, received_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewStockInItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStockIn {
    pub warehouse_id: String,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewStockInItem>,
}

/// A stock-in with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct StockInDetail {
    #[serde(flatten)]
    pub stock_in: StockIn,
    pub items: Vec<StockInItem>,
}

#[derive(Debug, Clone)]
pub struct StockInRepository {
    pool: SqlitePool,
}

impl StockInRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockInRepository { pool }
    }

    /// Records a pending stock-in. Stock is untouched until [`Self::receive`].
    pub async fn create(&self, input: &NewStockIn, created_by: Option<&str>) -> DbResult<StockInDetail> {
        validate_line_count(input.items.len())?;
        let lines: Vec<StockLine> = input
            .items
            .iter()
            .map(|i| StockLine::new(&i.product_id, i.quantity))
            .collect();
        ledger::merge_lines(&lines)?;
        for item in &input.items {
            validate_price_cents("unit_cost", item.unit_cost_cents)?;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let stock_in = StockIn {
            id: new_id(),
            reference_no: next_document_number(&mut tx, "stock_ins", "reference_no", "SI", now).await?,
            warehouse_id: input.warehouse_id.clone(),
            supplier: input.supplier.clone(),
            status: StockInStatus::Pending,
            notes: input.notes.clone(),
            created_by: created_by.map(str::to_string),
            created_at: now,
            received_at: None,
        };

        sqlx::query(
            "INSERT INTO stock_ins (id, reference_no, warehouse_id, supplier, status, notes, \
                 created_by, created_at, received_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&stock_in.id)
        .bind(&stock_in.reference_no)
        .bind(&stock_in.warehouse_id)
        .bind(&stock_in.supplier)
        .bind(stock_in.status)
        .bind(&stock_in.notes)
        .bind(&stock_in.created_by)
        .bind(stock_in.created_at)
        .bind(stock_in.received_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = StockInItem {
                id: new_id(),
                stock_in_id: stock_in.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_cost_cents: line.unit_cost_cents,
            };
            sqlx::query(
                "INSERT INTO stock_in_items (id, stock_in_id, product_id, quantity, unit_cost_cents) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&item.id)
            .bind(&item.stock_in_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .execute(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;

        info!(id = %stock_in.id, reference_no = %stock_in.reference_no, lines = items.len(), "Stock-in created");
        Ok(StockInDetail { stock_in, items })
    }

    pub async fn get(&self, id: &str) -> DbResult<StockInDetail> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    /// Most recent stock-ins first.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<StockIn>> {
        let rows = sqlx::query_as::<_, StockIn>(&format!(
            "SELECT {HEADER_COLUMNS} FROM stock_ins ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Receives the goods: every product's balance goes up in one transaction.
    pub async fn receive(&self, id: &str, user: Option<&str>) -> DbResult<StockInDetail> {
        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "stock_ins", id).await?;
        let mut detail = load(&mut tx, id).await?;
        let next = detail.stock_in.status.transition(StockInStatus::Received)?;

        let lines: Vec<StockLine> = detail
            .items
            .iter()
            .map(|i| StockLine::new(&i.product_id, i.quantity))
            .collect();
        for line in ledger::merge_lines(&lines)? {
            let movement = Movement::new(MovementType::StockIn)
                .reference(REFERENCE_TYPE, id)
                .by(user);
            stock::increment(&mut tx, &line.product_id, &detail.stock_in.warehouse_id, line.quantity, movement)
                .await?;
        }

        let now = Utc::now();
        set_status(&mut tx, id, detail.stock_in.status, next, Some(now)).await?;
        tx.commit().await?;

        detail.stock_in.status = next;
        detail.stock_in.received_at = Some(now);

        info!(id = %id, reference_no = %detail.stock_in.reference_no, "Stock-in received");
        Ok(detail)
    }

    pub async fn cancel(&self, id: &str) -> DbResult<StockInDetail> {
        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "stock_ins", id).await?;
        let mut detail = load(&mut tx, id).await?;
        let next = detail.stock_in.status.transition(StockInStatus::Cancelled)?;
        set_status(&mut tx, id, detail.stock_in.status, next, None).await?;
        tx.commit().await?;

        detail.stock_in.status = next;
        info!(id = %id, "Stock-in cancelled");
        Ok(detail)
    }
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<StockInDetail> {
    let stock_in = sqlx::query_as::<_, StockIn>(&format!(
        "SELECT {HEADER_COLUMNS} FROM stock_ins WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("StockIn", id))?;

    let items = sqlx::query_as::<_, StockInItem>(
        "SELECT id, stock_in_id, product_id, quantity, unit_cost_cents \
         FROM stock_in_items WHERE stock_in_id = ?1 ORDER BY rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(StockInDetail { stock_in, items })
}

async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: StockInStatus,
    to: StockInStatus,
    received_at: Option<chrono::DateTime<Utc>>,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE stock_ins SET status = ?1, received_at = COALESCE(?2, received_at) \
         WHERE id = ?3 AND status = ?4",
    )
    .bind(to)
    .bind(received_at)
    .bind(id)
    .bind(from)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(depot_core::CoreError::invalid_transition(StockInStatus::ENTITY, from, to).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::setup;
    use depot_core::CoreError;

    fn order(fx: &crate::repository::fixtures::Fixture) -> NewStockIn {
        NewStockIn {
            warehouse_id: fx.main.clone(),
            supplier: Some("AquaParts Ltd".into()),
            notes: None,
            items: vec![
                NewStockInItem {
                    product_id: fx.sediment.clone(),
                    quantity: 10,
                    unit_cost_cents: 900,
                },
                NewStockInItem {
                    product_id: fx.machine.clone(),
                    quantity: 3,
                    unit_cost_cents: 30_000,
                },
                NewStockInItem {
                    product_id: fx.sediment.clone(),
                    quantity: 5,
                    unit_cost_cents: 900,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_receive_increments_and_writes_ledger() {
        let fx = setup().await;
        let created = fx.db.stock_ins().create(&order(&fx), None).await.unwrap();
        assert_eq!(created.stock_in.status, StockInStatus::Pending);
        assert!(created.stock_in.reference_no.starts_with("SI-"));
        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 0);

        let received = fx
            .db
            .stock_ins()
            .receive(&created.stock_in.id, Some("user-1"))
            .await
            .unwrap();
        assert_eq!(received.stock_in.status, StockInStatus::Received);
        assert!(received.stock_in.received_at.is_some());

        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 15);
        assert_eq!(fx.db.stock().balance(&fx.machine, &fx.main).await.unwrap(), 3);

        // one ledger row per product, duplicates merged
        let movements = fx
            .db
            .stock()
            .movements_for(REFERENCE_TYPE, &created.stock_in.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.movement_type == MovementType::StockIn));
        assert!(movements.iter().all(|m| m.created_by.as_deref() == Some("user-1")));
    }

    #[tokio::test]
    async fn test_receive_twice_is_rejected() {
        let fx = setup().await;
        let created = fx.db.stock_ins().create(&order(&fx), None).await.unwrap();
        fx.db.stock_ins().receive(&created.stock_in.id, None).await.unwrap();

        let again = fx.db.stock_ins().receive(&created.stock_in.id, None).await;
        assert!(matches!(again, Err(DbError::Core(CoreError::InvalidTransition { .. }))));
        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_cancelled_stock_in_cannot_be_received() {
        let fx = setup().await;
        let created = fx.db.stock_ins().create(&order(&fx), None).await.unwrap();
        let cancelled = fx.db.stock_ins().cancel(&created.stock_in.id).await.unwrap();
        assert_eq!(cancelled.stock_in.status, StockInStatus::Cancelled);

        assert!(fx.db.stock_ins().receive(&created.stock_in.id, None).await.is_err());
        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reference_numbers_are_sequential() {
        let fx = setup().await;
        let a = fx.db.stock_ins().create(&order(&fx), None).await.unwrap();
        let b = fx.db.stock_ins().create(&order(&fx), None).await.unwrap();
        assert!(a.stock_in.reference_no.ends_with("-0001"));
        assert!(b.stock_in.reference_no.ends_with("-0002"));
        assert_eq!(fx.db.stock_ins().list(10).await.unwrap().len(), 2);
    }
}
