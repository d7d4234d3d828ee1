//! # Stock-Out Repository
//!
//! Goods leaving a warehouse outside of a sale (returns to supplier,
//! internal use, write-offs).
//!
//! ```text
//!   dispatch() ──► BEGIN
//!                  pending ──► dispatched
//!                  stock::decrement() per product   (movement: stock_out)
//!                    └── any line short? ──► InsufficientStock, ROLLBACK
//!                  COMMIT
//! ```

use chrono::{DateTime, Utc};
use depot_core::ledger::{self, MovementType, StockLine};
use depot_core::validation::validate_line_count;
use depot_core::{CoreError, StockOut, StockOutItem, StockOutStatus, Workflow};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use super::stock::{self, Movement};
use super::{lock_row, new_id, next_document_number};
use crate::error::{DbError, DbResult};

const REFERENCE_TYPE: &str = "stock_out";

const HEADER_COLUMNS: &str =
    "id, reference_no, warehouse_id, recipient, reason, status, created_by, created_at, dispatched_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewStockOutItem {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStockOut {
    pub warehouse_id: String,
    pub recipient: Option<String>,
    pub reason: Option<String>,
    pub items: Vec<NewStockOutItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockOutDetail {
    #[serde(flatten)]
    pub stock_out: StockOut,
    pub items: Vec<StockOutItem>,
}

impl StockOutDetail {
    /// Distinct products on this document.
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.items.iter().map(|i| i.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone)]
pub struct StockOutRepository {
    pool: SqlitePool,
}

impl StockOutRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockOutRepository { pool }
    }

    pub async fn create(&self, input: &NewStockOut, created_by: Option<&str>) -> DbResult<StockOutDetail> {
        validate_line_count(input.items.len())?;
        let lines: Vec<StockLine> = input
            .items
            .iter()
            .map(|i| StockLine::new(&i.product_id, i.quantity))
            .collect();
        ledger::merge_lines(&lines)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let stock_out = StockOut {
            id: new_id(),
            reference_no: next_document_number(&mut tx, "stock_outs", "reference_no", "SO", now).await?,
            warehouse_id: input.warehouse_id.clone(),
            recipient: input.recipient.clone(),
            reason: input.reason.clone(),
            status: StockOutStatus::Pending,
            created_by: created_by.map(str::to_string),
            created_at: now,
            dispatched_at: None,
        };

        sqlx::query(
            "INSERT INTO stock_outs (id, reference_no, warehouse_id, recipient, reason, status, \
                 created_by, created_at, dispatched_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&stock_out.id)
        .bind(&stock_out.reference_no)
        .bind(&stock_out.warehouse_id)
        .bind(&stock_out.recipient)
        .bind(&stock_out.reason)
        .bind(stock_out.status)
        .bind(&stock_out.created_by)
        .bind(stock_out.created_at)
        .bind(stock_out.dispatched_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = StockOutItem {
                id: new_id(),
                stock_out_id: stock_out.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            };
            sqlx::query(
                "INSERT INTO stock_out_items (id, stock_out_id, product_id, quantity) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&item.id)
            .bind(&item.stock_out_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;

        info!(id = %stock_out.id, reference_no = %stock_out.reference_no, "Stock-out created");
        Ok(StockOutDetail { stock_out, items })
    }

    pub async fn get(&self, id: &str) -> DbResult<StockOutDetail> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    pub async fn list(&self, limit: i64) -> DbResult<Vec<StockOut>> {
        let rows = sqlx::query_as::<_, StockOut>(&format!(
            "SELECT {HEADER_COLUMNS} FROM stock_outs ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Dispatches every line or nothing.
    pub async fn dispatch(&self, id: &str, user: Option<&str>) -> DbResult<StockOutDetail> {
        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "stock_outs", id).await?;
        let mut detail = load(&mut tx, id).await?;
        let next = detail.stock_out.status.transition(StockOutStatus::Dispatched)?;

        let lines: Vec<StockLine> = detail
            .items
            .iter()
            .map(|i| StockLine::new(&i.product_id, i.quantity))
            .collect();
        for line in ledger::merge_lines(&lines)? {
            let movement = Movement::new(MovementType::StockOut)
                .reference(REFERENCE_TYPE, id)
                .note(detail.stock_out.reason.as_deref())
                .by(user);
            if let Err(err) = stock::decrement(
                &mut tx,
                &line.product_id,
                &detail.stock_out.warehouse_id,
                line.quantity,
                movement,
            )
            .await
            {
                warn!(id = %id, error = %err, "Stock-out dispatch refused");
                return Err(err);
            }
        }

        let now = Utc::now();
        set_status(&mut tx, id, detail.stock_out.status, next, Some(now)).await?;
        tx.commit().await?;

        detail.stock_out.status = next;
        detail.stock_out.dispatched_at = Some(now);

        info!(id = %id, reference_no = %detail.stock_out.reference_no, "Stock-out dispatched");
        Ok(detail)
    }

    pub async fn cancel(&self, id: &str) -> DbResult<StockOutDetail> {
        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "stock_outs", id).await?;
        let mut detail = load(&mut tx, id).await?;
        let next = detail.stock_out.status.transition(StockOutStatus::Cancelled)?;
        set_status(&mut tx, id, detail.stock_out.status, next, None).await?;
        tx.commit().await?;

        detail.stock_out.status = next;
        info!(id = %id, "Stock-out cancelled");
        Ok(detail)
    }
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<StockOutDetail> {
    let stock_out = sqlx::query_as::<_, StockOut>(&format!(
        "SELECT {HEADER_COLUMNS} FROM stock_outs WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("StockOut", id))?;

    let items = sqlx::query_as::<_, StockOutItem>(
        "SELECT id, stock_out_id, product_id, quantity \
         FROM stock_out_items WHERE stock_out_id = ?1 ORDER BY rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(StockOutDetail { stock_out, items })
}

async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: StockOutStatus,
    to: StockOutStatus,
    dispatched_at: Option<DateTime<Utc>>,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE stock_outs SET status = ?1, dispatched_at = COALESCE(?2, dispatched_at) \
         WHERE id = ?3 AND status = ?4",
    )
    .bind(to)
    .bind(dispatched_at)
    .bind(id)
    .bind(from)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::invalid_transition(StockOutStatus::ENTITY, from, to).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{setup, setup_file, Fixture};

    async fn stocked(fx: &Fixture) {
        let stock = fx.db.stock();
        stock.adjust(&fx.sediment, &fx.main, 4, None, None).await.unwrap();
        stock.adjust(&fx.part, &fx.main, 10, None, None).await.unwrap();
    }

    fn request(fx: &Fixture, sediment: i64, part: i64) -> NewStockOut {
        NewStockOut {
            warehouse_id: fx.main.clone(),
            recipient: Some("Workshop".into()),
            reason: Some("Service kits".into()),
            items: vec![
                NewStockOutItem {
                    product_id: fx.part.clone(),
                    quantity: part,
                },
                NewStockOutItem {
                    product_id: fx.sediment.clone(),
                    quantity: sediment,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_dispatch_decrements() {
        let fx = setup().await;
        stocked(&fx).await;

        let created = fx.db.stock_outs().create(&request(&fx, 3, 5), None).await.unwrap();
        let dispatched = fx.db.stock_outs().dispatch(&created.stock_out.id, None).await.unwrap();

        assert_eq!(dispatched.stock_out.status, StockOutStatus::Dispatched);
        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 1);
        assert_eq!(fx.db.stock().balance(&fx.part, &fx.main).await.unwrap(), 5);
        assert_eq!(dispatched.product_ids().len(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let fx = setup().await;
        stocked(&fx).await;

        // the part line succeeds first, then the sediment line is short
        let created = fx.db.stock_outs().create(&request(&fx, 5, 5), None).await.unwrap();
        let err = fx
            .db
            .stock_outs()
            .dispatch(&created.stock_out.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { requested: 5, available: 4, .. })));

        assert_eq!(fx.db.stock().balance(&fx.part, &fx.main).await.unwrap(), 10);
        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 4);
        assert!(fx
            .db
            .stock()
            .movements_for(REFERENCE_TYPE, &created.stock_out.id)
            .await
            .unwrap()
            .is_empty());
        let still = fx.db.stock_outs().get(&created.stock_out.id).await.unwrap();
        assert_eq!(still.stock_out.status, StockOutStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_dispatches_take_last_units_once() {
        let (fx, path) = setup_file("dispatch-race").await;
        fx.db.stock().adjust(&fx.sediment, &fx.main, 4, None, None).await.unwrap();

        let whole_balance = || NewStockOut {
            warehouse_id: fx.main.clone(),
            recipient: None,
            reason: None,
            items: vec![NewStockOutItem { product_id: fx.sediment.clone(), quantity: 4 }],
        };
        let first = fx.db.stock_outs().create(&whole_balance(), None).await.unwrap();
        let second = fx.db.stock_outs().create(&whole_balance(), None).await.unwrap();

        let (a, b) = (fx.db.stock_outs(), fx.db.stock_outs());
        let (ra, rb) = tokio::join!(
            a.dispatch(&first.stock_out.id, None),
            b.dispatch(&second.stock_out.id, None)
        );

        assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1, "{ra:?} / {rb:?}");
        let loser = if ra.is_ok() { rb } else { ra };
        assert!(matches!(loser, Err(DbError::Core(CoreError::InsufficientStock { available: 0, .. }))));

        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 0);
        let taken = fx
            .db
            .stock()
            .movements(&stock::MovementFilter {
                movement_type: Some(MovementType::StockOut),
                ..stock::MovementFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].movement.quantity, -4);

        fx.db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_duplicate_lines_checked_against_total() {
        let fx = setup().await;
        stocked(&fx).await;

        let input = NewStockOut {
            warehouse_id: fx.main.clone(),
            recipient: None,
            reason: None,
            items: vec![
                NewStockOutItem { product_id: fx.sediment.clone(), quantity: 3 },
                NewStockOutItem { product_id: fx.sediment.clone(), quantity: 3 },
            ],
        };
        let created = fx.db.stock_outs().create(&input, None).await.unwrap();
        assert!(fx.db.stock_outs().dispatch(&created.stock_out.id, None).await.is_err());
        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 4);
    }
}
