//! # Transfer Repository
//!
//! Moving goods between two warehouses.
//!
//! ```text
//!   complete() ──► BEGIN
//!                  pending ──► completed
//!                  per product:
//!                    decrement(source)       movement: transfer_out (−qty)
//!                    increment(destination)  movement: transfer_in  (+qty)
//!                  COMMIT
//! ```

use chrono::{DateTime, Utc};
use depot_core::ledger::{self, MovementType, StockLine};
use depot_core::validation::validate_line_count;
use depot_core::{CoreError, StockTransfer, StockTransferItem, TransferStatus, Workflow};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::stock::{self, Movement};
use super::{lock_row, new_id, next_document_number};
use crate::error::{DbError, DbResult};

const REFERENCE_TYPE: &str = "transfer";

const HEADER_COLUMNS: &str = "id, reference_no, from_warehouse_id, to_warehouse_id, status, notes, \
     created_by, created_at, completed_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewTransferItem {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTransfer {
    pub from_warehouse_id: String,
    pub to_warehouse_id: String,
    pub notes: Option<String>,
    pub items: Vec<NewTransferItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferDetail {
    #[serde(flatten)]
    pub transfer: StockTransfer,
    pub items: Vec<StockTransferItem>,
}

#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
}

impl TransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransferRepository { pool }
    }

    /// Records a pending transfer; same-warehouse transfers are rejected.
    pub async fn create(&self, input: &NewTransfer, created_by: Option<&str>) -> DbResult<TransferDetail> {
        validate_line_count(input.items.len())?;
        let lines: Vec<StockLine> = input
            .items
            .iter()
            .map(|i| StockLine::new(&i.product_id, i.quantity))
            .collect();
        ledger::plan_transfer(&input.from_warehouse_id, &input.to_warehouse_id, &lines)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let transfer = StockTransfer {
            id: new_id(),
            reference_no: next_document_number(&mut tx, "stock_transfers", "reference_no", "TR", now).await?,
            from_warehouse_id: input.from_warehouse_id.clone(),
            to_warehouse_id: input.to_warehouse_id.clone(),
            status: TransferStatus::Pending,
            notes: input.notes.clone(),
            created_by: created_by.map(str::to_string),
            created_at: now,
            completed_at: None,
        };

        sqlx::query(
            "INSERT INTO stock_transfers (id, reference_no, from_warehouse_id, to_warehouse_id, \
                 status, notes, created_by, created_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&transfer.id)
        .bind(&transfer.reference_no)
        .bind(&transfer.from_warehouse_id)
        .bind(&transfer.to_warehouse_id)
        .bind(transfer.status)
        .bind(&transfer.notes)
        .bind(&transfer.created_by)
        .bind(transfer.created_at)
        .bind(transfer.completed_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = StockTransferItem {
                id: new_id(),
                transfer_id: transfer.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            };
            sqlx::query(
                "INSERT INTO stock_transfer_items (id, transfer_id, product_id, quantity) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&item.id)
            .bind(&item.transfer_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;

        info!(
            id = %transfer.id,
            reference_no = %transfer.reference_no,
            from = %transfer.from_warehouse_id,
            to = %transfer.to_warehouse_id,
            "Transfer created"
        );
        Ok(TransferDetail { transfer, items })
    }

    pub async fn get(&self, id: &str) -> DbResult<TransferDetail> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    pub async fn list(&self, limit: i64) -> DbResult<Vec<StockTransfer>> {
        let rows = sqlx::query_as::<_, StockTransfer>(&format!(
            "SELECT {HEADER_COLUMNS} FROM stock_transfers ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Moves every line from source to destination, or nothing.
    pub async fn complete(&self, id: &str, user: Option<&str>) -> DbResult<TransferDetail> {
        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "stock_transfers", id).await?;
        let mut detail = load(&mut tx, id).await?;
        let next = detail.transfer.status.transition(TransferStatus::Completed)?;

        let lines: Vec<StockLine> = detail
            .items
            .iter()
            .map(|i| StockLine::new(&i.product_id, i.quantity))
            .collect();
        let plan = ledger::plan_transfer(
            &detail.transfer.from_warehouse_id,
            &detail.transfer.to_warehouse_id,
            &lines,
        )?;

        for line in plan {
            let out = Movement::new(MovementType::TransferOut)
                .reference(REFERENCE_TYPE, id)
                .by(user);
            stock::decrement(&mut tx, &line.product_id, &detail.transfer.from_warehouse_id, line.quantity, out)
                .await?;

            let inbound = Movement::new(MovementType::TransferIn)
                .reference(REFERENCE_TYPE, id)
                .by(user);
            stock::increment(&mut tx, &line.product_id, &detail.transfer.to_warehouse_id, line.quantity, inbound)
                .await?;
        }

        let now = Utc::now();
        set_status(&mut tx, id, detail.transfer.status, next, Some(now)).await?;
        tx.commit().await?;

        detail.transfer.status = next;
        detail.transfer.completed_at = Some(now);

        info!(id = %id, reference_no = %detail.transfer.reference_no, "Transfer completed");
        Ok(detail)
    }

    pub async fn cancel(&self, id: &str) -> DbResult<TransferDetail> {
        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "stock_transfers", id).await?;
        let mut detail = load(&mut tx, id).await?;
        let next = detail.transfer.status.transition(TransferStatus::Cancelled)?;
        set_status(&mut tx, id, detail.transfer.status, next, None).await?;
        tx.commit().await?;

        detail.transfer.status = next;
        info!(id = %id, "Transfer cancelled");
        Ok(detail)
    }
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<TransferDetail> {
    let transfer = sqlx::query_as::<_, StockTransfer>(&format!(
        "SELECT {HEADER_COLUMNS} FROM stock_transfers WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Transfer", id))?;

    let items = sqlx::query_as::<_, StockTransferItem>(
        "SELECT id, transfer_id, product_id, quantity \
         FROM stock_transfer_items WHERE transfer_id = ?1 ORDER BY rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(TransferDetail { transfer, items })
}

async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: TransferStatus,
    to: TransferStatus,
    completed_at: Option<DateTime<Utc>>,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE stock_transfers SET status = ?1, completed_at = COALESCE(?2, completed_at) \
         WHERE id = ?3 AND status = ?4",
    )
    .bind(to)
    .bind(completed_at)
    .bind(id)
    .bind(from)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::invalid_transition(TransferStatus::ENTITY, from, to).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::setup;

    #[tokio::test]
    async fn test_transfer_moves_both_sides() {
        let fx = setup().await;
        fx.db.stock().adjust(&fx.sediment, &fx.main, 10, None, None).await.unwrap();

        let input = NewTransfer {
            from_warehouse_id: fx.main.clone(),
            to_warehouse_id: fx.branch.clone(),
            notes: None,
            items: vec![NewTransferItem {
                product_id: fx.sediment.clone(),
                quantity: 4,
            }],
        };
        let created = fx.db.transfers().create(&input, None).await.unwrap();
        let done = fx.db.transfers().complete(&created.transfer.id, None).await.unwrap();
        assert_eq!(done.transfer.status, TransferStatus::Completed);

        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.main).await.unwrap(), 6);
        assert_eq!(fx.db.stock().balance(&fx.sediment, &fx.branch).await.unwrap(), 4);

        let movements = fx
            .db
            .stock()
            .movements_for(REFERENCE_TYPE, &created.transfer.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].movement_type, MovementType::TransferOut);
        assert_eq!(movements[0].quantity, -4);
        assert_eq!(movements[1].movement_type, MovementType::TransferIn);
        assert_eq!(movements[1].balance_after, 4);
    }

    #[tokio::test]
    async fn test_same_warehouse_rejected() {
        let fx = setup().await;
        let input = NewTransfer {
            from_warehouse_id: fx.main.clone(),
            to_warehouse_id: fx.main.clone(),
            notes: None,
            items: vec![NewTransferItem {
                product_id: fx.part.clone(),
                quantity: 1,
            }],
        };
        let result = fx.db.transfers().create(&input, None).await;
        assert!(matches!(result, Err(DbError::Core(CoreError::SameWarehouseTransfer(_)))));
    }

    #[tokio::test]
    async fn test_short_source_leaves_both_sides() {
        let fx = setup().await;
        fx.db.stock().adjust(&fx.part, &fx.main, 1, None, None).await.unwrap();

        let input = NewTransfer {
            from_warehouse_id: fx.main.clone(),
            to_warehouse_id: fx.branch.clone(),
            notes: None,
            items: vec![NewTransferItem {
                product_id: fx.part.clone(),
                quantity: 2,
            }],
        };
        let created = fx.db.transfers().create(&input, None).await.unwrap();
        assert!(fx.db.transfers().complete(&created.transfer.id, None).await.is_err());
        assert_eq!(fx.db.stock().balance(&fx.part, &fx.main).await.unwrap(), 1);
        assert_eq!(fx.db.stock().balance(&fx.part, &fx.branch).await.unwrap(), 0);

        let cancelled = fx.db.transfers().cancel(&created.transfer.id).await.unwrap();
        assert_eq!(cancelled.transfer.status, TransferStatus::Cancelled);
    }
}
