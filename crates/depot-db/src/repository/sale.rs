//! # Sale Repository
//!
//! Sales, their line items, and the completion chain.
//!
//! ## Completing a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transition(id, Completed) ──► BEGIN                                    │
//! │                                                                         │
//! │  1. SaleStatus::transition()          illegal? ──► InvalidTransition    │
//! │  2. stock::decrement() per product    short?   ──► InsufficientStock    │
//! │     from the sale warehouse           (movement: sale)                  │
//! │  3. machine::provision_sale()         one machine per machine unit,     │
//! │                                       default filters installed         │
//! │  4. UPDATE status, completed_at       guarded by the previous status    │
//! │                                                                         │
//! │  COMMIT  ── any failure above leaves the sale and stock untouched       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use depot_core::ledger::{self, MovementType, StockLine};
use depot_core::validation::{validate_line_count, validate_name, validate_price_cents};
use depot_core::workflow::{PricedLine, SaleTotals};
use depot_core::{CoreError, Money, Sale, SaleItem, SaleStatus, TaxRate, Workflow};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use super::machine::{self, MachineDetail};
use super::stock::{self, Movement};
use super::{lock_row, new_id, next_document_number};
use crate::error::{DbError, DbResult};

const REFERENCE_TYPE: &str = "sale";

const SALE_COLUMNS: &str = "id, invoice_number, customer_name, customer_phone, customer_address, \
     warehouse_id, status, total_amount_cents, discount_cents, tax_cents, net_total_cents, \
     sold_by, notes, created_at, updated_at, completed_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
    /// Catalog price when absent.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub warehouse_id: String,
    #[serde(default)]
    pub discount_cents: i64,
    pub notes: Option<String>,
    pub items: Vec<NewSaleItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

impl SaleDetail {
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.items.iter().map(|i| i.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Result of a status change.
#[derive(Debug, Clone, Serialize)]
pub struct SaleTransition {
    #[serde(flatten)]
    pub detail: SaleDetail,
    pub previous: SaleStatus,
    /// Machines provisioned by this transition (completion only).
    pub machines: Vec<MachineDetail>,
}

/// Sale search; dates are inclusive calendar days (UTC).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<SaleStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a pending sale with computed totals.
    pub async fn create(&self, input: &NewSale, tax_rate: TaxRate, sold_by: Option<&str>) -> DbResult<SaleDetail> {
        validate_name("customer_name", &input.customer_name, 200)?;
        validate_line_count(input.items.len())?;
        validate_price_cents("discount", input.discount_cents)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut priced = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let unit_price_cents = match item.unit_price_cents {
                Some(cents) => {
                    validate_price_cents("unit_price", cents)?;
                    cents
                }
                None => catalog_price(&mut tx, &item.product_id).await?,
            };
            priced.push(PricedLine {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price: Money::from_cents(unit_price_cents),
            });
        }
        let totals = SaleTotals::compute(&priced, Money::from_cents(input.discount_cents), tax_rate)?;

        let sale = Sale {
            id: new_id(),
            invoice_number: next_document_number(&mut tx, "sales", "invoice_number", "INV", now).await?,
            customer_name: input.customer_name.trim().to_string(),
            customer_phone: input.customer_phone.clone(),
            customer_address: input.customer_address.clone(),
            warehouse_id: input.warehouse_id.clone(),
            status: SaleStatus::Pending,
            total_amount_cents: totals.total_amount.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            net_total_cents: totals.net_total.cents(),
            sold_by: sold_by.map(str::to_string),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        sqlx::query(
            "INSERT INTO sales (id, invoice_number, customer_name, customer_phone, customer_address, \
                 warehouse_id, status, total_amount_cents, discount_cents, tax_cents, net_total_cents, \
                 sold_by, notes, created_at, updated_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .bind(&sale.id)
        .bind(&sale.invoice_number)
        .bind(&sale.customer_name)
        .bind(&sale.customer_phone)
        .bind(&sale.customer_address)
        .bind(&sale.warehouse_id)
        .bind(sale.status)
        .bind(sale.total_amount_cents)
        .bind(sale.discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.net_total_cents)
        .bind(&sale.sold_by)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.completed_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(priced.len());
        for line in &priced {
            let item = SaleItem {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                line_total_cents: line.line_total()?.cents(),
                created_at: now,
            };
            sqlx::query(
                "INSERT INTO sale_items (id, sale_id, product_id, quantity, unit_price_cents, \
                     line_total_cents, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;

        info!(
            id = %sale.id,
            invoice = %sale.invoice_number,
            net_total = %sale.net_total(),
            lines = items.len(),
            "Sale created"
        );
        Ok(SaleDetail { sale, items })
    }

    pub async fn get(&self, id: &str) -> DbResult<SaleDetail> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    /// Sales newest first, optionally by creation date range and status.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {SALE_COLUMNS} FROM sales WHERE 1 = 1"));
        if let Some(from) = filter.from {
            query.push(" AND created_at >= ").push_bind(day_start(from));
        }
        if let Some(to) = filter.to {
            query.push(" AND created_at < ").push_bind(day_start(to + Duration::days(1)));
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(500).clamp(1, 10_000));

        let sales = query.build_query_as::<Sale>().fetch_all(&self.pool).await?;
        Ok(sales)
    }

    /// Moves a sale to `next`.
    ///
    /// Completion deducts stock and provisions machines in the same
    /// transaction as the status change.
    pub async fn transition(&self, id: &str, next: SaleStatus, user: Option<&str>) -> DbResult<SaleTransition> {
        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "sales", id).await?;
        let mut detail = load(&mut tx, id).await?;
        let previous = detail.sale.status;
        let next = previous.transition(next)?;

        let now = Utc::now();
        let mut machines = Vec::new();

        if next == SaleStatus::Completed {
            let lines: Vec<StockLine> = detail
                .items
                .iter()
                .map(|i| StockLine::new(&i.product_id, i.quantity))
                .collect();
            for line in ledger::merge_lines(&lines)? {
                let movement = Movement::new(MovementType::Sale)
                    .reference(REFERENCE_TYPE, id)
                    .note(Some(detail.sale.invoice_number.as_str()))
                    .by(user);
                if let Err(err) =
                    stock::decrement(&mut tx, &line.product_id, &detail.sale.warehouse_id, line.quantity, movement)
                        .await
                {
                    warn!(id = %id, invoice = %detail.sale.invoice_number, error = %err, "Sale completion refused");
                    return Err(err);
                }
            }

            detail.sale.completed_at = Some(now);
            machines = machine::provision_sale(&mut tx, &detail.sale, now.date_naive()).await?;
        }

        let result = sqlx::query(
            "UPDATE sales SET status = ?1, updated_at = ?2, completed_at = COALESCE(?3, completed_at) \
             WHERE id = ?4 AND status = ?5",
        )
        .bind(next)
        .bind(now)
        .bind(detail.sale.completed_at)
        .bind(id)
        .bind(previous)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::invalid_transition(SaleStatus::ENTITY, previous, next).into());
        }

        tx.commit().await?;

        detail.sale.status = next;
        detail.sale.updated_at = now;

        info!(
            id = %id,
            invoice = %detail.sale.invoice_number,
            from = %previous,
            to = %next,
            machines = machines.len(),
            "Sale status changed"
        );
        Ok(SaleTransition {
            detail,
            previous,
            machines,
        })
    }
}

/// Loads a sale header on the caller's connection.
pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

async fn load(conn: &mut SqliteConnection, id: &str) -> DbResult<SaleDetail> {
    let sale = fetch_sale(conn, id).await?;
    let items = sqlx::query_as::<_, SaleItem>(
        "SELECT id, sale_id, product_id, quantity, unit_price_cents, line_total_cents, created_at \
         FROM sale_items WHERE sale_id = ?1 ORDER BY rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(SaleDetail { sale, items })
}

async fn catalog_price(conn: &mut SqliteConnection, product_id: &str) -> DbResult<i64> {
    sqlx::query_scalar("SELECT price_cents FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{setup, Fixture};
    use depot_core::FilterStatus;

    fn order(fx: &Fixture, machines: i64, discount_cents: i64) -> NewSale {
        NewSale {
            customer_name: "Brian Otieno".into(),
            customer_phone: Some("0700 123 456".into()),
            customer_address: Some("12 Lake Rd".into()),
            warehouse_id: fx.main.clone(),
            discount_cents,
            notes: None,
            items: vec![
                NewSaleItem {
                    product_id: fx.machine.clone(),
                    quantity: machines,
                    unit_price_cents: None,
                },
                NewSaleItem {
                    product_id: fx.part.clone(),
                    quantity: 2,
                    unit_price_cents: Some(1_000),
                },
            ],
        }
    }

    async fn stocked(fx: &Fixture) {
        fx.db.stock().adjust(&fx.machine, &fx.main, 3, None, None).await.unwrap();
        fx.db.stock().adjust(&fx.part, &fx.main, 5, None, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_computes_totals() {
        let fx = setup().await;
        let sale = fx
            .db
            .sales()
            .create(&order(&fx, 1, 2_000), TaxRate::from_bps(1_600), Some("user-1"))
            .await
            .unwrap();

        // 45_000 + 2 × 1_000 = 47_000; taxed on 45_000
        assert_eq!(sale.sale.total_amount_cents, 47_000);
        assert_eq!(sale.sale.tax_cents, 7_200);
        assert_eq!(sale.sale.net_total_cents, 52_200);
        assert_eq!(sale.items[0].unit_price_cents, 45_000);
        assert_eq!(sale.items[1].line_total_cents, 2_000);
        assert!(sale.sale.invoice_number.starts_with("INV-"));
    }

    #[tokio::test]
    async fn test_discount_larger_than_total_rejected() {
        let fx = setup().await;
        let result = fx.db.sales().create(&order(&fx, 1, 50_000), TaxRate::zero(), None).await;
        assert!(matches!(result, Err(DbError::Core(CoreError::DiscountExceedsTotal { .. }))));
    }

    #[tokio::test]
    async fn test_oversized_line_rejected_before_anything_is_written() {
        let fx = setup().await;
        let mut huge = order(&fx, 1, 0);
        huge.items[0].quantity = i64::MAX / 2;
        let result = fx.db.sales().create(&huge, TaxRate::zero(), None).await;
        assert!(matches!(
            result,
            Err(DbError::Core(CoreError::Validation(depot_core::ValidationError::OutOfRange { .. })))
        ));

        let mut pricey = order(&fx, 1, 0);
        pricey.items[1].unit_price_cents = Some(i64::MAX);
        assert!(fx.db.sales().create(&pricey, TaxRate::zero(), None).await.is_err());

        let listed = fx.db.sales().list(&SaleFilter::default()).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_completion_deducts_stock_and_provisions() {
        let fx = setup().await;
        stocked(&fx).await;
        let sale = fx.db.sales().create(&order(&fx, 2, 0), TaxRate::zero(), None).await.unwrap();

        let deposited = fx
            .db
            .sales()
            .transition(&sale.sale.id, SaleStatus::Deposited, None)
            .await
            .unwrap();
        assert!(deposited.machines.is_empty());
        assert_eq!(fx.db.stock().balance(&fx.machine, &fx.main).await.unwrap(), 3);

        let done = fx
            .db
            .sales()
            .transition(&sale.sale.id, SaleStatus::Completed, Some("user-1"))
            .await
            .unwrap();
        assert_eq!(done.previous, SaleStatus::Deposited);
        assert_eq!(done.detail.sale.status, SaleStatus::Completed);
        assert!(done.detail.sale.completed_at.is_some());

        assert_eq!(fx.db.stock().balance(&fx.machine, &fx.main).await.unwrap(), 1);
        assert_eq!(fx.db.stock().balance(&fx.part, &fx.main).await.unwrap(), 3);

        // two machines, each with 2 sediment + 1 carbon filters
        assert_eq!(done.machines.len(), 2);
        for m in &done.machines {
            assert_eq!(m.machine.customer_name, "Brian Otieno");
            assert_eq!(m.filters.len(), 3);
            assert!(m.filters.iter().all(|f| f.status == FilterStatus::Active));
        }
        assert_ne!(done.machines[0].machine.serial_number, done.machines[1].machine.serial_number);
        assert_eq!(fx.db.machines().list_by_sale(&sale.sale.id).await.unwrap().len(), 2);

        let movements = fx.db.stock().movements_for(REFERENCE_TYPE, &sale.sale.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.movement_type == MovementType::Sale));
    }

    #[tokio::test]
    async fn test_completion_without_stock_changes_nothing() {
        let fx = setup().await;
        fx.db.stock().adjust(&fx.machine, &fx.main, 1, None, None).await.unwrap();
        fx.db.stock().adjust(&fx.part, &fx.main, 5, None, None).await.unwrap();
        let sale = fx.db.sales().create(&order(&fx, 2, 0), TaxRate::zero(), None).await.unwrap();

        let result = fx.db.sales().transition(&sale.sale.id, SaleStatus::Completed, None).await;
        assert!(matches!(result, Err(DbError::Core(CoreError::InsufficientStock { .. }))));

        let reloaded = fx.db.sales().get(&sale.sale.id).await.unwrap();
        assert_eq!(reloaded.sale.status, SaleStatus::Pending);
        assert_eq!(fx.db.stock().balance(&fx.part, &fx.main).await.unwrap(), 5);
        assert!(fx.db.machines().list_by_sale(&sale.sale.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_states_and_backwards_moves() {
        let fx = setup().await;
        let sale = fx.db.sales().create(&order(&fx, 1, 0), TaxRate::zero(), None).await.unwrap();
        let sales = fx.db.sales();

        sales.transition(&sale.sale.id, SaleStatus::Processing, None).await.unwrap();
        let back = sales.transition(&sale.sale.id, SaleStatus::Deposited, None).await;
        assert!(matches!(back, Err(DbError::Core(CoreError::InvalidTransition { .. }))));

        let cancelled = sales.transition(&sale.sale.id, SaleStatus::Cancelled, None).await.unwrap();
        assert_eq!(cancelled.previous, SaleStatus::Processing);
        assert!(sales.transition(&sale.sale.id, SaleStatus::Completed, None).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let fx = setup().await;
        let sales = fx.db.sales();
        let a = sales.create(&order(&fx, 1, 0), TaxRate::zero(), None).await.unwrap();
        sales.create(&order(&fx, 1, 0), TaxRate::zero(), None).await.unwrap();
        sales.transition(&a.sale.id, SaleStatus::Cancelled, None).await.unwrap();

        let today = Utc::now().date_naive();
        let all = sales
            .list(&SaleFilter {
                from: Some(today),
                to: Some(today),
                ..SaleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let cancelled = sales
            .list(&SaleFilter {
                status: Some(SaleStatus::Cancelled),
                ..SaleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, a.sale.id);
    }
}
