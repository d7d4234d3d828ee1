//! # Machine Repository
//!
//! Installed machines, their filters, and provisioning from completed sales.
//!
//! ## Provisioning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  provision_sale(conn, sale, installed_on)      (caller's transaction)  │
//! │                                                                         │
//! │  sale_items ⋈ products           ──► ProvisionItem per line             │
//! │     + COUNT(machines) per line       (already_provisioned)              │
//! │  product_filters of machine kinds ──► filter sets                       │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │  depot_core::machine::provision_plan()                                  │
//! │                   │  one PlannedMachine per missing unit                │
//! │                   ▼                                                     │
//! │  INSERT machines + machine_filters                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines that already have their machines plan nothing, so sale completion
//! and [`MachineRepository::backfill`] can both run over the same sale.

use chrono::{Duration, NaiveDate, Utc};
use depot_core::ledger::MovementType;
use depot_core::machine::{self, FilterUsage, PlannedMachine, ProvisionItem};
use depot_core::{
    CoreError, DueFilter, FilterStatus, Machine, MachineFilter, MachineStatus, ProductKind, Sale,
    SaleStatus, StockMovement,
};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::lock_row;
use super::product::filter_sets;
use super::sale::fetch_sale;
use super::stock::{self, Movement};
use crate::error::{DbError, DbResult};

const MACHINE_COLUMNS: &str = "id, serial_number, product_id, sale_id, sale_item_id, customer_name, \
     customer_phone, customer_address, installed_on, status, created_at";

const FILTER_COLUMNS: &str = "id, machine_id, filter_product_id, installed_on, lifespan_days, \
     due_on, replaced_on, status, created_at";

/// A machine with its filters.
#[derive(Debug, Clone, Serialize)]
pub struct MachineDetail {
    #[serde(flatten)]
    pub machine: Machine,
    pub filters: Vec<MachineFilter>,
}

/// A filter with its usage on a given day.
#[derive(Debug, Clone, Serialize)]
pub struct FilterState {
    #[serde(flatten)]
    pub filter: MachineFilter,
    pub usage: FilterUsage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub dry_run: bool,
    pub sales_scanned: usize,
    pub sales_provisioned: usize,
    pub machines_created: usize,
    pub filters_created: usize,
}

/// Outcome of swapping a filter cartridge.
#[derive(Debug, Clone, Serialize)]
pub struct FilterReplacement {
    pub replaced: MachineFilter,
    pub installed: MachineFilter,
    /// Present when the new cartridge was taken from a warehouse.
    pub movement: Option<StockMovement>,
}

#[derive(Debug, FromRow)]
struct ProvisionRow {
    sale_item_id: String,
    product_id: String,
    kind: ProductKind,
    quantity: i64,
    already_provisioned: i64,
}

impl From<ProvisionRow> for ProvisionItem {
    fn from(row: ProvisionRow) -> Self {
        ProvisionItem {
            sale_item_id: row.sale_item_id,
            product_id: row.product_id,
            kind: row.kind,
            quantity: row.quantity,
            already_provisioned: row.already_provisioned,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MachineRepository {
    pool: SqlitePool,
}

impl MachineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MachineRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<MachineDetail> {
        let machine = sqlx::query_as::<_, Machine>(&format!(
            "SELECT {MACHINE_COLUMNS} FROM machines WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Machine", id))?;

        let filters = self.filters_of(id).await?;
        Ok(MachineDetail { machine, filters })
    }

    pub async fn get_by_serial(&self, serial_number: &str) -> DbResult<Option<Machine>> {
        let machine = sqlx::query_as::<_, Machine>(&format!(
            "SELECT {MACHINE_COLUMNS} FROM machines WHERE serial_number = ?1"
        ))
        .bind(serial_number.trim().to_ascii_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(machine)
    }

    pub async fn list_by_sale(&self, sale_id: &str) -> DbResult<Vec<Machine>> {
        let machines = sqlx::query_as::<_, Machine>(&format!(
            "SELECT {MACHINE_COLUMNS} FROM machines WHERE sale_id = ?1 ORDER BY rowid"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(machines)
    }

    /// All filters ever installed in a machine, current ones first.
    pub async fn filters_of(&self, machine_id: &str) -> DbResult<Vec<MachineFilter>> {
        let filters = sqlx::query_as::<_, MachineFilter>(&format!(
            "SELECT {FILTER_COLUMNS} FROM machine_filters WHERE machine_id = ?1 \
             ORDER BY status = 'replaced', due_on, rowid"
        ))
        .bind(machine_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(filters)
    }

    /// Active filters of a machine with their usage on `today`.
    pub async fn filter_usage(&self, machine_id: &str, today: NaiveDate) -> DbResult<Vec<FilterState>> {
        let states = self
            .filters_of(machine_id)
            .await?
            .into_iter()
            .filter(|f| f.status == FilterStatus::Active)
            .map(|filter| {
                let usage = FilterUsage::evaluate(filter.installed_on, filter.lifespan_days, today);
                FilterState { filter, usage }
            })
            .collect();
        Ok(states)
    }

    /// Active filters due within `within_days` of `today`, overdue included.
    pub async fn filters_due(&self, within_days: i64, today: NaiveDate) -> DbResult<Vec<DueFilter>> {
        let horizon = today
            .checked_add_signed(Duration::days(within_days.clamp(0, machine::MAX_LIFESPAN_DAYS)))
            .unwrap_or(NaiveDate::MAX);

        let due = sqlx::query_as::<_, DueFilter>(
            "SELECT f.id AS filter_id, f.machine_id, m.serial_number, m.customer_name, \
                 m.customer_phone, m.customer_address, p.sku AS filter_sku, p.name AS filter_name, \
                 f.installed_on, f.lifespan_days, f.due_on \
             FROM machine_filters f \
             JOIN machines m ON m.id = f.machine_id \
             JOIN products p ON p.id = f.filter_product_id \
             WHERE f.status = 'active' AND m.status = 'active' AND f.due_on <= ?1 \
             ORDER BY f.due_on, m.serial_number",
        )
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;

        debug!(within_days, due = due.len(), "Filters due");
        Ok(due)
    }

    /// Swaps an active filter for a fresh one of the same product.
    ///
    /// With a warehouse, one unit of the filter product is deducted there in
    /// the same transaction.
    pub async fn replace_filter(
        &self,
        filter_id: &str,
        replaced_on: NaiveDate,
        warehouse_id: Option<&str>,
        user: Option<&str>,
    ) -> DbResult<FilterReplacement> {
        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "machine_filters", filter_id).await?;

        let mut old = sqlx::query_as::<_, MachineFilter>(&format!(
            "SELECT {FILTER_COLUMNS} FROM machine_filters WHERE id = ?1"
        ))
        .bind(filter_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("MachineFilter", filter_id))?;

        let result = sqlx::query(
            "UPDATE machine_filters SET status = ?1, replaced_on = ?2 WHERE id = ?3 AND status = ?4",
        )
        .bind(FilterStatus::Replaced)
        .bind(replaced_on)
        .bind(filter_id)
        .bind(FilterStatus::Active)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(
                CoreError::invalid_transition("machine_filter", old.status, FilterStatus::Replaced).into(),
            );
        }
        old.status = FilterStatus::Replaced;
        old.replaced_on = Some(replaced_on);

        // current catalog lifespan wins; fall back to the old cartridge's
        let lifespan_days: i64 = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT filter_lifespan_days FROM products WHERE id = ?1",
        )
        .bind(&old.filter_product_id)
        .fetch_optional(&mut *tx)
        .await?
        .flatten()
        .unwrap_or(old.lifespan_days);

        let installed = MachineFilter {
            id: Uuid::new_v4().to_string(),
            machine_id: old.machine_id.clone(),
            filter_product_id: old.filter_product_id.clone(),
            installed_on: replaced_on,
            lifespan_days,
            due_on: machine::due_date(replaced_on, lifespan_days),
            replaced_on: None,
            status: FilterStatus::Active,
            created_at: Utc::now(),
        };
        insert_filter(&mut tx, &installed).await?;

        let movement = match warehouse_id {
            Some(warehouse_id) => {
                let movement = Movement::new(MovementType::FilterReplacement)
                    .reference("machine_filter", filter_id)
                    .by(user);
                Some(stock::decrement(&mut tx, &old.filter_product_id, warehouse_id, 1, movement).await?)
            }
            None => None,
        };

        tx.commit().await?;

        info!(
            machine_id = %installed.machine_id,
            old_filter = %filter_id,
            new_filter = %installed.id,
            due_on = %installed.due_on,
            "Filter replaced"
        );
        Ok(FilterReplacement {
            replaced: old,
            installed,
            movement,
        })
    }

    /// Provisions machines for completed sales that are missing them.
    ///
    /// Each sale gets its own transaction; machines are dated on the sale's
    /// completion day. A dry run only counts what would be created.
    pub async fn backfill(&self, dry_run: bool) -> DbResult<BackfillReport> {
        let sales: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM sales WHERE status = ?1 ORDER BY completed_at, created_at",
        )
        .bind(SaleStatus::Completed)
        .fetch_all(&self.pool)
        .await?;

        let mut report = BackfillReport {
            dry_run,
            sales_scanned: sales.len(),
            ..BackfillReport::default()
        };

        for sale_id in &sales {
            let mut tx = self.pool.begin().await?;
            let sale = fetch_sale(&mut tx, sale_id).await?;
            let installed_on = sale.completed_at.unwrap_or(sale.updated_at).date_naive();

            let plan = plan_for_sale(&mut tx, &sale.id, installed_on).await?;
            if plan.is_empty() {
                continue;
            }

            let machines = plan.len();
            let filters: usize = plan.iter().map(|m| m.filters.len()).sum();
            if dry_run {
                debug!(sale_id = %sale.id, machines, filters, "Backfill would provision");
            } else {
                apply_plan(&mut tx, &sale, &plan, installed_on, &mut Uuid::new_v4).await?;
                tx.commit().await?;
                info!(sale_id = %sale.id, invoice = %sale.invoice_number, machines, "Backfilled machines");
            }

            report.sales_provisioned += 1;
            report.machines_created += machines;
            report.filters_created += filters;
        }

        if report.sales_provisioned > 0 && dry_run {
            warn!(sales = report.sales_provisioned, "Completed sales are missing machines");
        }
        Ok(report)
    }
}

// =============================================================================
// Provisioning (runs on the caller's transaction)
// =============================================================================

/// Creates the machines a completed sale is still missing.
pub(crate) async fn provision_sale(
    conn: &mut SqliteConnection,
    sale: &Sale,
    installed_on: NaiveDate,
) -> DbResult<Vec<MachineDetail>> {
    let plan = plan_for_sale(conn, &sale.id, installed_on).await?;
    apply_plan(conn, sale, &plan, installed_on, &mut Uuid::new_v4).await
}

async fn plan_for_sale(
    conn: &mut SqliteConnection,
    sale_id: &str,
    installed_on: NaiveDate,
) -> DbResult<Vec<PlannedMachine>> {
    let rows = sqlx::query_as::<_, ProvisionRow>(
        "SELECT si.id AS sale_item_id, si.product_id, p.kind, si.quantity, \
             (SELECT COUNT(*) FROM machines m WHERE m.sale_item_id = si.id) AS already_provisioned \
         FROM sale_items si \
         JOIN products p ON p.id = si.product_id \
         WHERE si.sale_id = ?1 \
         ORDER BY si.rowid",
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    let items: Vec<ProvisionItem> = rows.into_iter().map(ProvisionItem::from).collect();
    let mut machine_products: Vec<String> = items
        .iter()
        .filter(|i| i.kind == ProductKind::Machine)
        .map(|i| i.product_id.clone())
        .collect();
    machine_products.sort();
    machine_products.dedup();

    let sets = filter_sets(conn, &machine_products).await?;
    Ok(machine::provision_plan(&items, &sets, installed_on))
}

/// Serial suffixes are short, so a same-day clash is possible; it gets a
/// fresh id instead of failing the whole completion.
const SERIAL_ATTEMPTS: usize = 5;

async fn apply_plan(
    conn: &mut SqliteConnection,
    sale: &Sale,
    plan: &[PlannedMachine],
    installed_on: NaiveDate,
    next_id: &mut impl FnMut() -> Uuid,
) -> DbResult<Vec<MachineDetail>> {
    let now = Utc::now();
    let mut created = Vec::with_capacity(plan.len());

    for planned in plan {
        let template = Machine {
            id: String::new(),
            serial_number: String::new(),
            product_id: planned.product_id.clone(),
            sale_id: Some(sale.id.clone()),
            sale_item_id: Some(planned.sale_item_id.clone()),
            customer_name: sale.customer_name.clone(),
            customer_phone: sale.customer_phone.clone(),
            customer_address: sale.customer_address.clone(),
            installed_on,
            status: MachineStatus::Active,
            created_at: now,
        };
        let machine = insert_machine(conn, template, next_id).await?;

        let mut filters = Vec::with_capacity(planned.filters.len());
        for pf in &planned.filters {
            let filter = MachineFilter {
                id: Uuid::new_v4().to_string(),
                machine_id: machine.id.clone(),
                filter_product_id: pf.filter_product_id.clone(),
                installed_on,
                lifespan_days: pf.lifespan_days,
                due_on: pf.due_on,
                replaced_on: None,
                status: FilterStatus::Active,
                created_at: now,
            };
            insert_filter(conn, &filter).await?;
            filters.push(filter);
        }

        debug!(serial = %machine.serial_number, filters = filters.len(), "Machine provisioned");
        created.push(MachineDetail { machine, filters });
    }

    Ok(created)
}

async fn insert_machine(
    conn: &mut SqliteConnection,
    mut machine: Machine,
    next_id: &mut impl FnMut() -> Uuid,
) -> DbResult<Machine> {
    let mut attempt = 1;
    loop {
        let id = next_id();
        machine.id = id.to_string();
        machine.serial_number = machine::serial_number(machine.installed_on, &id);

        let inserted = sqlx::query(
            "INSERT INTO machines (id, serial_number, product_id, sale_id, sale_item_id, \
                 customer_name, customer_phone, customer_address, installed_on, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&machine.id)
        .bind(&machine.serial_number)
        .bind(&machine.product_id)
        .bind(&machine.sale_id)
        .bind(&machine.sale_item_id)
        .bind(&machine.customer_name)
        .bind(&machine.customer_phone)
        .bind(&machine.customer_address)
        .bind(machine.installed_on)
        .bind(machine.status)
        .bind(machine.created_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from);

        match inserted {
            Ok(_) => return Ok(machine),
            Err(DbError::UniqueViolation { field, .. }) if attempt < SERIAL_ATTEMPTS => {
                warn!(serial = %machine.serial_number, %field, attempt, "Machine serial taken, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn insert_filter(conn: &mut SqliteConnection, filter: &MachineFilter) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO machine_filters (id, machine_id, filter_product_id, installed_on, \
             lifespan_days, due_on, replaced_on, status, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&filter.id)
    .bind(&filter.machine_id)
    .bind(&filter.filter_product_id)
    .bind(filter.installed_on)
    .bind(filter.lifespan_days)
    .bind(filter.due_on)
    .bind(filter.replaced_on)
    .bind(filter.status)
    .bind(filter.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
