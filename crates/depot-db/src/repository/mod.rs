//! # Repository Module
//!
//! Database repository implementations for Depot.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Workflows                           │
//! │                                                                         │
//! │  HTTP handler / CLI command                                             │
//! │       │                                                                 │
//! │       │  db.stock_outs().dispatch(id, user)                             │
//! │       ▼                                                                 │
//! │  StockOutRepository                                                     │
//! │  ├── BEGIN, lock_row() takes the write lock                             │
//! │  ├── load document, check status via depot-core workflow                │
//! │  ├── stock::decrement() per merged line  ──► stocks + stock_movements   │
//! │  ├── UPDATE status                                                      │
//! │  └── COMMIT   (any error drops the transaction: nothing changed)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`user::UserRepository`] - Users and roles
//! - [`warehouse::WarehouseRepository`] - Stock locations
//! - [`product::ProductRepository`] - Catalog and machine filter sets
//! - [`stock::StockRepository`] - Balances, adjustments, movement history
//! - [`stock_in::StockInRepository`] - Receiving goods
//! - [`stock_out::StockOutRepository`] - Dispatching goods
//! - [`transfer::TransferRepository`] - Moving goods between warehouses
//! - [`sale::SaleRepository`] - Sales and the completion chain
//! - [`machine::MachineRepository`] - Installed machines and filters
//! - [`attendance::AttendanceRepository`] - Check-in / check-out

pub mod attendance;
pub mod machine;
pub mod product;
pub mod sale;
pub mod stock;
pub mod stock_in;
pub mod stock_out;
pub mod transfer;
pub mod user;
pub mod warehouse;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::DbResult;

/// Generates a new record id.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Next daily document number, e.g. `SI-20240506-0003`.
///
/// Counted inside the caller's transaction; the UNIQUE index on `column`
/// rejects the rare collision instead of silently reusing a number.
pub(crate) async fn next_document_number(
    conn: &mut SqliteConnection,
    table: &'static str,
    column: &'static str,
    prefix: &str,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let stem = format!("{}-{}-", prefix, now.format("%Y%m%d"));
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} LIKE ?1");

    let issued: i64 = sqlx::query_scalar(&sql)
        .bind(format!("{stem}%"))
        .fetch_one(&mut *conn)
        .await?;

    Ok(format!("{}{:04}", stem, issued + 1))
}

/// Touches a document row as the transaction's first statement.
///
/// SQLite hands a deferred transaction the write lock on its first write. If
/// that write comes after a read, a concurrent commit in between fails the
/// upgrade with `SQLITE_BUSY`. Writing first makes competing workflows queue
/// on the busy timeout and then see the committed state.
pub(crate) async fn lock_row(conn: &mut SqliteConnection, table: &'static str, id: &str) -> DbResult<()> {
    let sql = format!("UPDATE {table} SET status = status WHERE id = ?1");
    sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    Ok(())
}

/// Opens an in-memory database with a warehouse and a few products.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::PathBuf;

    use depot_core::ProductKind;

    use super::product::NewProduct;
    use crate::{Database, DbConfig};

    pub struct Fixture {
        pub db: Database,
        pub main: String,
        pub branch: String,
        pub machine: String,
        pub sediment: String,
        pub carbon: String,
        pub part: String,
    }

    pub async fn setup() -> Fixture {
        setup_with(DbConfig::in_memory()).await
    }

    /// File-backed variant with a real pool, for tests that need several
    /// connections. Remove the returned path when done.
    pub async fn setup_file(name: &str) -> (Fixture, PathBuf) {
        let path = std::env::temp_dir().join(format!("depot-{name}-{}.db", uuid::Uuid::new_v4()));
        let fx = setup_with(DbConfig::new(&path).max_connections(4)).await;
        (fx, path)
    }

    pub async fn setup_with(config: DbConfig) -> Fixture {
        let db = Database::new(config).await.unwrap();

        let main = db.warehouses().create("MAIN", "Main warehouse").await.unwrap();
        let branch = db.warehouses().create("BR-1", "Branch one").await.unwrap();

        let products = db.products();
        let machine = products
            .create(&NewProduct {
                sku: "RO-500".into(),
                name: "RO purifier 500".into(),
                kind: ProductKind::Machine,
                price_cents: 45_000,
                low_stock_threshold: 2,
                filter_lifespan_days: None,
            })
            .await
            .unwrap();
        let sediment = products
            .create(&NewProduct {
                sku: "FLT-SED".into(),
                name: "Sediment filter".into(),
                kind: ProductKind::Filter,
                price_cents: 1_500,
                low_stock_threshold: 5,
                filter_lifespan_days: Some(180),
            })
            .await
            .unwrap();
        let carbon = products
            .create(&NewProduct {
                sku: "FLT-CTO".into(),
                name: "Carbon block filter".into(),
                kind: ProductKind::Filter,
                price_cents: 2_500,
                low_stock_threshold: 0,
                filter_lifespan_days: Some(365),
            })
            .await
            .unwrap();
        let part = products
            .create(&NewProduct {
                sku: "TAP-01".into(),
                name: "Faucet".into(),
                kind: ProductKind::Part,
                price_cents: 800,
                low_stock_threshold: 0,
                filter_lifespan_days: None,
            })
            .await
            .unwrap();

        products
            .set_filter_set(&machine.id, &[(sediment.id.clone(), 2), (carbon.id.clone(), 1)])
            .await
            .unwrap();

        Fixture {
            db,
            main: main.id,
            branch: branch.id,
            machine: machine.id,
            sediment: sediment.id,
            carbon: carbon.id,
            part: part.id,
        }
    }
}
