//! # Seed Data Generator
//!
//! Populates a database with a small demo catalog for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p depot-db --bin seed
//!
//! # Specify database path
//! cargo run -p depot-db --bin seed -- --db ./data/depot.db
//! ```
//!
//! ## Generated Data
//! - Warehouses `MAIN` and `BR-1`
//! - Machines, filters and parts (see [`CATALOG`]), each machine with a
//!   default filter set
//! - Opening stock in `MAIN`, received through a stock-in so the ledger
//!   shows where it came from
//! - Two staff users, one of them super admin

use depot_core::{ProductKind, ROLE_STAFF, ROLE_TECHNICIAN};
use depot_db::{Database, DbConfig, NewProduct, NewStockIn, NewStockInItem};
use std::collections::HashMap;
use std::env;

/// (sku, name, kind, price_cents, low_stock_threshold, filter_lifespan_days, opening_stock)
type CatalogRow = (&'static str, &'static str, ProductKind, i64, i64, Option<i64>, i64);

const CATALOG: &[CatalogRow] = &[
    ("RO-500", "RO purifier 500", ProductKind::Machine, 45_000, 2, None, 6),
    ("RO-750", "RO purifier 750 under-sink", ProductKind::Machine, 62_000, 1, None, 3),
    ("UV-100", "UV steriliser", ProductKind::Machine, 28_000, 1, None, 2),
    ("FLT-SED", "Sediment filter 5 micron", ProductKind::Filter, 1_500, 10, Some(180), 40),
    ("FLT-CTO", "Carbon block filter", ProductKind::Filter, 2_500, 10, Some(365), 25),
    ("FLT-MEM", "RO membrane 75 GPD", ProductKind::Filter, 9_000, 3, Some(730), 8),
    ("FLT-UVL", "UV lamp", ProductKind::Filter, 4_000, 2, Some(365), 4),
    ("TAP-01", "Faucet, chrome", ProductKind::Part, 800, 5, None, 30),
    ("TUBE-14", "1/4\" tubing, per metre", ProductKind::Part, 60, 50, None, 400),
];

/// (machine sku, [(filter sku, quantity)])
const FILTER_SETS: &[(&str, &[(&str, i64)])] = &[
    ("RO-500", &[("FLT-SED", 2), ("FLT-CTO", 1), ("FLT-MEM", 1)]),
    ("RO-750", &[("FLT-SED", 1), ("FLT-CTO", 2), ("FLT-MEM", 1)]),
    ("UV-100", &[("FLT-SED", 1), ("FLT-UVL", 1)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./depot_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Depot Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./depot_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Depot Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let main = db.warehouses().create("MAIN", "Main warehouse").await?;
    db.warehouses().create("BR-1", "Branch one").await?;
    println!("✓ Created 2 warehouses");

    let mut ids: HashMap<&str, String> = HashMap::new();
    for (sku, name, kind, price_cents, threshold, lifespan, _) in CATALOG {
        let product = db
            .products()
            .create(&NewProduct {
                sku: sku.to_string(),
                name: name.to_string(),
                kind: *kind,
                price_cents: *price_cents,
                low_stock_threshold: *threshold,
                filter_lifespan_days: *lifespan,
            })
            .await?;
        ids.insert(sku, product.id);
    }
    println!("✓ Created {} products", ids.len());

    for (machine_sku, filters) in FILTER_SETS {
        let machine_id = &ids[machine_sku];
        let set: Vec<(String, i64)> = filters
            .iter()
            .map(|(sku, qty)| (ids[sku].clone(), *qty))
            .collect();
        db.products().set_filter_set(machine_id, &set).await?;
    }
    println!("✓ Configured {} filter sets", FILTER_SETS.len());

    let opening = NewStockIn {
        warehouse_id: main.id.clone(),
        supplier: Some("Opening balance".to_string()),
        notes: None,
        items: CATALOG
            .iter()
            .map(|(sku, _, _, _, _, _, qty)| NewStockInItem {
                product_id: ids[sku].clone(),
                quantity: *qty,
                unit_cost_cents: 0,
            })
            .collect(),
    };
    let stock_in = db.stock_ins().create(&opening, None).await?;
    db.stock_ins().receive(&stock_in.stock_in.id, None).await?;
    println!("✓ Received opening stock ({})", stock_in.stock_in.reference_no);

    let admin = db.users().create("Depot Admin", "admin@depot.local").await?;
    db.users().assign_role(&admin.id, ROLE_STAFF).await?;
    db.users().promote_super_admin(&admin.email).await?;
    let tech = db.users().create("Field Technician", "tech@depot.local").await?;
    db.users().assign_role(&tech.id, ROLE_TECHNICIAN).await?;
    println!("✓ Created users {} and {}", admin.email, tech.email);

    let low = db.stock().low_stock().await?;
    println!();
    println!("Low stock after seeding: {}", low.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
