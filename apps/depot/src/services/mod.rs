//! HTTP routes.
//!
//! ```text
//!   /health                                   health
//!   /attendance/{qr,scan,process,status}      attendance
//!   /api/sales[/..]                           sales
//!   /api/stocks, /api/stock-*, /api/transfers stock
//!   /api/machines/.., /api/filters/..         machines
//!   /api/exports/{kind}                       exports
//! ```

pub mod attendance;
pub mod exports;
pub mod health;
pub mod machines;
pub mod sales;
pub mod stock;

use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// `?user_id=` on workflow actions; recorded as the acting user.
#[derive(Debug, Default, Deserialize)]
pub struct Actor {
    pub user_id: Option<String>,
}

impl Actor {
    pub fn as_deref(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

pub fn router(state: SharedState) -> Router {
    let attendance = Router::new()
        .route("/qr", get(attendance::qr))
        .route("/scan", post(attendance::scan))
        .route("/process", post(attendance::process))
        .route("/status", get(attendance::status));

    let api = Router::new()
        .route("/sales", get(sales::list).post(sales::create))
        .route("/sales/{id}", get(sales::get))
        .route("/sales/{id}/status", post(sales::transition))
        .route("/sales/{id}/machines", get(machines::by_sale))
        .route("/stocks", get(stock::levels))
        .route("/stocks/low", get(stock::low))
        .route("/stocks/adjust", post(stock::adjust))
        .route("/stock-movements", get(stock::movements))
        .route("/stock-ins", post(stock::create_stock_in))
        .route("/stock-ins/{id}", get(stock::get_stock_in))
        .route("/stock-ins/{id}/receive", post(stock::receive_stock_in))
        .route("/stock-ins/{id}/cancel", post(stock::cancel_stock_in))
        .route("/stock-outs", post(stock::create_stock_out))
        .route("/stock-outs/{id}", get(stock::get_stock_out))
        .route("/stock-outs/{id}/dispatch", post(stock::dispatch_stock_out))
        .route("/stock-outs/{id}/cancel", post(stock::cancel_stock_out))
        .route("/transfers", post(stock::create_transfer))
        .route("/transfers/{id}", get(stock::get_transfer))
        .route("/transfers/{id}/complete", post(stock::complete_transfer))
        .route("/transfers/{id}/cancel", post(stock::cancel_transfer))
        .route("/machines/{id}", get(machines::get))
        .route("/machines/{id}/filters", get(machines::filters))
        .route("/filters/due", get(machines::filters_due))
        .route("/filters/{id}/replace", post(machines::replace_filter))
        .route("/exports/{kind}", get(exports::download));

    Router::new()
        .route("/health", get(health::health))
        .nest("/attendance", attendance)
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use depot_core::ProductKind;
    use depot_db::{Database, DbConfig, NewProduct, NewStockIn, NewStockInItem};
    use depot_notify::Notifier;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::router;
    use crate::config::AppConfig;
    use crate::state::{AppState, SharedState};

    pub struct TestApp {
        pub state: SharedState,
        pub warehouse: String,
        pub machine: String,
        pub filter: String,
        pub user: String,
    }

    impl TestApp {
        pub fn router(&self) -> Router {
            router(self.state.clone())
        }

        pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, body)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.send(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }
    }

    /// One warehouse stocked with 5 machines and 20 filters, one user.
    pub async fn app() -> TestApp {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let warehouse = db.warehouses().create("MAIN", "Main warehouse").await.unwrap();
        let filter = db
            .products()
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
        let machine = db
            .products()
            .create(&NewProduct {
                sku: "RO-500".into(),
                name: "RO purifier 500".into(),
                kind: ProductKind::Machine,
                price_cents: 45_000,
                low_stock_threshold: 0,
                filter_lifespan_days: None,
            })
            .await
            .unwrap();
        db.products().set_filter_set(&machine.id, &[(filter.id.clone(), 1)]).await.unwrap();

        let receipt = db
            .stock_ins()
            .create(
                &NewStockIn {
                    warehouse_id: warehouse.id.clone(),
                    supplier: None,
                    notes: None,
                    items: vec![
                        NewStockInItem {
                            product_id: machine.id.clone(),
                            quantity: 5,
                            unit_cost_cents: 0,
                        },
                        NewStockInItem {
                            product_id: filter.id.clone(),
                            quantity: 20,
                            unit_cost_cents: 0,
                        },
                    ],
                },
                None,
            )
            .await
            .unwrap();
        db.stock_ins().receive(&receipt.stock_in.id, None).await.unwrap();

        let user = db.users().create("Grace Hopper", "grace@example.com").await.unwrap();

        let state = AppState::new(db, AppConfig::default(), Notifier::disabled()).unwrap();
        TestApp {
            state,
            warehouse: warehouse.id,
            machine: machine.id,
            filter: filter.id,
            user: user.id,
        }
    }
}
