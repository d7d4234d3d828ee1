//! Sale endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use depot_core::{Sale, SaleStatus};
use depot_db::{NewSale, SaleDetail, SaleFilter, SaleTransition};
use serde::Deserialize;
use tracing::info;

use crate::alerts;
use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateSale {
    #[serde(flatten)]
    pub sale: NewSale,
    pub sold_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: SaleStatus,
    pub user_id: Option<String>,
}

pub async fn create(
    State(state): State<SharedState>,
    Json(req): Json<CreateSale>,
) -> ApiResult<(StatusCode, Json<SaleDetail>)> {
    let detail = state
        .db
        .sales()
        .create(&req.sale, state.config.sales.tax_rate(), req.sold_by.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list(State(state): State<SharedState>, Query(filter): Query<SaleFilter>) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.db.sales().list(&filter).await?))
}

pub async fn get(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<SaleDetail>> {
    Ok(Json(state.db.sales().get(&id).await?))
}

pub async fn transition(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<StatusChange>,
) -> ApiResult<Json<SaleTransition>> {
    let done = state.db.sales().transition(&id, req.status, req.user_id.as_deref()).await?;
    info!(
        invoice = %done.detail.sale.invoice_number,
        from = %done.previous,
        to = %done.detail.sale.status,
        machines = done.machines.len(),
        "Sale status changed"
    );

    alerts::notify_sale_transition(&state.notifier, &done);
    if done.detail.sale.status == SaleStatus::Completed {
        alerts::spawn_low_stock_check(&state.db, &state.notifier, done.detail.product_ids());
    }
    Ok(Json(done))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::services::testing::app;

    #[tokio::test]
    async fn test_sale_completion_provisions_machine() {
        let app = app().await;

        let (status, sale) = app
            .post(
                "/api/sales",
                json!({
                    "customer_name": "Ada",
                    "customer_phone": "+254700000000",
                    "warehouse_id": app.warehouse,
                    "discount_cents": 1000,
                    "items": [{ "product_id": app.machine, "quantity": 1 }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sale["status"], "pending");
        assert_eq!(sale["net_total_cents"], 44_000);
        let id = sale["id"].as_str().unwrap().to_string();

        let (status, done) = app
            .post(&format!("/api/sales/{id}/status"), json!({ "status": "completed" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["previous"], "pending");
        assert_eq!(done["status"], "completed");
        assert_eq!(done["machines"].as_array().unwrap().len(), 1);
        assert_eq!(done["machines"][0]["filters"].as_array().unwrap().len(), 1);

        let (_, machines) = app.get(&format!("/api/sales/{id}/machines")).await;
        assert_eq!(machines.as_array().unwrap().len(), 1);

        let (status, body) = app
            .post(&format!("/api/sales/{id}/status"), json!({ "status": "processing" }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "business_rule");
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_business_rule() {
        let app = app().await;
        let (_, sale) = app
            .post(
                "/api/sales",
                json!({
                    "customer_name": "Ada",
                    "warehouse_id": app.warehouse,
                    "items": [{ "product_id": app.machine, "quantity": 9 }]
                }),
            )
            .await;
        let id = sale["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .post(&format!("/api/sales/{id}/status"), json!({ "status": "completed" }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, levels) = app.get("/api/stocks").await;
        let machine = levels
            .as_array()
            .unwrap()
            .iter()
            .find(|l| l["sku"] == "RO-500")
            .unwrap();
        assert_eq!(machine["quantity"], 5);
    }

    #[tokio::test]
    async fn test_missing_sale_is_404() {
        let app = app().await;
        let (status, body) = app.get("/api/sales/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }
}
