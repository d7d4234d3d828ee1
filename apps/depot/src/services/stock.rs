//! Stock endpoints: balances, movements, stock-ins, stock-outs, transfers.
//!
//! Workflow actions take the acting user as `?user_id=`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use depot_core::{MovementLine, StockLevel, StockMovement};
use depot_db::{
    MovementFilter, NewStockIn, NewStockOut, NewTransfer, StockInDetail, StockOutDetail, TransferDetail,
};
use serde::Deserialize;

use super::Actor;
use crate::alerts;
use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct LevelQuery {
    pub warehouse_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Adjustment {
    pub product_id: String,
    pub warehouse_id: String,
    /// Signed change, never zero.
    pub delta: i64,
    pub note: Option<String>,
    pub user_id: Option<String>,
}

// =============================================================================
// Balances and Ledger
// =============================================================================

pub async fn levels(State(state): State<SharedState>, Query(q): Query<LevelQuery>) -> ApiResult<Json<Vec<StockLevel>>> {
    Ok(Json(state.db.stock().levels(q.warehouse_id.as_deref()).await?))
}

pub async fn low(State(state): State<SharedState>) -> ApiResult<Json<Vec<StockLevel>>> {
    Ok(Json(state.db.stock().low_stock().await?))
}

pub async fn movements(
    State(state): State<SharedState>,
    Query(filter): Query<MovementFilter>,
) -> ApiResult<Json<Vec<MovementLine>>> {
    Ok(Json(state.db.stock().movements(&filter).await?))
}

pub async fn adjust(State(state): State<SharedState>, Json(req): Json<Adjustment>) -> ApiResult<Json<StockMovement>> {
    let movement = state
        .db
        .stock()
        .adjust(
            &req.product_id,
            &req.warehouse_id,
            req.delta,
            req.note.as_deref(),
            req.user_id.as_deref(),
        )
        .await?;
    if req.delta < 0 {
        alerts::spawn_low_stock_check(&state.db, &state.notifier, vec![req.product_id]);
    }
    Ok(Json(movement))
}

// =============================================================================
// Stock-ins
// =============================================================================

pub async fn create_stock_in(
    State(state): State<SharedState>,
    Query(actor): Query<Actor>,
    Json(req): Json<NewStockIn>,
) -> ApiResult<(StatusCode, Json<StockInDetail>)> {
    let detail = state.db.stock_ins().create(&req, actor.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_stock_in(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<StockInDetail>> {
    Ok(Json(state.db.stock_ins().get(&id).await?))
}

pub async fn receive_stock_in(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(actor): Query<Actor>,
) -> ApiResult<Json<StockInDetail>> {
    Ok(Json(state.db.stock_ins().receive(&id, actor.as_deref()).await?))
}

pub async fn cancel_stock_in(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<StockInDetail>> {
    Ok(Json(state.db.stock_ins().cancel(&id).await?))
}

// =============================================================================
// Stock-outs
// =============================================================================

pub async fn create_stock_out(
    State(state): State<SharedState>,
    Query(actor): Query<Actor>,
    Json(req): Json<NewStockOut>,
) -> ApiResult<(StatusCode, Json<StockOutDetail>)> {
    let detail = state.db.stock_outs().create(&req, actor.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_stock_out(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<StockOutDetail>> {
    Ok(Json(state.db.stock_outs().get(&id).await?))
}

pub async fn dispatch_stock_out(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(actor): Query<Actor>,
) -> ApiResult<Json<StockOutDetail>> {
    let detail = state.db.stock_outs().dispatch(&id, actor.as_deref()).await?;
    alerts::spawn_low_stock_check(&state.db, &state.notifier, detail.product_ids());
    Ok(Json(detail))
}

pub async fn cancel_stock_out(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StockOutDetail>> {
    Ok(Json(state.db.stock_outs().cancel(&id).await?))
}

// =============================================================================
// Transfers
// =============================================================================

pub async fn create_transfer(
    State(state): State<SharedState>,
    Query(actor): Query<Actor>,
    Json(req): Json<NewTransfer>,
) -> ApiResult<(StatusCode, Json<TransferDetail>)> {
    let detail = state.db.transfers().create(&req, actor.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_transfer(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<TransferDetail>> {
    Ok(Json(state.db.transfers().get(&id).await?))
}

pub async fn complete_transfer(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(actor): Query<Actor>,
) -> ApiResult<Json<TransferDetail>> {
    let detail = state.db.transfers().complete(&id, actor.as_deref()).await?;
    let products = detail.items.iter().map(|i| i.product_id.clone()).collect();
    alerts::spawn_low_stock_check(&state.db, &state.notifier, products);
    Ok(Json(detail))
}

pub async fn cancel_transfer(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<TransferDetail>> {
    Ok(Json(state.db.transfers().cancel(&id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::services::testing::app;

    #[tokio::test]
    async fn test_stock_out_dispatch_and_shortage() {
        let app = app().await;

        let (status, out) = app
            .post(
                "/api/stock-outs",
                json!({
                    "warehouse_id": app.warehouse,
                    "reason": "damaged",
                    "items": [{ "product_id": app.filter, "quantity": 16 }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = out["id"].as_str().unwrap().to_string();

        let (status, done) = app.post(&format!("/api/stock-outs/{id}/dispatch"), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "dispatched");

        let (_, low) = app.get("/api/stocks/low").await;
        assert_eq!(low[0]["sku"], "FLT-SED");
        assert_eq!(low[0]["quantity"], 4);

        let (_, again) = app
            .post(
                "/api/stock-outs",
                json!({
                    "warehouse_id": app.warehouse,
                    "items": [{ "product_id": app.filter, "quantity": 5 }]
                }),
            )
            .await;
        let again = again["id"].as_str().unwrap().to_string();
        let (status, body) = app.post(&format!("/api/stock-outs/{again}/dispatch"), json!({})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].as_str().unwrap().contains("Insufficient stock"));
    }

    #[tokio::test]
    async fn test_movement_history_lists_receipt() {
        let app = app().await;
        let (status, rows) = app
            .get(&format!("/api/stock-movements?product_id={}&movement_type=stock_in", app.filter))
            .await;
        assert_eq!(status, StatusCode::OK);
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["quantity"], 20);
        assert_eq!(rows[0]["balance_after"], 20);
    }

    #[tokio::test]
    async fn test_zero_and_extreme_adjustments_rejected() {
        let app = app().await;
        let (status, body) = app
            .post(
                "/api/stocks/adjust",
                json!({ "product_id": app.filter, "warehouse_id": app.warehouse, "delta": 0 }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation");

        let (status, body) = app
            .post(
                "/api/stocks/adjust",
                json!({ "product_id": app.filter, "warehouse_id": app.warehouse, "delta": i64::MIN }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation");
    }
}
