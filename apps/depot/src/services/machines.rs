//! Machine and filter endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use depot_core::{DueFilter, Machine};
use depot_db::{FilterReplacement, FilterState, MachineDetail};
use serde::Deserialize;

use crate::alerts;
use crate::error::ApiResult;
use crate::state::SharedState;

const DEFAULT_DUE_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct DueQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Replacement {
    /// Today (shop time) when absent.
    pub replaced_on: Option<NaiveDate>,
    /// Deduct the new filter from this warehouse.
    pub warehouse_id: Option<String>,
    pub user_id: Option<String>,
}

fn today(state: &SharedState) -> NaiveDate {
    state.clock.work_date(Utc::now())
}

pub async fn get(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<MachineDetail>> {
    Ok(Json(state.db.machines().get(&id).await?))
}

pub async fn by_sale(State(state): State<SharedState>, Path(sale_id): Path<String>) -> ApiResult<Json<Vec<Machine>>> {
    Ok(Json(state.db.machines().list_by_sale(&sale_id).await?))
}

/// Filters of a machine with their usage today.
pub async fn filters(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Json<Vec<FilterState>>> {
    let day = today(&state);
    Ok(Json(state.db.machines().filter_usage(&id, day).await?))
}

pub async fn filters_due(State(state): State<SharedState>, Query(q): Query<DueQuery>) -> ApiResult<Json<Vec<DueFilter>>> {
    let day = today(&state);
    let days = q.days.unwrap_or(DEFAULT_DUE_WINDOW_DAYS);
    Ok(Json(state.db.machines().filters_due(days, day).await?))
}

pub async fn replace_filter(
    State(state): State<SharedState>,
    Path(filter_id): Path<String>,
    Json(req): Json<Replacement>,
) -> ApiResult<Json<FilterReplacement>> {
    let replaced_on = req.replaced_on.unwrap_or_else(|| today(&state));
    let done = state
        .db
        .machines()
        .replace_filter(&filter_id, replaced_on, req.warehouse_id.as_deref(), req.user_id.as_deref())
        .await?;
    if done.movement.is_some() {
        alerts::spawn_low_stock_check(&state.db, &state.notifier, vec![done.installed.filter_product_id.clone()]);
    }
    Ok(Json(done))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::services::testing::{app, TestApp};

    async fn sold_machine(app: &TestApp) -> serde_json::Value {
        let (_, sale) = app
            .post(
                "/api/sales",
                json!({
                    "customer_name": "Ada",
                    "warehouse_id": app.warehouse,
                    "items": [{ "product_id": app.machine, "quantity": 1 }]
                }),
            )
            .await;
        let id = sale["id"].as_str().unwrap().to_string();
        let (_, done) = app
            .post(&format!("/api/sales/{id}/status"), json!({ "status": "completed" }))
            .await;
        done["machines"][0].clone()
    }

    #[tokio::test]
    async fn test_filters_and_replacement() {
        let app = app().await;
        let machine = sold_machine(&app).await;
        let machine_id = machine["id"].as_str().unwrap();

        let (status, filters) = app.get(&format!("/api/machines/{machine_id}/filters")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(filters[0]["status"], "active");
        let filter_id = filters[0]["id"].as_str().unwrap().to_string();

        let (_, due) = app.get("/api/filters/due?days=365").await;
        assert_eq!(due.as_array().unwrap().len(), 1);
        let (_, due) = app.get("/api/filters/due?days=0").await;
        assert!(due.as_array().unwrap().is_empty());

        let (status, done) = app
            .post(
                &format!("/api/filters/{filter_id}/replace"),
                json!({ "warehouse_id": app.warehouse }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["replaced"]["status"], "replaced");
        assert_eq!(done["installed"]["status"], "active");
        assert_eq!(done["movement"]["quantity"], -1);

        let (status, _) = app
            .post(&format!("/api/filters/{filter_id}/replace"), json!({}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
