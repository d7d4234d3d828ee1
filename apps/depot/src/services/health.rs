//! Liveness and database check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
    pub telegram: bool,
    pub version: &'static str,
}

pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<Health>) {
    let database = state.db.health_check().await;
    if !database {
        warn!("Health check: database unavailable");
    }
    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(Health {
            status: if database { "ok" } else { "degraded" },
            database,
            telegram: state.notifier.is_enabled(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::services::testing::app;

    #[tokio::test]
    async fn test_health_reports_ok() {
        let app = app().await;
        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["telegram"], false);
    }
}
