//! Attendance endpoints.
//!
//! ## Scan Flow
//! ```text
//! ┌────────────┐  GET /attendance/qr   ┌────────────┐
//! │ Door tablet│ ────────────────────► │   server   │  today's token
//! └────────────┘                       └────────────┘
//!       │ shows QR
//!       ▼
//! ┌────────────┐  POST /attendance/scan {token, user_id}
//! │   phone    │ ─────────────────────────────────────► verify token → process
//! └────────────┘
//!
//!   process: no record → check_in │ open record → check_out │ closed → done
//! ```

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use depot_core::attendance::{format_hours, local_time, next_action, AttendanceAction};
use depot_core::Attendance;
use depot_db::AttendanceOutcome;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::token::ScanToken;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub action: AttendanceAction,
    pub message: String,
    /// Local `HH:MM` of the scan.
    pub time: String,
    /// Decimal hours worked, once checked out.
    pub work_hours: Option<String>,
    pub overtime_hours: Option<String>,
    pub user: UserRef,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub user_id: String,
    pub work_date: NaiveDate,
    /// What the next scan will do.
    pub next_action: AttendanceAction,
    pub record: Option<Attendance>,
    pub work_hours: Option<String>,
}

pub async fn qr(State(state): State<SharedState>) -> ApiResult<Json<ScanToken>> {
    let today = state.clock.work_date(Utc::now());
    Ok(Json(state.tokens.issue(today)?))
}

pub async fn scan(State(state): State<SharedState>, Json(req): Json<ScanRequest>) -> ApiResult<Json<ScanResponse>> {
    let now = Utc::now();
    state.tokens.verify(&req.token, state.clock.work_date(now))?;
    run(&state, &req.user_id, now).await
}

pub async fn process(
    State(state): State<SharedState>,
    Json(req): Json<ProcessRequest>,
) -> ApiResult<Json<ScanResponse>> {
    run(&state, &req.user_id, Utc::now()).await
}

pub async fn status(
    State(state): State<SharedState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<StatusResponse>> {
    let work_date = state.clock.work_date(Utc::now());
    let user = state.db.users().get_by_id(&query.user_id).await?;
    if user.is_none() {
        return Err(ApiError::NotFound(format!("User not found: {}", query.user_id)));
    }

    let record = state.db.attendance().for_day(&query.user_id, work_date).await?;
    Ok(Json(StatusResponse {
        success: true,
        user_id: query.user_id,
        work_date,
        next_action: next_action(record.as_ref()),
        work_hours: record.as_ref().and_then(|r| r.work_minutes).map(format_hours),
        record,
    }))
}

async fn run(state: &SharedState, user_id: &str, now: DateTime<Utc>) -> ApiResult<Json<ScanResponse>> {
    if user_id.trim().is_empty() {
        return Err(ApiError::Validation("user_id is required".to_string()));
    }
    let outcome = state.db.attendance().process(user_id, now, &state.clock).await?;
    info!(user_id = %user_id, action = %outcome.action, "Attendance processed");
    Ok(Json(response(outcome, now, state)))
}

fn response(outcome: AttendanceOutcome, now: DateTime<Utc>, state: &SharedState) -> ScanResponse {
    let offset = state.clock.offset;
    let hhmm = |at: DateTime<Utc>| local_time(at, offset).format("%H:%M").to_string();
    let worked = outcome.summary.map(|s| s.worked_minutes).or(outcome.record.work_minutes);
    let overtime = outcome.summary.map(|s| s.overtime_minutes).or(outcome.record.overtime_minutes);

    let message = match outcome.action {
        AttendanceAction::CheckIn if outcome.record.is_late => {
            format!("Checked in at {} (late)", hhmm(outcome.record.check_in_at))
        }
        AttendanceAction::CheckIn => format!("Checked in at {}", hhmm(outcome.record.check_in_at)),
        AttendanceAction::CheckOut => format!(
            "Checked out at {}, worked {} h",
            hhmm(now),
            worked.map(format_hours).unwrap_or_default()
        ),
        AttendanceAction::Done => "Attendance for today is already complete".to_string(),
    };

    ScanResponse {
        success: true,
        action: outcome.action,
        message,
        time: hhmm(now),
        work_hours: worked.map(format_hours),
        overtime_hours: overtime.map(format_hours),
        user: UserRef {
            id: outcome.user.id,
            name: outcome.user.name,
        },
    }
}
