//! Spreadsheet downloads.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use depot_report::{write_xlsx, ExportKind};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::export::build_report;
use crate::state::SharedState;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// `GET /api/exports/{kind}?from=YYYY-MM-DD&to=YYYY-MM-DD`
pub async fn download(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    Query(period): Query<Period>,
) -> ApiResult<Response> {
    let kind: ExportKind = kind.parse()?;
    let report = build_report(&state.db, kind, period.from, period.to, state.clock.offset).await?;
    let bytes = write_xlsx(&report)?;

    let disposition = format!("attachment; filename=\"{}\"", kind.file_name(period.from, period.to));
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
