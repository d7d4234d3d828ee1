//! Loads the records behind an export and builds its report.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use depot_core::validation::validate_date_range;
use depot_core::ValidationError;
use depot_db::{Database, DbResult, MovementFilter, SaleFilter};
use depot_report::{attendance_report, movement_report, sales_report, stock_report, ExportKind, Report};
use tracing::info;

/// Sales and movement exports larger than this are refused rather than cut
/// short, so footer totals always cover the whole period.
pub const MAX_EXPORT_ROWS: i64 = 10_000;

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn check_row_count(rows: usize, max_rows: i64) -> DbResult<()> {
    if i64::try_from(rows).unwrap_or(i64::MAX) > max_rows {
        return Err(ValidationError::OutOfRange {
            field: "export rows (narrow the date range)".to_string(),
            min: 0,
            max: max_rows,
        }
        .into());
    }
    Ok(())
}

/// `from..=to` are calendar days; attendance times are shown at `offset`.
pub async fn build_report(
    db: &Database,
    kind: ExportKind,
    from: NaiveDate,
    to: NaiveDate,
    offset: FixedOffset,
) -> DbResult<Report> {
    build_report_within(db, kind, from, to, offset, MAX_EXPORT_ROWS).await
}

async fn build_report_within(
    db: &Database,
    kind: ExportKind,
    from: NaiveDate,
    to: NaiveDate,
    offset: FixedOffset,
    max_rows: i64,
) -> DbResult<Report> {
    validate_date_range(from, to)?;

    let report = match kind {
        ExportKind::Sales => {
            let mut sales = db
                .sales()
                .list(&SaleFilter {
                    from: Some(from),
                    to: Some(to),
                    status: None,
                    limit: Some(max_rows + 1),
                })
                .await?;
            check_row_count(sales.len(), max_rows)?;
            sales.reverse();
            sales_report(&sales, from, to)
        }
        ExportKind::Stock => stock_report(&db.stock().levels(None).await?, to),
        ExportKind::Movements => {
            let lines = db
                .stock()
                .movements(&MovementFilter {
                    from: Some(day_start(from)),
                    to: Some(day_start(to + Duration::days(1))),
                    limit: Some(max_rows + 1),
                    oldest_first: true,
                    ..Default::default()
                })
                .await?;
            check_row_count(lines.len(), max_rows)?;
            movement_report(&lines, from, to)
        }
        ExportKind::Attendance => {
            let lines = db.attendance().list(from, to, None).await?;
            attendance_report(&lines, from, to, offset)
        }
    };

    info!(kind = %kind, %from, %to, rows = report.rows.len(), "Export built");
    Ok(report)
}
