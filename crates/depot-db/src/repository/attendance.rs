//! # Attendance Repository
//!
//! One record per user and work day; the scan decides what happens next.
//!
//! ```text
//!   process(user, now)
//!     work_date = local date of `now`
//!     record for (user, work_date)?
//!       none             ──► check_in   (INSERT, lateness from policy)
//!       open             ──► check_out  (UPDATE .. WHERE check_out_at IS NULL)
//!       closed           ──► done       (nothing written)
//! ```
//!
//! The UNIQUE (user_id, work_date) index makes a double check-in from two
//! simultaneous scans fail instead of creating a second row.

use chrono::{DateTime, NaiveDate, Utc};
use depot_core::attendance::{self, AttendanceAction, AttendanceClock, WorkSummary};
use depot_core::validation::validate_date_range;
use depot_core::{Attendance, AttendanceLine, CoreError, User, ValidationError};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::new_id;
use crate::error::{DbError, DbResult};

const ATTENDANCE_COLUMNS: &str = "id, user_id, work_date, check_in_at, check_out_at, work_minutes, \
     overtime_minutes, is_late, created_at, updated_at";

/// What a scan did.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceOutcome {
    pub action: AttendanceAction,
    pub user: User,
    pub record: Attendance,
    /// Present after a check-out.
    pub summary: Option<WorkSummary>,
}

#[derive(Debug, Clone)]
pub struct AttendanceRepository {
    pool: SqlitePool,
}

impl AttendanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AttendanceRepository { pool }
    }

    pub async fn for_day(&self, user_id: &str, work_date: NaiveDate) -> DbResult<Option<Attendance>> {
        let record = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE user_id = ?1 AND work_date = ?2"
        ))
        .bind(user_id)
        .bind(work_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Opens the day's record.
    pub async fn check_in(&self, user_id: &str, at: DateTime<Utc>, clock: &AttendanceClock) -> DbResult<Attendance> {
        let record = Attendance {
            id: new_id(),
            user_id: user_id.to_string(),
            work_date: clock.work_date(at),
            check_in_at: at,
            check_out_at: None,
            work_minutes: None,
            overtime_minutes: None,
            is_late: clock.is_late(at),
            created_at: at,
            updated_at: at,
        };

        sqlx::query(
            "INSERT INTO attendances (id, user_id, work_date, check_in_at, check_out_at, \
                 work_minutes, overtime_minutes, is_late, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.work_date)
        .bind(record.check_in_at)
        .bind(record.check_out_at)
        .bind(record.work_minutes)
        .bind(record.overtime_minutes)
        .bind(record.is_late)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("attendance", record.work_date.to_string()),
            other => other,
        })?;

        info!(user_id = %user_id, work_date = %record.work_date, late = record.is_late, "Checked in");
        Ok(record)
    }

    /// Closes the day's record and stores worked and overtime minutes.
    pub async fn check_out(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
        clock: &AttendanceClock,
    ) -> DbResult<(Attendance, WorkSummary)> {
        let work_date = clock.work_date(at);
        let mut record = self
            .for_day(user_id, work_date)
            .await?
            .ok_or_else(|| DbError::not_found("Attendance", format!("{user_id} on {work_date}")))?;

        let summary = attendance::compute_work(record.check_in_at, at, &clock.policy)?;

        let result = sqlx::query(
            "UPDATE attendances SET check_out_at = ?1, work_minutes = ?2, overtime_minutes = ?3, \
                 updated_at = ?1 \
             WHERE id = ?4 AND check_out_at IS NULL",
        )
        .bind(at)
        .bind(summary.worked_minutes)
        .bind(summary.overtime_minutes)
        .bind(&record.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::AttendanceComplete {
                date: work_date.to_string(),
            }
            .into());
        }

        record.check_out_at = Some(at);
        record.work_minutes = Some(summary.worked_minutes);
        record.overtime_minutes = Some(summary.overtime_minutes);
        record.updated_at = at;

        info!(
            user_id = %user_id,
            work_date = %work_date,
            worked = %attendance::format_hours(summary.worked_minutes),
            overtime = %attendance::format_hours(summary.overtime_minutes),
            "Checked out"
        );
        Ok((record, summary))
    }

    /// Handles one scan for an active user.
    pub async fn process(&self, user_id: &str, now: DateTime<Utc>, clock: &AttendanceClock) -> DbResult<AttendanceOutcome> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, is_active, created_at, updated_at FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", user_id))?;
        if !user.is_active {
            return Err(ValidationError::NotAllowed {
                field: "user".to_string(),
                allowed: vec!["active users".to_string()],
            }
            .into());
        }

        let today = self.for_day(user_id, clock.work_date(now)).await?;
        let action = attendance::next_action(today.as_ref());
        debug!(user_id = %user_id, action = %action, "Attendance scan");

        let (record, summary) = match (action, today) {
            (AttendanceAction::CheckIn, _) => (self.check_in(user_id, now, clock).await?, None),
            (AttendanceAction::CheckOut, _) => {
                let (record, summary) = self.check_out(user_id, now, clock).await?;
                (record, Some(summary))
            }
            (AttendanceAction::Done, Some(record)) => (record, None),
            (AttendanceAction::Done, None) => {
                return Err(DbError::Internal("attendance done without a record".to_string()))
            }
        };

        Ok(AttendanceOutcome {
            action,
            user,
            record,
            summary,
        })
    }

    /// Records in an inclusive work-date range, optionally for one user.
    pub async fn list(&self, from: NaiveDate, to: NaiveDate, user_id: Option<&str>) -> DbResult<Vec<AttendanceLine>> {
        validate_date_range(from, to)?;

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT a.id, a.user_id, a.work_date, a.check_in_at, a.check_out_at, a.work_minutes, \
                 a.overtime_minutes, a.is_late, a.created_at, a.updated_at, \
                 u.name AS user_name, u.email AS user_email \
             FROM attendances a \
             JOIN users u ON u.id = a.user_id \
             WHERE a.work_date >= ",
        );
        query.push_bind(from).push(" AND a.work_date <= ").push_bind(to);
        if let Some(user_id) = user_id {
            query.push(" AND a.user_id = ").push_bind(user_id);
        }
        query.push(" ORDER BY a.work_date, u.name");

        let lines = query.build_query_as::<AttendanceLine>().fetch_all(&self.pool).await?;
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{FixedOffset, TimeZone};
    use depot_core::attendance::WorkPolicy;

    async fn setup() -> (Database, User) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.users().create("Grace Wanjiru", "grace@example.com").await.unwrap();
        (db, user)
    }

    fn nairobi() -> AttendanceClock {
        AttendanceClock::new(FixedOffset::east_opt(3 * 3600).unwrap(), WorkPolicy::default())
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        // local (UTC+3) wall-clock time on 2024-05-06
        Utc.with_ymd_and_hms(2024, 5, 6, h, m, 0).unwrap() - chrono::Duration::hours(3)
    }

    #[tokio::test]
    async fn test_check_in_then_out_then_done() {
        let (db, user) = setup().await;
        let clock = nairobi();
        let repo = db.attendance();

        let first = repo.process(&user.id, at(8, 55), &clock).await.unwrap();
        assert_eq!(first.action, AttendanceAction::CheckIn);
        assert!(!first.record.is_late);
        assert_eq!(first.record.work_date, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());

        let second = repo.process(&user.id, at(18, 55), &clock).await.unwrap();
        assert_eq!(second.action, AttendanceAction::CheckOut);
        let summary = second.summary.unwrap();
        assert_eq!(summary.span_minutes, 600);
        assert_eq!(summary.worked_minutes, 540);
        assert_eq!(summary.overtime_minutes, 60);
        assert_eq!(second.record.work_minutes, Some(540));

        let third = repo.process(&user.id, at(19, 30), &clock).await.unwrap();
        assert_eq!(third.action, AttendanceAction::Done);
        assert_eq!(third.record.check_out_at, second.record.check_out_at);
        assert_eq!(third.user.email, "grace@example.com");
    }

    #[tokio::test]
    async fn test_late_check_in_uses_local_time() {
        let (db, user) = setup().await;
        let outcome = db.attendance().process(&user.id, at(9, 20), &nairobi()).await.unwrap();
        assert!(outcome.record.is_late);
    }

    #[tokio::test]
    async fn test_second_check_in_is_duplicate() {
        let (db, user) = setup().await;
        let clock = nairobi();
        db.attendance().check_in(&user.id, at(9, 0), &clock).await.unwrap();
        let again = db.attendance().check_in(&user.id, at(9, 1), &clock).await;
        assert!(matches!(again, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let (db, _) = setup().await;
        let result = db.attendance().process("missing", at(9, 0), &nairobi()).await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_joins_user_names() {
        let (db, user) = setup().await;
        let clock = nairobi();
        let other = db.users().create("Peter Kamau", "peter@example.com").await.unwrap();
        db.attendance().process(&user.id, at(9, 0), &clock).await.unwrap();
        db.attendance().process(&other.id, at(9, 0), &clock).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let all = db.attendance().list(day, day, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_name, "Grace Wanjiru");

        let one = db.attendance().list(day, day, Some(&other.id)).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].user_email, "peter@example.com");
    }
}
