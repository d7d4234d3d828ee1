//! # Attendance
//!
//! Work-hour and overtime math for a single attendance day.
//!
//! ## One Day, Three Scans
//! ```text
//!   scan #1 ──► check_in   (record created, lateness decided)
//!   scan #2 ──► check_out  (work + overtime minutes stored)
//!   scan #3 ──► done       (nothing changes)
//! ```
//!
//! ## Worked Time
//! ```text
//!   span      = check_out − check_in
//!   worked    = span − break      (break only when span ≥ break_threshold)
//!   overtime  = max(0, worked − standard)
//! ```

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::Attendance;

// =============================================================================
// Work Policy
// =============================================================================

/// Shop rules for one working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPolicy {
    /// Scheduled start of the shift, local time.
    pub shift_start: NaiveTime,
    /// Worked minutes beyond this count as overtime.
    pub standard_minutes: i64,
    /// Unpaid break deducted from long days.
    pub break_minutes: i64,
    /// Spans shorter than this keep their break.
    pub break_threshold_minutes: i64,
    /// Check-ins up to this many minutes after shift start are on time.
    pub late_grace_minutes: i64,
}

impl Default for WorkPolicy {
    fn default() -> Self {
        WorkPolicy {
            shift_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            standard_minutes: 8 * 60,
            break_minutes: 60,
            break_threshold_minutes: 5 * 60,
            late_grace_minutes: 15,
        }
    }
}

/// Policy plus the shop's UTC offset: everything needed to place a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceClock {
    pub offset: FixedOffset,
    pub policy: WorkPolicy,
}

impl AttendanceClock {
    pub fn new(offset: FixedOffset, policy: WorkPolicy) -> Self {
        AttendanceClock { offset, policy }
    }

    /// Work date a scan at `at` belongs to.
    pub fn work_date(&self, at: DateTime<Utc>) -> NaiveDate {
        local_date(at, self.offset)
    }

    /// Whether a check-in at `at` is late.
    pub fn is_late(&self, at: DateTime<Utc>) -> bool {
        is_late(local_time(at, self.offset), &self.policy)
    }
}

impl Default for AttendanceClock {
    fn default() -> Self {
        AttendanceClock {
            offset: Utc.fix(),
            policy: WorkPolicy::default(),
        }
    }
}

// =============================================================================
// Next Action
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceAction {
    CheckIn,
    CheckOut,
    Done,
}

impl AttendanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceAction::CheckIn => "check_in",
            AttendanceAction::CheckOut => "check_out",
            AttendanceAction::Done => "done",
        }
    }
}

impl fmt::Display for AttendanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a scan does given today's record.
pub fn next_action(today: Option<&Attendance>) -> AttendanceAction {
    match today {
        None => AttendanceAction::CheckIn,
        Some(record) if record.check_out_at.is_none() => AttendanceAction::CheckOut,
        Some(_) => AttendanceAction::Done,
    }
}

// =============================================================================
// Work Computation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSummary {
    pub span_minutes: i64,
    pub break_minutes: i64,
    pub worked_minutes: i64,
    pub overtime_minutes: i64,
}

/// Computes worked and overtime minutes for a check-in/check-out pair.
///
/// Works on absolute timestamps, so a night shift across midnight is one
/// continuous span.
pub fn compute_work(
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
    policy: &WorkPolicy,
) -> CoreResult<WorkSummary> {
    if check_out < check_in {
        return Err(CoreError::CheckOutBeforeCheckIn {
            check_in: check_in.to_rfc3339(),
            check_out: check_out.to_rfc3339(),
        });
    }

    let span_minutes = (check_out - check_in).num_minutes();
    let break_minutes = if span_minutes >= policy.break_threshold_minutes {
        policy.break_minutes.min(span_minutes)
    } else {
        0
    };
    let worked_minutes = span_minutes - break_minutes;
    let overtime_minutes = (worked_minutes - policy.standard_minutes).max(0);

    Ok(WorkSummary {
        span_minutes,
        break_minutes,
        worked_minutes,
        overtime_minutes,
    })
}

/// Late when the local check-in time is past shift start plus grace.
pub fn is_late(check_in_local: NaiveTime, policy: &WorkPolicy) -> bool {
    let (deadline, wrapped) = policy
        .shift_start
        .overflowing_add_signed(Duration::minutes(policy.late_grace_minutes));
    // a grace period running past midnight never marks anyone late
    wrapped == 0 && check_in_local > deadline
}

/// Calendar day of an instant at the shop's UTC offset.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Wall-clock time of an instant at the shop's UTC offset.
pub fn local_time(at: DateTime<Utc>, offset: FixedOffset) -> NaiveTime {
    at.with_timezone(&offset).time()
}

// =============================================================================
// Formatting
// =============================================================================

/// Minutes as decimal hours with two places: 450 → `"7.50"`.
pub fn format_hours(minutes: i64) -> String {
    let sign = if minutes < 0 { "-" } else { "" };
    let abs = minutes.unsigned_abs();
    let hundredths = (abs * 100 + 30) / 60;
    format!("{}{}.{:02}", sign, hundredths / 100, hundredths % 100)
}

/// Minutes as fractional hours for spreadsheet cells.
#[inline]
pub fn minutes_to_hours(minutes: i64) -> f64 {
    minutes as f64 / 60.0
}

// =============================================================================
// Unit Tests
// =============================================================================
