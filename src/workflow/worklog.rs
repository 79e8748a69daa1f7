use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

use crate::errors::{AppError, AppResult};

/// A work log is open from check-in until check-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkLogState {
    Open,
    Closed,
}

impl WorkLogState {
    pub fn from_open(open: bool) -> Self {
        if open {
            WorkLogState::Open
        } else {
            WorkLogState::Closed
        }
    }

    /// Closes the log and derives the hours worked.
    pub fn check_out(self, check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> AppResult<f64> {
        match self {
            WorkLogState::Open => Ok(hours_worked(check_in, check_out)),
            WorkLogState::Closed => Err(AppError::invalid_state("work log", self, "check out")),
        }
    }
}

impl fmt::Display for WorkLogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkLogState::Open => f.write_str("checked in"),
            WorkLogState::Closed => f.write_str("checked out"),
        }
    }
}

/// One open session per (employee, project).
pub fn ensure_can_check_in(open_session: bool) -> AppResult<()> {
    if open_session {
        return Err(AppError::invalid_state("work log", WorkLogState::Open, "check in"));
    }
    Ok(())
}

/// Elapsed wall-clock hours rounded to two decimals. Clock skew never
/// produces negative hours.
pub fn hours_worked(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> f64 {
    let millis = (check_out - check_in).num_milliseconds().max(0) as f64;
    round_hours(millis / 3_600_000.0)
}

pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// Midnight UTC on the Sunday that opens the week containing `now`.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let sunday = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    Utc.from_utc_datetime(&sunday.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, s).unwrap()
    }

    #[test]
    fn hours_are_rounded_to_two_decimals() {
        assert_eq!(hours_worked(at(8, 0, 0), at(16, 30, 0)), 8.5);
        // 1h 20m = 1.3333..
        assert_eq!(hours_worked(at(8, 0, 0), at(9, 20, 0)), 1.33);
        // 2h 41m = 2.68333..
        assert_eq!(hours_worked(at(8, 0, 0), at(10, 41, 0)), 2.68);
        assert_eq!(hours_worked(at(8, 0, 0), at(8, 0, 0)), 0.0);
    }

    #[test]
    fn skewed_clock_does_not_go_negative() {
        let start = at(9, 0, 0);
        assert_eq!(hours_worked(start, start - Duration::minutes(5)), 0.0);
    }

    #[test]
    fn weeks_start_on_sunday_midnight() {
        let sunday = Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap();
        // Friday afternoon
        assert_eq!(week_start(at(15, 45, 10)), sunday);
        assert_eq!(week_start(sunday + Duration::hours(23)), sunday);
        assert_eq!(week_start(sunday - Duration::seconds(1)), sunday - Duration::days(7));
    }

    #[test]
    fn second_check_in_is_refused() {
        assert!(ensure_can_check_in(false).is_ok());
        let err = ensure_can_check_in(true).unwrap_err();
        assert_eq!(err.to_string(), "invalid state: cannot check in work log in state checked in");
    }

    #[test]
    fn closed_log_cannot_check_out_again() {
        let state = WorkLogState::from_open(false);
        assert!(matches!(
            state.check_out(at(8, 0, 0), at(9, 0, 0)),
            Err(AppError::InvalidState { .. })
        ));
        assert_eq!(WorkLogState::Open.check_out(at(8, 0, 0), at(9, 0, 0)).unwrap(), 1.0);
    }
}
