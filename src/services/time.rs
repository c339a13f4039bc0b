//! Minutes-of-day arithmetic, date-string conversion, and working-day
//! traversal (C1, §4.1). All operations use the local civil calendar — no
//! time zones are carried by the core; callers normalize to a single zone
//! before calling in.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

use crate::error::{SchedulerError, SchedulerResult};

/// Parses `"HH:MM"` into minutes-since-midnight. Fails with
/// `SchedulerError::InvalidFormat` on anything else.
pub fn to_minutes(value: &str) -> SchedulerResult<u32> {
    let (hour_str, minute_str) = value
        .split_once(':')
        .ok_or_else(|| SchedulerError::invalid_format(format!("expected HH:MM, got {value:?}")))?;
    let hour: u32 = hour_str
        .parse()
        .map_err(|_| SchedulerError::invalid_format(format!("invalid hour in {value:?}")))?;
    let minute: u32 = minute_str
        .parse()
        .map_err(|_| SchedulerError::invalid_format(format!("invalid minute in {value:?}")))?;
    if hour > 23 || minute > 59 {
        return Err(SchedulerError::invalid_format(format!(
            "hour/minute out of range in {value:?}"
        )));
    }
    Ok(hour * 60 + minute)
}

/// Formats minutes-since-midnight as `"HH:MM"`.
pub fn to_time_string(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

pub fn is_working_day(date: NaiveDate, working_days: &BTreeSet<u8>) -> bool {
    working_days.contains(&weekday_index(date.weekday()))
}

/// Calendar days strictly between `a` and `b` (inclusive of both ends)
/// whose weekday is in `working_days`, counted in chronological order. If
/// `b < a` the count is 0.
pub fn working_days_between(a: NaiveDate, b: NaiveDate, working_days: &BTreeSet<u8>) -> i64 {
    if b < a {
        return 0;
    }
    let mut count = 0i64;
    let mut cursor = a;
    while cursor <= b {
        if is_working_day(cursor, working_days) {
            count += 1;
        }
        cursor = cursor.succ_opt().expect("date arithmetic in range");
    }
    count
}

/// `d` advanced by `n` working days (n may be negative to go backwards).
/// The starting date itself is never counted.
pub fn add_working_days(d: NaiveDate, n: i64, working_days: &BTreeSet<u8>) -> NaiveDate {
    let mut cursor = d;
    let mut remaining = n.abs();
    let step = if n >= 0 { 1 } else { -1 };
    while remaining > 0 {
        cursor = if step > 0 {
            cursor.succ_opt().expect("date arithmetic in range")
        } else {
            cursor.pred_opt().expect("date arithmetic in range")
        };
        if is_working_day(cursor, working_days) {
            remaining -= 1;
        }
    }
    cursor
}

/// All dates in `[start, end]` (inclusive) whose weekday is a working day,
/// in chronological order. Used by C3 to build the capacity map.
pub fn enumerate_working_days(
    start: NaiveDate,
    end: NaiveDate,
    working_days: &BTreeSet<u8>,
) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    if end < start {
        return out;
    }
    let mut cursor = start;
    while cursor <= end {
        if is_working_day(cursor, working_days) {
            out.push(cursor);
        }
        cursor = cursor.succ_opt().expect("date arithmetic in range");
    }
    out
}

pub fn start_of_day(date: NaiveDate) -> chrono::NaiveDateTime {
    date.and_hms_opt(0, 0, 0).expect("midnight is always valid")
}

/// End-of-day (23:59) as minutes-from-midnight of `date`, expressed as a
/// `NaiveDateTime` so it composes with `earliestStart`/block comparisons.
pub fn end_of_day(date: NaiveDate) -> chrono::NaiveDateTime {
    date.and_hms_opt(23, 59, 0).expect("23:59 is always valid")
}
