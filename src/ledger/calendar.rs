use chrono::NaiveDate;

use crate::error::AvailabilityError;
use crate::limits::MAX_CALENDAR_DAYS;
use crate::model::*;

// ── Day-granularity view ──────────────────────────────────────────
//
// A range covers every UTC day from the day of its start to the day of its
// end, inclusive. Booked coverage wins over `disponible` coverage.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    Booked(RangeStatus),
    Available,
    Unmarked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub state: DayState,
}

/// `(first day, last day, status)` per range, as day indexes.
fn day_bounds(ranges: &[DateRange]) -> Vec<(i64, i64, RangeStatus)> {
    ranges
        .iter()
        .map(|r| (day_index(r.start()), day_index(r.end()), r.status()))
        .collect()
}

fn state_at(bounds: &[(i64, i64, RangeStatus)], day: i64) -> DayState {
    let mut available = false;
    for &(first, last, status) in bounds {
        if first <= day && day <= last {
            if status.is_booked() {
                return DayState::Booked(status);
            }
            available = true;
        }
    }
    if available {
        DayState::Available
    } else {
        DayState::Unmarked
    }
}

/// Number of days in `[from, to]`, bounded by `MAX_CALENDAR_DAYS`.
fn window_len(from: NaiveDate, to: NaiveDate) -> Result<i64, AvailabilityError> {
    if from > to {
        return Err(AvailabilityError::InvalidRange("from must not be after to".into()));
    }
    let days = (to - from).num_days() + 1;
    if days > MAX_CALENDAR_DAYS {
        return Err(AvailabilityError::LimitExceeded("calendar window too wide"));
    }
    Ok(days)
}

pub fn day_state(ranges: &[DateRange], date: NaiveDate) -> DayState {
    state_at(&day_bounds(ranges), date_index(date))
}

pub fn calendar(
    ranges: &[DateRange],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<CalendarDay>, AvailabilityError> {
    let days = window_len(from, to)?;
    let bounds = day_bounds(ranges);
    Ok(from
        .iter_days()
        .take(days as usize)
        .map(|date| CalendarDay {
            date,
            state: state_at(&bounds, date_index(date)),
        })
        .collect())
}

/// True if any day in `[from, to]` is covered by a booked range.
pub fn is_range_booked(
    ranges: &[DateRange],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<bool, AvailabilityError> {
    Ok(calendar(ranges, from, to)?
        .iter()
        .any(|d| matches!(d.state, DayState::Booked(_))))
}

/// True if every day in `[from, to]` is explicitly `disponible` and not
/// booked. An empty ledger has nothing available.
pub fn is_range_fully_available(
    ranges: &[DateRange],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<bool, AvailabilityError> {
    if ranges.is_empty() {
        window_len(from, to)?;
        return Ok(false);
    }
    Ok(calendar(ranges, from, to)?
        .iter()
        .all(|d| d.state == DayState::Available))
}

/// Maximal runs of consecutive available days, as `(first, last)` pairs.
pub fn open_windows(days: &[CalendarDay]) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows: Vec<(NaiveDate, NaiveDate)> = Vec::new();
    let mut prev: Option<NaiveDate> = None;
    for day in days {
        if day.state != DayState::Available {
            prev = None;
            continue;
        }
        match (windows.last_mut(), prev) {
            (Some(last), Some(p)) if p.succ_opt() == Some(day.date) => last.1 = day.date,
            _ => windows.push((day.date, day.date)),
        }
        prev = Some(day.date);
    }
    windows
}
