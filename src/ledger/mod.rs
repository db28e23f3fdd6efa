mod calendar;
mod conflict;
mod seasons;
mod status;

pub use calendar::{CalendarDay, DayState, day_state, is_range_booked, is_range_fully_available, open_windows, calendar};
pub use conflict::find_conflicts;
pub use seasons::Seasons;
pub use status::{LedgerChange, derive_aggregate_status};

use crate::error::AvailabilityError;
use crate::limits::MAX_RANGES_PER_PROPERTY;
use crate::model::*;

/// The set of date ranges belonging to one property, in insertion order.
///
/// No two ranges overlap (inclusive boundaries), whatever their status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    ranges: Vec<DateRange>,
}

impl Ledger {
    /// Wrap ranges loaded from storage. Storage only ever holds ledgers that
    /// passed `insert`, so the invariant is not re-checked here.
    pub fn from_ranges(ranges: Vec<DateRange>) -> Self {
        Self { ranges }
    }

    pub fn ranges(&self) -> &[DateRange] {
        &self.ranges
    }

    /// Snapshot of every range in insertion order.
    pub fn list_ranges(&self) -> Vec<DateRange> {
        self.ranges.clone()
    }

    pub fn into_ranges(self) -> Vec<DateRange> {
        self.ranges
    }

    /// Append `range` unless it touches or crosses any existing range.
    /// On failure the ledger is unchanged.
    pub fn insert(&mut self, range: DateRange) -> Result<&[DateRange], AvailabilityError> {
        if self.ranges.len() >= MAX_RANGES_PER_PROPERTY {
            return Err(AvailabilityError::LimitExceeded("too many ranges on property"));
        }
        conflict::check_no_conflict(&self.ranges, &range.span())?;
        self.ranges.push(range);
        Ok(&self.ranges)
    }

    /// Remove the range whose id (or upstream storage id) equals `key`.
    pub fn remove(&mut self, key: &str) -> Result<&[DateRange], AvailabilityError> {
        let pos = self
            .ranges
            .iter()
            .position(|r| r.matches_key(key))
            .ok_or_else(|| AvailabilityError::RangeNotFound(key.to_string()))?;
        self.ranges.remove(pos);
        Ok(&self.ranges)
    }

    /// Remove `key` and insert `range` in its place, all-or-nothing.
    pub fn replace(&mut self, key: &str, range: DateRange) -> Result<&[DateRange], AvailabilityError> {
        let mut working = self.clone();
        working.remove(key)?;
        working.insert(range)?;
        *self = working;
        Ok(&self.ranges)
    }

    /// Earliest start to latest end across all ranges.
    pub fn coverage(&self) -> Option<Span> {
        let start = self.ranges.iter().map(|r| r.start()).min()?;
        let end = self.ranges.iter().map(|r| r.end()).max()?;
        Some(Span::new(start, end))
    }

    pub fn derive_aggregate_status(
        &self,
        previous: &PropertyStatus,
        change: LedgerChange,
    ) -> PropertyStatus {
        derive_aggregate_status(&self.ranges, previous, change)
    }
}
