use chrono::NaiveDate;
use ulid::Ulid;

use crate::error::AvailabilityError;
use crate::ledger::{self, CalendarDay};

use super::AvailabilityService;

/// Per-day states for a window plus the runs of bookable days within it.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarView {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<CalendarDay>,
    pub open_windows: Vec<(NaiveDate, NaiveDate)>,
}

// Read-only: no lock, the snapshot is whatever the store returns.
impl AvailabilityService {
    pub async fn calendar(
        &self,
        property_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CalendarView, AvailabilityError> {
        let property = self.load_active(property_id).await?;
        let days = ledger::calendar(&property.availability, from, to)?;
        let open_windows = ledger::open_windows(&days);
        Ok(CalendarView {
            from,
            to,
            days,
            open_windows,
        })
    }

    pub async fn is_range_booked(
        &self,
        property_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<bool, AvailabilityError> {
        let property = self.load_active(property_id).await?;
        ledger::is_range_booked(&property.availability, from, to)
    }

    pub async fn is_range_fully_available(
        &self,
        property_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<bool, AvailabilityError> {
        let property = self.load_active(property_id).await?;
        ledger::is_range_fully_available(&property.availability, from, to)
    }
}
