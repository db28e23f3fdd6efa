use chrono::NaiveDate;
use ulid::Ulid;

use crate::error::AvailabilityError;
use crate::limits::MAX_SEASONS_PER_PROPERTY;
use crate::model::*;

use super::Ledger;

/// Seasonal price adjustments of one property. Seasons are whole days and
/// never overlap each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Seasons {
    items: Vec<SeasonalPrice>,
}

fn day_span(span: &Span) -> Span {
    Span::new(day_index(span.start), day_index(span.end))
}

impl Seasons {
    pub fn from_vec(items: Vec<SeasonalPrice>) -> Self {
        Self { items }
    }

    pub fn into_vec(self) -> Vec<SeasonalPrice> {
        self.items
    }

    /// Add `season`. It must fall inside the days covered by the property's
    /// availability ledger and must not share a day with another season.
    pub fn add(&mut self, season: SeasonalPrice, ledger: &Ledger) -> Result<&[SeasonalPrice], AvailabilityError> {
        if self.items.len() >= MAX_SEASONS_PER_PROPERTY {
            return Err(AvailabilityError::LimitExceeded("too many seasons on property"));
        }
        let coverage = ledger.coverage().ok_or_else(|| {
            AvailabilityError::InvalidSeason(
                "availability must be defined before seasonal prices".into(),
            )
        })?;
        let days = day_span(&season.span);
        if !day_span(&coverage).contains_span(&days) {
            return Err(AvailabilityError::InvalidSeason(
                "season must lie within the property's availability".into(),
            ));
        }
        if let Some(existing) = self.items.iter().find(|s| day_span(&s.span).overlaps(&days)) {
            return Err(AvailabilityError::SeasonOverlap(existing.id));
        }
        self.items.push(season);
        Ok(&self.items)
    }

    pub fn remove(&mut self, key: &str) -> Result<&[SeasonalPrice], AvailabilityError> {
        let id = key.trim().parse::<Ulid>().ok();
        let pos = self
            .items
            .iter()
            .position(|s| Some(s.id) == id)
            .ok_or_else(|| AvailabilityError::SeasonNotFound(key.to_string()))?;
        self.items.remove(pos);
        Ok(&self.items)
    }

    /// Percentage of the active season covering `date`, if any.
    pub fn rate_for(&self, date: NaiveDate) -> Option<f64> {
        let day = date_index(date);
        self.items
            .iter()
            .find(|s| s.active && day_span(&s.span).contains_instant(day))
            .map(|s| s.percentage)
    }

    /// `base` raised by the covering season's percentage.
    pub fn quote(&self, date: NaiveDate, base: f64) -> f64 {
        match self.rate_for(date) {
            Some(pct) => base * (1.0 + pct / 100.0),
            None => base,
        }
    }
}
