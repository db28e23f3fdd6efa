use chrono::NaiveDate;
use ulid::Ulid;

use crate::error::AvailabilityError;
use crate::ledger::{Ledger, Seasons};
use crate::model::*;

use super::{AvailabilityService, Requester};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub date: NaiveDate,
    pub base: f64,
    /// Percentage of the season that applied, if any.
    pub percentage: Option<f64>,
    pub price: f64,
}

impl AvailabilityService {
    pub async fn list_seasons(&self, property_id: Ulid) -> Result<Vec<SeasonalPrice>, AvailabilityError> {
        Ok(self.load_active(property_id).await?.seasonal_prices)
    }

    pub async fn add_season(
        &self,
        property_id: Ulid,
        requester: &Requester,
        input: SeasonInput,
    ) -> Result<Property, AvailabilityError> {
        self.mutate("add_season", property_id, requester, |property| {
            let season = SeasonalPrice::create(input)?;
            let ledger = Ledger::from_ranges(property.availability.clone());
            let mut seasons = Seasons::from_vec(property.seasonal_prices.clone());
            seasons.add(season, &ledger)?;
            Ok(PropertyUpdate::seasons(seasons.into_vec()))
        })
        .await
    }

    pub async fn remove_season(
        &self,
        property_id: Ulid,
        season_key: &str,
        requester: &Requester,
    ) -> Result<Property, AvailabilityError> {
        self.mutate("remove_season", property_id, requester, |property| {
            let mut seasons = Seasons::from_vec(property.seasonal_prices.clone());
            seasons.remove(season_key)?;
            Ok(PropertyUpdate::seasons(seasons.into_vec()))
        })
        .await
    }

    /// Nightly price on `date`. `base` falls back to the property's
    /// nightly price.
    pub async fn quote(
        &self,
        property_id: Ulid,
        date: NaiveDate,
        base: Option<f64>,
    ) -> Result<Quote, AvailabilityError> {
        let property = self.load_active(property_id).await?;
        let base = base
            .or(property.nightly_price)
            .ok_or_else(|| AvailabilityError::InvalidSeason("no base price given and none set on property".into()))?;
        if !(base.is_finite() && base >= 0.0) {
            return Err(AvailabilityError::InvalidSeason(
                "base price must be a non-negative number".into(),
            ));
        }
        let seasons = Seasons::from_vec(property.seasonal_prices);
        Ok(Quote {
            date,
            base,
            percentage: seasons.rate_for(date),
            price: seasons.quote(date, base),
        })
    }
}
