use chrono::NaiveDate;
use serde::Serialize;
use ulid::Ulid;

use crate::ledger::{CalendarDay, DayState};
use crate::model::*;
use crate::service::{AvailabilitySnapshot, CalendarView, Quote};

// JSON shapes of the public API. Instants are RFC 3339, calendar days are
// `YYYY-MM-DD`, field names are camelCase.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeView {
    pub id: Ulid,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub status: RangeStatusView,
    pub client_name: String,
    pub deposit: f64,
    pub guests: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Canonical status string.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct RangeStatusView(&'static str);

impl From<RangeStatus> for RangeStatusView {
    fn from(status: RangeStatus) -> Self {
        Self(status.as_str())
    }
}

impl From<&DateRange> for RangeView {
    fn from(r: &DateRange) -> Self {
        Self {
            id: r.id(),
            external_id: r.external_id().map(str::to_string),
            start_date: format_instant(r.start()),
            end_date: format_instant(r.end()),
            status: r.status().into(),
            client_name: r.client_name().to_string(),
            deposit: r.deposit(),
            guests: r.guests(),
            notes: r.notes().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonView {
    pub id: Ulid,
    pub start_date: String,
    pub end_date: String,
    pub percentage: f64,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&SeasonalPrice> for SeasonView {
    fn from(s: &SeasonalPrice) -> Self {
        Self {
            id: s.id,
            start_date: format_instant(s.span.start),
            end_date: format_instant(s.span.end),
            percentage: s.percentage,
            active: s.active,
            description: s.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyView {
    pub id: Ulid,
    pub owner_user_id: Ulid,
    pub status: PropertyStatus,
    pub active: bool,
    pub availability: Vec<RangeView>,
    pub seasonal_prices: Vec<SeasonView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nightly_price: Option<f64>,
    #[serde(rename = "servicios")]
    pub amenities: Vec<String>,
    #[serde(rename = "reglasPropiedad")]
    pub house_rules: Vec<String>,
    #[serde(rename = "metodosPago")]
    pub payment_methods: Vec<String>,
}

impl From<&Property> for PropertyView {
    fn from(p: &Property) -> Self {
        Self {
            id: p.id,
            owner_user_id: p.owner_id,
            status: p.status.clone(),
            active: p.active,
            availability: p.availability.iter().map(RangeView::from).collect(),
            seasonal_prices: p.seasonal_prices.iter().map(SeasonView::from).collect(),
            nightly_price: p.nightly_price,
            amenities: p.amenities.clone(),
            house_rules: p.house_rules.clone(),
            payment_methods: p.payment_methods.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvailabilityView {
    pub ranges: Vec<RangeView>,
    pub status: PropertyStatus,
}

impl From<&AvailabilitySnapshot> for AvailabilityView {
    fn from(s: &AvailabilitySnapshot) -> Self {
        Self {
            ranges: s.ranges.iter().map(RangeView::from).collect(),
            status: s.status.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictView {
    pub id: Ulid,
    pub start_date: String,
    pub end_date: String,
    pub status: RangeStatusView,
}

impl From<&RangeConflict> for ConflictView {
    fn from(c: &RangeConflict) -> Self {
        Self {
            id: c.id,
            start_date: format_instant(c.span.start),
            end_date: format_instant(c.span.end),
            status: c.status.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DayView {
    pub date: NaiveDate,
    /// `booked`, `available` or `unmarked`.
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RangeStatusView>,
}

impl From<&CalendarDay> for DayView {
    fn from(d: &CalendarDay) -> Self {
        let (state, status) = match d.state {
            DayState::Booked(s) => ("booked", Some(s.into())),
            DayState::Available => ("available", None),
            DayState::Unmarked => ("unmarked", None),
        };
        Self {
            date: d.date,
            state,
            status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WindowView {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<DayView>,
    pub open_windows: Vec<WindowView>,
}

impl From<&CalendarView> for CalendarResponse {
    fn from(v: &CalendarView) -> Self {
        Self {
            from: v.from,
            to: v.to,
            days: v.days.iter().map(DayView::from).collect(),
            open_windows: v
                .open_windows
                .iter()
                .map(|&(from, to)| WindowView { from, to })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteView {
    pub date: NaiveDate,
    pub base: f64,
    pub percentage: Option<f64>,
    pub price: f64,
}

impl From<&Quote> for QuoteView {
    fn from(q: &Quote) -> Self {
        Self {
            date: q.date,
            base: q.base,
            percentage: q.percentage,
            price: q.price,
        }
    }
}
