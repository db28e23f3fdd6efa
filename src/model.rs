use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::error::AvailabilityError;
use crate::limits::*;

/// Unix milliseconds, UTC.
pub type Ms = i64;

pub const DAY_MS: Ms = 86_400_000;

/// Closed interval `[start, end]`. Both ends belong to the span, so two spans
/// that share a boundary instant overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start <= end, "Span start must not be after end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t <= self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

// ── Statuses ─────────────────────────────────────────────────────

/// Booking state of a single date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeStatus {
    Disponible,
    ReservadoTemp,
    OcupadoTemp,
}

impl RangeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RangeStatus::Disponible => "disponible",
            RangeStatus::ReservadoTemp => "reservado_temp",
            RangeStatus::OcupadoTemp => "ocupado_temp",
        }
    }

    /// Reserved or occupied.
    pub fn is_booked(self) -> bool {
        matches!(self, RangeStatus::ReservadoTemp | RangeStatus::OcupadoTemp)
    }
}

impl fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeStatus {
    type Err = AvailabilityError;

    /// Accepts the canonical names plus the admin-form and English aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disponible" | "available" => Ok(RangeStatus::Disponible),
            "reservado_temp" | "reservado" | "booked" => Ok(RangeStatus::ReservadoTemp),
            "ocupado_temp" | "ocupado" | "occupied" => Ok(RangeStatus::OcupadoTemp),
            other => Err(AvailabilityError::InvalidRange(format!(
                "unknown status: {other:?}"
            ))),
        }
    }
}

/// Lifecycle status of a property. Temporary-rental properties carry one of
/// the range statuses; any other listing status is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyStatus {
    Rental(RangeStatus),
    Listing(String),
}

impl PropertyStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PropertyStatus::Rental(s) => s.as_str(),
            PropertyStatus::Listing(s) => s,
        }
    }
}

impl Default for PropertyStatus {
    fn default() -> Self {
        PropertyStatus::Rental(RangeStatus::Disponible)
    }
}

impl From<RangeStatus> for PropertyStatus {
    fn from(status: RangeStatus) -> Self {
        PropertyStatus::Rental(status)
    }
}

impl From<String> for PropertyStatus {
    fn from(s: String) -> Self {
        match s.parse::<RangeStatus>() {
            Ok(status) => PropertyStatus::Rental(status),
            Err(_) => PropertyStatus::Listing(s),
        }
    }
}

impl From<PropertyStatus> for String {
    fn from(status: PropertyStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Date ranges ──────────────────────────────────────────────────

/// Optional metadata attached to a range. Coerced, never rejected, except for
/// length limits.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeMeta {
    pub client_name: String,
    pub deposit: f64,
    pub guests: u32,
    pub notes: Option<String>,
    pub external_id: Option<String>,
}

impl Default for RangeMeta {
    fn default() -> Self {
        Self {
            client_name: String::new(),
            deposit: 0.0,
            guests: 1,
            notes: None,
            external_id: None,
        }
    }
}

/// Raw, unvalidated range as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeInput {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub client_name: Option<String>,
    pub deposit: Option<Value>,
    pub guests: Option<Value>,
    pub notes: Option<String>,
    #[serde(rename = "_id")]
    pub external_id: Option<String>,
}

/// One interval of a property's calendar. Fields are private: a range is
/// immutable once created, edits are remove + insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    id: Ulid,
    external_id: Option<String>,
    span: Span,
    status: RangeStatus,
    client_name: String,
    deposit: f64,
    guests: u32,
    notes: Option<String>,
}

impl DateRange {
    /// Build a range from already-typed parts, assigning a fresh id.
    pub fn new(span: Span, status: RangeStatus, meta: RangeMeta) -> Result<Self, AvailabilityError> {
        if span.start >= span.end {
            return Err(AvailabilityError::InvalidRange(
                "startDate must be before endDate".into(),
            ));
        }
        validate_instants(&span)?;
        if meta.client_name.len() > MAX_CLIENT_NAME_LEN {
            return Err(AvailabilityError::LimitExceeded("client name too long"));
        }
        if let Some(ref n) = meta.notes
            && n.len() > MAX_NOTES_LEN {
                return Err(AvailabilityError::LimitExceeded("notes too long"));
            }
        let deposit = if meta.deposit.is_finite() && meta.deposit > 0.0 {
            meta.deposit
        } else {
            0.0
        };
        Ok(Self {
            id: Ulid::new(),
            external_id: meta.external_id,
            span,
            status,
            client_name: meta.client_name,
            deposit,
            guests: meta.guests.max(1),
            notes: meta.notes,
        })
    }

    /// Parse and validate caller input.
    pub fn create(input: RangeInput) -> Result<Self, AvailabilityError> {
        let start = required_instant(input.start_date.as_deref(), "startDate")?;
        let end = required_instant(input.end_date.as_deref(), "endDate")?;
        let status = match input.status.as_deref() {
            Some(s) => s.parse::<RangeStatus>()?,
            None => {
                return Err(AvailabilityError::InvalidRange("status is required".into()));
            }
        };
        if start >= end {
            return Err(AvailabilityError::InvalidRange(
                "startDate must be before endDate".into(),
            ));
        }
        let meta = RangeMeta {
            client_name: input.client_name.map(|s| s.trim().to_string()).unwrap_or_default(),
            deposit: coerce_deposit(input.deposit.as_ref()),
            guests: coerce_guests(input.guests.as_ref()),
            notes: input.notes.filter(|n| !n.trim().is_empty()),
            external_id: input.external_id.filter(|s| !s.is_empty()),
        };
        Self::new(Span::new(start, end), status, meta)
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// True if `key` is this range's id or its upstream storage id.
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.trim();
        if let Ok(id) = key.parse::<Ulid>()
            && id == self.id {
                return true;
            }
        self.external_id.as_deref() == Some(key)
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn start(&self) -> Ms {
        self.span.start
    }

    pub fn end(&self) -> Ms {
        self.span.end
    }

    pub fn status(&self) -> RangeStatus {
        self.status
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn deposit(&self) -> f64 {
        self.deposit
    }

    pub fn guests(&self) -> u32 {
        self.guests
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.span.overlaps(&other.span)
    }
}

// ── Seasonal prices ──────────────────────────────────────────────

/// Percentage price adjustment over an inclusive window of days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPrice {
    pub id: Ulid,
    pub span: Span,
    pub percentage: f64,
    pub active: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonInput {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub percentage: Option<Value>,
    pub active: Option<bool>,
    pub description: Option<String>,
}

impl SeasonalPrice {
    pub fn create(input: SeasonInput) -> Result<Self, AvailabilityError> {
        let start = parse_season_instant(input.start_date.as_deref(), "startDate")?;
        let end = parse_season_instant(input.end_date.as_deref(), "endDate")?;
        if start > end {
            return Err(AvailabilityError::InvalidSeason(
                "startDate must not be after endDate".into(),
            ));
        }
        let percentage = input
            .percentage
            .as_ref()
            .and_then(value_as_f64)
            .ok_or_else(|| AvailabilityError::InvalidSeason("percentage is required".into()))?;
        if !(MIN_SEASON_PERCENTAGE..=MAX_SEASON_PERCENTAGE).contains(&percentage) {
            return Err(AvailabilityError::InvalidSeason(format!(
                "percentage must be between {MIN_SEASON_PERCENTAGE} and {MAX_SEASON_PERCENTAGE}"
            )));
        }
        if let Some(ref d) = input.description
            && d.len() > MAX_DESCRIPTION_LEN {
                return Err(AvailabilityError::LimitExceeded("description too long"));
            }
        Ok(Self {
            id: Ulid::new(),
            span: Span::new(start, end),
            percentage,
            active: input.active.unwrap_or(true),
            description: input.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

fn parse_season_instant(raw: Option<&str>, field: &str) -> Result<Ms, AvailabilityError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AvailabilityError::InvalidSeason(format!("{field} is required")))?;
    parse_instant(raw)
        .ok_or_else(|| AvailabilityError::InvalidSeason(format!("{field} is not a valid date")))
}

// ── Property document ────────────────────────────────────────────

/// The availability-relevant slice of a property listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub status: PropertyStatus,
    pub active: bool,
    /// Insertion-ordered ledger of ranges.
    pub availability: Vec<DateRange>,
    pub seasonal_prices: Vec<SeasonalPrice>,
    pub nightly_price: Option<f64>,
    pub amenities: Vec<String>,
    pub house_rules: Vec<String>,
    pub payment_methods: Vec<String>,
}

impl Property {
    pub fn new(id: Ulid, owner_id: Ulid) -> Self {
        Self {
            id,
            owner_id,
            status: PropertyStatus::default(),
            active: true,
            availability: Vec::new(),
            seasonal_prices: Vec::new(),
            nightly_price: None,
            amenities: Vec::new(),
            house_rules: Vec::new(),
            payment_methods: Vec::new(),
        }
    }
}

/// Partial update applied to a property as one atomic write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub availability: Option<Vec<DateRange>>,
    pub status: Option<PropertyStatus>,
    pub seasonal_prices: Option<Vec<SeasonalPrice>>,
    pub active: Option<bool>,
}

impl PropertyUpdate {
    /// Range list and recomputed aggregate status, always written together.
    pub fn ledger(ranges: Vec<DateRange>, status: PropertyStatus) -> Self {
        Self {
            availability: Some(ranges),
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn seasons(seasons: Vec<SeasonalPrice>) -> Self {
        Self {
            seasonal_prices: Some(seasons),
            ..Self::default()
        }
    }

    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Self::default()
        }
    }

    pub fn apply(self, property: &mut Property) {
        if let Some(ranges) = self.availability {
            property.availability = ranges;
        }
        if let Some(status) = self.status {
            property.status = status;
        }
        if let Some(seasons) = self.seasonal_prices {
            property.seasonal_prices = seasons;
        }
        if let Some(active) = self.active {
            property.active = active;
        }
    }
}

/// WAL record format. Each mutation is exactly one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    PropertyRegistered { property: Property },
    PropertyUpdated { id: Ulid, update: PropertyUpdate },
}

// ── Query result types ───────────────────────────────────────────

/// An existing range that blocks a candidate insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeConflict {
    pub id: Ulid,
    pub span: Span,
    pub status: RangeStatus,
}

// ── Parsing helpers ──────────────────────────────────────────────

/// Parse an RFC 3339 instant, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as
/// UTC) or a bare `YYYY-MM-DD` date (midnight UTC). Instants outside the
/// four-digit-year window are unparseable.
pub fn parse_instant(raw: &str) -> Option<Ms> {
    let raw = raw.trim();
    let ms = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.timestamp_millis()
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.and_utc().timestamp_millis()
    } else {
        date_start_ms(NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?)
    };
    (MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS)
        .contains(&ms)
        .then_some(ms)
}

/// RFC 3339 with millisecond precision, `Z` suffix.
pub fn format_instant(ms: Ms) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

/// Days since the Unix epoch of the UTC day containing `ms`.
pub fn day_index(ms: Ms) -> i64 {
    ms.div_euclid(DAY_MS)
}

pub fn date_start_ms(date: NaiveDate) -> Ms {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

pub fn date_index(date: NaiveDate) -> i64 {
    day_index(date_start_ms(date))
}

fn required_instant(raw: Option<&str>, field: &str) -> Result<Ms, AvailabilityError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AvailabilityError::InvalidRange(format!("{field} is required")))?;
    parse_instant(raw)
        .ok_or_else(|| AvailabilityError::InvalidRange(format!("{field} is not a valid date")))
}

fn validate_instants(span: &Span) -> Result<(), AvailabilityError> {
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(AvailabilityError::InvalidRange(
            "dates must fall between years 0000 and 9999".into(),
        ));
    }
    Ok(())
}

fn value_as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Invalid, missing or negative deposits become 0.
pub fn coerce_deposit(value: Option<&Value>) -> f64 {
    value
        .and_then(value_as_f64)
        .filter(|d| *d > 0.0)
        .unwrap_or(0.0)
}

/// Invalid, missing or non-positive guest counts become 1. Fractions truncate.
pub fn coerce_guests(value: Option<&Value>) -> u32 {
    let n = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    };
    match n {
        Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => 1,
    }
}
