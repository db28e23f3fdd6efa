use crate::model::Ms;

/// 0000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = -62_167_219_200_000;
/// 9999-12-31T23:59:59.999Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 253_402_300_799_999;

pub const MAX_RANGES_PER_PROPERTY: usize = 2_000;
pub const MAX_SEASONS_PER_PROPERTY: usize = 200;

pub const MAX_CLIENT_NAME_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 2_000;
pub const MAX_DESCRIPTION_LEN: usize = 500;

pub const MIN_SEASON_PERCENTAGE: f64 = 0.0;
pub const MAX_SEASON_PERCENTAGE: f64 = 1_000.0;

/// Widest window a calendar query may span, in days.
pub const MAX_CALENDAR_DAYS: i64 = 731;

pub const MAX_LIST_ITEMS: usize = 100;
pub const MAX_LIST_ITEM_LEN: usize = 200;
