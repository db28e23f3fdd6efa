use ulid::Ulid;

use crate::model::{RangeConflict, Span, format_instant};

#[derive(Debug)]
pub enum AvailabilityError {
    /// Malformed dates, start >= end, unknown status, missing field.
    InvalidRange(String),
    OverlapConflict {
        candidate: Span,
        conflicts: Vec<RangeConflict>,
    },
    RangeNotFound(String),
    Forbidden {
        property_id: Ulid,
        requester_id: Ulid,
    },
    /// Missing or soft-deleted.
    PropertyNotFound(Ulid),
    AlreadyExists(Ulid),
    InvalidSeason(String),
    SeasonOverlap(Ulid),
    SeasonNotFound(String),
    LimitExceeded(&'static str),
    Storage(String),
}

impl std::fmt::Display for AvailabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvailabilityError::InvalidRange(msg) => write!(f, "invalid range: {msg}"),
            AvailabilityError::OverlapConflict {
                candidate,
                conflicts,
            } => {
                write!(
                    f,
                    "range [{}, {}] overlaps {} existing range(s)",
                    format_instant(candidate.start),
                    format_instant(candidate.end),
                    conflicts.len()
                )?;
                for c in conflicts {
                    write!(
                        f,
                        "; {} [{}, {}] {}",
                        c.id,
                        format_instant(c.span.start),
                        format_instant(c.span.end),
                        c.status
                    )?;
                }
                Ok(())
            }
            AvailabilityError::RangeNotFound(key) => write!(f, "range not found: {key}"),
            AvailabilityError::Forbidden {
                property_id,
                requester_id,
            } => write!(
                f,
                "user {requester_id} may not modify availability of property {property_id}"
            ),
            AvailabilityError::PropertyNotFound(id) => write!(f, "property not found: {id}"),
            AvailabilityError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            AvailabilityError::InvalidSeason(msg) => write!(f, "invalid season: {msg}"),
            AvailabilityError::SeasonOverlap(id) => {
                write!(f, "season overlaps existing season: {id}")
            }
            AvailabilityError::SeasonNotFound(key) => write!(f, "season not found: {key}"),
            AvailabilityError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            AvailabilityError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for AvailabilityError {}
