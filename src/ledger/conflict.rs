use crate::error::AvailabilityError;
use crate::model::*;

/// Every existing range the candidate touches or crosses. Status is ignored:
/// a `disponible` declaration blocks another `disponible` declaration too.
pub fn find_conflicts(ranges: &[DateRange], candidate: &Span) -> Vec<RangeConflict> {
    ranges
        .iter()
        .filter(|r| r.span().overlaps(candidate))
        .map(|r| RangeConflict {
            id: r.id(),
            span: r.span(),
            status: r.status(),
        })
        .collect()
}

pub(crate) fn check_no_conflict(ranges: &[DateRange], candidate: &Span) -> Result<(), AvailabilityError> {
    let conflicts = find_conflicts(ranges, candidate);
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(AvailabilityError::OverlapConflict {
            candidate: *candidate,
            conflicts,
        })
    }
}
