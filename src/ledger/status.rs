use crate::model::*;

/// The mutation that was just applied to a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    Inserted(RangeStatus),
    Removed,
}

/// Property-level status after `change`, given the ranges that remain.
///
/// - A booked insert sets the aggregate to that status (last write wins).
/// - A `disponible` insert or any removal flips the aggregate to
///   `disponible` only when no booked range remains; otherwise the previous
///   aggregate is kept as-is, never re-derived from the remaining ranges.
pub fn derive_aggregate_status(
    ranges: &[DateRange],
    previous: &PropertyStatus,
    change: LedgerChange,
) -> PropertyStatus {
    match change {
        LedgerChange::Inserted(status) if status.is_booked() => PropertyStatus::Rental(status),
        LedgerChange::Inserted(_) | LedgerChange::Removed => {
            if ranges.iter().any(|r| r.status().is_booked()) {
                previous.clone()
            } else {
                PropertyStatus::Rental(RangeStatus::Disponible)
            }
        }
    }
}
