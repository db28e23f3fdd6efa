mod queries;
mod seasons;
#[cfg(test)]
mod tests;

pub use queries::CalendarView;
pub use seasons::Quote;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::error::AvailabilityError;
use crate::ledger::{Ledger, LedgerChange, derive_aggregate_status};
use crate::model::*;
use crate::observability::{self, OVERLAP_REJECTIONS_TOTAL, PROPERTIES_ACTIVE, RANGE_MUTATIONS_TOTAL};
use crate::store::PropertyStore;

/// Who is asking. Owners may change their own properties; admins may change
/// any property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Ulid,
    pub is_admin: bool,
}

impl Requester {
    pub fn user(user_id: Ulid) -> Self {
        Self { user_id, is_admin: false }
    }

    pub fn admin(user_id: Ulid) -> Self {
        Self { user_id, is_admin: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Booked ranges must name a client.
    pub require_client_name: bool,
}

/// Ranges in insertion order plus the derived property status.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilitySnapshot {
    pub ranges: Vec<DateRange>,
    pub status: PropertyStatus,
}

impl From<Property> for AvailabilitySnapshot {
    fn from(property: Property) -> Self {
        let ledger = Ledger::from_ranges(property.availability);
        Self {
            ranges: ledger.list_ranges(),
            status: property.status,
        }
    }
}

/// Registration request, already normalised by the caller.
#[derive(Debug, Clone, Default)]
pub struct NewProperty {
    /// Generated when absent.
    pub id: Option<Ulid>,
    /// Defaults to the requester. Only admins may register for someone else.
    pub owner_id: Option<Ulid>,
    pub status: Option<PropertyStatus>,
    pub nightly_price: Option<f64>,
    pub amenities: Vec<String>,
    pub house_rules: Vec<String>,
    pub payment_methods: Vec<String>,
}

pub struct AvailabilityService {
    store: Arc<dyn PropertyStore>,
    /// One async mutex per property, held across load → validate → persist.
    locks: DashMap<Ulid, Arc<Mutex<()>>>,
    options: ServiceOptions,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn PropertyStore>, options: ServiceOptions) -> Self {
        metrics::gauge!(PROPERTIES_ACTIVE).set(store.active_property_count() as f64);
        Self {
            store,
            locks: DashMap::new(),
            options,
        }
    }

    pub fn property_count(&self) -> usize {
        self.store.property_count()
    }

    pub fn active_property_count(&self) -> usize {
        self.store.active_property_count()
    }

    fn lock_for(&self, property_id: Ulid) -> Arc<Mutex<()>> {
        self.locks.entry(property_id).or_default().value().clone()
    }

    /// Drop the lock entry of a property that turned out not to exist, unless
    /// another task is waiting on it.
    fn forget_lock(&self, property_id: Ulid) {
        self.locks
            .remove_if(&property_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// The property, if it exists and has not been deactivated.
    pub(crate) async fn load_active(&self, property_id: Ulid) -> Result<Property, AvailabilityError> {
        match self.store.load_property(property_id).await {
            Ok(Some(property)) if property.active => Ok(property),
            Ok(_) => Err(AvailabilityError::PropertyNotFound(property_id)),
            Err(e) => {
                error!(%property_id, "load failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Serialised read-modify-write of one property. `build` sees the
    /// current document after authorisation and returns the update to
    /// persist; the update is written as a single store call.
    pub(crate) async fn mutate<F>(
        &self,
        op: &'static str,
        property_id: Ulid,
        requester: &Requester,
        build: F,
    ) -> Result<Property, AvailabilityError>
    where
        F: FnOnce(&Property) -> Result<PropertyUpdate, AvailabilityError>,
    {
        let lock = self.lock_for(property_id);
        let result = {
            let _guard = lock.lock().await;
            self.mutate_locked(property_id, requester, build).await
        };
        drop(lock);
        if matches!(result, Err(AvailabilityError::PropertyNotFound(_))) {
            self.forget_lock(property_id);
        }
        record_mutation(op, property_id, requester, &result);
        result
    }

    async fn mutate_locked<F>(
        &self,
        property_id: Ulid,
        requester: &Requester,
        build: F,
    ) -> Result<Property, AvailabilityError>
    where
        F: FnOnce(&Property) -> Result<PropertyUpdate, AvailabilityError>,
    {
        let property = self.load_active(property_id).await?;
        authorize(&property, requester)?;
        let update = build(&property)?;
        Ok(self.store.save_property(property_id, update).await?)
    }

    fn check_policy(&self, range: &DateRange) -> Result<(), AvailabilityError> {
        if self.options.require_client_name
            && range.status().is_booked()
            && range.client_name().is_empty()
        {
            return Err(AvailabilityError::InvalidRange(
                "clientName is required for booked ranges".into(),
            ));
        }
        Ok(())
    }

    // ── Availability ─────────────────────────────────────────

    pub async fn get_availability(&self, property_id: Ulid) -> Result<AvailabilitySnapshot, AvailabilityError> {
        let property = self.load_active(property_id).await?;
        Ok(AvailabilitySnapshot::from(property))
    }

    pub async fn add_range(
        &self,
        property_id: Ulid,
        requester: &Requester,
        input: RangeInput,
    ) -> Result<Property, AvailabilityError> {
        self.mutate("add_range", property_id, requester, |property| {
            let range = DateRange::create(input)?;
            self.check_policy(&range)?;
            let status = range.status();
            let mut ledger = Ledger::from_ranges(property.availability.clone());
            ledger.insert(range)?;
            let aggregate = ledger.derive_aggregate_status(&property.status, LedgerChange::Inserted(status));
            Ok(PropertyUpdate::ledger(ledger.into_ranges(), aggregate))
        })
        .await
    }

    pub async fn remove_range(
        &self,
        property_id: Ulid,
        range_key: &str,
        requester: &Requester,
    ) -> Result<Property, AvailabilityError> {
        self.mutate("remove_range", property_id, requester, |property| {
            let mut ledger = Ledger::from_ranges(property.availability.clone());
            ledger.remove(range_key)?;
            let aggregate = ledger.derive_aggregate_status(&property.status, LedgerChange::Removed);
            Ok(PropertyUpdate::ledger(ledger.into_ranges(), aggregate))
        })
        .await
    }

    /// Swap one range for another in a single write. The aggregate status is
    /// reduced as the removal followed by the insertion.
    pub async fn replace_range(
        &self,
        property_id: Ulid,
        range_key: &str,
        requester: &Requester,
        input: RangeInput,
    ) -> Result<Property, AvailabilityError> {
        self.mutate("replace_range", property_id, requester, |property| {
            let range = DateRange::create(input)?;
            self.check_policy(&range)?;
            let (new_id, status) = (range.id(), range.status());
            let mut ledger = Ledger::from_ranges(property.availability.clone());
            ledger.replace(range_key, range)?;

            let without_new: Vec<DateRange> = ledger
                .ranges()
                .iter()
                .filter(|r| r.id() != new_id)
                .cloned()
                .collect();
            let after_removal = derive_aggregate_status(&without_new, &property.status, LedgerChange::Removed);
            let aggregate = ledger.derive_aggregate_status(&after_removal, LedgerChange::Inserted(status));
            Ok(PropertyUpdate::ledger(ledger.into_ranges(), aggregate))
        })
        .await
    }

    // ── Property lifecycle ───────────────────────────────────

    pub async fn register_property(
        &self,
        requester: &Requester,
        new: NewProperty,
    ) -> Result<Property, AvailabilityError> {
        let id = new.id.unwrap_or_else(Ulid::new);
        let owner_id = new.owner_id.unwrap_or(requester.user_id);
        if owner_id != requester.user_id && !requester.is_admin {
            return Err(AvailabilityError::Forbidden {
                property_id: id,
                requester_id: requester.user_id,
            });
        }
        if let Some(price) = new.nightly_price
            && !(price.is_finite() && price >= 0.0)
        {
            return Err(AvailabilityError::InvalidSeason(
                "nightlyPrice must be a non-negative number".into(),
            ));
        }

        let mut property = Property::new(id, owner_id);
        if let Some(status) = new.status {
            property.status = status;
        }
        property.nightly_price = new.nightly_price;
        property.amenities = new.amenities;
        property.house_rules = new.house_rules;
        property.payment_methods = new.payment_methods;

        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            self.store.insert_property(property.clone()).await
        };
        match result {
            Ok(()) => {
                metrics::gauge!(PROPERTIES_ACTIVE).increment(1.0);
                info!(property_id = %id, %owner_id, "property registered");
                Ok(property)
            }
            Err(e) => {
                let e = AvailabilityError::from(e);
                match &e {
                    AvailabilityError::Storage(_) => error!(property_id = %id, "register failed: {e}"),
                    _ => warn!(property_id = %id, "register rejected: {e}"),
                }
                Err(e)
            }
        }
    }

    /// Soft delete. Every later availability call reports `PropertyNotFound`.
    pub async fn deactivate_property(
        &self,
        property_id: Ulid,
        requester: &Requester,
    ) -> Result<Property, AvailabilityError> {
        let property = self
            .mutate("deactivate_property", property_id, requester, |_| {
                Ok(PropertyUpdate::deactivate())
            })
            .await?;
        // Only an active property can be deactivated, so each success is one
        // fewer.
        metrics::gauge!(PROPERTIES_ACTIVE).decrement(1.0);
        Ok(property)
    }
}

fn authorize(property: &Property, requester: &Requester) -> Result<(), AvailabilityError> {
    if requester.is_admin || property.owner_id == requester.user_id {
        Ok(())
    } else {
        Err(AvailabilityError::Forbidden {
            property_id: property.id,
            requester_id: requester.user_id,
        })
    }
}

fn record_mutation(
    op: &'static str,
    property_id: Ulid,
    requester: &Requester,
    result: &Result<Property, AvailabilityError>,
) {
    let outcome = observability::outcome_label(&result.as_ref().map(|_| ()));
    metrics::counter!(RANGE_MUTATIONS_TOTAL, "op" => op, "outcome" => outcome).increment(1);
    let user_id = requester.user_id;
    match result {
        Ok(property) => info!(
            op,
            %property_id,
            %user_id,
            ranges = property.availability.len(),
            status = %property.status,
            "availability updated"
        ),
        Err(AvailabilityError::Storage(e)) => error!(op, %property_id, "storage failure: {e}"),
        Err(e) => {
            if matches!(e, AvailabilityError::OverlapConflict { .. }) {
                metrics::counter!(OVERLAP_REJECTIONS_TOTAL).increment(1);
            }
            warn!(op, %property_id, %user_id, outcome, "mutation rejected: {e}");
        }
    }
}
