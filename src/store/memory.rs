use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ulid::Ulid;

use crate::model::{Property, PropertyUpdate};

use super::{PropertyStore, StoreError};

/// Volatile store. Used in tests and when the server runs without a data
/// directory.
#[derive(Default)]
pub struct InMemoryStore {
    properties: DashMap<Ulid, Property>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for InMemoryStore {
    async fn load_property(&self, id: Ulid) -> Result<Option<Property>, StoreError> {
        Ok(self.properties.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_property(&self, property: Property) -> Result<(), StoreError> {
        match self.properties.entry(property.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(property.id)),
            Entry::Vacant(slot) => {
                slot.insert(property);
                Ok(())
            }
        }
    }

    async fn save_property(&self, id: Ulid, update: PropertyUpdate) -> Result<Property, StoreError> {
        let mut entry = self.properties.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        update.apply(entry.value_mut());
        Ok(entry.value().clone())
    }

    fn property_count(&self) -> usize {
        self.properties.len()
    }

    fn active_property_count(&self) -> usize {
        self.properties.iter().filter(|e| e.value().active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyStatus, RangeStatus};

    #[tokio::test]
    async fn insert_load_and_save() {
        let store = InMemoryStore::new();
        let id = Ulid::new();
        store.insert_property(Property::new(id, Ulid::new())).await.unwrap();
        assert_eq!(store.property_count(), 1);

        let saved = store
            .save_property(id, PropertyUpdate::ledger(Vec::new(), RangeStatus::ReservadoTemp.into()))
            .await
            .unwrap();
        assert_eq!(saved.status, PropertyStatus::Rental(RangeStatus::ReservadoTemp));
        let loaded = store.load_property(id).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn duplicate_insert_and_missing_save_fail() {
        let store = InMemoryStore::new();
        let id = Ulid::new();
        store.insert_property(Property::new(id, Ulid::new())).await.unwrap();
        let dup = store.insert_property(Property::new(id, Ulid::new())).await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists(d)) if d == id));

        let missing = Ulid::new();
        let result = store.save_property(missing, PropertyUpdate::deactivate()).await;
        assert!(matches!(result, Err(StoreError::NotFound(m)) if m == missing));
        assert!(store.load_property(missing).await.unwrap().is_none());
    }
}
