mod memory;
mod wal_store;

pub use memory::InMemoryStore;
pub use wal_store::WalStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::error::AvailabilityError;
use crate::model::{Property, PropertyUpdate};

#[derive(Debug)]
pub enum StoreError {
    AlreadyExists(Ulid),
    NotFound(Ulid),
    /// Log append, flush or compaction failed. The write did not happen.
    Wal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::AlreadyExists(id) => write!(f, "property already stored: {id}"),
            StoreError::NotFound(id) => write!(f, "property not stored: {id}"),
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for AvailabilityError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(id) => AvailabilityError::AlreadyExists(id),
            StoreError::NotFound(id) => AvailabilityError::PropertyNotFound(id),
            StoreError::Wal(msg) => AvailabilityError::Storage(msg),
        }
    }
}

/// Durable home of property documents.
///
/// `save_property` applies the whole update or nothing; the returned property
/// is the stored state after the write. Implementations do not serialize
/// writers; callers hold a per-property lock around load + save.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn load_property(&self, id: Ulid) -> Result<Option<Property>, StoreError>;

    async fn insert_property(&self, property: Property) -> Result<(), StoreError>;

    async fn save_property(&self, id: Ulid, update: PropertyUpdate) -> Result<Property, StoreError>;

    fn property_count(&self) -> usize;

    /// Properties that have not been deactivated.
    fn active_property_count(&self) -> usize;
}
