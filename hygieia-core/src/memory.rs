//! In-process record store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{Facility, FacilityId};
use crate::ports::{PortError, RecordStore, replace_or_push};

/// Record store backed by a vector in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    facilities: RwLock<Vec<Facility>>,
}

impl MemoryStore {
    /// Create a store seeded with the given records.
    #[must_use]
    pub fn new(facilities: Vec<Facility>) -> Self {
        Self {
            facilities: RwLock::new(facilities),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_all(&self) -> Result<Vec<Facility>, PortError> {
        Ok(self.facilities.read().await.clone())
    }

    async fn save_all(&self, facilities: &[Facility]) -> Result<(), PortError> {
        *self.facilities.write().await = facilities.to_vec();
        Ok(())
    }

    async fn get(&self, id: FacilityId) -> Result<Option<Facility>, PortError> {
        Ok(self
            .facilities
            .read()
            .await
            .iter()
            .find(|facility| facility.id == id)
            .cloned())
    }

    async fn upsert(&self, facility: Facility) -> Result<(), PortError> {
        replace_or_push(&mut *self.facilities.write().await, facility);
        Ok(())
    }
}
