//! Resource registry: availability state for allocatable assets.
//!
//! The registry is the only writer of `availability`. Acquisition serializes
//! per resource id; different resources proceed in parallel.

use crate::jsonl::{JsonlError, read_records_from_path, write_records_to_path};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use thela_core::{Availability, ReleaseState, Resource, ResourceKind};

/// Errors raised by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown resource: {0}")]
    NotFound(String),

    #[error("resource {id} is already in use")]
    AlreadyInUse { id: String },

    #[error("resource {id} is unavailable")]
    Unavailable { id: String },

    #[error("resource {id} is not currently held")]
    NotHeld { id: String },

    #[error("resource {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: String,
        expected: ResourceKind,
        actual: ResourceKind,
    },
}

/// Availability state for every allocatable asset, keyed by id.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: RwLock<BTreeMap<String, Arc<Mutex<Resource>>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource.
    pub fn register(&self, resource: Resource) {
        let mut resources = self.resources.write().unwrap_or_else(|e| e.into_inner());
        match resources.get(&resource.id) {
            Some(entry) => {
                let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
                *entry = resource;
            }
            None => {
                resources.insert(resource.id.clone(), Arc::new(Mutex::new(resource)));
            }
        }
    }

    /// Snapshot one resource.
    pub fn resource(&self, resource_id: &str) -> Option<Resource> {
        let entry = self.entry(resource_id)?;
        let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(entry.clone())
    }

    /// Snapshot all resources in deterministic id order.
    pub fn list(&self) -> Vec<Resource> {
        let resources = self.resources.read().unwrap_or_else(|e| e.into_inner());
        resources
            .values()
            .map(|entry| entry.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect()
    }

    /// Pure read check: the resource exists, is of `kind`, and is available.
    ///
    /// Used by the allocator's validation phase; the authoritative gate is
    /// still `try_acquire`.
    pub fn expect_available_kind(
        &self,
        resource_id: &str,
        kind: ResourceKind,
    ) -> Result<(), RegistryError> {
        let entry = self
            .entry(resource_id)
            .ok_or_else(|| RegistryError::NotFound(resource_id.to_string()))?;
        let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        if entry.kind != kind {
            return Err(RegistryError::WrongKind {
                id: resource_id.to_string(),
                expected: kind,
                actual: entry.kind,
            });
        }
        match entry.availability {
            Availability::Available => Ok(()),
            Availability::InUse => Err(RegistryError::AlreadyInUse {
                id: resource_id.to_string(),
            }),
            Availability::Unavailable => Err(RegistryError::Unavailable {
                id: resource_id.to_string(),
            }),
        }
    }

    /// Transition `available -> in_use`; reject anything else.
    pub fn try_acquire(&self, resource_id: &str) -> Result<(), RegistryError> {
        let entry = self
            .entry(resource_id)
            .ok_or_else(|| RegistryError::NotFound(resource_id.to_string()))?;
        let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        match entry.availability {
            Availability::Available => {
                entry.availability = Availability::InUse;
                Ok(())
            }
            Availability::InUse => Err(RegistryError::AlreadyInUse {
                id: resource_id.to_string(),
            }),
            Availability::Unavailable => Err(RegistryError::Unavailable {
                id: resource_id.to_string(),
            }),
        }
    }

    /// Transition `in_use -> next`; rejects resources not currently held.
    pub fn release(
        &self,
        resource_id: &str,
        next: ReleaseState,
    ) -> Result<Resource, RegistryError> {
        let entry = self
            .entry(resource_id)
            .ok_or_else(|| RegistryError::NotFound(resource_id.to_string()))?;
        let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        if entry.availability != Availability::InUse {
            return Err(RegistryError::NotHeld {
                id: resource_id.to_string(),
            });
        }
        entry.availability = next.into();
        Ok(entry.clone())
    }

    /// Hydrate from a JSONL snapshot. Later lines win on duplicate ids.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, JsonlError> {
        let records: Vec<Resource> = read_records_from_path(path)?;
        let registry = Self::new();
        {
            let mut resources = registry.resources.write().unwrap_or_else(|e| e.into_inner());
            for record in records {
                resources.insert(record.id.clone(), Arc::new(Mutex::new(record)));
            }
        }
        Ok(registry)
    }

    /// Flush all resources to a JSONL snapshot.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), JsonlError> {
        write_records_to_path(path, &self.list())
    }

    fn entry(&self, resource_id: &str) -> Option<Arc<Mutex<Resource>>> {
        let resources = self.resources.read().unwrap_or_else(|e| e.into_inner());
        resources.get(resource_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn registry_with(id: &str, kind: ResourceKind) -> ResourceRegistry {
        let registry = ResourceRegistry::new();
        registry.register(Resource::new(id, kind, ""));
        registry
    }

    #[test]
    fn acquire_is_exclusive_per_resource() {
        let registry = registry_with("v1", ResourceKind::Vehicle);

        registry.try_acquire("v1").expect("first acquire should win");
        let err = registry.try_acquire("v1").expect_err("second acquire must lose");
        assert!(matches!(err, RegistryError::AlreadyInUse { id } if id == "v1"));
    }

    #[test]
    fn unavailable_resources_are_not_acquirable() {
        let registry = ResourceRegistry::new();
        let mut battery = Resource::new("b1", ResourceKind::Battery, "");
        battery.availability = Availability::Unavailable;
        registry.register(battery);

        assert!(matches!(
            registry.try_acquire("b1"),
            Err(RegistryError::Unavailable { .. })
        ));
    }

    #[test]
    fn release_returns_to_pool_or_marks_defective() {
        let registry = registry_with("v1", ResourceKind::Vehicle);
        registry.try_acquire("v1").expect("acquire should succeed");

        let released = registry
            .release("v1", ReleaseState::Unavailable)
            .expect("release should succeed");
        assert_eq!(released.availability, Availability::Unavailable);

        let err = registry
            .release("v1", ReleaseState::Available)
            .expect_err("double release must fail");
        assert!(matches!(err, RegistryError::NotHeld { .. }));
    }

    #[test]
    fn kind_mismatch_is_reported_before_acquisition() {
        let registry = registry_with("b1", ResourceKind::Battery);
        let err = registry
            .expect_available_kind("b1", ResourceKind::Vehicle)
            .expect_err("kind mismatch must fail");
        assert!(matches!(
            err,
            RegistryError::WrongKind {
                expected: ResourceKind::Vehicle,
                actual: ResourceKind::Battery,
                ..
            }
        ));
    }

    #[test]
    fn racing_acquires_admit_exactly_one_winner() {
        let registry = Arc::new(registry_with("v1", ResourceKind::Vehicle));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.try_acquire("v1").is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("acquirer thread should not panic"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(
            registry.resource("v1").expect("resource should exist").availability,
            Availability::InUse
        );
    }
}
